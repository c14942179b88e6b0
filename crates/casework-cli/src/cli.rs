//! Clap argument types and their conversion into core parameters.
//!
//! ```text
//! User Input → CLI Args (clap) → Core Params → Engine
//! ```
//!
//! The core parameter types carry no clap derives; every wrapper here owns
//! the help text and flags and converts with `From`.

use std::path::PathBuf;

use casework_core::params::*;
use clap::{Args, Subcommand, ValueEnum};

// ============================================================================
// Definitions
// ============================================================================

/// Deploy a case definition from a JSON file
///
/// Deploying a key that already exists stores a new version. Cases that are
/// already running keep the version they were started from.
#[derive(Args)]
pub struct DeployDefinitionArgs {
    #[arg(help = "Path to the definition JSON file")]
    pub file: PathBuf,
}

/// Show a deployed definition
#[derive(Args)]
pub struct ShowDefinitionArgs {
    #[arg(help = "Definition key")]
    pub key: String,
    #[arg(long, help = "Version to show; defaults to the latest")]
    pub version: Option<u32>,
    #[arg(long, help = "Print the definition as JSON instead of a tree")]
    pub json: bool,
}

impl From<&ShowDefinitionArgs> for ShowDefinition {
    fn from(val: &ShowDefinitionArgs) -> Self {
        ShowDefinition {
            key: val.key.clone(),
            version: val.version,
        }
    }
}

#[derive(Subcommand)]
pub enum DefinitionCommands {
    /// Deploy a case definition from a JSON file
    #[command(alias = "d")]
    Deploy(DeployDefinitionArgs),
    /// List the latest version of every definition
    #[command(aliases = ["l", "ls"])]
    List,
    /// Show a deployed definition
    #[command(alias = "s")]
    Show(ShowDefinitionArgs),
}

// ============================================================================
// Cases
// ============================================================================

/// Start a case from the latest version of a definition
#[derive(Args)]
pub struct StartCaseArgs {
    #[arg(help = "Key of the definition to start")]
    pub definition_key: String,
    #[arg(
        short = 'v',
        long = "var",
        help = "Initial variable as name=value; the value is read as JSON when possible"
    )]
    pub variables: Vec<String>,
}

impl From<StartCaseArgs> for StartCase {
    fn from(val: StartCaseArgs) -> Self {
        StartCase {
            definition_key: val.definition_key,
            variables: val.variables,
        }
    }
}

/// List cases
///
/// Shows active cases by default. Use --ended for completed and terminated
/// cases, or --all for every case.
#[derive(Args)]
pub struct ListCasesArgs {
    #[arg(long, help = "Show completed and terminated cases", conflicts_with = "all")]
    pub ended: bool,
    #[arg(long, help = "Show every case regardless of state")]
    pub all: bool,
    #[arg(long = "definition", help = "Only cases of this definition key")]
    pub definition_key: Option<String>,
}

impl From<ListCasesArgs> for ListCases {
    fn from(val: ListCasesArgs) -> Self {
        ListCases {
            ended: val.ended,
            all: val.all,
            definition_key: val.definition_key,
        }
    }
}

/// Assign case variables and re-evaluate the case
#[derive(Args)]
pub struct SetVariablesArgs {
    #[arg(help = "ID of the case")]
    pub case_id: u64,
    #[arg(
        required = true,
        help = "Assignments as name=value; the value is read as JSON when possible"
    )]
    pub assignments: Vec<String>,
}

impl From<SetVariablesArgs> for SetVariables {
    fn from(val: SetVariablesArgs) -> Self {
        SetVariables {
            case_id: val.case_id,
            assignments: val.assignments,
        }
    }
}

/// Any command that only needs an ID
#[derive(Args)]
pub struct IdArgs {
    #[arg(help = "Unique identifier")]
    pub id: u64,
}

impl From<IdArgs> for Id {
    fn from(val: IdArgs) -> Self {
        Id { id: val.id }
    }
}

#[derive(Subcommand)]
pub enum CaseCommands {
    /// Start a case from a definition
    #[command(alias = "n")]
    Start(StartCaseArgs),
    /// List cases
    #[command(aliases = ["l", "ls"])]
    List(ListCasesArgs),
    /// Show a case with its variables and plan item tree
    #[command(alias = "s")]
    Show(IdArgs),
    /// Assign case variables
    #[command(alias = "set")]
    Vars(SetVariablesArgs),
    /// Show the lifecycle history of a case
    #[command(alias = "h")]
    History(IdArgs),
    /// Terminate a case and everything still live in it
    Terminate(IdArgs),
}

// ============================================================================
// Plan items
// ============================================================================

/// Plan item states accepted by `--state`
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum StateArg {
    Available,
    Active,
    Completed,
    Terminated,
}

impl StateArg {
    fn as_str(self) -> &'static str {
        match self {
            StateArg::Available => "available",
            StateArg::Active => "active",
            StateArg::Completed => "completed",
            StateArg::Terminated => "terminated",
        }
    }
}

/// Plan item kinds accepted by `--kind`
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Task,
    Stage,
    PlanModel,
}

impl KindArg {
    fn as_str(self) -> &'static str {
        match self {
            KindArg::Task => "humanTask",
            KindArg::Stage => "stage",
            KindArg::PlanModel => "planModel",
        }
    }
}

/// List the plan items of a case
///
/// Ended items are hidden unless --all is given or --state asks for them.
#[derive(Args)]
pub struct ListItemsArgs {
    #[arg(help = "ID of the case")]
    pub case_id: u64,
    #[arg(short, long, help = "Only items in this state")]
    pub state: Option<StateArg>,
    #[arg(short, long, help = "Only items of this kind")]
    pub kind: Option<KindArg>,
    #[arg(long, help = "Only containers that can be completed right now")]
    pub completeable: bool,
    #[arg(long, help = "Include completed and terminated items")]
    pub all: bool,
}

impl From<ListItemsArgs> for ListPlanItems {
    fn from(val: ListItemsArgs) -> Self {
        ListPlanItems {
            case_id: val.case_id,
            state: val.state.map(|s| s.as_str().to_string()),
            kind: val.kind.map(|k| k.as_str().to_string()),
            completeable: val.completeable.then_some(true),
            all: val.all,
        }
    }
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// List the plan items of a case
    #[command(aliases = ["l", "ls"])]
    List(ListItemsArgs),
    /// Show one plan item
    #[command(alias = "s")]
    Show(IdArgs),
    /// Complete an active human task
    #[command(alias = "c")]
    Complete(IdArgs),
    /// Complete an active stage that no longer has blocking children
    #[command(alias = "cs")]
    CompleteStage(IdArgs),
    /// Activate an item waiting for manual activation
    #[command(alias = "a")]
    Activate(IdArgs),
}

// ============================================================================
// Tasks
// ============================================================================

/// List open human tasks
#[derive(Args)]
pub struct ListTasksArgs {
    #[arg(long = "case", help = "Only tasks of this case")]
    pub case_id: Option<u64>,
}

impl From<ListTasksArgs> for ListTasks {
    fn from(val: ListTasksArgs) -> Self {
        ListTasks {
            case_id: val.case_id,
        }
    }
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List open human tasks across cases
    #[command(aliases = ["l", "ls"])]
    List(ListTasksArgs),
    /// Complete a task (same as `item complete`)
    #[command(alias = "c")]
    Complete(IdArgs),
}
