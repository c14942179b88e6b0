//! Command handlers: call the engine, render the result.

use std::{fmt, fs};

use anyhow::{Context, Result};
use casework_core::{
    display::CommandResult,
    params::{DeployDefinition, Id, ListCases, ListPlanItems, ListTasks, ShowDefinition},
    CaseError, Engine,
};
use log::debug;

use crate::{
    cli::{CaseCommands, DefinitionCommands, ItemCommands, TaskCommands},
    renderer::TerminalRenderer,
};

pub struct Cli {
    engine: Engine,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(engine: Engine, renderer: TerminalRenderer) -> Self {
        Self { engine, renderer }
    }

    pub async fn handle_definition_command(&self, command: DefinitionCommands) -> Result<()> {
        match command {
            DefinitionCommands::Deploy(args) => {
                debug!("deploy_definition: {:?}", args.file);
                let source = fs::read_to_string(&args.file)
                    .with_context(|| format!("Failed to read {}", args.file.display()))?;
                let deployed = self
                    .engine
                    .deploy_definition(&DeployDefinition { source })
                    .await
                    .context("Failed to deploy definition")?;
                let summary = format!(
                    "Deployed definition '{}' as version {}",
                    deployed.definition.key, deployed.version
                );
                self.render(CommandResult::new(summary, deployed));
            }
            DefinitionCommands::List => {
                let definitions = self
                    .engine
                    .list_definitions()
                    .await
                    .context("Failed to list definitions")?;
                self.render(format!("# Definitions\n\n{definitions}"));
            }
            DefinitionCommands::Show(args) => {
                let params = ShowDefinition::from(&args);
                let deployed = self
                    .engine
                    .get_definition(&params)
                    .await
                    .context("Failed to get definition")?
                    .ok_or_else(|| CaseError::DefinitionNotFound {
                        key: params.key.clone(),
                    })?;
                if args.json {
                    let json = serde_json::to_string_pretty(&deployed.definition)
                        .context("Failed to serialize definition")?;
                    println!("{json}");
                } else {
                    self.render(deployed);
                }
            }
        }
        Ok(())
    }

    pub async fn handle_case_command(&self, command: CaseCommands) -> Result<()> {
        match command {
            CaseCommands::Start(args) => {
                let case = self
                    .engine
                    .start_case(&args.into())
                    .await
                    .context("Failed to start case")?;
                self.render(CommandResult::new(format!("Started case {}", case.id), case));
            }
            CaseCommands::List(args) => self.list_cases(&args.into()).await?,
            CaseCommands::Show(args) => {
                let params = Id::from(args);
                let case = self
                    .engine
                    .get_case(&params)
                    .await
                    .context("Failed to get case")?
                    .ok_or(CaseError::CaseNotFound { id: params.id })?;
                self.render(case);
            }
            CaseCommands::Vars(args) => {
                let case_id = args.case_id;
                let case = self
                    .engine
                    .set_variables(&args.into())
                    .await
                    .context("Failed to set variables")?;
                self.render(CommandResult::new(
                    format!("Updated variables of case {case_id}"),
                    case,
                ));
            }
            CaseCommands::History(args) => {
                let params = Id::from(args);
                let history = self
                    .engine
                    .case_history(&params)
                    .await
                    .context("Failed to load case history")?;
                self.render(format!("# History of case {}\n\n{history}", params.id));
            }
            CaseCommands::Terminate(args) => {
                let case = self
                    .engine
                    .terminate_case(&args.into())
                    .await
                    .context("Failed to terminate case")?;
                self.render(CommandResult::new(format!("Terminated case {}", case.id), case));
            }
        }
        Ok(())
    }

    pub async fn handle_item_command(&self, command: ItemCommands) -> Result<()> {
        match command {
            ItemCommands::List(args) => {
                let params = ListPlanItems::from(args);
                let items = self
                    .engine
                    .list_plan_items(&params)
                    .await
                    .context("Failed to list plan items")?;
                self.render(format!("# Plan items of case {}\n\n{items}", params.case_id));
            }
            ItemCommands::Show(args) => {
                let params = Id::from(args);
                let item = self
                    .engine
                    .get_plan_item(&params)
                    .await
                    .context("Failed to get plan item")?
                    .ok_or(CaseError::PlanItemNotFound { id: params.id })?;
                self.render(item);
            }
            ItemCommands::Complete(args) => self.complete_item(args.into()).await?,
            ItemCommands::CompleteStage(args) => {
                let params = Id::from(args);
                let case = self
                    .engine
                    .complete_stage(&params)
                    .await
                    .context("Failed to complete stage")?;
                self.render(CommandResult::new(
                    format!("Completed stage {}", params.id),
                    case,
                ));
            }
            ItemCommands::Activate(args) => {
                let params = Id::from(args);
                let case = self
                    .engine
                    .activate_item(&params)
                    .await
                    .context("Failed to activate plan item")?;
                self.render(CommandResult::new(
                    format!("Activated plan item {}", params.id),
                    case,
                ));
            }
        }
        Ok(())
    }

    pub async fn handle_task_command(&self, command: TaskCommands) -> Result<()> {
        match command {
            TaskCommands::List(args) => {
                let params = ListTasks::from(args);
                let tasks = self
                    .engine
                    .list_tasks(&params)
                    .await
                    .context("Failed to list tasks")?;
                self.render(format!("# Open tasks\n\n{tasks}"));
            }
            TaskCommands::Complete(args) => self.complete_item(args.into()).await?,
        }
        Ok(())
    }

    pub async fn list_cases(&self, params: &ListCases) -> Result<()> {
        let cases = self
            .engine
            .list_cases(params)
            .await
            .context("Failed to list cases")?;
        let title = if params.all {
            "All cases"
        } else if params.ended {
            "Ended cases"
        } else {
            "Active cases"
        };
        self.render(format!("# {title}\n\n{cases}"));
        Ok(())
    }

    async fn complete_item(&self, params: Id) -> Result<()> {
        let case = self
            .engine
            .complete_item(&params)
            .await
            .context("Failed to complete plan item")?;
        self.render(CommandResult::new(
            format!("Completed plan item {}", params.id),
            case,
        ));
        Ok(())
    }

    fn render(&self, output: impl fmt::Display) {
        self.renderer.render(&output.to_string());
    }
}
