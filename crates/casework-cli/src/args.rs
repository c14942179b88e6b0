use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::{CaseCommands, DefinitionCommands, ItemCommands, TaskCommands};

/// Command-line interface for the casework plan item engine
///
/// Deploy case definitions (JSON plan item trees), start cases from them and
/// drive the cases forward by completing tasks, setting variables and
/// completing stages. Every command prints the resulting case state as
/// markdown.
#[derive(Parser)]
#[command(version, about, name = "cw")]
pub struct Args {
    /// Path to the SQLite database file. Defaults to
    /// $XDG_DATA_HOME/casework/casework.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands, grouped by the resource they act on
#[derive(Subcommand)]
pub enum Commands {
    /// Deploy and inspect case definitions
    #[command(alias = "d")]
    Definition {
        #[command(subcommand)]
        command: DefinitionCommands,
    },
    /// Start, inspect and terminate cases
    #[command(alias = "c")]
    Case {
        #[command(subcommand)]
        command: CaseCommands,
    },
    /// Inspect and drive individual plan items
    #[command(alias = "i")]
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },
    /// Work with open human tasks
    #[command(alias = "t")]
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
}
