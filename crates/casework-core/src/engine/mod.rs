//! High-level engine API for deploying definitions and driving cases.
//!
//! [`Engine`] is the entry point for every interface. It owns no open
//! connection: each operation opens the database on a blocking thread, runs
//! in one transaction and returns.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │     Engine      │    │   CaseRuntime   │    │    Database     │
//! │ (commands,      │───▶│ (fixpoint over  │◀──▶│   (via db/)     │
//! │  queries)       │    │  one case)      │    │                 │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! Commands against one case are serialized by [`CaseLocks`]; commands on
//! different cases run concurrently. Work item listeners are notified after
//! the command has committed.
//!
//! # Usage
//!
//! ```rust,no_run
//! use casework_core::{
//!     params::{DeployDefinition, Id, StartCase},
//!     EngineBuilder,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = EngineBuilder::new()
//!     .with_database_path(Some("/tmp/casework.db"))
//!     .build()
//!     .await?;
//!
//! engine
//!     .deploy_definition(&DeployDefinition {
//!         source: std::fs::read_to_string("review.json")?,
//!     })
//!     .await?;
//!
//! let case = engine
//!     .start_case(&StartCase {
//!         definition_key: "review".to_string(),
//!         variables: vec!["required=true".to_string()],
//!     })
//!     .await?;
//!
//! for task in case.work_items() {
//!     engine.complete_item(&Id { id: task.id }).await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::task;

use crate::{
    db::Database,
    error::{Result, ResultExt},
    expression::RuleEvaluator,
};

pub mod builder;
pub mod commands;
pub mod listener;
pub mod locks;
pub mod queries;


pub use builder::EngineBuilder;
pub use listener::{WorkItemListener, WorkItemNotice};
pub use locks::CaseLocks;

/// Main engine interface for case definitions and case instances.
#[derive(Clone)]
pub struct Engine {
    pub(crate) db_path: PathBuf,
    pub(crate) evaluator: Arc<dyn RuleEvaluator>,
    pub(crate) listeners: Arc<[Arc<dyn WorkItemListener>]>,
    pub(crate) locks: CaseLocks,
}

impl Engine {
    /// Path of the database file this engine works on.
    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    /// Runs `operation` against a fresh connection on the blocking pool.
    pub(crate) async fn with_database<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = self.db_path.clone();
        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            operation(&mut db)
        })
        .await
        .with_context("Task join error")?
    }
}
