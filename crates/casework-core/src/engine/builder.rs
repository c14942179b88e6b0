//! Builder for creating and configuring Engine instances.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::task;

use super::{CaseLocks, Engine, WorkItemListener};
use crate::{
    db::Database,
    error::{CaseError, Result, ResultExt},
    expression::{ExpressionEvaluator, RuleEvaluator},
};

/// Builder for creating and configuring Engine instances.
#[derive(Clone)]
pub struct EngineBuilder {
    database_path: Option<PathBuf>,
    evaluator: Arc<dyn RuleEvaluator>,
    listeners: Vec<Arc<dyn WorkItemListener>>,
}

impl EngineBuilder {
    /// Creates a new builder with the default database location and the
    /// built-in expression evaluator.
    pub fn new() -> Self {
        Self {
            database_path: None,
            evaluator: Arc::new(ExpressionEvaluator),
            listeners: Vec::new(),
        }
    }

    /// Sets a custom database file path.
    ///
    /// If not specified, uses XDG Base Directory specification:
    /// `$XDG_DATA_HOME/casework/casework.db` or
    /// `~/.local/share/casework/casework.db`
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.database_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Replaces the rule evaluator used for required rules, activation rules
    /// and criteria.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Registers a listener for work item notifications.
    pub fn with_listener(mut self, listener: Arc<dyn WorkItemListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Builds the configured engine instance.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::FileSystem` if the database directory cannot be
    /// created
    /// Returns `CaseError::Database` if database initialization fails
    pub async fn build(self) -> Result<Engine> {
        let db_path = if let Some(path) = self.database_path {
            path
        } else {
            Self::default_database_path()?
        };

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CaseError::FileSystem {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let db_path_clone = db_path.clone();
        task::spawn_blocking(move || {
            let _db = Database::new(&db_path_clone)?;
            Ok::<(), CaseError>(())
        })
        .await
        .with_context("Task join error")??;

        Ok(Engine {
            db_path,
            evaluator: self.evaluator,
            listeners: Arc::from(self.listeners),
            locks: CaseLocks::new(),
        })
    }

    /// Returns the default database path following XDG Base Directory
    /// specification.
    fn default_database_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("casework")
            .place_data_file("casework.db")
            .map_err(|e| CaseError::XdgDirectory(e.to_string()))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
