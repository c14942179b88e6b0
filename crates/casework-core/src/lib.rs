//! Core library for the Casework plan item engine.
//!
//! A case definition is a tree of plan items: human tasks, nested stages and
//! the plan model at the root. Starting a case instantiates that tree, and
//! every command (completing a task, setting variables, completing a stage
//! by hand) drives the tree to a fixpoint: required rules, entry and exit
//! criteria and manual activation rules are evaluated, each container's
//! completeable flag is recomputed from its children, and auto-completing
//! containers finish as soon as nothing blocks them.
//!
//! # Layers
//!
//! - [`runtime`]: the in-memory lifecycle engine for one case
//! - [`db`]: SQLite persistence, one transaction per command
//! - [`engine`]: the async API shared by every interface
//! - [`display`]: markdown rendering for terminal output
//!
//! # Quick Start
//!
//! ```rust
//! use casework_core::{
//!     params::{DeployDefinition, Id, StartCase},
//!     CaseState, EngineBuilder,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = EngineBuilder::new()
//!     .with_database_path(Some("test.db"))
//!     .build()
//!     .await?;
//!
//! engine
//!     .deploy_definition(&DeployDefinition {
//!         source: r#"{
//!             "key": "intake",
//!             "planModel": {
//!                 "id": "root",
//!                 "type": "planModel",
//!                 "autoComplete": true,
//!                 "children": [{ "id": "review", "type": "humanTask" }]
//!             }
//!         }"#
//!         .to_string(),
//!     })
//!     .await?;
//!
//! let case = engine
//!     .start_case(&StartCase {
//!         definition_key: "intake".to_string(),
//!         variables: vec![],
//!     })
//!     .await?;
//!
//! let review = case.plan_item_by_definition("review").map(|item| item.id);
//! if let Some(id) = review {
//!     let case = engine.complete_item(&Id { id }).await?;
//!     assert_eq!(case.state, CaseState::Completed);
//! }
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod display;
pub mod engine;
pub mod error;
pub mod expression;
pub mod models;
pub mod params;
pub mod runtime;

pub use db::Database;
pub use display::{CaseSummaries, CommandResult, Definitions, History, LocalDateTime, PlanItems};
pub use engine::{Engine, EngineBuilder, WorkItemListener};
pub use error::{CaseError, Result};
pub use expression::{Expression, ExpressionEvaluator, RuleEvaluator};
pub use models::{
    CaseDefinition, CaseFilter, CaseInstance, CaseState, CaseSummary, DeployedDefinition,
    HistoryEntry, LifecycleEvent, PlanItemDefinition, PlanItemFilter, PlanItemInstance,
    PlanItemKind, PlanItemState, TransitionCause, VariableScope,
};
pub use runtime::CaseRuntime;
