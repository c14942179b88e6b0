//! Markdown rendering of engine results.
//!
//! Domain models implement `Display` directly (see [`models`]); lists are
//! wrapped in the newtypes of [`collections`] so that empty results print a
//! readable message, and [`results`] pairs a command's confirmation line with
//! the state it left behind.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Domain Models  │    │  Collections &  │    │    Markdown     │
//! │ (CaseInstance,  │───▶│  CommandResult  │───▶│  (termimad in   │
//! │  PlanItem, ...) │    │                 │    │   the CLI)      │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use casework_core::{display::CommandResult, models::PlanItemState};
//!
//! let result = CommandResult::new("Completed plan item 4", PlanItemState::Completed);
//! assert!(result.to_string().starts_with("Completed plan item 4"));
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod results;

pub use collections::{CaseSummaries, Definitions, History, PlanItems};
pub use datetime::LocalDateTime;
pub use results::CommandResult;
