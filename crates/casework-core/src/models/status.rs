//! State enumerations for plan items and case instances.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a plan item instance.
///
/// States only ever move forward: `Available → Active → {Completed |
/// Terminated}` or `Available → Terminated`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlanItemState {
    /// Waiting for its guards (entry criteria, manual activation)
    Available,

    /// Running; a task exposes a work item, a stage owns live children
    Active,

    /// Finished normally
    Completed,

    /// Stopped by an exit criterion or by an ending ancestor
    Terminated,
}

impl FromStr for PlanItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(PlanItemState::Available),
            "active" => Ok(PlanItemState::Active),
            "completed" => Ok(PlanItemState::Completed),
            "terminated" => Ok(PlanItemState::Terminated),
            _ => Err(format!("Invalid plan item state: {s}")),
        }
    }
}

impl PlanItemState {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanItemState::Available => "available",
            PlanItemState::Active => "active",
            PlanItemState::Completed => "completed",
            PlanItemState::Terminated => "terminated",
        }
    }

    /// True for `Completed` and `Terminated`.
    pub fn is_ended(&self) -> bool {
        matches!(self, PlanItemState::Completed | PlanItemState::Terminated)
    }

    /// True for `Available` and `Active`.
    pub fn is_live(&self) -> bool {
        !self.is_ended()
    }

    /// Get state with consistent icon formatting for display.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use casework_core::models::PlanItemState;
    ///
    /// assert_eq!(PlanItemState::Completed.with_icon(), "✓ Completed");
    /// assert_eq!(PlanItemState::Active.with_icon(), "➤ Active");
    /// assert_eq!(PlanItemState::Available.with_icon(), "○ Available");
    /// assert_eq!(PlanItemState::Terminated.with_icon(), "✗ Terminated");
    /// ```
    pub fn with_icon(&self) -> &'static str {
        match self {
            PlanItemState::Completed => "✓ Completed",
            PlanItemState::Active => "➤ Active",
            PlanItemState::Available => "○ Available",
            PlanItemState::Terminated => "✗ Terminated",
        }
    }
}

/// Lifecycle state of a case instance, mirroring its plan model root.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaseState {
    /// The plan model is still live
    #[default]
    Active,

    /// The plan model completed
    Completed,

    /// The plan model was terminated
    Terminated,
}

impl FromStr for CaseState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(CaseState::Active),
            "completed" => Ok(CaseState::Completed),
            "terminated" => Ok(CaseState::Terminated),
            _ => Err(format!("Invalid case state: {s}")),
        }
    }
}

impl CaseState {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseState::Active => "active",
            CaseState::Completed => "completed",
            CaseState::Terminated => "terminated",
        }
    }

    /// True once the plan model has ended.
    pub fn is_ended(&self) -> bool {
        !matches!(self, CaseState::Active)
    }
}

impl From<PlanItemState> for CaseState {
    fn from(state: PlanItemState) -> Self {
        match state {
            PlanItemState::Completed => CaseState::Completed,
            PlanItemState::Terminated => CaseState::Terminated,
            PlanItemState::Available | PlanItemState::Active => CaseState::Active,
        }
    }
}

/// Kind of a plan item definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PlanItemKind {
    /// Atomic unit of work completed by an external actor
    HumanTask,

    /// Nested container
    Stage,

    /// Root container of a case definition
    PlanModel,
}

impl FromStr for PlanItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "humantask" | "task" => Ok(PlanItemKind::HumanTask),
            "stage" => Ok(PlanItemKind::Stage),
            "planmodel" => Ok(PlanItemKind::PlanModel),
            _ => Err(format!("Invalid plan item kind: {s}")),
        }
    }
}

impl PlanItemKind {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanItemKind::HumanTask => "humanTask",
            PlanItemKind::Stage => "stage",
            PlanItemKind::PlanModel => "planModel",
        }
    }

    /// Stages and the plan model own children and compute completion.
    pub fn is_container(&self) -> bool {
        matches!(self, PlanItemKind::Stage | PlanItemKind::PlanModel)
    }
}
