//! Runtime instances of plan items and cases.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{CaseState, PlanItemKind, PlanItemState, VariableScope};

/// Runtime occurrence of one plan item definition inside one case instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanItemInstance {
    /// Unique identifier for the instance
    pub id: u64,

    /// ID of the owning case instance
    pub case_id: u64,

    /// Containing stage or plan model; `None` for the root
    pub parent_id: Option<u64>,

    /// Id of the definition this instance was created from
    pub definition_id: String,

    /// Display name copied from the definition
    pub name: String,

    /// Task, stage, or plan model
    pub kind: PlanItemKind,

    /// Current lifecycle state
    pub state: PlanItemState,

    /// Last evaluation of the required rule
    pub required: bool,

    /// Containers only: no child currently blocks completion
    pub completeable: bool,

    /// Guards satisfied, waiting for an explicit activate command
    pub enabled: bool,

    /// Child instance ids in definition order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<u64>,

    /// Position of the instance among its siblings
    pub order: u32,

    /// Timestamp when the instance was created (UTC)
    pub created_at: Timestamp,

    /// Timestamp of the last state or flag change (UTC)
    pub updated_at: Timestamp,

    /// Timestamp when the instance completed or terminated (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
}

impl PlanItemInstance {
    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// True for an active human task, i.e. an exposed work item.
    pub fn is_work_item(&self) -> bool {
        self.kind == PlanItemKind::HumanTask && self.state == PlanItemState::Active
    }
}

/// A case instance with its plan items and variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseInstance {
    /// Unique identifier for the case instance
    pub id: u64,

    /// Key of the definition the case was started from
    pub definition_key: String,

    /// Version of that definition
    pub definition_version: u32,

    /// Mirrors the state of the plan model root
    pub state: CaseState,

    /// Case variables
    #[serde(default)]
    pub variables: VariableScope,

    /// Plan item instances ordered by ID (root first)
    #[serde(default)]
    pub plan_items: Vec<PlanItemInstance>,

    /// Timestamp when the case was started (UTC)
    pub created_at: Timestamp,

    /// Timestamp when the case was last modified (UTC)
    pub updated_at: Timestamp,

    /// Timestamp when the case ended (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
}

impl CaseInstance {
    /// The plan model instance, if items are loaded.
    pub fn root(&self) -> Option<&PlanItemInstance> {
        self.plan_items.iter().find(|item| item.parent_id.is_none())
    }

    /// Looks up a loaded plan item by id.
    pub fn plan_item(&self, id: u64) -> Option<&PlanItemInstance> {
        self.plan_items.iter().find(|item| item.id == id)
    }

    /// Finds the first plan item created from the given definition id.
    pub fn plan_item_by_definition(&self, definition_id: &str) -> Option<&PlanItemInstance> {
        self.plan_items
            .iter()
            .find(|item| item.definition_id == definition_id)
    }

    /// Active human tasks in ID order.
    pub fn work_items(&self) -> impl Iterator<Item = &PlanItemInstance> {
        self.plan_items.iter().filter(|item| item.is_work_item())
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_ended()
    }
}

/// Compact case information for list output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseSummary {
    pub id: u64,
    pub definition_key: String,
    pub definition_version: u32,
    pub state: CaseState,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Number of live plan items
    pub live_items: u32,
    /// Number of exposed work items
    pub open_tasks: u32,
}

impl From<&CaseInstance> for CaseSummary {
    fn from(case: &CaseInstance) -> Self {
        Self {
            id: case.id,
            definition_key: case.definition_key.clone(),
            definition_version: case.definition_version,
            state: case.state,
            created_at: case.created_at,
            updated_at: case.updated_at,
            live_items: case
                .plan_items
                .iter()
                .filter(|item| item.state.is_live())
                .count() as u32,
            open_tasks: case.work_items().count() as u32,
        }
    }
}
