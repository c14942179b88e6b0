//! Lifecycle events recorded for every case instance.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{CaseState, PlanItemState};

/// Why a plan item changed state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// No guard held the item back
    AutoActivated,
    /// An entry criterion evaluated true
    EntryCriterion,
    /// The activate command was issued
    ManualActivation,
    /// The complete command was issued against a task
    CompleteCommand,
    /// A container became completeable with auto-complete enabled
    AutoCompleted,
    /// The complete stage command was issued
    ManualStageCompletion,
    /// An exit criterion evaluated true
    ExitCriterion,
    /// The containing stage or plan model ended
    ParentEnded,
    /// The terminate case command was issued
    CaseTerminated,
}

impl TransitionCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionCause::AutoActivated => "auto-activated",
            TransitionCause::EntryCriterion => "entry criterion satisfied",
            TransitionCause::ManualActivation => "manually activated",
            TransitionCause::CompleteCommand => "completed",
            TransitionCause::AutoCompleted => "auto-completed",
            TransitionCause::ManualStageCompletion => "stage completed manually",
            TransitionCause::ExitCriterion => "exit criterion satisfied",
            TransitionCause::ParentEnded => "parent ended",
            TransitionCause::CaseTerminated => "case terminated",
        }
    }
}

/// One observable change inside a case instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    CaseStarted {
        case_id: u64,
        definition_key: String,
    },
    PlanItemCreated {
        item_id: u64,
        definition_id: String,
        parent_id: Option<u64>,
    },
    StateChanged {
        item_id: u64,
        from: PlanItemState,
        to: PlanItemState,
        cause: TransitionCause,
    },
    RequiredChanged {
        item_id: u64,
        required: bool,
    },
    CompleteableChanged {
        item_id: u64,
        completeable: bool,
    },
    ActivationEnabled {
        item_id: u64,
    },
    VariablesChanged {
        names: Vec<String>,
    },
    CaseEnded {
        case_id: u64,
        state: CaseState,
    },
}

impl LifecycleEvent {
    /// The plan item the event concerns, if any.
    pub fn item_id(&self) -> Option<u64> {
        match self {
            LifecycleEvent::PlanItemCreated { item_id, .. }
            | LifecycleEvent::StateChanged { item_id, .. }
            | LifecycleEvent::RequiredChanged { item_id, .. }
            | LifecycleEvent::CompleteableChanged { item_id, .. }
            | LifecycleEvent::ActivationEnabled { item_id } => Some(*item_id),
            LifecycleEvent::CaseStarted { .. }
            | LifecycleEvent::VariablesChanged { .. }
            | LifecycleEvent::CaseEnded { .. } => None,
        }
    }
}

/// A persisted lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// Per-case sequence number, starting at 1
    pub seq: u64,

    /// ID of the case the event belongs to
    pub case_id: u64,

    /// Timestamp of the command that produced the event (UTC)
    pub recorded_at: Timestamp,

    #[serde(flatten)]
    pub event: LifecycleEvent,
}
