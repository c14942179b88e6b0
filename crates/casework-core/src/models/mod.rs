//! Data models for case definitions, case instances and plan items.
//!
//! Display implementations for these models are located in
//! [`crate::display::models`] to keep data structures and presentation apart.
//!
//! ## Model overview
//!
//! - [`CaseDefinition`] / [`PlanItemDefinition`]: the immutable tree a case is
//!   started from
//! - [`CaseInstance`] / [`PlanItemInstance`]: runtime state, one instance per
//!   live or ended plan item
//! - [`VariableScope`]: case variables the rules are evaluated against
//! - [`LifecycleEvent`]: the ordered record of every change a command made

pub mod definition;
pub mod events;
pub mod instance;
pub mod status;
pub mod variables;

pub use definition::{CaseDefinition, DeployedDefinition, PlanItemDefinition};
pub use events::{HistoryEntry, LifecycleEvent, TransitionCause};
pub use instance::{CaseInstance, CaseSummary, PlanItemInstance};
pub use status::{CaseState, PlanItemKind, PlanItemState};
pub use variables::VariableScope;

/// Filter over plan item instances of one case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanItemFilter {
    /// Only items in this state
    pub state: Option<PlanItemState>,
    /// Only items of this kind
    pub kind: Option<PlanItemKind>,
    /// Only items with this completeable flag
    pub completeable: Option<bool>,
    /// Include completed and terminated items
    pub include_ended: bool,
}

impl PlanItemFilter {
    /// Returns true if the instance passes every configured criterion.
    pub fn matches(&self, item: &PlanItemInstance) -> bool {
        if !self.include_ended && item.state.is_ended() && self.state.is_none() {
            return false;
        }
        self.state.map_or(true, |state| item.state == state)
            && self.kind.map_or(true, |kind| item.kind == kind)
            && self
                .completeable
                .map_or(true, |completeable| item.completeable == completeable)
    }
}

/// Filter over case instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseFilter {
    /// Cases whose plan model is still live
    #[default]
    Active,
    /// Completed or terminated cases
    Ended,
    /// Every case
    All,
}

impl CaseFilter {
    pub fn matches(&self, state: CaseState) -> bool {
        match self {
            CaseFilter::Active => !state.is_ended(),
            CaseFilter::Ended => state.is_ended(),
            CaseFilter::All => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;

    fn item(state: PlanItemState, kind: PlanItemKind, completeable: bool) -> PlanItemInstance {
        PlanItemInstance {
            id: 1,
            case_id: 1,
            parent_id: None,
            definition_id: "x".to_string(),
            name: "X".to_string(),
            kind,
            state,
            required: false,
            completeable,
            enabled: false,
            children: vec![],
            order: 0,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
            ended_at: None,
        }
    }

    #[test]
    fn test_default_filter_hides_ended_items() {
        let filter = PlanItemFilter::default();
        assert!(filter.matches(&item(PlanItemState::Active, PlanItemKind::HumanTask, false)));
        assert!(filter.matches(&item(PlanItemState::Available, PlanItemKind::HumanTask, false)));
        assert!(!filter.matches(&item(PlanItemState::Completed, PlanItemKind::HumanTask, false)));
    }

    #[test]
    fn test_explicit_state_filter_includes_ended_state() {
        let filter = PlanItemFilter {
            state: Some(PlanItemState::Terminated),
            ..Default::default()
        };
        assert!(filter.matches(&item(PlanItemState::Terminated, PlanItemKind::Stage, false)));
        assert!(!filter.matches(&item(PlanItemState::Active, PlanItemKind::Stage, false)));
    }

    #[test]
    fn test_kind_and_completeable_filters() {
        let filter = PlanItemFilter {
            kind: Some(PlanItemKind::Stage),
            completeable: Some(true),
            ..Default::default()
        };
        assert!(filter.matches(&item(PlanItemState::Active, PlanItemKind::Stage, true)));
        assert!(!filter.matches(&item(PlanItemState::Active, PlanItemKind::Stage, false)));
        assert!(!filter.matches(&item(PlanItemState::Active, PlanItemKind::HumanTask, true)));
    }

    #[test]
    fn test_case_filter() {
        assert!(CaseFilter::Active.matches(CaseState::Active));
        assert!(!CaseFilter::Active.matches(CaseState::Completed));
        assert!(CaseFilter::Ended.matches(CaseState::Terminated));
        assert!(CaseFilter::All.matches(CaseState::Completed));
    }
}
