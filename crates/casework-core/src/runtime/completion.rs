//! Completion predicate for stages and the plan model.
//!
//! A child blocks its container while it is `Active`, or while it is
//! `Available` and its required rule holds. Ended children never block, and
//! neither does an available child that is not required: it may never
//! activate. A container is completeable when no child blocks.

use crate::models::{PlanItemInstance, PlanItemState};

/// Outcome of evaluating one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCheck {
    /// No child blocks
    pub completeable: bool,
    /// IDs of the blocking children, in child order
    pub blocking: Vec<u64>,
}

/// Whether `child` currently prevents its container from completing.
pub fn is_blocking(child: &PlanItemInstance) -> bool {
    match child.state {
        PlanItemState::Active => true,
        PlanItemState::Available => child.required,
        PlanItemState::Completed | PlanItemState::Terminated => false,
    }
}

/// Evaluates the completion predicate over a container's children.
///
/// Pure: the result depends only on the children's states and required
/// flags, so evaluating an unchanged child set again gives the same answer.
pub fn evaluate<'a, I>(children: I) -> CompletionCheck
where
    I: IntoIterator<Item = &'a PlanItemInstance>,
{
    let blocking: Vec<u64> = children
        .into_iter()
        .filter(|child| is_blocking(child))
        .map(|child| child.id)
        .collect();
    CompletionCheck {
        completeable: blocking.is_empty(),
        blocking,
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::models::PlanItemKind;

    fn child(id: u64, state: PlanItemState, required: bool) -> PlanItemInstance {
        PlanItemInstance {
            id,
            case_id: 1,
            parent_id: Some(1),
            definition_id: format!("item{id}"),
            name: format!("Item {id}"),
            kind: PlanItemKind::HumanTask,
            state,
            required,
            completeable: false,
            enabled: false,
            children: vec![],
            order: 0,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
            ended_at: None,
        }
    }

    #[test]
    fn test_no_children_is_completeable() {
        let check = evaluate(std::iter::empty());
        assert!(check.completeable);
        assert!(check.blocking.is_empty());
    }

    #[test]
    fn test_active_required_child_blocks_regardless_of_sibling() {
        for sibling in [
            PlanItemState::Available,
            PlanItemState::Active,
            PlanItemState::Completed,
            PlanItemState::Terminated,
        ] {
            let children = [child(2, PlanItemState::Active, true), child(3, sibling, false)];
            let check = evaluate(&children);
            assert!(!check.completeable, "sibling in {sibling:?}");
            assert_eq!(check.blocking[0], 2);
        }
    }

    #[test]
    fn test_available_required_child_blocks() {
        let children = [child(2, PlanItemState::Available, true)];
        assert_eq!(
            evaluate(&children),
            CompletionCheck {
                completeable: false,
                blocking: vec![2]
            }
        );
    }

    #[test]
    fn test_available_optional_child_does_not_block() {
        let children = [
            child(2, PlanItemState::Completed, true),
            child(3, PlanItemState::Available, false),
        ];
        assert!(evaluate(&children).completeable);
    }

    #[test]
    fn test_active_optional_child_blocks() {
        let children = [
            child(2, PlanItemState::Completed, true),
            child(3, PlanItemState::Active, false),
        ];
        assert_eq!(evaluate(&children).blocking, vec![3]);
    }

    #[test]
    fn test_ended_children_never_block() {
        let children = [
            child(2, PlanItemState::Completed, true),
            child(3, PlanItemState::Terminated, true),
        ];
        assert!(evaluate(&children).completeable);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let children = [
            child(2, PlanItemState::Active, false),
            child(3, PlanItemState::Available, true),
        ];
        assert_eq!(evaluate(&children), evaluate(&children));
    }
}
