//! Notifications about exposed work items.

use std::sync::Arc;

use log::{debug, warn};

use crate::{
    models::{LifecycleEvent, PlanItemKind, PlanItemInstance, PlanItemState},
    runtime::RuntimeChanges,
};

/// Receives human tasks as they become work items and as they are
/// withdrawn again.
///
/// Listeners run after the command has committed. A failing listener is
/// logged and does not affect the command or the other listeners.
pub trait WorkItemListener: Send + Sync {
    /// A human task became active.
    fn work_item_created(&self, item: &PlanItemInstance) -> anyhow::Result<()>;

    /// An active human task left the active state, either completed or
    /// terminated.
    fn work_item_withdrawn(&self, item: &PlanItemInstance) -> anyhow::Result<()>;
}

/// Work item notification derived from a command's events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemNotice {
    Created(u64),
    Withdrawn(u64),
}

/// Extracts the work item notices from `changes`, in event order.
pub fn work_item_notices(changes: &RuntimeChanges) -> Vec<WorkItemNotice> {
    changes
        .events
        .iter()
        .filter_map(|event| match event {
            LifecycleEvent::StateChanged {
                item_id, from, to, ..
            } => {
                let task = changes
                    .items
                    .iter()
                    .any(|item| item.id == *item_id && item.kind == PlanItemKind::HumanTask);
                match (task, from, to) {
                    (true, _, PlanItemState::Active) => Some(WorkItemNotice::Created(*item_id)),
                    (
                        true,
                        PlanItemState::Active,
                        PlanItemState::Completed | PlanItemState::Terminated,
                    ) => Some(WorkItemNotice::Withdrawn(*item_id)),
                    _ => None,
                }
            }
            _ => None,
        })
        .collect()
}

/// Delivers the notices of one committed command to every listener.
pub(super) fn notify(listeners: &[Arc<dyn WorkItemListener>], changes: &RuntimeChanges) {
    if listeners.is_empty() {
        return;
    }
    for notice in work_item_notices(changes) {
        let (id, created) = match notice {
            WorkItemNotice::Created(id) => (id, true),
            WorkItemNotice::Withdrawn(id) => (id, false),
        };
        let Some(item) = changes.items.iter().find(|item| item.id == id) else {
            continue;
        };
        for listener in listeners {
            let result = if created {
                listener.work_item_created(item)
            } else {
                listener.work_item_withdrawn(item)
            };
            match result {
                Ok(()) => debug!("Notified listener about work item {}", id),
                Err(e) => warn!("Work item listener failed for item {}: {:#}", id, e),
            }
        }
    }
}
