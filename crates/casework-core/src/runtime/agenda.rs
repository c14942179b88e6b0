//! Work queue driving the fixpoint of one command.

use std::{cmp::Reverse, collections::BTreeSet};

/// Dirty plan items and containers waiting for re-evaluation.
///
/// Items queued with [`Agenda::mark_rules`] get their required rule, exit
/// criteria and activation guards re-evaluated. Containers queued with
/// [`Agenda::mark_container`] get their completion predicate recomputed,
/// deepest container first so completions cascade upward within one drain.
#[derive(Debug, Default)]
pub struct Agenda {
    rules: BTreeSet<u64>,
    containers: BTreeSet<(Reverse<u32>, u64)>,
}

impl Agenda {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an item for rule evaluation. Items are drained in ID order,
    /// which is creation order.
    pub fn mark_rules(&mut self, id: u64) {
        self.rules.insert(id);
    }

    /// Queues a container, at the given tree depth, for completion
    /// evaluation.
    pub fn mark_container(&mut self, id: u64, depth: u32) {
        self.containers.insert((Reverse(depth), id));
    }

    pub fn next_rules(&mut self) -> Option<u64> {
        self.rules.pop_first()
    }

    /// The deepest dirty container.
    pub fn next_container(&mut self) -> Option<u64> {
        self.containers.pop_first().map(|(_, id)| id)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.containers.is_empty()
    }
}
