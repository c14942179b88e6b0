//! Plan item state machine: creation, rule evaluation and transitions.

use std::sync::Arc;

use jiff::Timestamp;
use log::{debug, info};

use super::{agenda::Agenda, case::CaseRuntime, completion};
use crate::{
    error::{CaseError, Result},
    expression::{Expression, RuleEvaluator},
    models::{
        CaseState, LifecycleEvent, PlanItemDefinition, PlanItemInstance, PlanItemState,
        TransitionCause,
    },
};

impl CaseRuntime {
    /// Instantiates `definition` as an available item under `parent_id` and
    /// queues it for rule evaluation.
    pub(super) fn create_item(
        &mut self,
        definition: &PlanItemDefinition,
        parent_id: Option<u64>,
        order: u32,
        agenda: &mut Agenda,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let now = Timestamp::now();

        self.items.insert(
            id,
            PlanItemInstance {
                id,
                case_id: self.case_id,
                parent_id,
                definition_id: definition.id.clone(),
                name: definition.display_name().to_string(),
                kind: definition.kind,
                state: PlanItemState::Available,
                required: false,
                completeable: false,
                enabled: false,
                children: Vec::new(),
                order,
                created_at: now,
                updated_at: now,
                ended_at: None,
            },
        );
        if let Some(parent) = parent_id.and_then(|parent| self.items.get_mut(&parent)) {
            parent.children.push(id);
        }

        self.touched.insert(id);
        self.updated_at = now;
        self.events.push(LifecycleEvent::PlanItemCreated {
            item_id: id,
            definition_id: definition.id.clone(),
            parent_id,
        });
        debug!("Created plan item {} ('{}')", id, definition.id);

        agenda.mark_rules(id);
        self.mark_parent(id, agenda);
        id
    }

    /// Re-evaluates the required rule, exit criteria and activation guards
    /// of one live item.
    pub(super) fn evaluate_rules(
        &mut self,
        id: u64,
        evaluator: &dyn RuleEvaluator,
        agenda: &mut Agenda,
    ) -> Result<()> {
        if !self.items.get(&id).is_some_and(|item| item.state.is_live()) {
            return Ok(());
        }
        let case_definition = Arc::clone(&self.definition);
        let definition = self.definition_of(&case_definition, id)?;

        let required = match &definition.required_rule {
            Some(rule) => evaluator.evaluate(rule, &self.variables)?,
            None => false,
        };
        self.set_required(id, required, agenda)?;

        if self.any_satisfied(&definition.exit_criteria, evaluator)? {
            self.terminate(id, TransitionCause::ExitCriterion, agenda);
            return Ok(());
        }

        let item = self.item(id)?;
        if item.state != PlanItemState::Available || item.enabled {
            return Ok(());
        }

        let cause = if definition.entry_criteria.is_empty() {
            TransitionCause::AutoActivated
        } else if self.any_satisfied(&definition.entry_criteria, evaluator)? {
            TransitionCause::EntryCriterion
        } else {
            return Ok(());
        };

        let manual = match &definition.manual_activation_rule {
            Some(rule) => evaluator.evaluate(rule, &self.variables)?,
            None => false,
        };
        if manual {
            self.enable(id)
        } else {
            self.activate(id, cause, agenda)
        }
    }

    /// Recomputes the completion predicate of an active container and
    /// completes it when it is completeable and auto-completing.
    pub(super) fn evaluate_completion(&mut self, id: u64, agenda: &mut Agenda) -> Result<()> {
        let active_container = self.items.get(&id).is_some_and(|item| {
            item.kind.is_container() && item.state == PlanItemState::Active
        });
        if !active_container {
            return Ok(());
        }

        let check = completion::evaluate(self.children_of(id));
        let auto_complete = self.definition_of(&self.definition, id)?.auto_complete;

        let item = self.item_mut(id)?;
        if item.completeable != check.completeable {
            item.completeable = check.completeable;
            item.updated_at = Timestamp::now();
            self.touched.insert(id);
            self.events.push(LifecycleEvent::CompleteableChanged {
                item_id: id,
                completeable: check.completeable,
            });
            debug!("Container {} completeable = {}", id, check.completeable);
        }

        if check.completeable && auto_complete {
            self.complete(id, TransitionCause::AutoCompleted, agenda);
        }
        Ok(())
    }

    /// `Available → Active`. A container instantiates its children.
    pub(super) fn activate(
        &mut self,
        id: u64,
        cause: TransitionCause,
        agenda: &mut Agenda,
    ) -> Result<()> {
        self.transition(id, PlanItemState::Active, cause)?;
        self.mark_parent(id, agenda);

        let case_definition = Arc::clone(&self.definition);
        let definition = self.definition_of(&case_definition, id)?;
        if definition.kind.is_container() {
            for (order, child) in definition.children.iter().enumerate() {
                self.create_item(child, Some(id), order as u32, agenda);
            }
            self.mark_container(id, agenda);
        }
        Ok(())
    }

    /// `Active → Completed`, terminating whatever is still live beneath.
    pub(super) fn complete(&mut self, id: u64, cause: TransitionCause, agenda: &mut Agenda) {
        if self.transition(id, PlanItemState::Completed, cause).is_ok() {
            self.end(id, agenda);
        }
    }

    /// `Available|Active → Terminated`, cascading to live descendants.
    pub(super) fn terminate(&mut self, id: u64, cause: TransitionCause, agenda: &mut Agenda) {
        if self.transition(id, PlanItemState::Terminated, cause).is_ok() {
            self.end(id, agenda);
        }
    }

    fn end(&mut self, id: u64, agenda: &mut Agenda) {
        self.terminate_descendants(id);
        self.mark_parent(id, agenda);
        if id == self.root_id {
            self.end_case();
        }
    }

    /// Terminates live descendants depth first, in child order.
    fn terminate_descendants(&mut self, id: u64) {
        let mut stack: Vec<u64> = self
            .items
            .get(&id)
            .map(|item| item.children.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(child) = stack.pop() {
            if self
                .transition(child, PlanItemState::Terminated, TransitionCause::ParentEnded)
                .is_ok()
            {
                if let Some(item) = self.items.get(&child) {
                    stack.extend(item.children.iter().rev().copied());
                }
            }
        }
    }

    fn end_case(&mut self) {
        let now = Timestamp::now();
        self.state = CaseState::from(self.items[&self.root_id].state);
        self.ended_at = Some(now);
        self.updated_at = now;
        self.events.push(LifecycleEvent::CaseEnded {
            case_id: self.case_id,
            state: self.state,
        });
        info!("Case {} {}", self.case_id, self.state.as_str());
    }

    /// Moves one item to `to`. Fails without changing anything if the item
    /// has already ended or is missing.
    fn transition(&mut self, id: u64, to: PlanItemState, cause: TransitionCause) -> Result<()> {
        let now = Timestamp::now();
        let item = self.item_mut(id)?;
        let from = item.state;
        if from.is_ended() || from == to {
            return Err(CaseError::unexpected_state(id, PlanItemState::Active, from));
        }

        item.state = to;
        item.enabled = false;
        item.updated_at = now;
        if to.is_ended() {
            item.ended_at = Some(now);
        }
        let name = item.name.clone();

        self.touched.insert(id);
        self.updated_at = now;
        self.events.push(LifecycleEvent::StateChanged {
            item_id: id,
            from,
            to,
            cause,
        });
        debug!(
            "Plan item {} ('{}') {} -> {} ({})",
            id,
            name,
            from.as_str(),
            to.as_str(),
            cause.as_str()
        );
        Ok(())
    }

    fn enable(&mut self, id: u64) -> Result<()> {
        let item = self.item_mut(id)?;
        item.enabled = true;
        item.updated_at = Timestamp::now();
        self.touched.insert(id);
        self.events.push(LifecycleEvent::ActivationEnabled { item_id: id });
        debug!("Plan item {} waits for manual activation", id);
        Ok(())
    }

    fn set_required(&mut self, id: u64, required: bool, agenda: &mut Agenda) -> Result<()> {
        let item = self.item_mut(id)?;
        if item.required == required {
            return Ok(());
        }
        item.required = required;
        item.updated_at = Timestamp::now();
        self.touched.insert(id);
        self.events.push(LifecycleEvent::RequiredChanged {
            item_id: id,
            required,
        });
        self.mark_parent(id, agenda);
        Ok(())
    }

    fn any_satisfied(&self, criteria: &[Expression], evaluator: &dyn RuleEvaluator) -> Result<bool> {
        for criterion in criteria {
            if evaluator.evaluate(criterion, &self.variables)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn item_mut(&mut self, id: u64) -> Result<&mut PlanItemInstance> {
        self.items
            .get_mut(&id)
            .ok_or(CaseError::PlanItemNotFound { id })
    }

    fn mark_container(&self, id: u64, agenda: &mut Agenda) {
        agenda.mark_container(id, self.depth(id));
    }

    fn mark_parent(&self, id: u64, agenda: &mut Agenda) {
        if let Some(parent) = self.items.get(&id).and_then(|item| item.parent_id) {
            self.mark_container(parent, agenda);
        }
    }
}
