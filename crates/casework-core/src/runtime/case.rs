//! In-memory state of one case instance and its command entry points.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use jiff::Timestamp;
use log::{debug, info};
use serde_json::Value;

use super::{agenda::Agenda, completion};
use crate::{
    error::{CaseError, Result},
    expression::RuleEvaluator,
    models::{
        CaseDefinition, CaseInstance, CaseState, LifecycleEvent, PlanItemDefinition,
        PlanItemInstance, PlanItemState, TransitionCause, VariableScope,
    },
};

/// Everything needed to rebuild a [`CaseRuntime`] from storage.
#[derive(Debug, Clone)]
pub struct CaseSnapshot {
    pub case_id: u64,
    pub definition: Arc<CaseDefinition>,
    pub definition_version: u32,
    pub state: CaseState,
    pub variables: VariableScope,
    pub items: Vec<PlanItemInstance>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    /// First ID available for new plan items
    pub next_item_id: u64,
}

/// What a command changed, for the persistence layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeChanges {
    /// Created or modified plan items, in ID order
    pub items: Vec<PlanItemInstance>,
    /// Whether the variable scope changed
    pub variables_changed: bool,
    /// Lifecycle events in the order they happened
    pub events: Vec<LifecycleEvent>,
}

impl RuntimeChanges {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && !self.variables_changed && self.events.is_empty()
    }
}

/// One case instance: its plan item tree, its variables and the fixpoint
/// that keeps them consistent.
///
/// Every public command runs inside [`CaseRuntime::transact`]: when any step
/// fails, including rule evaluation in the middle of a cascade, the runtime
/// is restored to the state it had before the command.
#[derive(Debug, Clone)]
pub struct CaseRuntime {
    pub(super) case_id: u64,
    pub(super) definition: Arc<CaseDefinition>,
    pub(super) definition_version: u32,
    pub(super) state: CaseState,
    pub(super) variables: VariableScope,
    pub(super) items: BTreeMap<u64, PlanItemInstance>,
    pub(super) root_id: u64,
    pub(super) next_id: u64,
    pub(super) created_at: Timestamp,
    pub(super) updated_at: Timestamp,
    pub(super) ended_at: Option<Timestamp>,
    pub(super) touched: BTreeSet<u64>,
    pub(super) variables_changed: bool,
    pub(super) events: Vec<LifecycleEvent>,
}

impl CaseRuntime {
    /// Starts a new case: creates the plan model instance, activates it and
    /// runs the fixpoint so every unguarded item is active on return.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::EvaluationFailure` if a rule fails during the
    /// initial evaluation.
    pub fn start(
        case_id: u64,
        definition: Arc<CaseDefinition>,
        definition_version: u32,
        variables: VariableScope,
        first_item_id: u64,
        evaluator: &dyn RuleEvaluator,
    ) -> Result<Self> {
        let now = Timestamp::now();
        let mut runtime = Self {
            case_id,
            definition_version,
            state: CaseState::Active,
            variables,
            items: BTreeMap::new(),
            root_id: first_item_id,
            next_id: first_item_id,
            created_at: now,
            updated_at: now,
            ended_at: None,
            touched: BTreeSet::new(),
            variables_changed: true,
            events: vec![LifecycleEvent::CaseStarted {
                case_id,
                definition_key: definition.key.clone(),
            }],
            definition,
        };

        let mut agenda = Agenda::new();
        let case_definition = Arc::clone(&runtime.definition);
        let root_id = runtime.create_item(&case_definition.plan_model, None, 0, &mut agenda);
        runtime.root_id = root_id;
        runtime.activate(root_id, TransitionCause::AutoActivated, &mut agenda)?;
        runtime.settle(&mut agenda, evaluator)?;

        info!(
            "Started case {} from '{}' v{}",
            case_id, runtime.definition.key, definition_version
        );
        Ok(runtime)
    }

    /// Rebuilds a runtime from stored state.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Configuration` if the items do not form a tree
    /// with exactly one root, or reference unknown definitions.
    pub fn restore(snapshot: CaseSnapshot) -> Result<Self> {
        let CaseSnapshot {
            case_id,
            definition,
            definition_version,
            state,
            variables,
            items,
            created_at,
            updated_at,
            ended_at,
            next_item_id,
        } = snapshot;

        let mut roots = items.iter().filter(|item| item.parent_id.is_none());
        let root_id = match (roots.next(), roots.next()) {
            (Some(root), None) => root.id,
            _ => {
                return Err(CaseError::Configuration {
                    message: format!("Case {case_id} does not have exactly one plan model instance"),
                })
            }
        };

        let items: BTreeMap<u64, PlanItemInstance> =
            items.into_iter().map(|item| (item.id, item)).collect();
        for item in items.values() {
            if definition.find(&item.definition_id).is_none() {
                return Err(CaseError::Configuration {
                    message: format!(
                        "Plan item {} references unknown definition '{}'",
                        item.id, item.definition_id
                    ),
                });
            }
            if let Some(parent_id) = item.parent_id {
                if !items.get(&parent_id).is_some_and(|p| p.children.contains(&item.id)) {
                    return Err(CaseError::Configuration {
                        message: format!(
                            "Plan item {} is not listed by its parent {}",
                            item.id, parent_id
                        ),
                    });
                }
            }
        }

        let max_id = items.keys().next_back().copied().unwrap_or(0);
        Ok(Self {
            case_id,
            definition,
            definition_version,
            state,
            variables,
            items,
            root_id,
            next_id: next_item_id.max(max_id + 1),
            created_at,
            updated_at,
            ended_at,
            touched: BTreeSet::new(),
            variables_changed: false,
            events: Vec::new(),
        })
    }

    /// Runs `command` as one unit: on error the runtime is restored to the
    /// state it had before.
    pub fn transact<T, F>(&mut self, command: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let snapshot = self.clone();
        match command(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                debug!("Rolling back case {}: {}", self.case_id, err);
                *self = snapshot;
                Err(err)
            }
        }
    }

    /// Assigns variables and re-evaluates every live item. Returns the names
    /// whose value actually changed.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the case has ended, `EvaluationFailure` if a rule
    /// fails; in both cases nothing changes.
    pub fn set_variables(
        &mut self,
        variables: BTreeMap<String, Value>,
        evaluator: &dyn RuleEvaluator,
    ) -> Result<Vec<String>> {
        self.transact(|rt| {
            rt.ensure_running()?;
            let changed = rt.variables.extend(variables);
            if changed.is_empty() {
                return Ok(changed);
            }
            rt.variables_changed = true;
            rt.updated_at = Timestamp::now();
            rt.events.push(LifecycleEvent::VariablesChanged {
                names: changed.clone(),
            });

            let mut agenda = Agenda::new();
            for item in rt.items.values().filter(|item| item.state.is_live()) {
                agenda.mark_rules(item.id);
            }
            rt.settle(&mut agenda, evaluator)?;
            Ok(changed)
        })
    }

    /// Completes an active human task.
    ///
    /// # Errors
    ///
    /// `PlanItemNotFound`, `IllegalArgument` for containers, `IllegalState`
    /// when the task is not active.
    pub fn complete_item(&mut self, id: u64, evaluator: &dyn RuleEvaluator) -> Result<()> {
        self.transact(|rt| {
            rt.ensure_running()?;
            let item = rt.item(id)?;
            if item.kind.is_container() {
                return Err(CaseError::IllegalArgument {
                    message: format!(
                        "Plan item instance {id} is a {}; use complete stage instead",
                        item.kind.as_str()
                    ),
                });
            }
            if item.state != PlanItemState::Active {
                return Err(CaseError::unexpected_state(id, PlanItemState::Active, item.state));
            }

            let mut agenda = Agenda::new();
            rt.complete(id, TransitionCause::CompleteCommand, &mut agenda);
            rt.settle(&mut agenda, evaluator)
        })
    }

    /// Completes an active stage (or plan model) whose children no longer
    /// block it.
    ///
    /// # Errors
    ///
    /// `IllegalState` when the container is not active, `IllegalArgument`
    /// when it is not completeable.
    pub fn complete_stage(&mut self, id: u64, evaluator: &dyn RuleEvaluator) -> Result<()> {
        self.transact(|rt| {
            rt.ensure_running()?;
            let item = rt.item(id)?;
            if !item.kind.is_container() {
                return Err(CaseError::IllegalArgument {
                    message: format!("Plan item instance {id} is not a stage"),
                });
            }
            if item.state != PlanItemState::Active {
                return Err(CaseError::unexpected_state(id, PlanItemState::Active, item.state));
            }
            let check = completion::evaluate(rt.children_of(id));
            if !check.completeable {
                debug!("Stage {} blocked by {:?}", id, check.blocking);
                return Err(CaseError::stage_not_completeable());
            }

            let mut agenda = Agenda::new();
            rt.complete(id, TransitionCause::ManualStageCompletion, &mut agenda);
            rt.settle(&mut agenda, evaluator)
        })
    }

    /// Activates an available item that is waiting for manual activation.
    ///
    /// # Errors
    ///
    /// `IllegalState` unless the item is available and enabled.
    pub fn activate_item(&mut self, id: u64, evaluator: &dyn RuleEvaluator) -> Result<()> {
        self.transact(|rt| {
            rt.ensure_running()?;
            let item = rt.item(id)?;
            if item.state != PlanItemState::Available {
                return Err(CaseError::unexpected_state(id, PlanItemState::Available, item.state));
            }
            if !item.enabled {
                return Err(CaseError::IllegalState {
                    message: format!(
                        "plan item instance {id} is not enabled for manual activation"
                    ),
                });
            }

            let mut agenda = Agenda::new();
            rt.activate(id, TransitionCause::ManualActivation, &mut agenda)?;
            rt.settle(&mut agenda, evaluator)
        })
    }

    /// Terminates the plan model and everything still live beneath it.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the case has already ended.
    pub fn terminate_case(&mut self, evaluator: &dyn RuleEvaluator) -> Result<()> {
        self.transact(|rt| {
            rt.ensure_running()?;
            let mut agenda = Agenda::new();
            rt.terminate(rt.root_id, TransitionCause::CaseTerminated, &mut agenda);
            rt.settle(&mut agenda, evaluator)
        })
    }

    /// Drains the agenda until nothing is left to re-evaluate.
    ///
    /// Rule evaluation (required flags, exit criteria, activation) always
    /// runs before completion, so children created by an activation are
    /// settled before their container is judged.
    pub(super) fn settle(
        &mut self,
        agenda: &mut Agenda,
        evaluator: &dyn RuleEvaluator,
    ) -> Result<()> {
        loop {
            while let Some(id) = agenda.next_rules() {
                self.evaluate_rules(id, evaluator, agenda)?;
            }
            match agenda.next_container() {
                Some(id) => self.evaluate_completion(id, agenda)?,
                None => break,
            }
        }
        debug_assert!(agenda.is_empty());
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.state.is_ended() {
            return Err(CaseError::IllegalState {
                message: format!(
                    "case instance {} has already {}",
                    self.case_id,
                    self.state.as_str()
                ),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn case_id(&self) -> u64 {
        self.case_id
    }

    pub fn state(&self) -> CaseState {
        self.state
    }

    pub fn definition(&self) -> &CaseDefinition {
        &self.definition
    }

    pub fn variables(&self) -> &VariableScope {
        &self.variables
    }

    pub fn root(&self) -> &PlanItemInstance {
        &self.items[&self.root_id]
    }

    pub fn next_item_id(&self) -> u64 {
        self.next_id
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn ended_at(&self) -> Option<Timestamp> {
        self.ended_at
    }

    /// Looks up a plan item of this case.
    ///
    /// # Errors
    ///
    /// `PlanItemNotFound` if the ID is not part of this case.
    pub fn item(&self, id: u64) -> Result<&PlanItemInstance> {
        self.items
            .get(&id)
            .ok_or(CaseError::PlanItemNotFound { id })
    }

    /// All plan items in ID order.
    pub fn items(&self) -> impl Iterator<Item = &PlanItemInstance> {
        self.items.values()
    }

    /// First item created from the given definition id.
    pub fn item_by_definition(&self, definition_id: &str) -> Option<&PlanItemInstance> {
        self.items
            .values()
            .find(|item| item.definition_id == definition_id)
    }

    /// Direct children of a container in child order.
    pub fn children_of(&self, id: u64) -> impl Iterator<Item = &PlanItemInstance> {
        self.items
            .get(&id)
            .into_iter()
            .flat_map(|item| item.children.iter())
            .filter_map(move |child| self.items.get(child))
    }

    /// Active human tasks, i.e. exposed work items.
    pub fn work_items(&self) -> impl Iterator<Item = &PlanItemInstance> {
        self.items.values().filter(|item| item.is_work_item())
    }

    /// Definition node of item `id` within `definition`, which callers take
    /// as their own `Arc` of the case definition so the node does not borrow
    /// the runtime.
    pub(super) fn definition_of<'d>(
        &self,
        definition: &'d CaseDefinition,
        id: u64,
    ) -> Result<&'d PlanItemDefinition> {
        let item = self.item(id)?;
        definition
            .find(&item.definition_id)
            .ok_or_else(|| CaseError::Configuration {
                message: format!("Unknown plan item definition '{}'", item.definition_id),
            })
    }

    pub(super) fn depth(&self, id: u64) -> u32 {
        let mut depth = 0;
        let mut current = self.items.get(&id).and_then(|item| item.parent_id);
        while let Some(parent) = current {
            depth += 1;
            current = self.items.get(&parent).and_then(|item| item.parent_id);
        }
        depth
    }

    /// A snapshot of the whole case for callers outside the runtime.
    pub fn to_case_instance(&self) -> CaseInstance {
        CaseInstance {
            id: self.case_id,
            definition_key: self.definition.key.clone(),
            definition_version: self.definition_version,
            state: self.state,
            variables: self.variables.clone(),
            plan_items: self.items.values().cloned().collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            ended_at: self.ended_at,
        }
    }

    /// Hands over everything changed since the last call.
    pub fn take_changes(&mut self) -> RuntimeChanges {
        let touched = std::mem::take(&mut self.touched);
        RuntimeChanges {
            items: touched
                .into_iter()
                .filter_map(|id| self.items.get(&id).cloned())
                .collect(),
            variables_changed: std::mem::replace(&mut self.variables_changed, false),
            events: std::mem::take(&mut self.events),
        }
    }
}
