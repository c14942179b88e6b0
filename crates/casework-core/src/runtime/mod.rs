//! Execution of case instances.
//!
//! [`CaseRuntime`] owns the plan item tree of one case. Each command mutates
//! a few items directly and queues the affected items and containers on an
//! [`Agenda`]; the fixpoint then re-evaluates rules and completion until the
//! agenda drains. Every state only moves forward, so the fixpoint terminates.

pub mod agenda;
pub mod case;
pub mod completion;
mod lifecycle;

pub use agenda::Agenda;
pub use case::{CaseRuntime, CaseSnapshot, RuntimeChanges};
pub use completion::CompletionCheck;

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use serde_json::{json, Value};

    use super::*;
    use crate::{
        error::{CaseError, Result, STAGE_NOT_COMPLETEABLE},
        expression::{Expression, ExpressionEvaluator, RuleEvaluator},
        models::{
            CaseDefinition, CaseState, LifecycleEvent, PlanItemDefinition, PlanItemState,
            TransitionCause, VariableScope,
        },
    };

    fn vars(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn start(definition: CaseDefinition, pairs: &[(&str, Value)]) -> CaseRuntime {
        let scope = VariableScope::from(vars(pairs));
        CaseRuntime::start(1, Arc::new(definition), 1, scope, 1, &ExpressionEvaluator).unwrap()
    }

    fn id_of(runtime: &CaseRuntime, definition_id: &str) -> u64 {
        runtime.item_by_definition(definition_id).unwrap().id
    }

    fn state_of(runtime: &CaseRuntime, definition_id: &str) -> PlanItemState {
        runtime.item_by_definition(definition_id).unwrap().state
    }

    /// One required task and one task guarded by `${nonRequired}`.
    fn required_rule_case() -> CaseDefinition {
        CaseDefinition::new(
            "requiredRule",
            PlanItemDefinition::plan_model("planModel")
                .with_auto_complete(true)
                .with_child(
                    PlanItemDefinition::task("requiredTask")
                        .with_name("Required task")
                        .with_required_rule("${required}"),
                )
                .with_child(
                    PlanItemDefinition::task("nonRequiredTask")
                        .with_name("Non-required task")
                        .with_entry_criterion("${nonRequired}"),
                ),
        )
    }

    /// A manually completed stage holding a required task and a sibling
    /// guarded by `${activateOther}`.
    fn manual_stage_case() -> CaseDefinition {
        CaseDefinition::new(
            "manualStage",
            PlanItemDefinition::plan_model("planModel")
                .with_auto_complete(true)
                .with_child(
                    PlanItemDefinition::stage("stage")
                        .with_child(
                            PlanItemDefinition::task("requiredTask")
                                .with_required_rule("${required}"),
                        )
                        .with_child(
                            PlanItemDefinition::task("otherTask")
                                .with_required_rule("${escalate}")
                                .with_entry_criterion("${activateOther}"),
                        ),
                ),
        )
    }

    #[test]
    fn test_only_required_task_activates_and_completing_it_ends_case() {
        let mut runtime = start(required_rule_case(), &[("required", json!(true))]);
        assert_eq!(state_of(&runtime, "requiredTask"), PlanItemState::Active);
        assert!(runtime.item_by_definition("requiredTask").unwrap().required);
        assert_eq!(state_of(&runtime, "nonRequiredTask"), PlanItemState::Available);

        let task = id_of(&runtime, "requiredTask");
        runtime.complete_item(task, &ExpressionEvaluator).unwrap();

        assert_eq!(state_of(&runtime, "requiredTask"), PlanItemState::Completed);
        assert_eq!(state_of(&runtime, "nonRequiredTask"), PlanItemState::Terminated);
        assert_eq!(runtime.root().state, PlanItemState::Completed);
        assert_eq!(runtime.state(), CaseState::Completed);
    }

    #[test]
    fn test_active_non_required_task_keeps_case_open() {
        let mut runtime = start(
            required_rule_case(),
            &[("required", json!(true)), ("nonRequired", json!(true))],
        );
        assert_eq!(state_of(&runtime, "requiredTask"), PlanItemState::Active);
        assert_eq!(state_of(&runtime, "nonRequiredTask"), PlanItemState::Active);

        let required = id_of(&runtime, "requiredTask");
        runtime.complete_item(required, &ExpressionEvaluator).unwrap();
        assert_eq!(runtime.state(), CaseState::Active);
        assert!(!runtime.root().completeable);

        let optional = id_of(&runtime, "nonRequiredTask");
        runtime.complete_item(optional, &ExpressionEvaluator).unwrap();
        assert_eq!(runtime.state(), CaseState::Completed);
    }

    #[test]
    fn test_manual_stage_refuses_completion_until_completeable() {
        let mut runtime = start(manual_stage_case(), &[("required", json!(true))]);
        let stage = id_of(&runtime, "stage");
        assert!(!runtime.item(stage).unwrap().completeable);

        let err = runtime.complete_stage(stage, &ExpressionEvaluator).unwrap_err();
        assert!(matches!(err, CaseError::IllegalArgument { .. }));
        assert_eq!(err.to_string(), STAGE_NOT_COMPLETEABLE);
        assert_eq!(runtime.item(stage).unwrap().state, PlanItemState::Active);

        let task = id_of(&runtime, "requiredTask");
        runtime.complete_item(task, &ExpressionEvaluator).unwrap();
        let item = runtime.item(stage).unwrap();
        assert_eq!(item.state, PlanItemState::Active);
        assert!(item.completeable);

        runtime
            .set_variables(vars(&[("activateOther", json!(true))]), &ExpressionEvaluator)
            .unwrap();
        assert_eq!(state_of(&runtime, "otherTask"), PlanItemState::Active);
        assert!(!runtime.item(stage).unwrap().completeable);
    }

    #[test]
    fn test_completing_completeable_stage_ends_case() {
        let mut runtime = start(manual_stage_case(), &[("required", json!(true))]);
        let stage = id_of(&runtime, "stage");
        let task = id_of(&runtime, "requiredTask");
        runtime.complete_item(task, &ExpressionEvaluator).unwrap();

        runtime.complete_stage(stage, &ExpressionEvaluator).unwrap();

        assert_eq!(runtime.item(stage).unwrap().state, PlanItemState::Completed);
        assert_eq!(state_of(&runtime, "otherTask"), PlanItemState::Terminated);
        assert_eq!(runtime.state(), CaseState::Completed);
    }

    #[test]
    fn test_newly_required_child_blocks_completeable_stage() {
        let mut runtime = start(manual_stage_case(), &[("required", json!(true))]);
        let task = id_of(&runtime, "requiredTask");
        runtime.complete_item(task, &ExpressionEvaluator).unwrap();
        let stage = id_of(&runtime, "stage");
        assert!(runtime.item(stage).unwrap().completeable);

        runtime
            .set_variables(vars(&[("escalate", json!(true))]), &ExpressionEvaluator)
            .unwrap();

        let other = runtime.item_by_definition("otherTask").unwrap();
        assert_eq!(other.state, PlanItemState::Available);
        assert!(other.required);
        assert!(!runtime.item(stage).unwrap().completeable);
    }

    #[test]
    fn test_nested_stage_auto_completes_while_case_stays_open() {
        let definition = CaseDefinition::new(
            "nested",
            PlanItemDefinition::plan_model("planModel")
                .with_auto_complete(true)
                .with_child(
                    PlanItemDefinition::stage("stage")
                        .with_auto_complete(true)
                        .with_child(
                            PlanItemDefinition::task("requiredTask")
                                .with_required_rule("${required}"),
                        )
                        .with_child(
                            PlanItemDefinition::task("guardedTask")
                                .with_entry_criterion("${nonRequired}"),
                        ),
                )
                .with_child(PlanItemDefinition::task("otherTask")),
        );
        let mut runtime = start(definition, &[("required", json!(true))]);
        assert_eq!(state_of(&runtime, "otherTask"), PlanItemState::Active);

        let task = id_of(&runtime, "requiredTask");
        runtime.complete_item(task, &ExpressionEvaluator).unwrap();
        assert_eq!(state_of(&runtime, "stage"), PlanItemState::Completed);
        assert_eq!(state_of(&runtime, "guardedTask"), PlanItemState::Terminated);
        assert_eq!(runtime.state(), CaseState::Active);

        let other = id_of(&runtime, "otherTask");
        runtime.complete_item(other, &ExpressionEvaluator).unwrap();
        assert_eq!(runtime.state(), CaseState::Completed);
    }

    #[test]
    fn test_fresh_stage_with_required_children_is_not_completed_at_activation() {
        let definition = CaseDefinition::new(
            "fresh",
            PlanItemDefinition::plan_model("planModel")
                .with_auto_complete(true)
                .with_child(
                    PlanItemDefinition::stage("stage")
                        .with_auto_complete(true)
                        .with_child(
                            PlanItemDefinition::task("task")
                                .with_required_rule("true")
                                .with_entry_criterion("${go}"),
                        ),
                ),
        );
        let runtime = start(definition, &[]);
        assert_eq!(state_of(&runtime, "stage"), PlanItemState::Active);
        assert_eq!(state_of(&runtime, "task"), PlanItemState::Available);
        assert_eq!(runtime.state(), CaseState::Active);
    }

    #[test]
    fn test_empty_auto_complete_plan_model_completes_at_start() {
        let definition = CaseDefinition::new(
            "empty",
            PlanItemDefinition::plan_model("planModel").with_auto_complete(true),
        );
        let runtime = start(definition, &[]);
        assert_eq!(runtime.state(), CaseState::Completed);
    }

    #[test]
    fn test_exit_criterion_terminates_subtree() {
        let definition = CaseDefinition::new(
            "exit",
            PlanItemDefinition::plan_model("planModel")
                .with_auto_complete(true)
                .with_child(
                    PlanItemDefinition::stage("stage")
                        .with_exit_criterion("${cancel}")
                        .with_child(PlanItemDefinition::task("inner")),
                )
                .with_child(PlanItemDefinition::task("outer")),
        );
        let mut runtime = start(definition, &[]);
        assert_eq!(state_of(&runtime, "inner"), PlanItemState::Active);

        runtime
            .set_variables(vars(&[("cancel", json!(true))]), &ExpressionEvaluator)
            .unwrap();

        assert_eq!(state_of(&runtime, "stage"), PlanItemState::Terminated);
        assert_eq!(state_of(&runtime, "inner"), PlanItemState::Terminated);
        assert_eq!(state_of(&runtime, "outer"), PlanItemState::Active);
        assert_eq!(runtime.state(), CaseState::Active);
    }

    #[test]
    fn test_plan_model_exit_criterion_terminates_case() {
        let definition = CaseDefinition::new(
            "cancel",
            PlanItemDefinition::plan_model("planModel")
                .with_exit_criterion("${cancelled}")
                .with_child(PlanItemDefinition::task("task")),
        );
        let mut runtime = start(definition, &[]);
        assert_eq!(runtime.state(), CaseState::Active);

        runtime
            .set_variables(vars(&[("cancelled", json!(true))]), &ExpressionEvaluator)
            .unwrap();

        assert_eq!(runtime.root().state, PlanItemState::Terminated);
        assert_eq!(state_of(&runtime, "task"), PlanItemState::Terminated);
        assert_eq!(runtime.state(), CaseState::Terminated);
    }

    #[test]
    fn test_definition_lookup_borrows_shared_tree() {
        let runtime = start(manual_stage_case(), &[("required", json!(true))]);
        let stage = id_of(&runtime, "stage");

        let node = runtime.definition_of(&runtime.definition, stage).unwrap();
        let shared = runtime.definition.find("stage").unwrap();
        assert!(std::ptr::eq(node, shared));
        assert_eq!(
            runtime
                .definition_of(&runtime.definition, runtime.root().id)
                .unwrap()
                .id,
            "planModel"
        );
    }

    #[test]
    fn test_manual_activation_waits_for_activate_command() {
        let definition = CaseDefinition::new(
            "manual",
            PlanItemDefinition::plan_model("planModel")
                .with_auto_complete(true)
                .with_child(PlanItemDefinition::task("work"))
                .with_child(PlanItemDefinition::task("review").with_manual_activation_rule("true"))
                .with_child(PlanItemDefinition::task("later").with_entry_criterion("${never}")),
        );
        let mut runtime = start(definition, &[]);
        let review = id_of(&runtime, "review");
        let later = id_of(&runtime, "later");

        let err = runtime.complete_item(review, &ExpressionEvaluator).unwrap_err();
        assert!(matches!(err, CaseError::IllegalState { .. }));
        let err = runtime.activate_item(later, &ExpressionEvaluator).unwrap_err();
        assert!(matches!(err, CaseError::IllegalState { .. }));

        runtime.activate_item(review, &ExpressionEvaluator).unwrap();
        let item = runtime.item(review).unwrap();
        assert_eq!(item.state, PlanItemState::Active);
        assert!(!item.enabled);
    }

    #[test]
    fn test_complete_item_rejects_containers_and_inactive_items() {
        let mut runtime = start(manual_stage_case(), &[("required", json!(true))]);
        let stage = id_of(&runtime, "stage");
        let other = id_of(&runtime, "otherTask");

        let err = runtime.complete_item(stage, &ExpressionEvaluator).unwrap_err();
        assert!(matches!(err, CaseError::IllegalArgument { .. }));
        let err = runtime.complete_item(other, &ExpressionEvaluator).unwrap_err();
        assert!(matches!(err, CaseError::IllegalState { .. }));
        let err = runtime.complete_item(999, &ExpressionEvaluator).unwrap_err();
        assert!(matches!(err, CaseError::PlanItemNotFound { id: 999 }));
    }

    #[test]
    fn test_evaluation_failure_rolls_back_command() {
        let failing = |expression: &Expression, scope: &VariableScope| -> Result<bool> {
            if scope.contains("boom") {
                return Err(CaseError::EvaluationFailure {
                    expression: expression.to_string(),
                    reason: "evaluator unavailable".to_string(),
                });
            }
            ExpressionEvaluator.evaluate(expression, scope)
        };
        let mut runtime = start(required_rule_case(), &[("required", json!(true))]);
        runtime.take_changes();
        let before = runtime.to_case_instance();

        let err = runtime
            .set_variables(
                vars(&[("nonRequired", json!(true)), ("boom", json!(1))]),
                &failing,
            )
            .unwrap_err();

        assert!(matches!(err, CaseError::EvaluationFailure { .. }));
        assert_eq!(runtime.to_case_instance(), before);
        assert!(runtime.take_changes().is_empty());
    }

    #[test]
    fn test_set_variables_reports_only_changed_names() {
        let mut runtime = start(required_rule_case(), &[("required", json!(true))]);
        runtime.take_changes();

        let changed = runtime
            .set_variables(vars(&[("required", json!(true))]), &ExpressionEvaluator)
            .unwrap();
        assert!(changed.is_empty());
        assert!(runtime.take_changes().is_empty());

        let changed = runtime
            .set_variables(vars(&[("nonRequired", json!(true))]), &ExpressionEvaluator)
            .unwrap();
        assert_eq!(changed, vec!["nonRequired".to_string()]);
        let changes = runtime.take_changes();
        assert!(changes.variables_changed);
        assert_eq!(changes.items.len(), 1);
        assert!(changes.events.iter().any(|event| matches!(
            event,
            LifecycleEvent::StateChanged {
                to: PlanItemState::Active,
                cause: TransitionCause::EntryCriterion,
                ..
            }
        )));
    }

    #[test]
    fn test_terminate_case_ends_everything_and_blocks_further_commands() {
        let mut runtime = start(manual_stage_case(), &[("required", json!(true))]);
        runtime.terminate_case(&ExpressionEvaluator).unwrap();

        assert_eq!(runtime.state(), CaseState::Terminated);
        assert!(runtime.items().all(|item| item.state.is_ended()));

        let task = id_of(&runtime, "requiredTask");
        let err = runtime.complete_item(task, &ExpressionEvaluator).unwrap_err();
        assert!(matches!(err, CaseError::IllegalState { .. }));
        let err = runtime.terminate_case(&ExpressionEvaluator).unwrap_err();
        assert!(matches!(err, CaseError::IllegalState { .. }));
    }

    #[test]
    fn test_restore_rebuilds_identical_runtime() {
        let runtime = start(manual_stage_case(), &[("required", json!(true))]);
        let instance = runtime.to_case_instance();

        let restored = CaseRuntime::restore(CaseSnapshot {
            case_id: instance.id,
            definition: Arc::new(manual_stage_case()),
            definition_version: instance.definition_version,
            state: instance.state,
            variables: instance.variables.clone(),
            items: instance.plan_items.clone(),
            created_at: instance.created_at,
            updated_at: instance.updated_at,
            ended_at: instance.ended_at,
            next_item_id: 1,
        })
        .unwrap();

        assert_eq!(restored.to_case_instance(), instance);
        assert_eq!(restored.next_item_id(), runtime.next_item_id());
    }

    #[test]
    fn test_restore_rejects_orphaned_items() {
        let runtime = start(manual_stage_case(), &[("required", json!(true))]);
        let mut instance = runtime.to_case_instance();
        instance.plan_items.retain(|item| item.definition_id != "stage");

        let result = CaseRuntime::restore(CaseSnapshot {
            case_id: instance.id,
            definition: Arc::new(manual_stage_case()),
            definition_version: 1,
            state: instance.state,
            variables: instance.variables,
            items: instance.plan_items,
            created_at: instance.created_at,
            updated_at: instance.updated_at,
            ended_at: None,
            next_item_id: 1,
        });
        assert!(matches!(result, Err(CaseError::Configuration { .. })));
    }
}
