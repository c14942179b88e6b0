mod common;

use casework_core::{
    params::{Id, ListPlanItems, ListTasks, SetVariables},
    CaseError, CaseState, EngineBuilder, LifecycleEvent, PlanItemState, TransitionCause,
};
use common::*;

#[tokio::test]
async fn test_case_survives_engine_restart() {
    let (_temp_dir, db_path) = create_test_environment();

    let case = {
        let engine = create_test_engine(&db_path).await;
        deploy(&engine, &nested_definition()).await;
        start(&engine, "nested", &[]).await
    };

    let engine = EngineBuilder::new()
        .with_database_path(Some(&db_path))
        .build()
        .await
        .expect("Failed to reopen engine");
    let reloaded = engine
        .get_case(&Id { id: case.id })
        .await
        .unwrap()
        .expect("Case should survive reopening");
    assert_eq!(reloaded, case);

    let case = engine
        .complete_item(&Id {
            id: id_of(&reloaded, "draft"),
        })
        .await
        .unwrap();
    let inner = case.plan_item_by_definition("inner").unwrap();
    assert_eq!(inner.state, PlanItemState::Active);
    assert!(inner.completeable);
}

#[tokio::test]
async fn test_nested_stages_complete_bottom_up() {
    let (_temp_dir, db_path) = create_test_environment();
    let engine = create_test_engine(&db_path).await;
    deploy(&engine, &nested_definition()).await;
    let case = start(&engine, "nested", &[]).await;

    let case = engine
        .complete_item(&Id {
            id: id_of(&case, "draft"),
        })
        .await
        .unwrap();
    let case = engine
        .complete_stage(&Id {
            id: id_of(&case, "inner"),
        })
        .await
        .unwrap();

    // The inner stage completion terminates `polish`, lets `outer`
    // auto-complete, and with `escalation` optional the case completes too.
    assert_eq!(
        case.plan_item_by_definition("polish").unwrap().state,
        PlanItemState::Terminated
    );
    assert_eq!(
        case.plan_item_by_definition("outer").unwrap().state,
        PlanItemState::Completed
    );
    assert_eq!(case.state, CaseState::Completed);

    let history = engine.case_history(&Id { id: case.id }).await.unwrap();
    let causes: Vec<(u64, TransitionCause)> = history
        .iter()
        .filter_map(|entry| match &entry.event {
            LifecycleEvent::StateChanged {
                item_id,
                to: PlanItemState::Completed,
                cause,
                ..
            } => Some((*item_id, *cause)),
            _ => None,
        })
        .collect();
    assert_eq!(
        causes,
        vec![
            (id_of(&case, "draft"), TransitionCause::CompleteCommand),
            (id_of(&case, "inner"), TransitionCause::ManualStageCompletion),
            (id_of(&case, "outer"), TransitionCause::AutoCompleted),
            (id_of(&case, "planModel"), TransitionCause::AutoCompleted),
        ]
    );
}

#[tokio::test]
async fn test_required_escalation_holds_case_open() {
    let (_temp_dir, db_path) = create_test_environment();
    let engine = create_test_engine(&db_path).await;
    deploy(&engine, &nested_definition()).await;
    let case = start(&engine, "nested", &[]).await;

    let case = engine
        .set_variables(&SetVariables {
            case_id: case.id,
            assignments: vec!["escalate=true".to_string()],
        })
        .await
        .unwrap();
    let escalation = case.plan_item_by_definition("escalation").unwrap();
    assert_eq!(escalation.state, PlanItemState::Active);
    assert!(escalation.required);

    let case = engine
        .complete_item(&Id {
            id: id_of(&case, "draft"),
        })
        .await
        .unwrap();
    let case = engine
        .complete_stage(&Id {
            id: id_of(&case, "inner"),
        })
        .await
        .unwrap();
    assert_eq!(case.state, CaseState::Active);
    assert!(!case.root().unwrap().completeable);

    let tasks = engine
        .list_tasks(&ListTasks {
            case_id: Some(case.id),
        })
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    let case = engine.complete_item(&Id { id: tasks[0].id }).await.unwrap();
    assert_eq!(case.state, CaseState::Completed);
}

#[tokio::test]
async fn test_item_listing_includes_ended_on_request() {
    let (_temp_dir, db_path) = create_test_environment();
    let engine = create_test_engine(&db_path).await;
    deploy(&engine, &nested_definition()).await;
    let case = start(&engine, "nested", &[]).await;
    engine
        .complete_item(&Id {
            id: id_of(&case, "draft"),
        })
        .await
        .unwrap();

    let live = engine
        .list_plan_items(&ListPlanItems {
            case_id: case.id,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(live.iter().all(|item| item.state.is_live()));

    let every = engine
        .list_plan_items(&ListPlanItems {
            case_id: case.id,
            all: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(every.len(), live.len() + 1);

    let completeable = engine
        .list_plan_items(&ListPlanItems {
            case_id: case.id,
            completeable: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(completeable.len(), 1);
    assert_eq!(completeable[0].definition_id, "inner");

    let err = engine
        .list_plan_items(&ListPlanItems {
            case_id: case.id,
            kind: Some("milestone".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CaseError::InvalidInput { .. }));
}
