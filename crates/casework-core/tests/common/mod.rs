use std::path::PathBuf;

use casework_core::{
    params::{DeployDefinition, StartCase},
    CaseDefinition, CaseInstance, Engine, EngineBuilder, PlanItemDefinition,
};
use tempfile::TempDir;

/// Creates a temporary directory and the database path inside it.
pub fn create_test_environment() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let db_path = temp_dir.path().join("casework_test.db");
    (temp_dir, db_path)
}

pub async fn create_test_engine(db_path: &PathBuf) -> Engine {
    EngineBuilder::new()
        .with_database_path(Some(db_path))
        .build()
        .await
        .expect("Failed to create engine")
}

pub async fn deploy(engine: &Engine, definition: &CaseDefinition) {
    engine
        .deploy_definition(&DeployDefinition {
            source: serde_json::to_string(definition).expect("Failed to serialize definition"),
        })
        .await
        .expect("Failed to deploy definition");
}

pub async fn start(engine: &Engine, key: &str, variables: &[&str]) -> CaseInstance {
    engine
        .start_case(&StartCase {
            definition_key: key.to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
        })
        .await
        .expect("Failed to start case")
}

pub fn id_of(case: &CaseInstance, definition_id: &str) -> u64 {
    case.plan_item_by_definition(definition_id)
        .unwrap_or_else(|| panic!("No plan item for '{definition_id}'"))
        .id
}

/// Plan model (auto-complete) > outer stage (auto-complete) > inner stage
/// (manual) > a required task and an optional guarded one, plus a top-level
/// task guarded and required by `${escalate}`.
pub fn nested_definition() -> CaseDefinition {
    CaseDefinition::new(
        "nested",
        PlanItemDefinition::plan_model("planModel")
            .with_auto_complete(true)
            .with_child(
                PlanItemDefinition::stage("outer")
                    .with_auto_complete(true)
                    .with_child(
                        PlanItemDefinition::stage("inner")
                            .with_child(
                                PlanItemDefinition::task("draft").with_required_rule("true"),
                            )
                            .with_child(
                                PlanItemDefinition::task("polish")
                                    .with_entry_criterion("${polishNeeded}"),
                            ),
                    ),
            )
            .with_child(
                PlanItemDefinition::task("escalation")
                    .with_entry_criterion("${escalate}")
                    .with_required_rule("${escalate}"),
            ),
    )
}
