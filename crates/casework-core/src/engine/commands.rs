//! State-changing operations for the Engine.

use std::sync::Arc;

use log::info;

use super::{listener, Engine};
use crate::{
    db::CommandOutcome,
    error::{CaseError, Result},
    expression::RuleEvaluator,
    models::{CaseInstance, DeployedDefinition, VariableScope},
    params::{parse_assignments, DeployDefinition, Id, SetVariables, StartCase},
    runtime::CaseRuntime,
};

impl Engine {
    /// Validates a definition and stores it under the next version of its
    /// key.
    pub async fn deploy_definition(&self, params: &DeployDefinition) -> Result<DeployedDefinition> {
        let definition = params.parse()?;
        self.with_database(move |db| db.deploy_definition(&definition))
            .await
    }

    /// Starts a case from the latest version of a definition. The returned
    /// case is already settled: every unguarded item is active.
    pub async fn start_case(&self, params: &StartCase) -> Result<CaseInstance> {
        let variables = VariableScope::from(parse_assignments(&params.variables)?);
        let key = params.definition_key.clone();
        let evaluator = Arc::clone(&self.evaluator);

        let outcome = self
            .with_database(move |db| db.start_case(&key, variables, evaluator.as_ref()))
            .await?;

        info!(
            "Started case {} from '{}'",
            outcome.value, params.definition_key
        );
        listener::notify(&self.listeners, &outcome.changes);
        Ok(outcome.case)
    }

    /// Assigns case variables and re-evaluates every live plan item.
    pub async fn set_variables(&self, params: &SetVariables) -> Result<CaseInstance> {
        let variables = parse_assignments(&params.assignments)?;
        let outcome = self
            .run_command(params.case_id, move |runtime, evaluator| {
                runtime.set_variables(variables, evaluator)
            })
            .await?;
        info!(
            "Case {}: changed variables {:?}",
            params.case_id, outcome.value
        );
        Ok(outcome.case)
    }

    /// Completes an active human task.
    pub async fn complete_item(&self, params: &Id) -> Result<CaseInstance> {
        let item_id = params.id;
        let case_id = self.case_of_item(item_id).await?;
        let outcome = self
            .run_command(case_id, move |runtime, evaluator| {
                runtime.complete_item(item_id, evaluator)
            })
            .await?;
        info!("Completed plan item {}", item_id);
        Ok(outcome.case)
    }

    /// Completes an active stage whose children no longer block it.
    pub async fn complete_stage(&self, params: &Id) -> Result<CaseInstance> {
        let item_id = params.id;
        let case_id = self.case_of_item(item_id).await?;
        let outcome = self
            .run_command(case_id, move |runtime, evaluator| {
                runtime.complete_stage(item_id, evaluator)
            })
            .await?;
        info!("Completed stage {}", item_id);
        Ok(outcome.case)
    }

    /// Activates an item that waits for manual activation.
    pub async fn activate_item(&self, params: &Id) -> Result<CaseInstance> {
        let item_id = params.id;
        let case_id = self.case_of_item(item_id).await?;
        let outcome = self
            .run_command(case_id, move |runtime, evaluator| {
                runtime.activate_item(item_id, evaluator)
            })
            .await?;
        info!("Activated plan item {}", item_id);
        Ok(outcome.case)
    }

    /// Terminates a case and everything still live in it.
    pub async fn terminate_case(&self, params: &Id) -> Result<CaseInstance> {
        let outcome = self
            .run_command(params.id, |runtime, evaluator| runtime.terminate_case(evaluator))
            .await?;
        info!("Terminated case {}", params.id);
        Ok(outcome.case)
    }

    /// Runs one command against a case while holding its lock, then notifies
    /// listeners about the committed changes.
    async fn run_command<T, F>(&self, case_id: u64, command: F) -> Result<CommandOutcome<T>>
    where
        F: FnOnce(&mut CaseRuntime, &dyn RuleEvaluator) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.locks.lock(case_id).await;
        let evaluator = Arc::clone(&self.evaluator);

        let outcome = self
            .with_database(move |db| {
                db.execute(case_id, |runtime| command(runtime, evaluator.as_ref()))
            })
            .await?;

        listener::notify(&self.listeners, &outcome.changes);
        Ok(outcome)
    }

    async fn case_of_item(&self, item_id: u64) -> Result<u64> {
        self.with_database(move |db| db.get_plan_item(item_id))
            .await?
            .map(|item| item.case_id)
            .ok_or(CaseError::PlanItemNotFound { id: item_id })
    }
}
