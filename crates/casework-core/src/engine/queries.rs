//! Read-only operations for the Engine.
//!
//! Queries take no case lock: each one reads a committed snapshot in its own
//! connection.

use super::Engine;
use crate::{
    display::{CaseSummaries, Definitions, History, PlanItems},
    error::Result,
    models::{CaseFilter, CaseInstance, DeployedDefinition, PlanItemInstance},
    params::{Id, ListCases, ListPlanItems, ListTasks, ShowDefinition},
};

impl Engine {
    /// Retrieves a case with its variables and every plan item, ended ones
    /// included.
    pub async fn get_case(&self, params: &Id) -> Result<Option<CaseInstance>> {
        let id = params.id;
        self.with_database(move |db| db.get_case(id)).await
    }

    /// Lists case summaries, newest first.
    pub async fn list_cases(&self, params: &ListCases) -> Result<CaseSummaries> {
        let filter = CaseFilter::from(params);
        let key = params.definition_key.clone();
        let cases = self
            .with_database(move |db| db.list_cases(filter, key.as_deref()))
            .await?;
        Ok(CaseSummaries(cases))
    }

    /// Lists the plan items of one case.
    ///
    /// # Errors
    ///
    /// * `CaseError::InvalidInput` - When the state or kind filter is unknown
    /// * `CaseError::CaseNotFound` - When the case does not exist
    pub async fn list_plan_items(&self, params: &ListPlanItems) -> Result<PlanItems> {
        let filter = params.to_filter()?;
        let case_id = params.case_id;
        let items = self
            .with_database(move |db| db.list_plan_items(case_id, &filter))
            .await?;
        Ok(PlanItems(items))
    }

    /// Lists the exposed work items (active human tasks), optionally of a
    /// single case.
    pub async fn list_tasks(&self, params: &ListTasks) -> Result<PlanItems> {
        let case_id = params.case_id;
        let tasks = self
            .with_database(move |db| db.list_work_items(case_id))
            .await?;
        Ok(PlanItems(tasks))
    }

    pub async fn get_plan_item(&self, params: &Id) -> Result<Option<PlanItemInstance>> {
        let id = params.id;
        self.with_database(move |db| db.get_plan_item(id)).await
    }

    /// Returns the recorded lifecycle events of a case in order.
    pub async fn case_history(&self, params: &Id) -> Result<History> {
        let id = params.id;
        let entries = self.with_database(move |db| db.case_history(id)).await?;
        Ok(History(entries))
    }

    /// Lists the latest version of every deployed definition.
    pub async fn list_definitions(&self) -> Result<Definitions> {
        let definitions = self.with_database(|db| db.list_definitions()).await?;
        Ok(Definitions(definitions))
    }

    /// Looks up a definition by key, at a given version or the latest one.
    pub async fn get_definition(&self, params: &ShowDefinition) -> Result<Option<DeployedDefinition>> {
        let key = params.key.clone();
        let version = params.version;
        self.with_database(move |db| db.get_definition(&key, version))
            .await
    }
}
