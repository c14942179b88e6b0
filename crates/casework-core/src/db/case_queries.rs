//! Case instance lifecycle: start, command execution and queries.

use std::sync::Arc;

use jiff::Timestamp;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;

use super::{optional_timestamp_at, parsed_at, timestamp_at};
use crate::{
    error::{CaseError, DatabaseResultExt, Result},
    expression::RuleEvaluator,
    models::{CaseFilter, CaseInstance, CaseState, CaseSummary, VariableScope},
    runtime::{CaseRuntime, CaseSnapshot, RuntimeChanges},
};

const INSERT_CASE_SQL: &str = "INSERT INTO case_instances (definition_key, definition_version, state, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)";
const UPDATE_CASE_SQL: &str =
    "UPDATE case_instances SET state = ?1, updated_at = ?2, ended_at = ?3 WHERE id = ?4";
const SELECT_CASE_SQL: &str = "SELECT id, definition_key, definition_version, state, created_at, updated_at, ended_at FROM case_instances WHERE id = ?1";
const CHECK_CASE_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM case_instances WHERE id = ?1)";
const SELECT_VARIABLES_SQL: &str =
    "SELECT name, value FROM variables WHERE case_id = ?1 ORDER BY name";
const DELETE_VARIABLES_SQL: &str = "DELETE FROM variables WHERE case_id = ?1";
const INSERT_VARIABLE_SQL: &str =
    "INSERT INTO variables (case_id, name, value) VALUES (?1, ?2, ?3)";

// Summary listing counts live items and open tasks per case
const CASE_SUMMARY_SQL: &str = "SELECT c.id, c.definition_key, c.definition_version, c.state, c.created_at, c.updated_at, \
     (SELECT COUNT(*) FROM plan_items p WHERE p.case_id = c.id AND p.state IN ('available', 'active')), \
     (SELECT COUNT(*) FROM plan_items p WHERE p.case_id = c.id AND p.kind = 'humanTask' AND p.state = 'active') \
     FROM case_instances c";

/// Result of a command run through [`super::Database::execute`].
#[derive(Debug, Clone)]
pub struct CommandOutcome<T> {
    /// Whatever the command returned
    pub value: T,
    /// The case as committed
    pub case: CaseInstance,
    /// What the command changed
    pub changes: RuntimeChanges,
}

impl super::Database {
    /// Starts a case from the latest version of `key` and persists the
    /// settled initial state.
    pub fn start_case(
        &mut self,
        key: &str,
        variables: VariableScope,
        evaluator: &dyn RuleEvaluator,
    ) -> Result<CommandOutcome<u64>> {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let deployed = Self::load_definition(&tx, key, None)?.ok_or_else(|| {
            CaseError::DefinitionNotFound {
                key: key.to_string(),
            }
        })?;

        let now = Timestamp::now().to_string();
        tx.execute(
            INSERT_CASE_SQL,
            params![key, deployed.version as i64, CaseState::Active.as_str(), &now],
        )
        .db_context("Failed to insert case instance")?;
        let case_id = tx.last_insert_rowid() as u64;

        let mut runtime = CaseRuntime::start(
            case_id,
            Arc::new(deployed.definition),
            deployed.version,
            variables,
            Self::next_item_id(&tx)?,
            evaluator,
        )?;
        let changes = runtime.take_changes();
        Self::persist(&tx, &runtime, &changes)?;

        let case = Self::load_case(&tx, case_id)?.ok_or(CaseError::CaseNotFound { id: case_id })?;
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(CommandOutcome {
            value: case_id,
            case,
            changes,
        })
    }

    /// Loads a case, runs `command` against it and writes every change back
    /// in one transaction. Nothing is written when the command fails.
    pub fn execute<T, F>(&mut self, case_id: u64, command: F) -> Result<CommandOutcome<T>>
    where
        F: FnOnce(&mut CaseRuntime) -> Result<T>,
    {
        let tx = self
            .connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")?;

        let snapshot = Self::load_snapshot(&tx, case_id)?;
        let mut runtime = CaseRuntime::restore(snapshot)?;
        let value = command(&mut runtime)?;

        let changes = runtime.take_changes();
        if !changes.is_empty() {
            Self::persist(&tx, &runtime, &changes)?;
        }

        let case = Self::load_case(&tx, case_id)?.ok_or(CaseError::CaseNotFound { id: case_id })?;
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(CommandOutcome {
            value,
            case,
            changes,
        })
    }

    /// Retrieves a case with its variables and plan items.
    pub fn get_case(&self, id: u64) -> Result<Option<CaseInstance>> {
        Self::load_case(&self.connection, id)
    }

    /// Lists case summaries, newest first.
    pub fn list_cases(
        &self,
        filter: CaseFilter,
        definition_key: Option<&str>,
    ) -> Result<Vec<CaseSummary>> {
        let mut query = CASE_SUMMARY_SQL.to_string();
        let mut conditions = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        match filter {
            CaseFilter::Active => conditions.push("c.state = 'active'"),
            CaseFilter::Ended => conditions.push("c.state IN ('completed', 'terminated')"),
            CaseFilter::All => {}
        }
        if let Some(key) = definition_key {
            conditions.push("c.definition_key = ?");
            params_vec.push(Box::new(key.to_string()));
        }

        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY c.id DESC");

        let mut stmt = self
            .connection
            .prepare(&query)
            .db_context("Failed to prepare query")?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| &**b).collect();

        let cases = stmt
            .query_map(&params_refs[..], |row| {
                Ok(CaseSummary {
                    id: row.get::<_, i64>(0)? as u64,
                    definition_key: row.get(1)?,
                    definition_version: row.get::<_, i64>(2)? as u32,
                    state: parsed_at(row, 3, "case state")?,
                    created_at: timestamp_at(row, 4)?,
                    updated_at: timestamp_at(row, 5)?,
                    live_items: row.get::<_, i64>(6)? as u32,
                    open_tasks: row.get::<_, i64>(7)? as u32,
                })
            })
            .db_context("Failed to query cases")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch cases")?;

        Ok(cases)
    }

    pub(super) fn case_exists(conn: &Connection, id: u64) -> Result<bool> {
        conn.query_row(CHECK_CASE_EXISTS_SQL, params![id as i64], |row| row.get(0))
            .db_context("Failed to check case existence")
    }

    fn load_case(conn: &Connection, id: u64) -> Result<Option<CaseInstance>> {
        let case = conn
            .query_row(SELECT_CASE_SQL, params![id as i64], |row| {
                Ok(CaseInstance {
                    id: row.get::<_, i64>(0)? as u64,
                    definition_key: row.get(1)?,
                    definition_version: row.get::<_, i64>(2)? as u32,
                    state: parsed_at(row, 3, "case state")?,
                    variables: VariableScope::new(),
                    plan_items: Vec::new(),
                    created_at: timestamp_at(row, 4)?,
                    updated_at: timestamp_at(row, 5)?,
                    ended_at: optional_timestamp_at(row, 6)?,
                })
            })
            .optional()
            .db_context("Failed to query case instance")?;

        let Some(mut case) = case else {
            return Ok(None);
        };
        case.variables = Self::load_variables(conn, id)?;
        case.plan_items = Self::load_items(conn, id)?;
        Ok(Some(case))
    }

    fn load_snapshot(conn: &Connection, case_id: u64) -> Result<CaseSnapshot> {
        let case = Self::load_case(conn, case_id)?.ok_or(CaseError::CaseNotFound { id: case_id })?;
        let deployed =
            Self::load_definition(conn, &case.definition_key, Some(case.definition_version))?
                .ok_or_else(|| CaseError::DefinitionNotFound {
                    key: format!("{} v{}", case.definition_key, case.definition_version),
                })?;

        Ok(CaseSnapshot {
            case_id,
            definition: Arc::new(deployed.definition),
            definition_version: case.definition_version,
            state: case.state,
            variables: case.variables,
            items: case.plan_items,
            created_at: case.created_at,
            updated_at: case.updated_at,
            ended_at: case.ended_at,
            next_item_id: Self::next_item_id(conn)?,
        })
    }

    fn load_variables(conn: &Connection, case_id: u64) -> Result<VariableScope> {
        let mut stmt = conn
            .prepare(SELECT_VARIABLES_SQL)
            .db_context("Failed to prepare query")?;
        let rows = stmt
            .query_map(params![case_id as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .db_context("Failed to query variables")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch variables")?;

        rows.into_iter()
            .map(|(name, value)| -> Result<(String, Value)> {
                Ok((name, serde_json::from_str(&value)?))
            })
            .collect()
    }

    /// Writes the changes of one command: plan items, variables, the case
    /// row and the lifecycle events.
    fn persist(conn: &Connection, runtime: &CaseRuntime, changes: &RuntimeChanges) -> Result<()> {
        let case_id = runtime.case_id();
        Self::upsert_items(conn, &changes.items)?;

        if changes.variables_changed {
            conn.execute(DELETE_VARIABLES_SQL, params![case_id as i64])
                .db_context("Failed to clear variables")?;
            let mut stmt = conn
                .prepare_cached(INSERT_VARIABLE_SQL)
                .db_context("Failed to prepare variable insert")?;
            for (name, value) in runtime.variables().iter() {
                stmt.execute(params![case_id as i64, name, serde_json::to_string(value)?])
                    .db_context("Failed to write variable")?;
            }
        }

        conn.execute(
            UPDATE_CASE_SQL,
            params![
                runtime.state().as_str(),
                runtime.updated_at().to_string(),
                runtime.ended_at().map(|at| at.to_string()),
                case_id as i64
            ],
        )
        .db_context("Failed to update case instance")?;

        Self::append_events(conn, case_id, &changes.events, Timestamp::now())
    }
}
