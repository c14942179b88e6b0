//! Plan item persistence and queries.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::{optional_timestamp_at, parsed_at, timestamp_at};
use crate::{
    error::{CaseError, DatabaseResultExt, Result},
    models::{PlanItemFilter, PlanItemInstance},
};

const SELECT_ITEMS_BY_CASE_SQL: &str = "SELECT id, case_id, parent_id, definition_id, name, kind, state, required, completeable, enabled, item_order, created_at, updated_at, ended_at FROM plan_items WHERE case_id = ?1 ORDER BY id";
const SELECT_ITEM_BY_ID_SQL: &str = "SELECT id, case_id, parent_id, definition_id, name, kind, state, required, completeable, enabled, item_order, created_at, updated_at, ended_at FROM plan_items WHERE id = ?1";
const SELECT_CHILD_IDS_SQL: &str =
    "SELECT id FROM plan_items WHERE parent_id = ?1 ORDER BY item_order";
const SELECT_WORK_ITEMS_SQL: &str = "SELECT id, case_id, parent_id, definition_id, name, kind, state, required, completeable, enabled, item_order, created_at, updated_at, ended_at FROM plan_items WHERE kind = 'humanTask' AND state = 'active'";
const SELECT_NEXT_ITEM_ID_SQL: &str = "SELECT COALESCE(MAX(id), 0) + 1 FROM plan_items";
const UPSERT_ITEM_SQL: &str = "INSERT INTO plan_items (id, case_id, parent_id, definition_id, name, kind, state, required, completeable, enabled, item_order, created_at, updated_at, ended_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) ON CONFLICT(id) DO UPDATE SET state = excluded.state, required = excluded.required, completeable = excluded.completeable, enabled = excluded.enabled, updated_at = excluded.updated_at, ended_at = excluded.ended_at";

impl super::Database {
    /// Helper function to construct a plan item from a database row. The
    /// child list is filled in separately.
    fn build_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<PlanItemInstance> {
        Ok(PlanItemInstance {
            id: row.get::<_, i64>(0)? as u64,
            case_id: row.get::<_, i64>(1)? as u64,
            parent_id: row.get::<_, Option<i64>>(2)?.map(|id| id as u64),
            definition_id: row.get(3)?,
            name: row.get(4)?,
            kind: parsed_at(row, 5, "plan item kind")?,
            state: parsed_at(row, 6, "plan item state")?,
            required: row.get(7)?,
            completeable: row.get(8)?,
            enabled: row.get(9)?,
            children: Vec::new(),
            order: row.get::<_, i64>(10)? as u32,
            created_at: timestamp_at(row, 11)?,
            updated_at: timestamp_at(row, 12)?,
            ended_at: optional_timestamp_at(row, 13)?,
        })
    }

    /// Retrieves a single plan item with its child list.
    pub fn get_plan_item(&self, id: u64) -> Result<Option<PlanItemInstance>> {
        let item = self
            .connection
            .query_row(SELECT_ITEM_BY_ID_SQL, params![id as i64], Self::build_item_from_row)
            .optional()
            .db_context("Failed to query plan item")?;

        let Some(mut item) = item else {
            return Ok(None);
        };

        let mut stmt = self
            .connection
            .prepare(SELECT_CHILD_IDS_SQL)
            .db_context("Failed to prepare query")?;
        item.children = stmt
            .query_map(params![id as i64], |row| row.get::<_, i64>(0).map(|id| id as u64))
            .db_context("Failed to query child plan items")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch child plan items")?;

        Ok(Some(item))
    }

    /// Lists the plan items of one case that pass `filter`, in ID order.
    pub fn list_plan_items(
        &self,
        case_id: u64,
        filter: &PlanItemFilter,
    ) -> Result<Vec<PlanItemInstance>> {
        if !Self::case_exists(&self.connection, case_id)? {
            return Err(CaseError::CaseNotFound { id: case_id });
        }
        let items = Self::load_items(&self.connection, case_id)?;
        Ok(items.into_iter().filter(|item| filter.matches(item)).collect())
    }

    /// Active human tasks, optionally restricted to one case.
    pub fn list_work_items(&self, case_id: Option<u64>) -> Result<Vec<PlanItemInstance>> {
        let mut query = SELECT_WORK_ITEMS_SQL.to_string();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(case_id) = case_id {
            query.push_str(" AND case_id = ?");
            params_vec.push(Box::new(case_id as i64));
        }
        query.push_str(" ORDER BY id");

        let mut stmt = self
            .connection
            .prepare(&query)
            .db_context("Failed to prepare query")?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| &**b).collect();

        let items = stmt
            .query_map(&params_refs[..], Self::build_item_from_row)
            .db_context("Failed to query work items")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch work items")?;

        Ok(items)
    }

    /// Every plan item of a case in ID order, with child lists rebuilt from
    /// the parent links.
    pub(super) fn load_items(conn: &Connection, case_id: u64) -> Result<Vec<PlanItemInstance>> {
        let mut stmt = conn
            .prepare(SELECT_ITEMS_BY_CASE_SQL)
            .db_context("Failed to prepare query")?;
        let mut items = stmt
            .query_map(params![case_id as i64], Self::build_item_from_row)
            .db_context("Failed to query plan items")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch plan items")?;

        let mut children: HashMap<u64, Vec<(u32, u64)>> = HashMap::new();
        for item in &items {
            if let Some(parent_id) = item.parent_id {
                children
                    .entry(parent_id)
                    .or_default()
                    .push((item.order, item.id));
            }
        }
        for item in &mut items {
            if let Some(mut entries) = children.remove(&item.id) {
                entries.sort_unstable();
                item.children = entries.into_iter().map(|(_, id)| id).collect();
            }
        }
        Ok(items)
    }

    /// First plan item ID not used by any case.
    pub(super) fn next_item_id(conn: &Connection) -> Result<u64> {
        conn.query_row(SELECT_NEXT_ITEM_ID_SQL, [], |row| row.get::<_, i64>(0))
            .map(|id| id as u64)
            .db_context("Failed to allocate plan item id")
    }

    /// Inserts new plan items and updates the mutable columns of existing
    /// ones. Parents must precede their children.
    pub(super) fn upsert_items(conn: &Connection, items: &[PlanItemInstance]) -> Result<()> {
        let mut stmt = conn
            .prepare_cached(UPSERT_ITEM_SQL)
            .db_context("Failed to prepare plan item upsert")?;
        for item in items {
            stmt.execute(params![
                item.id as i64,
                item.case_id as i64,
                item.parent_id.map(|id| id as i64),
                &item.definition_id,
                &item.name,
                item.kind.as_str(),
                item.state.as_str(),
                item.required,
                item.completeable,
                item.enabled,
                item.order as i64,
                item.created_at.to_string(),
                item.updated_at.to_string(),
                item.ended_at.map(|at| at.to_string()),
            ])
            .db_context("Failed to write plan item")?;
        }
        Ok(())
    }
}
