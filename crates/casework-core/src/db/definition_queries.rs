//! Case definition deployment and lookup.

use jiff::Timestamp;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};

use super::{json_at, timestamp_at};
use crate::{
    error::{DatabaseResultExt, Result},
    models::{CaseDefinition, DeployedDefinition},
};

const SELECT_NEXT_VERSION_SQL: &str =
    "SELECT COALESCE(MAX(version), 0) + 1 FROM case_definitions WHERE key = ?1";
const INSERT_DEFINITION_SQL: &str = "INSERT INTO case_definitions (key, version, name, body, deployed_at) VALUES (?1, ?2, ?3, ?4, ?5)";
const SELECT_LATEST_DEFINITION_SQL: &str = "SELECT version, body, deployed_at FROM case_definitions WHERE key = ?1 ORDER BY version DESC LIMIT 1";
const SELECT_DEFINITION_VERSION_SQL: &str =
    "SELECT version, body, deployed_at FROM case_definitions WHERE key = ?1 AND version = ?2";
const SELECT_LATEST_DEFINITIONS_SQL: &str = "SELECT d.version, d.body, d.deployed_at FROM case_definitions d WHERE d.version = (SELECT MAX(version) FROM case_definitions WHERE key = d.key) ORDER BY d.key";

impl super::Database {
    fn build_definition_from_row(row: &rusqlite::Row) -> rusqlite::Result<DeployedDefinition> {
        Ok(DeployedDefinition {
            version: row.get::<_, i64>(0)? as u32,
            definition: json_at(row, 1)?,
            deployed_at: timestamp_at(row, 2)?,
        })
    }

    /// Validates and stores a definition under the next version of its key.
    pub fn deploy_definition(&mut self, definition: &CaseDefinition) -> Result<DeployedDefinition> {
        definition.validate()?;
        let body = serde_json::to_string(definition)?;

        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let version: i64 = tx
            .query_row(SELECT_NEXT_VERSION_SQL, params![&definition.key], |row| row.get(0))
            .db_context("Failed to compute next definition version")?;

        let now = Timestamp::now();
        tx.execute(
            INSERT_DEFINITION_SQL,
            params![
                &definition.key,
                version,
                definition.name.as_deref(),
                &body,
                now.to_string()
            ],
        )
        .db_context("Failed to insert case definition")?;

        tx.commit().db_context("Failed to commit transaction")?;

        info!("Deployed case definition '{}' v{}", definition.key, version);
        Ok(DeployedDefinition {
            version: version as u32,
            deployed_at: now,
            definition: definition.clone(),
        })
    }

    /// Retrieves a definition by key, either a specific version or the
    /// latest one.
    pub fn get_definition(&self, key: &str, version: Option<u32>) -> Result<Option<DeployedDefinition>> {
        Self::load_definition(&self.connection, key, version)
    }

    /// Latest version of every deployed key, ordered by key.
    pub fn list_definitions(&self) -> Result<Vec<DeployedDefinition>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_LATEST_DEFINITIONS_SQL)
            .db_context("Failed to prepare query")?;

        let definitions = stmt
            .query_map([], Self::build_definition_from_row)
            .db_context("Failed to query case definitions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch case definitions")?;

        Ok(definitions)
    }

    pub(super) fn load_definition(
        conn: &Connection,
        key: &str,
        version: Option<u32>,
    ) -> Result<Option<DeployedDefinition>> {
        match version {
            Some(version) => conn
                .query_row(
                    SELECT_DEFINITION_VERSION_SQL,
                    params![key, version as i64],
                    Self::build_definition_from_row,
                )
                .optional(),
            None => conn
                .query_row(
                    SELECT_LATEST_DEFINITION_SQL,
                    params![key],
                    Self::build_definition_from_row,
                )
                .optional(),
        }
        .db_context("Failed to query case definition")
    }
}
