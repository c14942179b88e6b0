//! Lifecycle history.

use jiff::Timestamp;
use rusqlite::{params, Connection};

use super::{json_at, timestamp_at};
use crate::{
    error::{CaseError, DatabaseResultExt, Result},
    models::{HistoryEntry, LifecycleEvent},
};

const SELECT_NEXT_SEQ_SQL: &str =
    "SELECT COALESCE(MAX(seq), 0) + 1 FROM case_events WHERE case_id = ?1";
const INSERT_EVENT_SQL: &str =
    "INSERT INTO case_events (case_id, seq, event, recorded_at) VALUES (?1, ?2, ?3, ?4)";
const SELECT_EVENTS_SQL: &str =
    "SELECT seq, case_id, event, recorded_at FROM case_events WHERE case_id = ?1 ORDER BY seq";

impl super::Database {
    fn build_history_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<HistoryEntry> {
        Ok(HistoryEntry {
            seq: row.get::<_, i64>(0)? as u64,
            case_id: row.get::<_, i64>(1)? as u64,
            event: json_at(row, 2)?,
            recorded_at: timestamp_at(row, 3)?,
        })
    }

    /// The full lifecycle history of a case in the order it happened.
    pub fn case_history(&self, case_id: u64) -> Result<Vec<HistoryEntry>> {
        if !Self::case_exists(&self.connection, case_id)? {
            return Err(CaseError::CaseNotFound { id: case_id });
        }

        let mut stmt = self
            .connection
            .prepare(SELECT_EVENTS_SQL)
            .db_context("Failed to prepare query")?;
        let history = stmt
            .query_map(params![case_id as i64], Self::build_history_entry_from_row)
            .db_context("Failed to query case history")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch case history")?;

        Ok(history)
    }

    /// Appends events after the last recorded sequence number of the case.
    pub(super) fn append_events(
        conn: &Connection,
        case_id: u64,
        events: &[LifecycleEvent],
        recorded_at: Timestamp,
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut seq: i64 = conn
            .query_row(SELECT_NEXT_SEQ_SQL, params![case_id as i64], |row| row.get(0))
            .db_context("Failed to compute next event sequence")?;

        let recorded_at = recorded_at.to_string();
        let mut stmt = conn
            .prepare_cached(INSERT_EVENT_SQL)
            .db_context("Failed to prepare event insert")?;
        for event in events {
            let body = serde_json::to_string(event)?;
            stmt.execute(params![case_id as i64, seq, &body, &recorded_at])
                .db_context("Failed to record lifecycle event")?;
            seq += 1;
        }
        Ok(())
    }
}
