//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Stages stay pure; the pipeline runner hands their outputs to store methods.

use crate::{
    config::NeverTransactedPolicy,
    error::{PipelineError, PipelineResult},
    event::EventLogEntry,
};
use chrono::NaiveDate;
use rusqlite::{params, types::Value, Connection, OptionalExtension};

mod derived;
mod snapshot;

pub struct ChurnStore {
    conn: Connection,
}

impl ChurnStore {
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Safe to call repeatedly.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_raw_snapshot.sql"))?;
        self.conn
            .execute_batch(include_str!("../../migrations/002_derived.sql"))?;
        self.conn
            .execute_batch(include_str!("../../migrations/003_run_log.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id: &str,
        as_of: NaiveDate,
        never_transacted: NeverTransactedPolicy,
    ) -> PipelineResult<()> {
        let policy = match never_transacted {
            NeverTransactedPolicy::Churned  => "churned",
            NeverTransactedPolicy::Excluded => "excluded",
        };
        self.conn.execute(
            "INSERT INTO pipeline_run (run_id, as_of, never_transacted) VALUES (?1, ?2, ?3)",
            params![run_id, date_text(as_of), policy],
        )?;
        Ok(())
    }

    pub fn complete_run(
        &self,
        run_id: &str,
        customers: usize,
        orphan_cards: usize,
        orphan_transactions: usize,
    ) -> PipelineResult<()> {
        self.conn.execute(
            "UPDATE pipeline_run
             SET customers = ?1, orphan_cards = ?2, orphan_transactions = ?3, completed = 1
             WHERE run_id = ?4",
            params![
                customers as i64,
                orphan_cards as i64,
                orphan_transactions as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    pub fn run_completed(&self, run_id: &str) -> PipelineResult<Option<bool>> {
        let completed = self
            .conn
            .query_row(
                "SELECT completed FROM pipeline_run WHERE run_id = ?1",
                params![run_id],
                |row| row.get::<_, i32>(0),
            )
            .optional()?;
        Ok(completed.map(|c| c != 0))
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, seq, stage, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.seq as i64,
                entry.stage,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_run(&self, run_id: &str) -> PipelineResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, seq, stage, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY seq ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    seq:        row.get::<_, i64>(2)? as u32,
                    stage:      row.get(3)?,
                    event_type: row.get(4)?,
                    payload:    row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

// ── Column codecs ──────────────────────────────────────────────────────────

pub(crate) fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(
    entity: &'static str,
    id: &str,
    field: &str,
    text: &str,
) -> PipelineResult<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| {
        PipelineError::invalid(entity, id, format!("{field} '{text}' is not a date: {e}"))
    })
}

/// Numeric column that may be NULL. Text or blobs are input errors.
pub(crate) fn opt_real(
    entity: &'static str,
    id: &str,
    field: &str,
    value: Value,
) -> PipelineResult<Option<f64>> {
    match value {
        Value::Null       => Ok(None),
        Value::Integer(i) => Ok(Some(i as f64)),
        Value::Real(r)    => Ok(Some(r)),
        Value::Text(t)    => Err(PipelineError::invalid(
            entity,
            id,
            format!("{field} '{t}' is not numeric"),
        )),
        Value::Blob(_)    => Err(PipelineError::invalid(entity, id, format!("{field} is a blob"))),
    }
}

pub(crate) fn real(
    entity: &'static str,
    id: &str,
    field: &str,
    value: Value,
) -> PipelineResult<f64> {
    opt_real(entity, id, field, value)?
        .ok_or_else(|| PipelineError::invalid(entity, id, format!("{field} is null")))
}

pub(crate) fn opt_int(
    entity: &'static str,
    id: &str,
    field: &str,
    value: Value,
) -> PipelineResult<Option<i64>> {
    match opt_real(entity, id, field, value)? {
        None => Ok(None),
        Some(v) if v.fract() == 0.0 => Ok(Some(v as i64)),
        Some(v) => Err(PipelineError::invalid(
            entity,
            id,
            format!("{field} {v} is not an integer"),
        )),
    }
}
