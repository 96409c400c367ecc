//! Structured pipeline events, persisted to the run's event log.

use crate::types::RunId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Every event recorded during a pipeline run.
/// Variants are append-only; stored payloads must stay readable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunInitialized {
        run_id: RunId,
        as_of:  NaiveDate,
    },
    OrphanRowsDropped {
        entity: String, // "card" | "transaction"
        count:  usize,
    },
    StageCompleted {
        stage: String,
        rows:  usize,
    },
    CalibrationInverted {
        lower_segment:  String,
        lower_rate:     f64,
        higher_segment: String,
        higher_rate:    f64,
    },
    RunCompleted {
        customers:  usize,
        high_risk:  usize,
    },
}

impl PipelineEvent {
    /// Stable string name, used for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RunInitialized { .. }      => "run_initialized",
            Self::OrphanRowsDropped { .. }   => "orphan_rows_dropped",
            Self::StageCompleted { .. }      => "stage_completed",
            Self::CalibrationInverted { .. } => "calibration_inverted",
            Self::RunCompleted { .. }        => "run_completed",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    pub seq:        u32,
    pub stage:      String,
    pub event_type: String,
    pub payload:    String, // JSON-serialized PipelineEvent
}
