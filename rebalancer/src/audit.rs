//! JSONL audit trail logging.
//!
//! Each rebalancer run appends events to an audit.jsonl file,
//! one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use indexbook::RebalanceEvent;
use serde::Serialize;

use crate::error::Result;
use crate::reconcile::ReconcileReport;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

/// Convenience: log a run start event.
pub fn log_run_started(audit: &mut AuditLog, target_file: &str, portfolio: &str) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "target_file": target_file,
            "portfolio": portfolio,
        }),
    )
}

/// Convenience: log a committed engine event under its own name.
pub fn log_engine_event(audit: &mut AuditLog, event: &RebalanceEvent) -> Result<()> {
    let mut data = serde_json::to_value(event).map_err(std::io::Error::other)?;
    if let serde_json::Value::Object(fields) = &mut data {
        fields.remove("event");
    }
    audit.log(event.name(), data)
}

/// Convenience: log an operation the engine refused.
pub fn log_refused(audit: &mut AuditLog, operation: &str, symbol: &str, err: &indexbook::Error) -> Result<()> {
    audit.log(
        "operation_refused",
        serde_json::json!({
            "operation": operation,
            "symbol": symbol,
            "kind": format!("{:?}", err.kind()),
            "reason": err.to_string(),
        }),
    )
}

/// Convenience: log the final reconciliation.
pub fn log_reconciliation(audit: &mut AuditLog, report: &ReconcileReport) -> Result<()> {
    let data = serde_json::to_value(report).map_err(std::io::Error::other)?;
    audit.log("reconciled", data)
}

/// Convenience: log run completion.
pub fn log_run_completed(audit: &mut AuditLog, rounds: usize, trades: usize, refused: usize) -> Result<()> {
    audit.log(
        "run_completed",
        serde_json::json!({
            "rounds": rounds,
            "trades": trades,
            "refused": refused,
        }),
    )
}
