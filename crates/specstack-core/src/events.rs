use crate::context::Host;
use crate::contract::EnvelopeKind;
use crate::error::Result;
use crate::io;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AuditRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    ContractValidation,
    ContractViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub exit_code: i32,
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EnvelopeKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
    pub host: Host,
}

impl AuditRecord {
    pub fn passed(exit_code: i32, kind: EnvelopeKind, host: Host) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: EventType::ContractValidation,
            timestamp: Utc::now(),
            exit_code,
            pass: true,
            kind: Some(kind),
            violations: Vec::new(),
            host,
        }
    }

    pub fn violated(exit_code: i32, violations: Vec<String>, host: Host) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: EventType::ContractViolation,
            timestamp: Utc::now(),
            exit_code,
            pass: false,
            kind: EnvelopeKind::from_exit_code(exit_code),
            violations,
            host,
        }
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// Append-only JSON-lines audit log. Each append is one write of one line;
/// the log is never read back and rewritten.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        io::append_line(&self.path, &line)
    }

    /// Parse every record. Lines that fail to parse are skipped.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        let Some(data) = io::read_optional(&self.path)? else {
            return Ok(Vec::new());
        };
        Ok(data
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }
}
