// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail — append-only SQLite log of every completed verification.
//
// Schema:
//   verification_attempts(
//     id              INTEGER PRIMARY KEY AUTOINCREMENT,
//     verification_id TEXT    NOT NULL,   -- run UUID
//     created_at      TEXT    NOT NULL,   -- RFC 3339
//     document_hash   TEXT    NOT NULL,   -- SHA-256 hex digest
//     document_name   TEXT,
//     status          TEXT    NOT NULL,   -- verified | flag | manual_verification | error
//     flags           TEXT    NOT NULL,   -- JSON array of flag codes
//     outcome         TEXT    NOT NULL    -- full outcome as JSON
//   )

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use valid8_core::error::{Result, Valid8Error};
use valid8_core::flags::FlagCode;
use valid8_core::oracle::OutcomeSink;
use valid8_core::outcome::{VerificationOutcome, VerificationStatus};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS verification_attempts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    verification_id TEXT    NOT NULL,
    created_at      TEXT    NOT NULL,
    document_hash   TEXT    NOT NULL,
    document_name   TEXT,
    status          TEXT    NOT NULL,
    flags           TEXT    NOT NULL,
    outcome         TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attempts_hash ON verification_attempts (document_hash);";

const SELECT_COLUMNS: &str =
    "SELECT id, verification_id, created_at, document_hash, document_name, status, flags
     FROM verification_attempts";

fn db_err(e: rusqlite::Error) -> Valid8Error {
    Valid8Error::Database(e.to_string())
}

/// One stored verification attempt. The full outcome JSON is fetched
/// separately with [`AuditLog::outcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub verification_id: String,
    pub created_at: String,
    pub document_hash: String,
    pub document_name: Option<String>,
    pub status: VerificationStatus,
    pub flags: Vec<FlagCode>,
}

impl AuditEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<(Self, String, String)> {
        Ok((
            Self {
                id: row.get(0)?,
                verification_id: row.get(1)?,
                created_at: row.get(2)?,
                document_hash: row.get(3)?,
                document_name: row.get(4)?,
                status: VerificationStatus::Verified,
                flags: Vec::new(),
            },
            row.get(5)?,
            row.get(6)?,
        ))
    }
}

/// Append-only audit log backed by SQLite.
///
/// The connection sits behind a mutex so one log can be shared by
/// concurrent verification runs as an [`OutcomeSink`].
pub struct AuditLog {
    conn: Mutex<Connection>,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`, in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!("audit log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        debug!("in-memory audit log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Valid8Error::Database("audit connection poisoned".into()))
    }

    /// Store a completed outcome.
    #[instrument(skip_all, fields(id = %outcome.id.0, status = %outcome.status, document_hash = %outcome.document_hash))]
    pub fn record(&self, outcome: &VerificationOutcome) -> Result<()> {
        let flags = serde_json::to_string(&outcome.flags)?;
        let body = serde_json::to_string(outcome)?;

        self.lock()?
            .execute(
                "INSERT INTO verification_attempts
                    (verification_id, created_at, document_hash, document_name, status, flags, outcome)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    outcome.id.0.to_string(),
                    Utc::now().to_rfc3339(),
                    outcome.document_hash,
                    outcome.document_name,
                    outcome.status.as_str(),
                    flags,
                    body,
                ],
            )
            .map_err(db_err)?;

        debug!("verification attempt recorded");
        Ok(())
    }

    /// Every attempt on the same document bytes, oldest first.
    pub fn entries_for_hash(&self, document_hash: &str) -> Result<Vec<AuditEntry>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE document_hash = ?1 ORDER BY id ASC"),
            params![document_hash],
        )
    }

    /// The `limit` most recent attempts, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        self.query(
            &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"),
            params![limit],
        )
    }

    /// The stored outcome of a run, if it was recorded.
    pub fn outcome(&self, verification_id: &str) -> Result<Option<VerificationOutcome>> {
        let body: Option<String> = self
            .lock()?
            .query_row(
                "SELECT outcome FROM verification_attempts WHERE verification_id = ?1",
                params![verification_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        body.map(|body| serde_json::from_str(&body).map_err(Valid8Error::from))
            .transpose()
    }

    pub fn count(&self) -> Result<u64> {
        self.lock()?
            .query_row("SELECT COUNT(*) FROM verification_attempts", [], |row| row.get(0))
            .map_err(db_err)
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<AuditEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt.query_map(params, AuditEntry::from_row).map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let (mut entry, status, flags) = row.map_err(db_err)?;
            entry.status = serde_json::from_value(serde_json::Value::String(status))?;
            entry.flags = serde_json::from_str(&flags)?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl OutcomeSink for AuditLog {
    fn append(&self, outcome: &VerificationOutcome) -> Result<()> {
        self.record(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valid8_core::types::{ClaimsRecord, VerificationId};

    fn outcome(hash: &str, status: VerificationStatus, flags: Vec<FlagCode>) -> VerificationOutcome {
        VerificationOutcome {
            id: VerificationId::new(),
            status,
            document_hash: hash.to_owned(),
            document_name: Some("degree.pdf".into()),
            steps: Vec::new(),
            flags,
            certificate_data: ClaimsRecord::default(),
            matched_record: None,
            authenticity: None,
            contact_info: None,
            error: None,
            started_at: Utc::now(),
            elapsed_ms: 12,
        }
    }

    #[test]
    fn record_and_count() {
        let log = AuditLog::open_in_memory().unwrap();
        assert_eq!(log.count().unwrap(), 0);
        log.record(&outcome("aaa", VerificationStatus::Verified, vec![])).unwrap();
        log.append(&outcome("aaa", VerificationStatus::Flag, vec![FlagCode::TemplateMismatch]))
            .unwrap();
        assert_eq!(log.count().unwrap(), 2);
    }

    #[test]
    fn entries_for_hash_keep_status_and_flags() {
        let log = AuditLog::open_in_memory().unwrap();
        log.record(&outcome("aaa", VerificationStatus::ManualVerification, vec![])).unwrap();
        log.record(&outcome("bbb", VerificationStatus::Verified, vec![])).unwrap();
        log.record(&outcome(
            "aaa",
            VerificationStatus::Flag,
            vec![FlagCode::TemplateMismatch, FlagCode::SignatureInvalid],
        ))
        .unwrap();

        let entries = log.entries_for_hash("aaa").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, VerificationStatus::ManualVerification);
        assert_eq!(entries[1].status, VerificationStatus::Flag);
        assert_eq!(
            entries[1].flags,
            vec![FlagCode::TemplateMismatch, FlagCode::SignatureInvalid]
        );
        assert_eq!(entries[1].document_name.as_deref(), Some("degree.pdf"));
    }

    #[test]
    fn recent_entries_are_newest_first() {
        let log = AuditLog::open_in_memory().unwrap();
        for i in 0..5 {
            log.record(&outcome(&format!("hash_{i}"), VerificationStatus::Verified, vec![]))
                .unwrap();
        }
        let recent = log.recent_entries(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].document_hash, "hash_4");
        assert!(recent[0].id > recent[1].id && recent[1].id > recent[2].id);
    }

    #[test]
    fn full_outcome_is_retrievable() {
        let log = AuditLog::open_in_memory().unwrap();
        let stored = outcome("ccc", VerificationStatus::Error, vec![FlagCode::ProcessingError]);
        log.record(&stored).unwrap();

        let loaded = log.outcome(&stored.id.0.to_string()).unwrap().unwrap();
        assert_eq!(loaded.id, stored.id);
        assert_eq!(loaded.status, VerificationStatus::Error);
        assert!(loaded.has_flag(FlagCode::ProcessingError));
        assert!(log.outcome("missing").unwrap().is_none());
    }

    #[test]
    fn on_disk_log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        AuditLog::open(&path)
            .unwrap()
            .record(&outcome("ddd", VerificationStatus::Verified, vec![]))
            .unwrap();
        assert_eq!(AuditLog::open(&path).unwrap().entries_for_hash("ddd").unwrap().len(), 1);
    }
}
