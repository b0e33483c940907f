use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

/// Kind of event recorded in the audit trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditAction {
    UserLoginSuccess,
    UserLoginFailure,
    UserLogout,
    UserCreated,
    UserRoleUpdated,
    UserPasswordUpdated,
    UserDeleted,
    UserCreateFailed,
    UserRoleUpdateFailed,
    UserPasswordUpdateFailed,
    UserDeleteFailed,
    PipelineExecutionStart,
    PipelineExecutionEnd,
    DataImported,
    DataExported,
    PluginLlmNormalizerUsed,
    Custom(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::UserLoginSuccess => "USER_LOGIN_SUCCESS",
            AuditAction::UserLoginFailure => "USER_LOGIN_FAILURE",
            AuditAction::UserLogout => "USER_LOGOUT",
            AuditAction::UserCreated => "USER_CREATED_BY_ADMIN",
            AuditAction::UserRoleUpdated => "USER_ROLE_UPDATED_BY_ADMIN",
            AuditAction::UserPasswordUpdated => "USER_PASSWORD_UPDATED_BY_ADMIN",
            AuditAction::UserDeleted => "USER_DELETED_BY_ADMIN",
            AuditAction::UserCreateFailed => "USER_CREATE_FAILED",
            AuditAction::UserRoleUpdateFailed => "USER_ROLE_UPDATE_FAILED",
            AuditAction::UserPasswordUpdateFailed => "USER_PASSWORD_UPDATE_FAILED",
            AuditAction::UserDeleteFailed => "USER_DELETE_FAILED",
            AuditAction::PipelineExecutionStart => "PIPELINE_EXECUTION_START",
            AuditAction::PipelineExecutionEnd => "PIPELINE_EXECUTION_END",
            AuditAction::DataImported => "DATA_IMPORTED",
            AuditAction::DataExported => "DATA_EXPORTED",
            AuditAction::PluginLlmNormalizerUsed => "PLUGIN_LLM_NORMALIZER_USED",
            AuditAction::Custom(name) => name,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Info,
    CriticalError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failure => "FAILURE",
            Outcome::Info => "INFO",
            Outcome::CriticalError => "CRITICAL_ERROR",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored audit row
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action_type: String,
    pub details: Option<serde_json::Value>,
    pub outcome: String,
}

/// SQLite-backed audit trail.
///
/// Writes never fail the caller; storage errors are logged together with
/// the event that could not be recorded.
pub struct AuditLog {
    conn: Mutex<Connection>,
}

impl AuditLog {
    /// Open (creating if needed) the audit database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open audit database {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                user_id INTEGER,
                username TEXT,
                action_type TEXT NOT NULL,
                details TEXT,
                outcome TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record an event. `details` of `null` is stored as SQL NULL.
    pub fn log_event(
        &self,
        action: AuditAction,
        outcome: Outcome,
        user_id: Option<i64>,
        username: Option<&str>,
        details: serde_json::Value,
    ) {
        let details_text = (!details.is_null()).then(|| details.to_string());

        let result = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("audit connection lock poisoned"))
            .and_then(|conn| {
                conn.execute(
                    "INSERT INTO audit_entries (user_id, username, action_type, details, outcome)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![user_id, username, action.as_str(), details_text, outcome.as_str()],
                )
                .map_err(Into::into)
            });

        match result {
            Ok(_) => log::debug!("Audit: {} {} user={:?}", action, outcome, username),
            Err(e) => log::error!(
                "Failed to record audit event {} ({}) user={:?} details={}: {:#}",
                action,
                outcome,
                username,
                details,
                e
            ),
        }
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("audit connection lock poisoned"))?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, user_id, username, action_type, details, outcome
             FROM audit_entries ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = stmt.query([limit])?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let details: Option<String> = row.get(5)?;
            entries.push(AuditEntry {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                user_id: row.get(2)?,
                username: row.get(3)?,
                action_type: row.get(4)?,
                details: details.and_then(|d| serde_json::from_str(&d).ok()),
                outcome: row.get(6)?,
            });
        }
        Ok(entries)
    }
}
