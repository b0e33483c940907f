use crate::audit::{AuditAction, AuditLog, Outcome};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_ROLE: &str = "user";

/// Stored account, including the password hash
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub hashed_password: String,
    pub role: String,
    pub created_at: String,
}

/// Account details safe to hand out after login
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// SQLite user database with bcrypt password hashes
pub struct UserStore {
    conn: Mutex<Connection>,
    cost: u32,
    audit: Option<Arc<AuditLog>>,
}

impl UserStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open user database {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                hashed_password TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            cost: bcrypt::DEFAULT_COST,
            audit: None,
        })
    }

    /// bcrypt work factor for new hashes
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("user database lock poisoned"))
    }

    fn audit(&self, action: AuditAction, outcome: Outcome, user_id: Option<i64>, username: &str, details: serde_json::Value) {
        if let Some(audit) = &self.audit {
            audit.log_event(action, outcome, user_id, Some(username), details);
        }
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.cost).context("Failed to hash password")
    }

    /// Create an account. Returns `false` when the username is taken.
    pub fn add_user(&self, username: &str, password: &str, role: &str) -> Result<bool> {
        let hashed = self.hash_password(password)?;
        let inserted = self.conn()?.execute(
            "INSERT INTO users (username, hashed_password, role) VALUES (?1, ?2, ?3)",
            params![username, hashed, role],
        );

        match inserted {
            Ok(_) => {
                log::info!("User '{}' added with role '{}'", username, role);
                self.audit(
                    AuditAction::UserCreated,
                    Outcome::Success,
                    None,
                    username,
                    json!({"role": role, "message": "User account created."}),
                );
                Ok(true)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                log::warn!("Failed to add user '{}': username already exists", username);
                self.audit(
                    AuditAction::UserCreateFailed,
                    Outcome::Failure,
                    None,
                    username,
                    json!({"role": role, "reason": "Username already exists."}),
                );
                Ok(false)
            }
            Err(e) => {
                self.audit(
                    AuditAction::UserCreateFailed,
                    Outcome::Failure,
                    None,
                    username,
                    json!({"role": role, "reason": format!("Database error: {}", e)}),
                );
                Err(e).with_context(|| format!("Failed to add user '{}'", username))
            }
        }
    }

    fn read_user(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            hashed_password: row.get(2)?,
            role: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn()?
            .query_row(
                "SELECT id, username, hashed_password, role, created_at FROM users WHERE username = ?1",
                [username],
                Self::read_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn()?
            .query_row(
                "SELECT id, username, hashed_password, role, created_at FROM users WHERE id = ?1",
                [id],
                Self::read_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Run an update touching one user; `true` when a row changed.
    fn update(
        &self,
        username: &str,
        sql: &str,
        value: &str,
        actions: (AuditAction, AuditAction),
        details: serde_json::Value,
        missing_reason: &str,
    ) -> Result<bool> {
        let changed = self.conn()?.execute(sql, params![value, username]);
        let (success, failure) = actions;

        match changed {
            Ok(n) if n > 0 => {
                self.audit(success, Outcome::Success, None, username, details);
                Ok(true)
            }
            Ok(_) => {
                log::warn!("No change for user '{}': {}", username, missing_reason);
                let mut details = details;
                details["reason"] = json!(missing_reason);
                self.audit(failure, Outcome::Failure, None, username, details);
                Ok(false)
            }
            Err(e) => {
                let mut details = details;
                details["reason"] = json!(format!("Database error: {}", e));
                self.audit(failure, Outcome::Failure, None, username, details);
                Err(e).with_context(|| format!("Failed to update user '{}'", username))
            }
        }
    }

    pub fn update_user_role(&self, username: &str, role: &str) -> Result<bool> {
        let updated = self.update(
            username,
            "UPDATE users SET role = ?1 WHERE username = ?2",
            role,
            (AuditAction::UserRoleUpdated, AuditAction::UserRoleUpdateFailed),
            json!({"new_role": role}),
            "User not found or role unchanged.",
        )?;
        if updated {
            log::info!("Role for user '{}' updated to '{}'", username, role);
        }
        Ok(updated)
    }

    pub fn update_user_password(&self, username: &str, password: &str) -> Result<bool> {
        let hashed = self.hash_password(password)?;
        let updated = self.update(
            username,
            "UPDATE users SET hashed_password = ?1 WHERE username = ?2",
            &hashed,
            (AuditAction::UserPasswordUpdated, AuditAction::UserPasswordUpdateFailed),
            json!({}),
            "User not found during password update.",
        )?;
        if updated {
            log::info!("Password for user '{}' updated", username);
        }
        Ok(updated)
    }

    pub fn delete_user(&self, username: &str) -> Result<bool> {
        let deleted = self.conn()?.execute("DELETE FROM users WHERE username = ?1", [username]);

        match deleted {
            Ok(n) if n > 0 => {
                log::info!("User '{}' deleted", username);
                self.audit(
                    AuditAction::UserDeleted,
                    Outcome::Success,
                    None,
                    username,
                    json!({"message": "User account deleted."}),
                );
                Ok(true)
            }
            Ok(_) => {
                log::warn!("Failed to delete user '{}': not found", username);
                self.audit(
                    AuditAction::UserDeleteFailed,
                    Outcome::Failure,
                    None,
                    username,
                    json!({"reason": "User not found during delete operation."}),
                );
                Ok(false)
            }
            Err(e) => {
                self.audit(
                    AuditAction::UserDeleteFailed,
                    Outcome::Failure,
                    None,
                    username,
                    json!({"reason": format!("Database error: {}", e)}),
                );
                Err(e).with_context(|| format!("Failed to delete user '{}'", username))
            }
        }
    }

    /// All accounts, without password hashes.
    pub fn list_users(&self) -> Result<Vec<UserInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, username, role, created_at FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], |row| {
                Ok(UserInfo {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    role: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn has_role(&self, role: &str) -> Result<bool> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM users WHERE role = ?1", [role], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Check credentials. `None` for an unknown user or a wrong password.
    pub fn login_user(&self, username: &str, password: &str) -> Result<Option<UserInfo>> {
        let user = self.get_user_by_username(username)?;

        if let Some(user) = &user {
            if bcrypt::verify(password, &user.hashed_password).unwrap_or(false) {
                self.audit(
                    AuditAction::UserLoginSuccess,
                    Outcome::Success,
                    Some(user.id),
                    &user.username,
                    json!({"message": "User logged in successfully."}),
                );
                return Ok(Some(user.clone().into()));
            }
        }

        let reason = if user.is_some() {
            "Incorrect password."
        } else {
            "User not found."
        };
        self.audit(
            AuditAction::UserLoginFailure,
            Outcome::Failure,
            None,
            username,
            json!({"reason": reason}),
        );
        log::warn!("Login failed for user '{}'. {}", username, reason);
        Ok(None)
    }
}
