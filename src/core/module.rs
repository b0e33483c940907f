use super::generation::TextGenerator;
use super::DataFrame;
use crate::audit::AuditLog;
use crate::auth::UserInfo;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Base trait for all cleaning modules and plugins in the pipeline
#[async_trait]
pub trait CleaningModule: Send + Sync {
    /// Called before each run with the step's named parameters
    async fn on_create(&mut self, params: Value) -> Result<()>;

    /// Produce a cleaned copy of `input`. The input is never modified.
    async fn process(&self, input: &DataFrame, ctx: &ModuleContext) -> Result<DataFrame>;
}

/// Ambient services available to a module while it runs
#[derive(Default)]
pub struct ModuleContext {
    pub user: Option<UserInfo>,
    pub audit: Option<Arc<AuditLog>>,
    pub generator: Option<Arc<dyn TextGenerator>>,
    warnings: Mutex<Vec<String>>,
}

impl ModuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: UserInfo) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Log a warning and keep it for the step report.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
    }

    /// Drain warnings recorded since the last call.
    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(
            &mut *self
                .warnings
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Username for logs, "System" when nobody is logged in.
    pub fn username(&self) -> &str {
        self.user
            .as_ref()
            .map(|u| u.username.as_str())
            .unwrap_or("System")
    }
}
