use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepStats {
    pub status: StepStatus,
    pub rows_before: usize,
    pub rows_after: usize,
    pub duration_ms: u128,
    /// Warnings the module raised while running
    pub warnings: Vec<String>,
}

/// A step that failed, with its error chain outermost first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepError {
    pub module: String,
    pub error: String,
    pub chain: Vec<String>,
}

impl StepError {
    pub fn new(module: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            module: module.into(),
            error: err.to_string(),
            chain: err.chain().skip(1).map(|cause| cause.to_string()).collect(),
        }
    }
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub steps_completed: Vec<String>,
    pub errors: Vec<StepError>,
    /// Per-step statistics keyed by step name
    pub stats: BTreeMap<String, StepStats>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stats
            .iter()
            .flat_map(|(step, s)| s.warnings.iter().map(move |w| (step.as_str(), w.as_str())))
    }
}
