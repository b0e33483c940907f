use super::report::{Report, StepError, StepStats, StepStatus};
use crate::audit::{AuditAction, Outcome};
use crate::core::{CleaningModule, DataFrame, ModuleContext};
use anyhow::Result;
use serde_json::{json, Value};
use std::time::Instant;

/// One configured step of a pipeline
pub struct ModuleConfig {
    pub name: String,
    pub module: Box<dyn CleaningModule>,
    pub params: Value,
    pub enabled: bool,
}

impl ModuleConfig {
    pub fn new(name: impl Into<String>, module: Box<dyn CleaningModule>, params: Value) -> Self {
        Self {
            name: name.into(),
            module,
            params,
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl std::fmt::Debug for ModuleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleConfig")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Runs cleaning steps in order over a frame
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    pub stop_on_error: bool,
}

impl Orchestrator {
    pub fn new(stop_on_error: bool) -> Self {
        Self { stop_on_error }
    }

    /// Run each enabled step in turn.
    ///
    /// A failing step leaves the frame as it was before that step and is
    /// recorded in the report; the run continues unless `stop_on_error`.
    pub async fn run_pipeline(
        &self,
        df: &DataFrame,
        steps: &mut [ModuleConfig],
        ctx: &ModuleContext,
    ) -> (DataFrame, Report) {
        let mut current = df.clone();
        let mut report = Report::default();

        let step_names: Vec<&str> = steps
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.name.as_str())
            .collect();
        if step_names.is_empty() {
            return (current, report);
        }

        self.audit(
            ctx,
            AuditAction::PipelineExecutionStart,
            Outcome::Info,
            json!({"steps": step_names, "rows_before": df.height()}),
        );

        // discard anything left over from an earlier run
        ctx.take_warnings();

        for step in steps.iter_mut().filter(|s| s.enabled) {
            log::info!("Executing {}", step.name);
            let rows_before = current.height();
            let started = Instant::now();

            match run_step(step, &current, ctx).await {
                Ok(next) => {
                    let rows_after = next.height();
                    current = next;
                    report.steps_completed.push(step.name.clone());
                    report.stats.insert(
                        step.name.clone(),
                        StepStats {
                            status: StepStatus::Success,
                            rows_before,
                            rows_after,
                            duration_ms: started.elapsed().as_millis(),
                            warnings: ctx.take_warnings(),
                        },
                    );
                }
                Err(e) => {
                    log::error!("Error in {}: {:#}", step.name, e);
                    report.errors.push(StepError::new(step.name.clone(), &e));
                    report.stats.insert(
                        step.name.clone(),
                        StepStats {
                            status: StepStatus::Failed,
                            rows_before,
                            rows_after: rows_before,
                            duration_ms: started.elapsed().as_millis(),
                            warnings: ctx.take_warnings(),
                        },
                    );
                    if self.stop_on_error {
                        break;
                    }
                }
            }
        }

        let outcome = if report.is_success() {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        self.audit(
            ctx,
            AuditAction::PipelineExecutionEnd,
            outcome,
            json!({
                "steps_completed": report.steps_completed,
                "errors": report.errors.len(),
                "rows_after": current.height(),
            }),
        );

        (current, report)
    }

    fn audit(&self, ctx: &ModuleContext, action: AuditAction, outcome: Outcome, details: Value) {
        if let Some(audit) = &ctx.audit {
            audit.log_event(action, outcome, ctx.user_id(), Some(ctx.username()), details);
        }
    }
}

async fn run_step(step: &mut ModuleConfig, df: &DataFrame, ctx: &ModuleContext) -> Result<DataFrame> {
    step.module.on_create(step.params.clone()).await?;
    step.module.process(df, ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, Value as Cell};
    use async_trait::async_trait;

    struct DropFirstRow;

    #[async_trait]
    impl CleaningModule for DropFirstRow {
        async fn on_create(&mut self, _params: Value) -> Result<()> {
            Ok(())
        }

        async fn process(&self, input: &DataFrame, _ctx: &ModuleContext) -> Result<DataFrame> {
            let mask: Vec<bool> = (0..input.height()).map(|i| i > 0).collect();
            input.filter_rows(&mask)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl CleaningModule for AlwaysFails {
        async fn on_create(&mut self, _params: Value) -> Result<()> {
            Ok(())
        }

        async fn process(&self, _input: &DataFrame, _ctx: &ModuleContext) -> Result<DataFrame> {
            anyhow::bail!("boom")
        }
    }

    fn frame() -> DataFrame {
        DataFrame::from_columns(vec![Column::new("a", vec![Cell::Int(1), Cell::Int(2), Cell::Int(3)])])
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_step_keeps_previous_frame() {
        let mut steps = vec![
            ModuleConfig::new("drop", Box::new(DropFirstRow), Value::Null),
            ModuleConfig::new("fail", Box::new(AlwaysFails), Value::Null),
            ModuleConfig::new("drop_again", Box::new(DropFirstRow), Value::Null),
        ];

        let (df, report) = Orchestrator::new(false)
            .run_pipeline(&frame(), &mut steps, &ModuleContext::new())
            .await;

        assert_eq!(df.height(), 1);
        assert_eq!(report.steps_completed, vec!["drop", "drop_again"]);
        assert_eq!(report.errors[0].module, "fail");
        assert_eq!(report.errors[0].error, "boom");
        assert_eq!(report.stats["fail"].status, StepStatus::Failed);
        assert_eq!(report.stats["drop"].rows_after, 2);
    }

    #[tokio::test]
    async fn test_stop_on_error() {
        let mut steps = vec![
            ModuleConfig::new("fail", Box::new(AlwaysFails), Value::Null),
            ModuleConfig::new("drop", Box::new(DropFirstRow), Value::Null),
        ];

        let (df, report) = Orchestrator::new(true)
            .run_pipeline(&frame(), &mut steps, &ModuleContext::new())
            .await;

        assert_eq!(df.height(), 3);
        assert!(report.steps_completed.is_empty());
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_steps_leave_no_trace() {
        let mut steps = vec![ModuleConfig::new("drop", Box::new(DropFirstRow), Value::Null).enabled(false)];

        let (df, report) = Orchestrator::default()
            .run_pipeline(&frame(), &mut steps, &ModuleContext::new())
            .await;

        assert_eq!(df, frame());
        assert_eq!(report, Report::default());
    }
}
