pub mod isolation_forest;
pub mod lof;

use super::{columns, parse_params, require_columns};
use crate::core::{stats, CleaningModule, Column, DataFrame, ModuleContext, Value};
use crate::error::CleanError;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sheetpilot_macros::CleaningModule;

pub const MODULE_ID: &str = "outlier_detector";

/// Name of the column added by [`OutlierAction::Flag`]
pub const FLAG_COLUMN: &str = "is_outlier";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    #[default]
    Iqr,
    Zscore,
    Isolation,
    Lof,
}

impl OutlierMethod {
    fn default_threshold(self) -> f64 {
        match self {
            OutlierMethod::Zscore => 3.0,
            _ => 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierAction {
    #[default]
    Remove,
    Flag,
}

/// Detects outlying rows over numeric columns and drops or flags them
#[derive(CleaningModule, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[module_meta(
    id = "outlier_detector",
    name = "Outlier Detector",
    category = "Cleaning",
    description = "Find outliers with IQR, z-score, isolation forest or local outlier factor"
)]
#[serde(default, deny_unknown_fields)]
pub struct OutlierDetector {
    #[param(kind = "list", required, description = "Numeric columns to check")]
    #[serde(deserialize_with = "columns::list")]
    pub columns: Vec<String>,

    #[param(default = "\"iqr\"", kind = "string", description = "iqr, zscore, isolation or lof")]
    pub method: OutlierMethod,

    #[param(description = "IQR multiplier (1.5) or z-score cut-off (3)")]
    pub threshold: Option<f64>,

    #[param(default = "\"remove\"", kind = "string", description = "remove or flag")]
    pub action: OutlierAction,

    #[param(default = "0.1", min = 0.0, max = 0.5)]
    pub contamination: f64,

    #[param(default = "20", min = 1.0)]
    pub n_neighbors: usize,

    #[param(default = "100", min = 1.0)]
    pub n_estimators: usize,

    #[param(default = "42")]
    pub random_state: u64,
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            method: OutlierMethod::Iqr,
            threshold: None,
            action: OutlierAction::Remove,
            contamination: 0.1,
            n_neighbors: 20,
            n_estimators: 100,
            random_state: 42,
        }
    }
}

impl OutlierDetector {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, method: OutlierMethod) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            method,
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: OutlierAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn apply(&self, df: &DataFrame, ctx: &ModuleContext) -> Result<DataFrame> {
        require_columns(df, &self.columns)?;

        let mut valid: Vec<&Column> = Vec::new();
        for name in &self.columns {
            let Some(column) = df.column(name) else {
                continue;
            };
            if !column.is_numeric() {
                return Err(CleanError::NotNumeric(name.clone()).into());
            }
            if stats::std_dev(&column.numbers()) == Some(0.0) {
                ctx.warn(format!("Column '{}' has zero variance, skipping", name));
            } else {
                valid.push(column);
            }
        }

        if valid.is_empty() {
            return Ok(df.clone());
        }

        let threshold = self.threshold.unwrap_or_else(|| self.method.default_threshold());
        let mask = match self.method {
            OutlierMethod::Iqr => column_mask(df.height(), &valid, |c| iqr_flags(c, threshold)),
            OutlierMethod::Zscore => column_mask(df.height(), &valid, |c| zscore_flags(c, threshold)),
            OutlierMethod::Isolation => {
                let data = complete_rows(df.height(), &valid)?;
                isolation_forest::fit_predict(
                    &data,
                    self.n_estimators,
                    self.contamination,
                    self.random_state,
                )
            }
            OutlierMethod::Lof => {
                let data = complete_rows(df.height(), &valid)?;
                lof::fit_predict(&data, self.n_neighbors, self.contamination)
            }
        };

        let outliers = mask.iter().filter(|m| **m).count();
        log::info!(
            "{} flagged {} of {} rows as outliers ({:?})",
            MODULE_ID,
            outliers,
            df.height(),
            self.method
        );

        match self.action {
            OutlierAction::Remove => {
                let keep: Vec<bool> = mask.iter().map(|m| !m).collect();
                df.filter_rows(&keep)
            }
            OutlierAction::Flag => {
                let mut result = df.clone();
                let flags = mask.into_iter().map(Value::Bool).collect();
                result.push_column(Column::new(FLAG_COLUMN, flags))?;
                Ok(result)
            }
        }
    }
}

#[async_trait]
impl CleaningModule for OutlierDetector {
    async fn on_create(&mut self, params: serde_json::Value) -> Result<()> {
        let parsed: Self = parse_params(MODULE_ID, params)?;
        if parsed.columns.is_empty() {
            return Err(CleanError::invalid_params(MODULE_ID, "'columns' must be provided").into());
        }
        if !(parsed.contamination > 0.0 && parsed.contamination <= 0.5) {
            return Err(CleanError::invalid_params(
                MODULE_ID,
                format!("contamination must be in (0, 0.5], got {}", parsed.contamination),
            )
            .into());
        }
        *self = parsed;
        Ok(())
    }

    async fn process(&self, input: &DataFrame, ctx: &ModuleContext) -> Result<DataFrame> {
        self.apply(input, ctx)
    }
}

/// OR together per-column flags.
fn column_mask(height: usize, columns: &[&Column], flags: impl Fn(&Column) -> Vec<bool>) -> Vec<bool> {
    let mut mask = vec![false; height];
    for column in columns {
        for (m, f) in mask.iter_mut().zip(flags(column)) {
            *m |= f;
        }
    }
    mask
}

fn iqr_flags(column: &Column, threshold: f64) -> Vec<bool> {
    let numbers = column.numbers();
    let (Some(q1), Some(q3)) = (stats::quantile(&numbers, 0.25), stats::quantile(&numbers, 0.75)) else {
        return vec![false; column.len()];
    };
    let iqr = q3 - q1;
    let (lower, upper) = (q1 - threshold * iqr, q3 + threshold * iqr);

    column
        .numeric_cells()
        .into_iter()
        .map(|v| v.map(|x| x < lower || x > upper).unwrap_or(false))
        .collect()
}

fn zscore_flags(column: &Column, threshold: f64) -> Vec<bool> {
    let numbers = column.numbers();
    let (Some(mean), Some(std)) = (stats::mean(&numbers), stats::std_dev(&numbers)) else {
        return vec![false; column.len()];
    };

    column
        .numeric_cells()
        .into_iter()
        .map(|v| v.map(|x| ((x - mean) / std).abs() > threshold).unwrap_or(false))
        .collect()
}

/// Row-major matrix over `columns`; fails on any missing cell.
fn complete_rows(height: usize, columns: &[&Column]) -> Result<Vec<Vec<f64>>> {
    let cells: Vec<Vec<Option<f64>>> = columns.iter().map(|c| c.numeric_cells()).collect();

    for (column, values) in columns.iter().zip(&cells) {
        if values.iter().any(Option::is_none) {
            return Err(CleanError::MissingValues(column.name.clone()).into());
        }
    }

    Ok((0..height)
        .map(|r| cells.iter().map(|col| col[r].unwrap_or_default()).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(values: Vec<f64>) -> DataFrame {
        DataFrame::from_columns(vec![Column::new(
            "v",
            values.into_iter().map(Value::Float).collect(),
        )])
        .unwrap()
    }

    #[test]
    fn test_iqr_bounds() {
        let col = Column::new("v", [1.0, 2.0, 3.0, 4.0, 100.0].into_iter().map(Value::Float).collect());
        assert_eq!(iqr_flags(&col, 1.5), vec![false, false, false, false, true]);
    }

    #[test]
    fn test_nulls_are_not_outliers() {
        let col = Column::new("v", vec![1.0.into(), Value::Null, 2.0.into(), 3.0.into()]);
        assert_eq!(zscore_flags(&col, 0.1)[1], false);
    }

    #[test]
    fn test_flag_adds_bool_column() {
        let df = frame(vec![1.0, 2.0, 3.0, 4.0, 100.0]);
        let result = OutlierDetector::new(["v"], OutlierMethod::Iqr)
            .with_action(OutlierAction::Flag)
            .apply(&df, &ModuleContext::new())
            .unwrap();
        assert_eq!(result.height(), 5);
        assert_eq!(result.column(FLAG_COLUMN).unwrap().values[4], Value::Bool(true));
    }

    #[test]
    fn test_isolation_rejects_missing_values() {
        let df = DataFrame::from_columns(vec![Column::new(
            "v",
            vec![1.0.into(), Value::Null, 3.0.into()],
        )])
        .unwrap();
        let err = OutlierDetector::new(["v"], OutlierMethod::Isolation)
            .apply(&df, &ModuleContext::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CleanError>(),
            Some(CleanError::MissingValues(_))
        ));
    }

    #[tokio::test]
    async fn test_contamination_validated() {
        let mut detector = OutlierDetector::default();
        let err = detector
            .on_create(serde_json::json!({"columns": ["v"], "contamination": 0.9}))
            .await;
        assert!(err.is_err());
    }
}
