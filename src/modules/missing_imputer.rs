use super::{columns, parse_params, require_columns};
use crate::core::{stats, CleaningModule, Column, DataFrame, ModuleContext, Value};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sheetpilot_macros::CleaningModule;
use std::collections::HashMap;

pub const MODULE_ID: &str = "missing_imputer";

/// Share of missing cells above which a column is reported
const HIGH_MISSING_PCT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImputeMethod {
    #[default]
    Mean,
    Median,
    Mode,
    Knn,
    Constant,
}

/// Fills missing cells column by column
#[derive(CleaningModule, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[module_meta(
    id = "missing_imputer",
    name = "Missing Value Imputer",
    category = "Cleaning",
    description = "Fill missing cells using mean, median, mode, k-nearest neighbours or a constant"
)]
#[serde(default, deny_unknown_fields)]
pub struct MissingImputer {
    #[param(kind = "list", description = "Columns to impute; every column when omitted")]
    #[serde(deserialize_with = "columns::optional")]
    pub columns: Option<Vec<String>>,

    #[param(default = "\"mean\"", kind = "string", description = "mean, median, mode, knn or constant")]
    pub method: ImputeMethod,

    #[param(default = "5", min = 1.0, description = "Neighbours averaged by the knn method")]
    pub n_neighbors: usize,

    #[param(default = "0", kind = "any", description = "Value used by the constant method")]
    pub fill_value: serde_json::Value,
}

impl Default for MissingImputer {
    fn default() -> Self {
        Self {
            columns: None,
            method: ImputeMethod::Mean,
            n_neighbors: 5,
            fill_value: serde_json::Value::from(0),
        }
    }
}

impl MissingImputer {
    pub fn new(method: ImputeMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn apply(&self, df: &DataFrame, ctx: &ModuleContext) -> Result<DataFrame> {
        let mut result = df.clone();

        let columns = match &self.columns {
            Some(columns) => columns.clone(),
            None => result.column_names(),
        };
        require_columns(&result, &columns)?;

        let height = result.height();
        if height > 0 {
            for name in &columns {
                if let Some(column) = result.column(name) {
                    let missing_pct = column.null_count() as f64 / height as f64 * 100.0;
                    if missing_pct > HIGH_MISSING_PCT {
                        ctx.warn(format!(
                            "Column '{}' has {:.1}% missing values",
                            name, missing_pct
                        ));
                    }
                }
            }
        }

        match self.method {
            ImputeMethod::Mean => fill_numeric(&mut result, &columns, stats::mean),
            ImputeMethod::Median => fill_numeric(&mut result, &columns, stats::median),
            ImputeMethod::Mode => {
                for name in &columns {
                    if let Some(column) = result.column_mut(name) {
                        if let Some(mode) = mode(column) {
                            column.fill_null(mode);
                        }
                    }
                }
            }
            ImputeMethod::Knn => {
                let numeric: Vec<String> = columns
                    .iter()
                    .filter(|name| {
                        result
                            .column(name)
                            .map(|c| c.is_numeric() && c.null_count() < c.len())
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect();
                knn_impute(&mut result, &numeric, self.n_neighbors.max(1));
            }
            ImputeMethod::Constant => {
                let fill = Value::from_json(&self.fill_value);
                for name in &columns {
                    if let Some(column) = result.column_mut(name) {
                        column.fill_null(fill.clone());
                    }
                }
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl CleaningModule for MissingImputer {
    async fn on_create(&mut self, params: serde_json::Value) -> Result<()> {
        *self = parse_params(MODULE_ID, params)?;
        Ok(())
    }

    async fn process(&self, input: &DataFrame, ctx: &ModuleContext) -> Result<DataFrame> {
        self.apply(input, ctx)
    }
}

fn fill_numeric(df: &mut DataFrame, columns: &[String], statistic: fn(&[f64]) -> Option<f64>) {
    for name in columns {
        if let Some(column) = df.column_mut(name) {
            if !column.is_numeric() {
                continue;
            }
            if let Some(fill) = statistic(&column.numbers()) {
                column.fill_null(Value::Float(fill));
            }
        }
    }
}

/// Most frequent non-null value; ties go to the smallest value.
fn mode(column: &Column) -> Option<Value> {
    let mut counts: HashMap<String, (usize, &Value)> = HashMap::new();
    for value in column.values.iter().filter(|v| !v.is_null()) {
        counts.entry(value.group_key()).or_insert((0, value)).0 += 1;
    }

    counts
        .into_values()
        .max_by(|(ca, va), (cb, vb)| ca.cmp(cb).then_with(|| vb.total_cmp(va)))
        .map(|(_, value)| value.clone())
}

/// Nan-euclidean distance: squared differences over coordinates present in
/// both rows, scaled up by the share of coordinates that were skipped.
fn nan_euclidean(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut present = 0usize;
    for (x, y) in a.iter().zip(b) {
        if let (Some(x), Some(y)) = (x, y) {
            sum += (x - y).powi(2);
            present += 1;
        }
    }
    if present == 0 {
        return None;
    }
    Some((a.len() as f64 / present as f64 * sum).sqrt())
}

fn knn_impute(df: &mut DataFrame, columns: &[String], k: usize) {
    if columns.is_empty() {
        return;
    }

    // Row-major snapshot of the original values; donors are always taken from it.
    let cells: Vec<Vec<Option<f64>>> = columns
        .iter()
        .filter_map(|name| df.column(name).map(Column::numeric_cells))
        .collect();
    let height = df.height();
    let rows: Vec<Vec<Option<f64>>> = (0..height)
        .map(|r| cells.iter().map(|col| col[r]).collect())
        .collect();

    for (c, name) in columns.iter().enumerate() {
        let column_mean = stats::mean(&cells[c].iter().flatten().copied().collect::<Vec<_>>());
        let Some(column) = df.column_mut(name) else {
            continue;
        };
        if column.null_count() == 0 {
            continue;
        }
        column.promote_to_float();

        for r in 0..height {
            if rows[r][c].is_some() {
                continue;
            }

            let mut donors: Vec<(f64, f64)> = rows
                .iter()
                .enumerate()
                .filter(|(d, _)| *d != r)
                .filter_map(|(_, donor)| {
                    let value = donor[c]?;
                    nan_euclidean(&rows[r], donor).map(|dist| (dist, value))
                })
                .collect();
            donors.sort_by(|a, b| a.0.total_cmp(&b.0));
            donors.truncate(k);

            let fill = if donors.is_empty() {
                column_mean
            } else {
                Some(donors.iter().map(|(_, v)| v).sum::<f64>() / donors.len() as f64)
            };

            if let Some(fill) = fill {
                column.values[r] = Value::Float(fill);
            }
        }
    }
}
