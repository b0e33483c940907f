use super::value::{Value, NULL_TOKENS};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Coarse type of a column, inferred from its non-null cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Text,
    Mixed,
    Empty,
}

/// A named, ordered sequence of cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Build a column from raw text cells, inferring one type for the whole column.
    pub fn from_raw(name: impl Into<String>, raw: Vec<Option<String>>) -> Self {
        let cells: Vec<Option<String>> = raw
            .into_iter()
            .map(|cell| cell.filter(|s| !NULL_TOKENS.contains(&s.trim())))
            .collect();

        let present = || cells.iter().flatten().map(|s| s.trim());

        let values: Vec<Value> = if present().all(|s| s.parse::<i64>().is_ok()) {
            cells
                .iter()
                .map(|c| c.as_deref().and_then(|s| s.trim().parse::<i64>().ok()).into())
                .collect()
        } else if present().all(|s| s.parse::<f64>().is_ok()) {
            cells
                .iter()
                .map(|c| c.as_deref().and_then(|s| s.trim().parse::<f64>().ok()).into())
                .collect()
        } else if present().all(|s| parse_bool(s).is_some()) {
            cells
                .iter()
                .map(|c| c.as_deref().and_then(parse_bool).into())
                .collect()
        } else {
            cells
                .into_iter()
                .map(|c| c.map(Value::Text).unwrap_or(Value::Null))
                .collect()
        };

        Self::new(name, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn kind(&self) -> ColumnKind {
        let mut numeric = false;
        let mut boolean = false;
        let mut text = false;

        for value in self.values.iter().filter(|v| !v.is_null()) {
            match value {
                Value::Int(_) | Value::Float(_) => numeric = true,
                Value::Bool(_) => boolean = true,
                Value::Text(_) => text = true,
                Value::Null => {}
            }
        }

        match (numeric, boolean, text) {
            (false, false, false) => ColumnKind::Empty,
            (true, false, false) => ColumnKind::Numeric,
            (false, true, false) => ColumnKind::Boolean,
            (false, false, true) => ColumnKind::Text,
            _ => ColumnKind::Mixed,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind(), ColumnKind::Numeric | ColumnKind::Empty)
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self.kind(),
            ColumnKind::Text | ColumnKind::Mixed | ColumnKind::Empty
        )
    }

    /// True when every non-null cell is an `Int`.
    pub fn is_integer(&self) -> bool {
        self.values
            .iter()
            .filter(|v| !v.is_null())
            .all(|v| matches!(v, Value::Int(_)))
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Non-null numeric cells, in row order.
    pub fn numbers(&self) -> Vec<f64> {
        self.values.iter().filter_map(Value::as_f64).collect()
    }

    /// One entry per row; `None` for nulls and non-numeric cells.
    pub fn numeric_cells(&self) -> Vec<Option<f64>> {
        self.values.iter().map(Value::as_f64).collect()
    }

    /// Convert every integer cell to a float.
    pub fn promote_to_float(&mut self) {
        for value in self.values.iter_mut() {
            if let Value::Int(i) = value {
                *value = Value::Float(*i as f64);
            }
        }
    }

    /// Replace every null with `fill`, keeping integer columns integral where possible.
    pub fn fill_null(&mut self, fill: Value) {
        if self.null_count() == 0 {
            return;
        }

        let fill = match fill {
            Value::Float(f) if self.is_integer() && f.fract() == 0.0 && f.is_finite() => {
                Value::Int(f as i64)
            }
            Value::Float(f) => {
                self.promote_to_float();
                Value::Float(f)
            }
            other => other,
        };

        for value in self.values.iter_mut().filter(|v| v.is_null()) {
            *value = fill.clone();
        }
    }

    /// Collapse float columns whose values are all integral into integers.
    pub(crate) fn normalize_integral_floats(&mut self) {
        let integral = self.values.iter().all(|v| match v {
            Value::Float(f) => f.is_nan() || (f.fract() == 0.0 && f.abs() < 9.0e15),
            Value::Null | Value::Int(_) => true,
            _ => false,
        });
        let any_float = self.values.iter().any(|v| matches!(v, Value::Float(f) if !f.is_nan()));

        if integral && any_float {
            for value in self.values.iter_mut() {
                match value {
                    Value::Float(f) if f.is_nan() => *value = Value::Null,
                    Value::Float(f) => *value = Value::Int(*f as i64),
                    _ => {}
                }
            }
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// In-memory table passed between cleaning modules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataFrame {
    columns: Vec<Column>,

    /// Side information such as the source path and format
    pub metadata: BTreeMap<String, String>,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let height = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != height) {
                bail!(
                    "Column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    height
                );
            }
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                bail!("Duplicate column name: '{}'", column.name);
            }
        }

        Ok(Self {
            columns,
            metadata: BTreeMap::new(),
        })
    }

    pub fn height(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Add a column, replacing any existing column of the same name.
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.height() {
            bail!(
                "Column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.height()
            );
        }

        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Requested names that are not present, sorted.
    pub fn missing_columns<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let mut missing: Vec<String> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|n| !self.has_column(n))
            .map(str::to_string)
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Keep rows whose mask entry is true.
    pub fn filter_rows(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.height() {
            bail!(
                "Row mask has {} entries, frame has {} rows",
                mask.len(),
                self.height()
            );
        }

        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = c
                    .values
                    .iter()
                    .zip(mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| v.clone())
                    .collect();
                Column::new(c.name.clone(), values)
            })
            .collect();

        Ok(Self {
            columns,
            metadata: self.metadata.clone(),
        })
    }

    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.height() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }
}
