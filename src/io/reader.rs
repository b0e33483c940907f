use crate::core::{Column, DataFrame, Value};
use crate::error::CleanError;
use anyhow::Result;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fmt;
use std::path::Path;

/// Supported input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Json,
    JsonLines,
    Excel,
}

impl FileFormat {
    /// Map a format name or file extension, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" | "txt" => Some(FileFormat::Csv),
            "tsv" => Some(FileFormat::Tsv),
            "json" => Some(FileFormat::Json),
            "jsonl" | "ndjson" => Some(FileFormat::JsonLines),
            "xls" | "xlsx" | "xlsm" | "ods" | "excel" => Some(FileFormat::Excel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Tsv => "tsv",
            FileFormat::Json => "json",
            FileFormat::JsonLines => "jsonl",
            FileFormat::Excel => "excel",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Overrides detection from the file extension
    pub format: Option<String>,
    /// Field separator for delimited text
    pub delimiter: Option<u8>,
    /// Worksheet to read; the first sheet when unset
    pub sheet: Option<String>,
}

impl ParseOptions {
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Load a file into a [`DataFrame`], detecting its format from the extension.
pub fn parse_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CleanError::FileNotFound(path.to_path_buf()).into());
    }

    let name = match &options.format {
        Some(format) => format.clone(),
        None => path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default(),
    };
    let format =
        FileFormat::from_name(&name).ok_or_else(|| CleanError::UnsupportedFormat(name.clone()))?;

    log::debug!("Parsing {} as {}", path.display(), format);

    let parsed = match format {
        FileFormat::Csv => read_delimited(path, options.delimiter.unwrap_or(b',')),
        FileFormat::Tsv => read_delimited(path, options.delimiter.unwrap_or(b'\t')),
        FileFormat::Json => read_json(path),
        FileFormat::JsonLines => read_json_lines(path),
        FileFormat::Excel => read_excel(path, options.sheet.as_deref()),
    };

    let mut df = parsed.map_err(|e| CleanError::Parse(format!("{:#}", e)))?;
    df.metadata
        .insert("source".to_string(), path.display().to_string());
    df.metadata
        .insert("format".to_string(), format.as_str().to_string());

    log::info!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<DataFrame> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            anyhow::bail!(
                "line {} has {} fields, but the header has {}",
                line,
                record.len(),
                headers.len()
            );
        }
        // short rows are padded with nulls
        for (i, cells) in raw.iter_mut().enumerate() {
            cells.push(record.get(i).map(str::to_string));
        }
    }

    DataFrame::from_columns(
        headers
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| Column::from_raw(name, cells))
            .collect(),
    )
}

fn read_json(path: &Path) -> Result<DataFrame> {
    let text = std::fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&text)?;

    match json {
        serde_json::Value::Array(records) => frame_from_records(&records),
        serde_json::Value::Object(columns) => frame_from_columns(columns),
        _ => anyhow::bail!("expected an array of records or an object of columns"),
    }
}

/// Column orientation. Cells are aligned on their index keys; a key missing
/// from a column is null.
fn frame_from_columns(columns: serde_json::Map<String, serde_json::Value>) -> Result<DataFrame> {
    let indexed: Vec<(String, Vec<(String, serde_json::Value)>)> = columns
        .into_iter()
        .map(|(name, cells)| {
            let cells = match cells {
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect(),
                serde_json::Value::Object(index) => index.into_iter().collect(),
                scalar => vec![("0".to_string(), scalar)],
            };
            (name, cells)
        })
        .collect();

    let mut keys: Vec<String> = Vec::new();
    for (_, cells) in &indexed {
        for (key, _) in cells {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    let numeric: Option<Vec<i64>> = keys.iter().map(|k| k.parse().ok()).collect();
    if let Some(numeric) = numeric {
        let mut order: Vec<(i64, String)> = numeric.into_iter().zip(keys).collect();
        order.sort_by_key(|(n, _)| *n);
        keys = order.into_iter().map(|(_, k)| k).collect();
    }

    let columns = indexed
        .into_iter()
        .map(|(name, cells)| {
            let values = keys
                .iter()
                .map(|key| {
                    cells
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| Value::from_json(v))
                        .unwrap_or(Value::Null)
                })
                .collect();
            Column::new(name, values)
        })
        .collect();
    DataFrame::from_columns(columns)
}

fn read_json_lines(path: &Path) -> Result<DataFrame> {
    let text = std::fs::read_to_string(path)?;
    let records = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str::<serde_json::Value>)
        .collect::<Result<Vec<serde_json::Value>, _>>()?;
    frame_from_records(&records)
}

/// Columns in order of first appearance; absent keys become null.
fn frame_from_records(records: &[serde_json::Value]) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        let Some(fields) = record.as_object() else {
            anyhow::bail!("expected every record to be a JSON object");
        };
        for key in fields.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let values = records
                .iter()
                .map(|r| r.get(&name).map(Value::from_json).unwrap_or(Value::Null))
                .collect();
            Column::new(name, values)
        })
        .collect();
    DataFrame::from_columns(columns)
}

fn read_excel(path: &Path, sheet: Option<&str>) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("workbook has no sheets"))?,
    };
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(DataFrame::new());
    };
    let headers: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            Data::Empty => format!("Unnamed: {}", i),
            other => other.to_string(),
        })
        .collect();

    let mut values: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (i, column) in values.iter_mut().enumerate() {
            column.push(row.get(i).map(excel_value).unwrap_or(Value::Null));
        }
    }

    let columns = headers
        .into_iter()
        .zip(values)
        .map(|(name, values)| {
            let mut column = Column::new(name, values);
            column.normalize_integral_floats();
            column
        })
        .collect();
    DataFrame::from_columns(columns)
}

fn excel_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if crate::core::value::NULL_TOKENS.contains(&s.trim()) => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}
