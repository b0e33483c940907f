use crate::core::{DataFrame, Value};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use rust_xlsxwriter::Workbook;
use std::io::Write;
use std::path::Path;

/// Save `df` to `path`; the extension picks the format, CSV otherwise.
pub fn write_file(df: &DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" => write_excel(df, path),
        "tsv" => write_delimited(df, path, b'\t'),
        "json" => write_json(df, path),
        "jsonl" | "ndjson" => write_json_lines(df, path),
        _ => write_delimited(df, path, b','),
    }
    .with_context(|| format!("Failed to write {}", path.display()))?;

    log::info!("Saved {} rows to {}", df.height(), path.display());
    Ok(())
}

fn write_delimited(df: &DataFrame, path: &Path, delimiter: u8) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_path(path)?;
    writer.write_record(df.column_names())?;
    for row in 0..df.height() {
        writer.write_record(df.columns().iter().map(|c| c.values[row].to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

fn record(df: &DataFrame, row: usize) -> serde_json::Value {
    let fields = df
        .columns()
        .iter()
        .map(|c| (c.name.clone(), c.values[row].to_json()))
        .collect();
    serde_json::Value::Object(fields)
}

fn write_json(df: &DataFrame, path: &Path) -> Result<()> {
    let records: Vec<serde_json::Value> = (0..df.height()).map(|r| record(df, r)).collect();
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, &records)?;
    Ok(())
}

fn write_json_lines(df: &DataFrame, path: &Path) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for row in 0..df.height() {
        serde_json::to_writer(&mut file, &record(df, row))?;
        file.write_all(b"\n")?;
    }
    file.flush()?;
    Ok(())
}

fn write_excel(df: &DataFrame, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, column) in df.columns().iter().enumerate() {
        let col = u16::try_from(col).context("too many columns for a worksheet")?;
        sheet.write_string(0, col, column.name.as_str())?;

        for (row, value) in column.values.iter().enumerate() {
            let row = u32::try_from(row + 1).context("too many rows for a worksheet")?;
            match value {
                Value::Null => {}
                Value::Float(f) if f.is_nan() => {}
                Value::Int(i) => {
                    sheet.write_number(row, col, *i as f64)?;
                }
                Value::Float(f) => {
                    sheet.write_number(row, col, *f)?;
                }
                Value::Bool(b) => {
                    sheet.write_boolean(row, col, *b)?;
                }
                Value::Text(s) => {
                    sheet.write_string(row, col, s.as_str())?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}
