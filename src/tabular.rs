use crate::models::Dataset;
use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use chrono::SubsecRound;
use rust_xlsxwriter::Workbook;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("column '{column}' not found; available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("line {line}: expected at most {expected} fields, found {found}")]
    MalformedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("workbook '{0}' contains no sheets")]
    EmptyWorkbook(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
}

const UTF8_BOM: &str = "\u{feff}";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cell text as a spreadsheet user would read it. Date cells are stored as
/// serial numbers and come out as `YYYY-MM-DD HH:MM:SS`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::DateTime(dt) if !dt.is_duration() => cell
            .as_datetime()
            .map(|dt| dt.round_subsecs(0).format(DATETIME_FORMAT).to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::DateTimeIso(text) | Data::DurationIso(text) => text.clone(),
        _ => cell.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Xlsx,
    Csv,
}

fn format_of(path: &Path) -> Result<Format> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => Ok(Format::Xlsx),
        Some("csv") => Ok(Format::Csv),
        _ => Err(PipelineError::UnsupportedFormat(path.display().to_string()).into()),
    }
}

/// Load a table from an xlsx workbook (first sheet) or a csv file.
/// The first row is taken as the header.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(anyhow!("input file not found: {}", path.display()));
    }

    match format_of(path)? {
        Format::Xlsx => read_xlsx(path),
        Format::Csv => read_csv(path),
    }
}

fn read_xlsx(path: &Path) -> Result<Dataset> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PipelineError::EmptyWorkbook(path.display().to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| anyhow!("Error reading sheet '{}': {}", sheet_name, e))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());

    let headers = match rows.next() {
        Some(headers) => headers.into_iter().map(|h| h.trim().to_string()).collect(),
        None => return Ok(Dataset::default()),
    };

    Ok(Dataset::new(headers, rows.collect()))
}

fn read_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches(UTF8_BOM).trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed row in {}", path.display()))?;
        // Short rows are padded later; extra fields would be silently lost.
        if record.len() > headers.len() {
            return Err(PipelineError::MalformedRow {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                expected: headers.len(),
                found: record.len(),
            }
            .into());
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Dataset::new(headers, rows))
}

/// Write every cell as text; empty cells stay blank in the sheet.
pub fn write_xlsx<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in dataset.headers.iter().enumerate() {
        sheet.write_string(0, col as u16, header)?;
    }

    for (row_idx, row) in dataset.rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(row_idx as u32 + 1, col as u16, value)?;
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed to save Excel file: {}", path.display()))?;
    Ok(())
}

/// CSV with a leading UTF-8 BOM so spreadsheet tools pick the right encoding.
pub fn write_csv<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    file.write_all(UTF8_BOM.as_bytes())?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&dataset.headers)?;
    for row in &dataset.rows {
        writer.write_record(row)?;
    }

    writer.flush()?;
    Ok(())
}
