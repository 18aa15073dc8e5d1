use crate::core::aggregate::parse_float;
use crate::domain::model::{number_value, Dataset, Row};
use crate::utils::error::{ReportError, Result};
use serde_json::Value;

/// Delimiters tried in order until one yields at least two columns.
const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

const MIN_COLUMNS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Rename the first two columns to `label`/`value` and force `value`
    /// numeric, the shape chart widgets read directly.
    pub chart_columns: bool,
}

pub fn parse_csv(bytes: &[u8], options: &LoadOptions) -> Result<Dataset> {
    let delimiter = detect_delimiter(bytes)?;
    tracing::debug!("CSV delimiter detected: {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let mut headers = dedupe_headers(reader.headers()?.iter());
    if options.chart_columns {
        headers[0] = "label".to_string();
        headers[1] = "value".to_string();
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Row = headers
            .iter()
            .enumerate()
            .map(|(col, header)| (header.clone(), infer_cell(record.get(col).unwrap_or(""))))
            .collect();
        if options.chart_columns {
            let value = parse_float(row.get("value"));
            row.insert("value", number_value(value));
        }
        rows.push(row);
    }

    tracing::info!("📥 Parsed {} rows with {} columns", rows.len(), headers.len());
    Ok(Dataset::new(rows))
}

fn detect_delimiter(bytes: &[u8]) -> Result<u8> {
    for delimiter in DELIMITERS {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(bytes);
        if reader.headers()?.len() >= MIN_COLUMNS {
            return Ok(delimiter);
        }
    }
    Err(ReportError::ValidationError {
        message: format!("CSV file must have at least {} columns", MIN_COLUMNS),
    })
}

/// Repeated header names get a `.1`, `.2`, ... suffix so no column is lost.
fn dedupe_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for name in raw {
        let mut candidate = name.to_string();
        let mut suffix = 1;
        while headers.contains(&candidate) {
            candidate = format!("{}.{}", name, suffix);
            suffix += 1;
        }
        headers.push(candidate);
    }
    headers
}

/// Empty cells become null, numeric text becomes a number.
fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    match trimmed.parse::<f64>() {
        Ok(float) if float.is_finite() => number_value(float),
        _ => Value::String(raw.to_string()),
    }
}

/// Rows from a JSON payload: a bare array of objects, an object carrying
/// `uploadedData` (optionally nested under `data`), or a single object.
pub fn parse_json(bytes: &[u8]) -> Result<Dataset> {
    let value: Value = serde_json::from_slice(bytes)?;
    let items = unwrap_rows(value)?;

    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(obj) => rows.push(Row::from(obj)),
            other => tracing::warn!("Skipping non-object entry #{}: {}", idx, other),
        }
    }

    tracing::info!("📥 Parsed {} rows from JSON", rows.len());
    Ok(Dataset::new(rows))
}

fn unwrap_rows(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => {
            if let Some(Value::Array(items)) = obj.remove("uploadedData") {
                return Ok(items);
            }
            match obj.remove("data") {
                Some(inner @ (Value::Array(_) | Value::Object(_))) => unwrap_rows(inner),
                Some(other) => {
                    obj.insert("data".to_string(), other);
                    Ok(vec![Value::Object(obj)])
                }
                None => Ok(vec![Value::Object(obj)]),
            }
        }
        other => Err(ReportError::ValidationError {
            message: format!("Expected a JSON array of rows, got: {}", other),
        }),
    }
}
