use crate::domain::model::{cell_text, number_value, Aggregation, MetricKind, Row};
use crate::domain::ports::Storage;
use crate::utils::error::{ReportError, Result};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::str::FromStr;
use zip::write::{FileOptions, ZipWriter};

/// Marker row between the per-date block and the category block of a
/// dashboard export.
pub const CATEGORY_SENTINEL: &str = "---Category Distribution---";

pub const SHEET_NAME: &str = "Data";

/// Longest text a single spreadsheet cell accepts, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn encode(&self, rows: &[Row]) -> Result<Vec<u8>> {
        match self {
            ExportFormat::Csv => to_csv(rows),
            ExportFormat::Json => to_json(rows),
            ExportFormat::Xlsx => to_spreadsheet(rows),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            _ => Err(ReportError::UnsupportedFormatError {
                format: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Union of the keys of all rows, in first-seen order.
pub fn header_union(rows: &[Row]) -> Vec<&str> {
    let mut headers: Vec<&str> = Vec::new();
    for key in rows.iter().flat_map(Row::keys) {
        if !headers.contains(&key) {
            headers.push(key);
        }
    }
    headers
}

/// CSV with a header row. Cells a row lacks are written empty; no rows gives
/// an empty file.
pub fn to_csv(rows: &[Row]) -> Result<Vec<u8>> {
    let headers = header_union(rows);
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(&headers)?;
    for row in rows {
        writer.write_record(
            headers
                .iter()
                .map(|h| row.text(h).map(Cow::into_owned).unwrap_or_default()),
        )?;
    }

    writer
        .into_inner()
        .map_err(|e| ReportError::IoError(e.into_error()))
}

/// Pretty-printed JSON array, two-space indent, keys in row order.
pub fn to_json(rows: &[Row]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(rows)?)
}

/// XLSX workbook with a single `Data` sheet: header row, then one row per
/// record. Numbers and booleans keep their cell types.
pub fn to_spreadsheet(rows: &[Row]) -> Result<Vec<u8>> {
    let headers = header_union(rows);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let xl_row = (idx + 1) as u32;
        for (col, header) in headers.iter().enumerate() {
            let col = col as u16;
            match row.get(header) {
                None | Some(Value::Null) => {}
                Some(Value::Number(n)) => {
                    worksheet.write_number(xl_row, col, n.as_f64().unwrap_or_default())?;
                }
                Some(Value::Bool(b)) => {
                    worksheet.write_boolean(xl_row, col, *b)?;
                }
                Some(other) => {
                    if let Some(text) = cell_text(other) {
                        worksheet.write_string(xl_row, col, fit_cell(&text, header, xl_row))?;
                    }
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Text past [`MAX_CELL_CHARS`] is cut off with a warning.
fn fit_cell<'t>(text: &'t str, header: &str, row: u32) -> &'t str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            tracing::warn!(
                "Truncated '{}' cell in spreadsheet row {} to {} characters",
                header,
                row,
                MAX_CELL_CHARS
            );
            &text[..cut]
        }
        None => text,
    }
}

/// Flattens an aggregation into one export table.
///
/// One row per distinct date (sorted) carrying every metric's value for that
/// date, or null when the metric has none. A sentinel row follows, then one
/// `{date: category, value: count}` row per category.
pub fn build_export_rows(aggregation: &Aggregation) -> Vec<Row> {
    let mut dates: Vec<&str> = aggregation
        .series
        .values()
        .flat_map(|s| s.labels().iter().map(String::as_str))
        .collect();
    dates.sort_unstable();
    dates.dedup();

    let indexed: Vec<(MetricKind, HashMap<&str, f64>)> = MetricKind::ALL
        .into_iter()
        .filter_map(|kind| aggregation.metric(kind).map(|s| (kind, s.first_values())))
        .collect();

    let mut rows = Vec::with_capacity(dates.len() + aggregation.categories.len() + 1);
    for date in dates {
        let mut row = Row::new().with("date", date);
        for (kind, values) in &indexed {
            let value = values
                .get(date)
                .copied()
                .map(number_value)
                .unwrap_or(Value::Null);
            row.insert(kind.name(), value);
        }
        rows.push(row);
    }

    rows.push(Row::new().with("date", CATEGORY_SENTINEL));
    for (category, count) in aggregation.categories.iter() {
        rows.push(
            Row::new()
                .with("date", category)
                .with("value", number_value(count)),
        );
    }
    rows
}

/// Packs already encoded files into one zip archive.
pub fn zip_bundle(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Encodes rows and hands the bytes to the storage collaborator as
/// `<file_name>.<extension>`.
pub struct Exporter<S: Storage> {
    storage: S,
}

impl<S: Storage> Exporter<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn export(&self, rows: &[Row], file_name: &str, format: ExportFormat) -> Result<String> {
        let bytes = format.encode(rows)?;
        let path = format!("{}.{}", file_name, format.extension());
        tracing::debug!(
            "Writing {} rows to {} ({}, {} bytes)",
            rows.len(),
            path,
            format.mime_type(),
            bytes.len()
        );
        self.storage.write_file(&path, &bytes).await?;
        Ok(path)
    }

    pub async fn export_csv(&self, rows: &[Row], file_name: &str) -> Result<String> {
        self.export(rows, file_name, ExportFormat::Csv).await
    }

    pub async fn export_json(&self, rows: &[Row], file_name: &str) -> Result<String> {
        self.export(rows, file_name, ExportFormat::Json).await
    }

    pub async fn export_spreadsheet(&self, rows: &[Row], file_name: &str) -> Result<String> {
        self.export(rows, file_name, ExportFormat::Xlsx).await
    }
}
