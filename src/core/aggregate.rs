use crate::domain::model::{
    cell_text, Aggregation, Dataset, MetricKind, MetricSeries, MetricSummary, Row, CATEGORY_COLUMN,
    DATE_COLUMNS,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Pie slices kept in the category distribution. Categories past this are
/// dropped, not merged into an "other" slice.
pub const MAX_CATEGORY_SLICES: usize = 5;

pub const UNKNOWN_LABEL: &str = "Unknown";

const LEGACY_LABEL: &str = "label";
const LEGACY_VALUE: &str = "value";

fn metric_columns(kind: MetricKind) -> &'static [&'static str] {
    match kind {
        MetricKind::Revenue => &["Revenue", "revenue"],
        MetricKind::Clicks => &["Clicks", "clicks"],
        MetricKind::Conversions => &["Conversions", "conversions"],
        MetricKind::Performance => &["Performance", "performance", "Cost", "cost"],
    }
}

/// Builds every chart series and summary for `dataset`.
///
/// Uploads shaped as `label`/`value` pairs (detected from the first row) fan
/// out into the four metrics by fixed ratios. Anything else is read through
/// the named metric columns, with absent cells counted as `0`.
pub fn aggregate_metrics(dataset: &Dataset) -> Aggregation {
    let series = if is_legacy_shape(dataset) {
        tracing::debug!("Aggregating {} rows in label/value form", dataset.len());
        legacy_series(dataset)
    } else {
        tracing::debug!("Aggregating {} rows by named columns", dataset.len());
        named_series(dataset)
    };

    let summaries = series
        .iter()
        .map(|(kind, s)| (*kind, summarize(*kind, s)))
        .collect();

    Aggregation {
        series,
        summaries,
        categories: category_distribution(dataset),
    }
}

fn is_legacy_shape(dataset: &Dataset) -> bool {
    dataset
        .first()
        .is_some_and(|row| row.contains_key(LEGACY_LABEL) && row.contains_key(LEGACY_VALUE))
}

fn legacy_series(dataset: &Dataset) -> BTreeMap<MetricKind, MetricSeries> {
    let mut base = MetricSeries::with_capacity(dataset.len());
    for row in dataset {
        let label = row
            .text(LEGACY_LABEL)
            .map(|l| l.into_owned())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        base.push(label, parse_float(row.get(LEGACY_VALUE)));
    }

    BTreeMap::from([
        (MetricKind::Clicks, base.map_values(|v| round_half_up(v / 2.0))),
        (MetricKind::Conversions, base.map_values(|v| round_half_up(v / 10.0))),
        (MetricKind::Performance, base.map_values(|v| round_half_up(v / 100.0))),
        (MetricKind::Revenue, base),
    ])
}

fn named_series(dataset: &Dataset) -> BTreeMap<MetricKind, MetricSeries> {
    let labels: Vec<String> = dataset.iter().map(date_label).collect();

    MetricKind::ALL
        .iter()
        .map(|kind| {
            let mut series = MetricSeries::with_capacity(dataset.len());
            for (row, label) in dataset.iter().zip(&labels) {
                series.push(label.clone(), metric_value(row, *kind));
            }
            (*kind, series)
        })
        .collect()
}

fn date_label(row: &Row) -> String {
    row.lookup(&DATE_COLUMNS)
        .and_then(cell_text)
        .map(|d| d.into_owned())
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
}

/// Numeric cell for `kind`; counts are truncated to integers.
pub fn metric_value(row: &Row, kind: MetricKind) -> f64 {
    let cell = row.lookup(metric_columns(kind));
    if kind.is_count() {
        parse_int(cell)
    } else {
        parse_float(cell)
    }
}

fn summarize(kind: MetricKind, series: &MetricSeries) -> MetricSummary {
    let count = series.len();
    let total = series.total();
    let average = if count == 0 {
        0.0
    } else if kind.is_count() {
        round_half_up(total / count as f64)
    } else {
        total / count as f64
    };

    MetricSummary {
        total,
        average,
        count,
    }
}

/// Rows per category in first-seen order, capped at [`MAX_CATEGORY_SLICES`].
pub fn category_distribution(dataset: &Dataset) -> MetricSeries {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut uncategorized = 0usize;

    for row in dataset {
        let Some(category) = row.text(CATEGORY_COLUMN).filter(|c| !c.is_empty()) else {
            uncategorized += 1;
            continue;
        };
        match index.get(&*category) {
            Some(&pos) => order[pos].1 += 1,
            None => {
                index.insert(category.to_string(), order.len());
                order.push((category.into_owned(), 1));
            }
        }
    }

    if !order.is_empty() && uncategorized > 0 {
        tracing::warn!(
            "{} rows have no category and are left out of the distribution",
            uncategorized
        );
    }
    if order.len() > MAX_CATEGORY_SLICES {
        tracing::debug!(
            "Category distribution truncated from {} to {} entries",
            order.len(),
            MAX_CATEGORY_SLICES
        );
    }

    let mut series = MetricSeries::with_capacity(order.len().min(MAX_CATEGORY_SLICES));
    for (category, count) in order.into_iter().take(MAX_CATEGORY_SLICES) {
        series.push(category, count as f64);
    }
    series
}

/// `Math.round` semantics: halves go up, so `0.5 -> 1` and `-2.5 -> -2`.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Float coercion that never fails: unparseable or non-finite cells are `0`.
/// Strings are read by their longest numeric prefix (`"12.5 USD"` is `12.5`).
pub fn parse_float(cell: Option<&Value>) -> f64 {
    let parsed = match cell {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_float_prefix(s.trim()),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Integer coercion by leading digits (`"12.7"` is `12`, `"abc"` is `0`).
pub fn parse_int(cell: Option<&Value>) -> f64 {
    let parsed = match cell {
        Some(Value::Number(n)) => n.as_f64().map(f64::trunc),
        Some(Value::String(s)) => parse_int_prefix(s.trim()),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn parse_float_prefix(text: &str) -> Option<f64> {
    if let Ok(value) = text.parse::<f64>() {
        return Some(value);
    }
    let end = numeric_prefix_len(text, true);
    (end > 0).then(|| text[..end].parse::<f64>().ok()).flatten()
}

fn parse_int_prefix(text: &str) -> Option<f64> {
    let end = numeric_prefix_len(text, false);
    (end > 0)
        .then(|| text[..end].parse::<i64>().ok().map(|v| v as f64))
        .flatten()
}

fn numeric_prefix_len(text: &str, allow_fraction: bool) -> usize {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if allow_fraction && end < bytes.len() && bytes[end] == b'.' {
        let mut frac_end = end + 1;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > end + 1 || end > digits_start {
            end = frac_end;
        }
    }
    if end == digits_start {
        return 0;
    }
    end
}
