use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

/// Category value meaning "do not filter by category".
pub const ALL_CATEGORIES: &str = "all";

/// Column holding the category used by the filter and the distribution series.
pub const CATEGORY_COLUMN: &str = "category";

/// Date columns in lookup priority, shared by chart labels and the date filter.
pub const DATE_COLUMNS: [&str; 2] = ["Date", "date"];

/// One record of an uploaded dataset. Keys keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    pub data: Map<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.data.values()
    }

    /// First present cell among `candidates`, in priority order. For each
    /// candidate an exact key wins over a case-insensitive one. Nulls and
    /// empty strings count as absent.
    pub fn lookup(&self, candidates: &[&str]) -> Option<&Value> {
        candidates.iter().find_map(|name| {
            self.data
                .get(*name)
                .filter(|v| is_present(v))
                .or_else(|| {
                    self.data
                        .iter()
                        .find(|(key, value)| key.eq_ignore_ascii_case(name) && is_present(value))
                        .map(|(_, value)| value)
                })
        })
    }

    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.data.get(key).and_then(cell_text)
    }
}

impl From<Map<String, Value>> for Row {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Display form of a cell, `None` for nulls.
///
/// Integral floats print without a fractional part so `100.0` reads as `100`,
/// which is what a browser shows for the same cell.
pub fn cell_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return Some(Cow::Owned(n.to_string()));
            }
            let f = n.as_f64().unwrap_or_default();
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(Cow::Owned(format!("{}", f as i64)))
            } else {
                Some(Cow::Owned(f.to_string()))
            }
        }
        other => Some(Cow::Owned(other.to_string())),
    }
}

/// JSON value for a metric number; integral values are emitted as integers.
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// An uploaded table. Every transformation returns a new dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Schema of the dataset, taken from the first row.
    pub fn columns(&self) -> Vec<&str> {
        self.rows
            .first()
            .map(|row| row.keys().collect())
            .unwrap_or_default()
    }
}

impl FromIterator<Row> for Dataset {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub search_term: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

fn default_category() -> String {
    ALL_CATEGORIES.to_string()
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            category: default_category(),
            date_range: None,
        }
    }
}

impl FilterCriteria {
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn filters_category(&self) -> bool {
        !self.category.is_empty() && self.category != ALL_CATEGORIES
    }

    pub fn is_empty(&self) -> bool {
        self.search_term.is_empty() && !self.filters_category() && self.date_range.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Revenue,
    Clicks,
    Conversions,
    Performance,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Revenue,
        MetricKind::Clicks,
        MetricKind::Conversions,
        MetricKind::Performance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Revenue => "revenue",
            MetricKind::Clicks => "clicks",
            MetricKind::Conversions => "conversions",
            MetricKind::Performance => "performance",
        }
    }

    /// Count metrics are parsed as integers and have rounded averages.
    pub fn is_count(&self) -> bool {
        matches!(self, MetricKind::Clicks | MetricKind::Conversions)
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Index-aligned labels and values. Only `push` grows it, so both vectors
/// always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSeries {
    labels: Vec<String>,
    values: Vec<f64>,
}

impl MetricSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            labels: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, value: f64) {
        self.labels.push(label.into());
        self.values.push(value);
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Label to value, keeping the first occurrence of repeated labels.
    pub fn first_values(&self) -> HashMap<&str, f64> {
        let mut index = HashMap::with_capacity(self.labels.len());
        for (label, value) in self.iter() {
            index.entry(label).or_insert(value);
        }
        index
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            labels: self.labels.clone(),
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricSummary {
    pub total: f64,
    pub average: f64,
    pub count: usize,
}

/// Chart-ready output of the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregation {
    pub series: BTreeMap<MetricKind, MetricSeries>,
    pub summaries: BTreeMap<MetricKind, MetricSummary>,
    /// Rows per category, labels are category names.
    pub categories: MetricSeries,
}

impl Aggregation {
    pub fn metric(&self, kind: MetricKind) -> Option<&MetricSeries> {
        self.series.get(&kind)
    }

    pub fn summary(&self, kind: MetricKind) -> MetricSummary {
        self.summaries.get(&kind).copied().unwrap_or_default()
    }
}

/// Everything the load step needs: the filtered rows, their aggregation and
/// the synthesized export rows.
#[derive(Debug, Clone)]
pub struct DashboardReport {
    pub filtered: Dataset,
    pub aggregation: Aggregation,
    pub export_rows: Vec<Row>,
}
