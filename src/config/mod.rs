pub mod cli;
pub mod toml_config;

use crate::domain::model::{DateRange, FilterCriteria, ALL_CATEGORIES};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use chrono::NaiveDate;
#[cfg(feature = "cli")]
use clap::Parser;
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "campaign-metrics")]
#[command(about = "Filter, aggregate and export uploaded marketing data")]
pub struct CliConfig {
    /// CSV/JSON file path or http(s) URL of the uploaded dataset
    #[arg(long)]
    pub source: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value = "")]
    pub search: String,

    #[arg(long, default_value = ALL_CATEGORIES)]
    pub category: String,

    /// Keep rows dated on or after this day (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Keep rows dated on or before this day (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    #[arg(long, value_delimiter = ',', default_values = ["csv", "json", "xlsx"])]
    pub formats: Vec<String>,

    #[arg(long, default_value = "dashboard-data")]
    pub file_name: String,

    #[arg(long, help = "Write every export into a single zip archive")]
    pub bundle: bool,

    #[arg(long, help = "Treat the first two CSV columns as label/value")]
    pub chart_columns: bool,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn date_range(&self) -> Option<DateRange> {
        date_range_from_bounds(self.from, self.to)
    }
}

/// Either bound may be open; no bounds means no date filter.
pub fn date_range_from_bounds(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Option<DateRange> {
    match (from, to) {
        (None, None) => None,
        (start, end) => Some(DateRange::new(
            start.unwrap_or(NaiveDate::MIN),
            end.unwrap_or(NaiveDate::MAX),
        )),
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn source(&self) -> &str {
        &self.source
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.formats
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            search_term: self.search.clone(),
            category: self.category.clone(),
            date_range: self.date_range(),
        }
    }

    fn bundle_outputs(&self) -> bool {
        self.bundle
    }

    fn chart_columns(&self) -> bool {
        self.chart_columns
    }

    fn request_timeout_seconds(&self) -> Option<u64> {
        self.timeout_seconds
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_source("source", &self.source)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_file_name("file_name", &self.file_name)?;
        validation::validate_formats("formats", &self.formats)?;
        if let Some(timeout) = self.timeout_seconds {
            validation::validate_positive_number("timeout_seconds", timeout as usize, 1)?;
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            validation::validate_date_order("from", from, to)?;
        }
        Ok(())
    }
}
