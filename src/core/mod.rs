pub mod aggregate;
pub mod engine;
pub mod export;
pub mod filter;
pub mod loader;
pub mod source;

pub use crate::domain::model::{Aggregation, DashboardReport, Dataset, FilterCriteria, Row};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
pub use aggregate::aggregate_metrics;
pub use export::{build_export_rows, ExportFormat, Exporter};
pub use filter::{filter_dataset, FilterEngine};
