use crate::core::aggregate::aggregate_metrics;
use crate::core::export::{build_export_rows, to_csv, zip_bundle, Exporter};
use crate::core::filter::filter_dataset;
use crate::core::loader::LoadOptions;
use crate::core::source::{fetch_dataset, DataSource, SourceOptions};
use crate::domain::model::{DashboardReport, Dataset, MetricKind};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::Result;
use crate::utils::format::{format_currency, format_number};
use crate::utils::validation::validate_formats;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

/// Raw filtered rows, added to zip bundles next to the dashboard exports.
pub const FILTERED_ROWS_FILE: &str = "filtered.csv";

/// Loads an uploaded dataset, filters and aggregates it, then writes the
/// dashboard export in every configured format.
pub struct DashboardPipeline<S: Storage, C: ConfigProvider> {
    exporter: Exporter<S>,
    config: C,
    client: Client,
}

impl<S: Storage, C: ConfigProvider> DashboardPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self {
            exporter: Exporter::new(storage),
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    fn source_options(&self) -> SourceOptions {
        SourceOptions {
            timeout: self.config.request_timeout_seconds().map(Duration::from_secs),
            headers: self.config.request_headers(),
            load: LoadOptions {
                chart_columns: self.config.chart_columns(),
            },
        }
    }

    fn output_location(&self, file: &str) -> String {
        Path::new(self.config.output_path())
            .join(file)
            .display()
            .to_string()
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for DashboardPipeline<S, C> {
    async fn extract(&self) -> Result<Dataset> {
        let source = DataSource::parse(self.config.source())?;
        tracing::debug!("Loading dataset from {}", source.describe());

        let dataset = fetch_dataset(&self.client, &source, &self.source_options()).await?;
        if dataset.is_empty() {
            tracing::warn!("Dataset from {} has no rows", source.describe());
        } else {
            tracing::debug!("Dataset columns: {:?}", dataset.columns());
        }
        Ok(dataset)
    }

    async fn transform(&self, data: Dataset) -> Result<DashboardReport> {
        let criteria = self.config.criteria();
        let filtered = filter_dataset(&data, &criteria);
        tracing::debug!(
            "Filter kept {} of {} rows (search: {:?}, category: {})",
            filtered.len(),
            data.len(),
            criteria.search_term,
            criteria.category
        );

        let aggregation = aggregate_metrics(&filtered);
        let revenue = aggregation.summary(MetricKind::Revenue);
        tracing::info!(
            "Revenue {} total, {} average over {} points",
            format_currency(revenue.total),
            format_currency(revenue.average),
            revenue.count
        );
        for kind in [MetricKind::Clicks, MetricKind::Conversions] {
            let summary = aggregation.summary(kind);
            tracing::info!(
                "{} {} total, {} average",
                kind,
                format_number(summary.total),
                format_number(summary.average)
            );
        }

        let export_rows = build_export_rows(&aggregation);
        Ok(DashboardReport {
            filtered,
            aggregation,
            export_rows,
        })
    }

    async fn load(&self, report: DashboardReport) -> Result<Vec<String>> {
        let formats = validate_formats("output_formats", self.config.output_formats())?;
        let file_name = self.config.file_name();

        if !self.config.bundle_outputs() {
            let mut outputs = Vec::with_capacity(formats.len());
            for format in formats {
                let path = self
                    .exporter
                    .export(&report.export_rows, file_name, format)
                    .await?;
                outputs.push(self.output_location(&path));
            }
            return Ok(outputs);
        }

        let mut files = Vec::with_capacity(formats.len() + 1);
        for format in formats {
            files.push((
                format!("{}.{}", file_name, format.extension()),
                format.encode(&report.export_rows)?,
            ));
        }
        files.push((
            FILTERED_ROWS_FILE.to_string(),
            to_csv(report.filtered.rows())?,
        ));

        let zip_name = format!("{}.zip", file_name);
        tracing::debug!("Creating ZIP file with {} files", files.len());
        let zip_data = zip_bundle(&files)?;

        tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
        self.exporter.storage().write_file(&zip_name, &zip_data).await?;
        Ok(vec![self.output_location(&zip_name)])
    }
}
