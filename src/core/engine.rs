use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::format::format_number;
use crate::utils::monitor::SystemMonitor;

/// Drives a pipeline through extract, transform and load, logging each phase.
pub struct ReportEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ReportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Returns the paths written by the load phase.
    pub async fn run(&self) -> Result<Vec<String>> {
        tracing::info!("🚀 Starting dashboard report");
        self.monitor.log_stats("Start");

        tracing::info!("📥 Extracting dataset...");
        let dataset = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} rows", format_number(dataset.len() as f64));
        self.monitor.log_stats("Extract");

        tracing::info!("🔄 Filtering and aggregating...");
        let report = self.pipeline.transform(dataset).await?;
        tracing::info!(
            "🔄 {} rows matched, {} export rows",
            format_number(report.filtered.len() as f64),
            format_number(report.export_rows.len() as f64)
        );
        self.monitor.log_stats("Transform");

        tracing::info!("💾 Writing exports...");
        let outputs = self.pipeline.load(report).await?;
        for path in &outputs {
            tracing::info!("💾 Wrote {}", path);
        }
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DashboardReport, Dataset, Row};
    use crate::utils::error::ReportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPipeline {
        calls: AtomicUsize,
        fail_extract: bool,
    }

    #[async_trait]
    impl Pipeline for CountingPipeline {
        async fn extract(&self) -> Result<Dataset> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_extract {
                return Err(ReportError::ValidationError {
                    message: "no rows".to_string(),
                });
            }
            Ok(Dataset::new(vec![Row::new().with("date", "2024-01-01")]))
        }

        async fn transform(&self, data: Dataset) -> Result<DashboardReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DashboardReport {
                filtered: data,
                aggregation: Default::default(),
                export_rows: Vec::new(),
            })
        }

        async fn load(&self, _report: DashboardReport) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["dashboard-data.csv".to_string()])
        }
    }

    #[tokio::test]
    async fn test_engine_runs_all_phases() {
        let engine = ReportEngine::new(CountingPipeline {
            calls: AtomicUsize::new(0),
            fail_extract: false,
        });

        let outputs = engine.run().await.unwrap();
        assert_eq!(outputs, vec!["dashboard-data.csv"]);
        assert_eq!(engine.pipeline().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_engine_stops_on_first_error() {
        let engine = ReportEngine::new_with_monitoring(
            CountingPipeline {
                calls: AtomicUsize::new(0),
                fail_extract: true,
            },
            true,
        );

        assert!(engine.run().await.is_err());
        assert_eq!(engine.pipeline().calls.load(Ordering::SeqCst), 1);
    }
}
