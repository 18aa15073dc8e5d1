use crate::domain::model::{DashboardReport, Dataset, FilterCriteria};
use crate::utils::error::Result;
use async_trait::async_trait;

/// File-save collaborator. Exports hand it finished bytes.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn source(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn file_name(&self) -> &str;
    fn criteria(&self) -> FilterCriteria;
    fn bundle_outputs(&self) -> bool;
    fn chart_columns(&self) -> bool;

    fn request_timeout_seconds(&self) -> Option<u64> {
        None
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Dataset>;
    async fn transform(&self, data: Dataset) -> Result<DashboardReport>;
    async fn load(&self, report: DashboardReport) -> Result<Vec<String>>;
}

/// Receives every newly filtered dataset.
pub trait FilterObserver {
    fn on_filter_change(&self, filtered: &Dataset);
}

impl<F> FilterObserver for F
where
    F: Fn(&Dataset),
{
    fn on_filter_change(&self, filtered: &Dataset) {
        self(filtered)
    }
}
