pub mod pipelines;

pub use pipelines::DashboardPipeline;
