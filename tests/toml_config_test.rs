use campaign_metrics::utils::validation::Validate;
use campaign_metrics::{DashboardPipeline, LocalStorage, ReportEngine, TomlConfig};
use httpmock::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

#[tokio::test]
async fn test_toml_report_with_headers_and_filter() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/dashboard/upload")
            .header("authorization", "Bearer secret");
        then.status(200).json_body(json!({
            "success": true,
            "data": {"uploadedData": [
                {"Date": "2024-01-01", "Campaign": "Spring Sale", "category": "Email", "Revenue": "120.5", "Clicks": "12"},
                {"Date": "2024-01-02", "Campaign": "Winter Promo", "category": "Social", "Revenue": "80", "Clicks": "8"},
                {"Date": "2024-01-03", "Campaign": "Spring Sale", "category": "Social", "Revenue": "40", "Clicks": "4"}
            ]}
        }));
    });

    let output_dir = TempDir::new().unwrap();
    let toml_content = format!(
        r#"
[report]
name = "toml-integration"

[source]
location = "{}"
timeout_seconds = 5

[source.headers]
Authorization = "Bearer secret"

[filter]
search = "spring"

[load]
output_path = "{}"
output_formats = ["json"]
"#,
        server.url("/dashboard/upload"),
        output_dir.path().display()
    );

    let config = TomlConfig::from_toml_str(&toml_content).unwrap();
    config.validate().unwrap();

    let storage = LocalStorage::new(config.load.output_path.clone());
    let engine = ReportEngine::new(DashboardPipeline::new(storage, config));
    engine.run().await.unwrap();

    api_mock.assert();
    let rows: Value = serde_json::from_slice(
        &std::fs::read(output_dir.path().join("dashboard-data.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        rows,
        json!([
            {"date": "2024-01-01", "revenue": 120.5, "clicks": 12, "conversions": 0, "performance": 0},
            {"date": "2024-01-03", "revenue": 40, "clicks": 4, "conversions": 0, "performance": 0},
            {"date": "---Category Distribution---"},
            {"date": "Email", "value": 1},
            {"date": "Social", "value": 1}
        ])
    );
}
