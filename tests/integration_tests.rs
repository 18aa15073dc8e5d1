use campaign_metrics::core::export::CATEGORY_SENTINEL;
use campaign_metrics::{CliConfig, DashboardPipeline, LocalStorage, ReportEngine, ReportError};
use clap::Parser;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

const CAMPAIGN_CSV: &str = "\
date,campaign,category,revenue,clicks
2024-01-01,Spring Sale,Email,100,10
2024-01-02,Winter Promo,Social,200,20
2024-01-03,Spring Sale,Email,300,30
";

fn cli_config(args: &[&str]) -> CliConfig {
    CliConfig::parse_from(std::iter::once("campaign-metrics").chain(args.iter().copied()))
}

fn engine_for(config: CliConfig) -> ReportEngine<DashboardPipeline<LocalStorage, CliConfig>> {
    let storage = LocalStorage::new(config.output_path.clone());
    ReportEngine::new(DashboardPipeline::new(storage, config))
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_end_to_end_report_from_http_csv() {
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/uploads/march");
        then.status(200)
            .header("Content-Type", "text/csv")
            .body(CAMPAIGN_CSV);
    });

    let source = server.url("/uploads/march");
    let config = cli_config(&[
        "--source",
        &source,
        "--output-path",
        &output_path,
        "--category",
        "Email",
        "--formats",
        "csv,json",
    ]);
    let outputs = engine_for(config).run().await.unwrap();

    api_mock.assert();
    assert_eq!(outputs.len(), 2);

    assert_eq!(
        read_json(&temp_dir.path().join("dashboard-data.json")),
        json!([
            {"date": "2024-01-01", "revenue": 100, "clicks": 10, "conversions": 0, "performance": 0},
            {"date": "2024-01-03", "revenue": 300, "clicks": 30, "conversions": 0, "performance": 0},
            {"date": CATEGORY_SENTINEL},
            {"date": "Email", "value": 2}
        ])
    );

    let csv = std::fs::read_to_string(temp_dir.path().join("dashboard-data.csv")).unwrap();
    let lines: Vec<&str> = csv.split("\r\n").collect();
    assert_eq!(lines[0], "date,revenue,clicks,conversions,performance,value");
    assert_eq!(lines[1], "2024-01-01,100,10,0,0,");
    assert_eq!(lines[3], "---Category Distribution---,,,,,");
    assert_eq!(lines[4], "Email,,,,,2");
}

#[tokio::test]
async fn test_semicolon_file_source_with_bundle_and_date_range() {
    let input_dir = TempDir::new().unwrap();
    let input_path = input_dir.path().join("march.csv");
    std::fs::write(
        &input_path,
        "date;category;revenue\n2024-01-01;Email;10\n2024-02-15;Social;20\n2024-03-01;Email;30\n",
    )
    .unwrap();

    let output_dir = TempDir::new().unwrap();
    let config = cli_config(&[
        "--source",
        input_path.to_str().unwrap(),
        "--output-path",
        output_dir.path().to_str().unwrap(),
        "--from",
        "2024-02-01",
        "--to",
        "2024-03-31",
        "--bundle",
        "--file-name",
        "q1",
    ]);
    let outputs = engine_for(config).run().await.unwrap();

    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].ends_with("q1.zip"));

    let zip_data = std::fs::read(output_dir.path().join("q1.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
    assert_eq!(archive.len(), 4);
    assert!(archive.by_name("q1.xlsx").is_ok());

    let mut json_text = String::new();
    archive
        .by_name("q1.json")
        .unwrap()
        .read_to_string(&mut json_text)
        .unwrap();
    let rows: Value = serde_json::from_str(&json_text).unwrap();
    assert_eq!(rows[0]["date"], "2024-02-15");
    assert_eq!(rows[1]["date"], "2024-03-01");
    assert_eq!(rows[1]["revenue"], 30);
    assert_eq!(rows[2]["date"], CATEGORY_SENTINEL);

    let mut filtered = String::new();
    archive
        .by_name("filtered.csv")
        .unwrap()
        .read_to_string(&mut filtered)
        .unwrap();
    assert!(!filtered.contains("2024-01-01"));
    assert!(filtered.contains("2024-02-15,Social,20"));
}

#[tokio::test]
async fn test_chart_columns_fan_out_by_ratio() {
    let input_dir = TempDir::new().unwrap();
    let input_path = input_dir.path().join("channels.csv");
    std::fs::write(&input_path, "Channel,Amount\nA,50\nB,120\n").unwrap();

    let output_dir = TempDir::new().unwrap();
    let config = cli_config(&[
        "--source",
        input_path.to_str().unwrap(),
        "--output-path",
        output_dir.path().to_str().unwrap(),
        "--formats",
        "json",
        "--chart-columns",
    ]);
    engine_for(config).run().await.unwrap();

    assert_eq!(
        read_json(&output_dir.path().join("dashboard-data.json")),
        json!([
            {"date": "A", "revenue": 50, "clicks": 25, "conversions": 5, "performance": 1},
            {"date": "B", "revenue": 120, "clicks": 60, "conversions": 12, "performance": 1},
            {"date": CATEGORY_SENTINEL}
        ])
    );
}

#[tokio::test]
async fn test_single_column_upload_is_rejected() {
    let input_dir = TempDir::new().unwrap();
    let input_path = input_dir.path().join("broken.csv");
    std::fs::write(&input_path, "only\n1\n2\n").unwrap();

    let output_dir = TempDir::new().unwrap();
    let config = cli_config(&[
        "--source",
        input_path.to_str().unwrap(),
        "--output-path",
        output_dir.path().to_str().unwrap(),
    ]);
    let err = engine_for(config).run().await.unwrap_err();

    assert!(matches!(err, ReportError::ValidationError { .. }));
    assert!(!output_dir.path().join("dashboard-data.csv").exists());
}

#[tokio::test]
async fn test_missing_source_file_is_io_error() {
    let output_dir = TempDir::new().unwrap();
    let config = cli_config(&[
        "--source",
        "does/not/exist.csv",
        "--output-path",
        output_dir.path().to_str().unwrap(),
    ]);

    let err = engine_for(config).run().await.unwrap_err();
    assert!(matches!(err, ReportError::IoError(_)));
}
