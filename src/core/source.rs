use crate::core::loader::{parse_csv, parse_json, LoadOptions};
use crate::domain::model::Dataset;
use crate::utils::error::{ReportError, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    /// `.json` files are JSON, everything else is treated as CSV.
    pub fn from_path(path: &str) -> Self {
        match Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => SourceFormat::Json,
            _ => SourceFormat::Csv,
        }
    }

    /// JSON when the first non-whitespace byte (after a UTF-8 BOM) opens an
    /// array or object.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match body.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'[') | Some(b'{') => Some(SourceFormat::Json),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
        if mime.ends_with("json") {
            Some(SourceFormat::Json)
        } else if mime == "text/csv" || mime == "application/csv" {
            Some(SourceFormat::Csv)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    File(PathBuf),
    Http(Url),
}

impl DataSource {
    pub fn parse(location: &str) -> Result<Self> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(ReportError::MissingConfigError {
                field: "source".to_string(),
            });
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = Url::parse(trimmed).map_err(|e| ReportError::InvalidConfigValueError {
                field: "source".to_string(),
                value: trimmed.to_string(),
                reason: format!("Invalid URL format: {}", e),
            })?;
            Ok(DataSource::Http(url))
        } else {
            Ok(DataSource::File(PathBuf::from(trimmed)))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DataSource::File(path) => path.display().to_string(),
            DataSource::Http(url) => url.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub load: LoadOptions,
}

pub async fn fetch_dataset(
    client: &Client,
    source: &DataSource,
    options: &SourceOptions,
) -> Result<Dataset> {
    let (bytes, declared, path) = match source {
        DataSource::File(path) => {
            tracing::debug!("Reading dataset from file: {}", path.display());
            let bytes = tokio::fs::read(path).await?;
            (bytes, None, path.to_string_lossy().into_owned())
        }
        DataSource::Http(url) => {
            tracing::debug!("Requesting dataset from: {}", url);
            let mut request = client.get(url.clone());
            for (key, value) in &options.headers {
                request = request.header(key, value);
            }
            if let Some(timeout) = options.timeout {
                request = request.timeout(timeout);
            }

            let response = request.send().await?.error_for_status()?;
            tracing::debug!("Source response status: {}", response.status());

            let declared = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(SourceFormat::from_content_type);
            (response.bytes().await?.to_vec(), declared, url.path().to_string())
        }
    };

    let format = declared.unwrap_or_else(|| match SourceFormat::from_path(&path) {
        SourceFormat::Json => SourceFormat::Json,
        SourceFormat::Csv => SourceFormat::sniff(&bytes).unwrap_or(SourceFormat::Csv),
    });
    tracing::debug!("Parsing {} bytes as {:?}", bytes.len(), format);

    match format {
        SourceFormat::Csv => parse_csv(&bytes, &options.load),
        SourceFormat::Json => parse_json(&bytes),
    }
}
