use campaign_metrics::config::toml_config::TomlConfig;
use campaign_metrics::core::export::ExportFormat;
use campaign_metrics::core::source::DataSource;
use campaign_metrics::domain::ports::ConfigProvider;
use campaign_metrics::utils::{logger, validation::Validate};
use campaign_metrics::{DashboardPipeline, LocalStorage, ReportEngine};
use anyhow::Context;
use clap::Parser;

#[derive(Parser)]
#[command(name = "toml-report")]
#[command(about = "Dashboard report driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "report.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override bundling setting from config
    #[arg(long)]
    bundle: Option<bool>,

    /// Show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose, args.json_logs);

    tracing::info!("🚀 Starting TOML-based dashboard report");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Some(bundle) = args.bundle {
        config.load.bundle = Some(bundle);
        tracing::info!("🔧 Bundling overridden to: {}", bundle);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No files will be written");
        perform_dry_run(&config)?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = DashboardPipeline::new(storage, config);
    let engine = ReportEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(outputs) => {
            tracing::info!("✅ Dashboard report completed");
            println!("✅ Dashboard report completed");
            for path in outputs {
                println!("📁 {}", path);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Report failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Report: {}", config.report.name);
    if let Some(description) = &config.report.description {
        println!("  Description: {}", description);
    }
    println!("  Source: {}", config.source());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.load.output_formats.join(", "));
    println!("  Bundle: {}", config.bundle_outputs());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) -> anyhow::Result<()> {
    println!("🔍 Dry Run Analysis:");
    println!();

    let source = DataSource::parse(config.source())
        .with_context(|| format!("Invalid source location: {}", config.source()))?;
    println!("📡 Data Source:");
    match &source {
        DataSource::File(path) => println!("  File: {}", path.display()),
        DataSource::Http(url) => {
            println!("  URL: {}", url);
            println!("  Headers: {} custom headers", config.request_headers().len());
            if let Some(timeout) = config.request_timeout_seconds() {
                println!("  Timeout: {}s", timeout);
            }
        }
    }
    if config.chart_columns() {
        println!("  First two columns read as label/value");
    }

    let criteria = config.criteria();
    println!();
    println!("🔎 Filter:");
    if criteria.is_empty() {
        println!("  All rows kept");
    } else {
        if !criteria.search_term.is_empty() {
            println!("  Search: {}", criteria.search_term);
        }
        if criteria.filters_category() {
            println!("  Category: {}", criteria.category);
        }
        if let Some(range) = criteria.date_range {
            println!("  Dates: {} to {}", range.start, range.end);
        }
    }

    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_path());
    if config.bundle_outputs() {
        println!("  Bundle: {}.zip", config.file_name());
    } else {
        for format in &config.load.output_formats {
            let format: ExportFormat = format.parse()?;
            println!("  {}.{}", config.file_name(), format.extension());
        }
    }

    println!();
    println!("✅ Dry run analysis complete.");

    Ok(())
}
