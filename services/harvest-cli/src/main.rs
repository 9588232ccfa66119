//! Catalog harvester.
//!
//! Loads catalog definitions, harvests every referenced provider and writes
//! one static JSON catalog per definition.

mod config_loader;
mod credentials;
mod http;
mod licenses;
mod writer;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use harvester::{CatalogBuilder, Clients};

use config_loader::{load_catalogs, load_settings, ConfigDirs};
use credentials::SentinelHubCredentials;
use http::HttpClients;
use licenses::SpdxLicenses;
use writer::CatalogWriter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(about = "Harvest provider metadata into static catalogs")]
struct Args {
    /// Directory holding catalog definition files
    #[arg(long, env = "HARVEST_CATALOGS_DIR", default_value = "catalogs")]
    catalogs_dir: PathBuf,

    /// Directory holding collection definition files
    #[arg(long, env = "HARVEST_COLLECTIONS_DIR", default_value = "collections")]
    collections_dir: PathBuf,

    /// Directory holding indicator definition files
    #[arg(long, env = "HARVEST_INDICATORS_DIR", default_value = "indicators")]
    indicators_dir: PathBuf,

    /// Where built catalogs are written
    #[arg(long, env = "HARVEST_OUTPUT_DIR", default_value = "build")]
    output_dir: PathBuf,

    /// Only build these catalogs (repeatable)
    #[arg(long = "catalog")]
    catalogs: Vec<String>,

    /// Engine settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "json")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(&args)?;
    info!("Starting catalog harvester");

    let settings = load_settings(args.settings.as_deref())?;
    let dirs = ConfigDirs {
        catalogs: args.catalogs_dir.clone(),
        collections: args.collections_dir.clone(),
        indicators: args.indicators_dir.clone(),
    };
    let definitions = load_catalogs(&dirs, &args.catalogs)?;
    info!(
        catalogs = ?definitions.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
        "Loaded catalog definitions"
    );
    anyhow::ensure!(!definitions.is_empty(), "No catalog definitions to build");

    let endpoints: Vec<(String, String)> = definitions
        .iter()
        .map(|d| (d.id.clone(), d.endpoint.clone()))
        .collect();

    let http = Arc::new(HttpClients::new()?);
    let clients = Clients {
        stac: http.clone(),
        tabular: http.clone(),
        capabilities: http.clone(),
        datacube: http.clone(),
        credentials: Arc::new(SentinelHubCredentials::from_env(http.client())),
        content: http,
        licenses: Arc::new(SpdxLicenses),
    };

    let report = CatalogBuilder::new(settings, clients)
        .build_all(definitions)
        .await;

    let writer = CatalogWriter::new(&args.output_dir);
    for catalog in &report.catalogs {
        let endpoint = endpoints
            .iter()
            .find(|(id, _)| *id == catalog.id)
            .map(|(_, endpoint)| endpoint.as_str())
            .unwrap_or_default();
        let path = writer
            .write(catalog, endpoint)
            .with_context(|| format!("Failed to write catalog {}", catalog.id))?;
        info!(catalog = %catalog.id, path = %path.display(), "Catalog written");
    }

    for failure in &report.failures {
        error!(
            catalog = %failure.catalog,
            collection = failure.error.collection().unwrap_or_default(),
            error = %failure.error,
            "Catalog build failed"
        );
    }

    report
        .into_result()
        .map(|_| ())
        .context("At least one catalog failed to build")
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    match args.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}
