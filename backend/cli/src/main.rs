mod api;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use fundsync_config::{config_file_path, load_and_prepare, process_env, FundSyncConfig, ValidationReport};
use fundsync_core::{LedgerStore, SystemClock};
use fundsync_extraction::ExtractionClient;
use fundsync_ledger::{EntityDirectory, NotionLedger};
use fundsync_logging::init_logger;
use fundsync_reconcile::{Pipeline, ReconciliationEngine};

use api::AppState;

#[derive(Parser)]
#[command(name = "fundsync")]
#[command(about = "fundsync: record fund statement returns in a Notion ledger")]
#[command(version)]
struct Cli {
    /// Path to the YAML config file (defaults to $FUNDSYNC_CONFIG or ./fundsync.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP front door
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Process one statement image and print the result as JSON
    Process {
        /// Statement screenshot to upload
        image: PathBuf,
        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },
    /// Query a running server's health endpoint
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env = process_env();
    let path = config_file_path(cli.config.as_deref());
    let (mut config, report) = load_and_prepare(&path, &env)
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    init_logger(&config.logging);
    for warning in &report.warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }

    match cli.command {
        Commands::Serve { port } => {
            ensure_valid(&report)?;
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await?;
        }
        Commands::Process { image, pretty } => {
            ensure_valid(&report)?;
            let success = process_once(&config, &image, pretty).await?;
            if !success {
                std::process::exit(1);
            }
        }
        Commands::Status => {
            let url = format!("http://localhost:{}/health", config.server.port);
            match reqwest::Client::new().get(&url).send().await {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("fundsync is not running on port {}", config.server.port);
                }
            }
        }
    }

    Ok(())
}

fn ensure_valid(report: &ValidationReport) -> Result<()> {
    if report.is_valid() {
        return Ok(());
    }
    for e in &report.errors {
        error!(path = %e.path, "{}", e.message);
    }
    bail!("Invalid configuration:\n{}", report.error_summary())
}

/// Wire the extraction client, the Notion ledger, and the engine together.
fn build_pipeline(config: &FundSyncConfig) -> Result<Pipeline> {
    let extractor = ExtractionClient::new(&config.extraction)?;
    let ledger: Arc<dyn LedgerStore> = Arc::new(NotionLedger::new(&config.ledger)?);

    let directory = EntityDirectory::new(ledger.clone(), config.ledger.properties.fund_name.clone());
    let engine = ReconciliationEngine::new(ledger, Arc::new(SystemClock))
        .with_strategy(config.matching.strategy);

    Ok(Pipeline::new(Arc::new(extractor), directory, engine))
}

async fn process_once(config: &FundSyncConfig, image: &Path, pretty: bool) -> Result<bool> {
    let key = config.api_key_status();
    if !key.configured {
        bail!("{}", key.reason);
    }

    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read image: {}", image.display()))?;
    if bytes.len() > config.server.max_upload_bytes {
        bail!(
            "{} is {} bytes; the limit is {}",
            image.display(),
            bytes.len(),
            config.server.max_upload_bytes
        );
    }

    let pipeline = build_pipeline(config)?;
    let response = pipeline.process_statement_image(Bytes::from(bytes)).await;

    let out = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{out}");
    Ok(response.success)
}

async fn run_server(config: FundSyncConfig) -> Result<()> {
    info!(
        port = config.server.port,
        bind = %config.server.bind_address,
        proxy = %config.extraction.proxy_url,
        config = %config.redacted(),
        "Starting fundsync front door"
    );

    let pipeline = build_pipeline(&config)?;
    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        config: Arc::new(config.clone()),
    });

    let app = api::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
