//! NebulaFS: a single-node, S3-style object store over a local filesystem.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use nebulafs_api::{create_router, AppState};
use nebulafs_core::config::{Config, LogFormat};
use nebulafs_storage::{BlobStore, ExpirySweeper, MultipartCoordinator, SqliteMetadataStore};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = load_config(&args.config)?;
            config.validate().context("invalid configuration")?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.server.threads.max(1))
                .enable_all()
                .build()
                .context("failed to build runtime")?;
            runtime.block_on(run_server(config))
        }
        Commands::Version => {
            println!("nebulafs {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_server(config: Config) -> Result<()> {
    init_logging(&config)?;

    let metrics_handle =
        PrometheusBuilder::new().install_recorder().context("failed to install metrics recorder")?;
    nebulafs_api::init_metrics();

    let db_path = config.storage.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let metadata = Arc::new(
        SqliteMetadataStore::open(&db_path).context("failed to open metadata store")?,
    );
    let blob = Arc::new(
        BlobStore::new(config.storage.base_path.clone(), config.storage.temp_path.clone())
            .await
            .context("failed to initialize blob store")?,
    );
    let multipart = Arc::new(MultipartCoordinator::new(
        metadata.clone(),
        blob.clone(),
        config.storage.multipart.max_upload_ttl_seconds,
    ));

    if config.cleanup.enabled {
        let sweeper = ExpirySweeper::new(metadata.clone(), blob.clone(), config.cleanup.clone());
        tokio::spawn(sweeper.run());
    }

    let config = Arc::new(config);
    let state = AppState {
        metadata,
        blob,
        multipart,
        config: config.clone(),
        metrics: Some(metrics_handle),
    };
    let app = create_router(state);

    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host: {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    if config.server.tls.enabled {
        serve_tls(addr, &config, app).await
    } else {
        let listener = TcpListener::bind(addr).await.context("failed to bind to address")?;
        info!("server listening on http://{addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;
        info!("server shutdown complete");
        Ok(())
    }
}

async fn serve_tls(addr: SocketAddr, config: &Config, app: axum::Router) -> Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let rustls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
        &config.server.tls.certificate,
        &config.server.tls.private_key,
    )
    .await
    .context("failed to load TLS certificate or key")?;

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!("server listening on https://{addr}");
    axum_server::bind_rustls(addr, rustls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("server error")?;
    info!("server shutdown complete");
    Ok(())
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    match path {
        Some(p) => Config::from_file(p)
            .with_context(|| format!("failed to load config file: {}", p.display())),
        None => {
            // Try default locations before falling back to built-in defaults.
            let default_paths =
                [PathBuf::from("nebulafs.toml"), PathBuf::from("/etc/nebulafs/nebulafs.toml")];
            for p in &default_paths {
                if p.exists() {
                    return Config::from_file(p)
                        .with_context(|| format!("failed to load config file: {}", p.display()));
                }
            }
            Ok(Config::default())
        }
    }
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level_directive(config)));

    let fmt_layer = tracing_subscriber::fmt::layer();

    match config.observability.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt_layer.json()).init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        }
    }

    Ok(())
}

/// Map the configured level to a tracing directive. The config uses
/// `information` where tracing spells it `info`.
fn level_directive(config: &Config) -> &str {
    match config.observability.log_level.as_str() {
        "information" => "info",
        other => other,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("received SIGTERM, initiating shutdown");
        }
    }
}
