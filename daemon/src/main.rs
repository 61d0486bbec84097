//! Tanglepulse daemon — entry point for running confirmation sequences.

use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use clap::Parser;
use tokio::sync::mpsc;

use pulse_gateway::{DynGateway, NullGateway};
use pulse_sender::{
    init_logging, synthetic_source, Gateways, LogFormat, SenderConfig, SenderMetrics, SenderUpdate,
    Sequence, SequenceParams,
};

/// Promotions per bundle before the in-memory gateway reports confirmation.
const NULL_GATEWAY_CONFIRM_AFTER: u64 = 2;

#[derive(Parser)]
#[command(name = "pulse-daemon", about = "Tangle confirmation sequence daemon")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "tanglepulse.toml", env = "PULSE_CONFIG")]
    config: String,

    /// Log level override: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "PULSE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format override: "human" or "json".
    #[arg(long, env = "PULSE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Enable the Prometheus metrics endpoint.
    #[arg(long, env = "PULSE_ENABLE_METRICS")]
    metrics: bool,

    /// Metrics endpoint port override.
    #[arg(long, env = "PULSE_METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match SenderConfig::from_toml_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load {}: {err}; using default config", cli.config);
            SenderConfig::default()
        }
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if cli.metrics {
        config.metrics_enabled = true;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics_port = port;
    }

    init_logging(LogFormat::parse(&config.log_format), &config.log_level);
    tracing::info!(config = %cli.config, "starting tanglepulse daemon");

    let metrics = if config.metrics_enabled {
        let metrics = Arc::new(SenderMetrics::new());
        tokio::spawn(serve_metrics(Arc::clone(&metrics), config.metrics_port));
        Some(metrics)
    } else {
        None
    };

    let publish = if config.publish_updates {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(publish_updates(rx));
        Some(tx)
    } else {
        None
    };

    let enabled = config.enabled_sequences();
    if enabled.is_empty() {
        tracing::warn!("no enabled sequences configured");
    }
    for (seed, (name, params)) in enabled.into_iter().enumerate() {
        let gateways = build_gateways(params)?;
        let source = synthetic_source(seed as u64 + 1);
        let sequence = Sequence::new(
            name,
            params.clone(),
            gateways,
            source,
            metrics.clone(),
            publish.clone(),
        )?;
        tokio::spawn(sequence.run());
    }

    wait_for_signal().await;
    tracing::info!("shutting down");
    Ok(())
}

/// Build the three gateway handles for a sequence, sharing one instance
/// per distinct endpoint so the in-memory gateway observes all traffic.
fn build_gateways(params: &SequenceParams) -> anyhow::Result<Gateways> {
    let general = build_gateway(&params.endpoint)?;
    let promote = if params.promote_endpoint() == params.endpoint {
        Arc::clone(&general)
    } else {
        build_gateway(params.promote_endpoint())?
    };
    let reattach = if params.reattach_endpoint() == params.endpoint {
        Arc::clone(&general)
    } else if params.reattach_endpoint() == params.promote_endpoint() {
        Arc::clone(&promote)
    } else {
        build_gateway(params.reattach_endpoint())?
    };
    Ok(Gateways {
        gateway: general,
        promote_gateway: promote,
        reattach_gateway: reattach,
    })
}

/// Only the in-memory gateway is wired here; an HTTP node client lives
/// outside this workspace.
fn build_gateway(endpoint: &str) -> anyhow::Result<DynGateway> {
    if endpoint.starts_with("null://") {
        let gateway = NullGateway::new(endpoint);
        gateway.confirm_every_promotions(NULL_GATEWAY_CONFIRM_AFTER);
        Ok(Arc::new(gateway))
    } else {
        anyhow::bail!("unsupported gateway endpoint '{endpoint}': only null:// is built in")
    }
}

async fn metrics_handler(State(metrics): State<Arc<SenderMetrics>>) -> String {
    metrics.render()
}

async fn serve_metrics(metrics: Arc<SenderMetrics>, port: u16) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);
    let addr = format!("0.0.0.0:{port}");
    tracing::info!("metrics endpoint listening on {addr}");
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!("metrics server failed: {err}");
            }
        }
        Err(err) => tracing::error!("failed to bind metrics endpoint {addr}: {err}"),
    }
}

/// JSON-lines publisher for downstream consumers.
async fn publish_updates(mut updates: mpsc::Receiver<SenderUpdate>) {
    while let Some(update) = updates.recv().await {
        match serde_json::to_string(&update) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::error!("failed to serialize update: {err}"),
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::info!("received SIGINT"); }
        _ = terminate => { tracing::info!("received SIGTERM"); }
    }
}
