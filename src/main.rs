use axum::extract::Extension;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use hireflow::config::AppConfig;
use hireflow::error::AppError;
use hireflow::offers::{offers_router, OfferService, RandomTokens};
use hireflow::pipeline::{pipeline_router, PipelineService};
use hireflow::store::{InMemoryOfferStore, InMemoryPipelineStore, LoggingMailer};
use hireflow::telemetry;

const DISPATCH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: Arc<PrometheusHandle>,
}

#[derive(Parser, Debug)]
#[command(
    name = "Hireflow",
    about = "Run the hiring pipeline and offer negotiation service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let Command::Serve(args) = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));
    serve(args).await
}

async fn serve(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let pipeline_store = Arc::new(InMemoryPipelineStore::default());
    let offer_store = Arc::new(InMemoryOfferStore::default());
    let mailer = Arc::new(LoggingMailer);
    let tokens = Arc::new(RandomTokens);

    let pipeline_service = Arc::new(PipelineService::new(
        pipeline_store.clone(),
        mailer.clone(),
        offer_store.clone(),
        config.company.clone(),
    ));
    let offer_service = Arc::new(OfferService::new(
        offer_store,
        pipeline_store,
        mailer,
        tokens,
        config.company.clone(),
    ));

    // Background sweep delivering deferred workflow sends once their
    // delay elapses.
    let dispatcher = pipeline_service.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DISPATCH_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(error) = dispatcher.dispatch_due(Utc::now()) {
                warn!(%error, "deferred send sweep failed");
            }
        }
    });

    let app = Router::new()
        .merge(pipeline_router(pipeline_service))
        .merge(offers_router(offer_service))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "hiring pipeline service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
