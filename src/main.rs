use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use refund_desk::assessment::{
    assessment_router, AssessmentRequest, AssessmentService, ProfileScore,
};
use refund_desk::config::AppConfig;
use refund_desk::error::AppError;
use refund_desk::storage::CsvStore;
use refund_desk::telemetry;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Refund Assessment Desk",
    about = "Assess experience refund requests from the command line or serve the HTTP API",
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
    /// Run a one-shot assessment against the CSV dataset
    Assess(AssessArgs),
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

#[derive(Args, Debug)]
struct AssessArgs {
    /// Customer identifier
    #[arg(long)]
    customer: String,
    /// Booking identifier
    #[arg(long)]
    booking: String,
    /// Claimed refund reason (no_show, cancellation, partial_service,
    /// technical_issue, other)
    #[arg(long)]
    reason: String,
    /// Data directory holding bookings.csv and customers.csv
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Assessment reference time (YYYY-MM-DD HH:MM:SS; defaults to now)
    #[arg(long, value_parser = parse_reference_time)]
    as_of: Option<NaiveDateTime>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Assess(args) => run_assessment(args),
    }
}

fn parse_reference_time(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD HH:MM:SS ({err})"))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let store = Arc::new(CsvStore::open(&config.data_dir)?);
    info!(
        bookings = store.booking_count(),
        customers = store.customer_count(),
        "dataset loaded"
    );
    let service = Arc::new(AssessmentService::new(store, config.pipeline.clone()));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(assessment_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "refund assessment desk ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("refund assessment desk stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            // Without a signal handler the server simply runs until killed.
            warn!("failed to listen for shutdown signal: {err}");
            std::future::pending::<()>().await;
        }
    }
}

async fn healthcheck() -> impl IntoResponse {
    StatusCode::OK
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    if state.readiness.load(Ordering::Acquire) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn run_assessment(args: AssessArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let data_dir = args.data_dir.unwrap_or(config.data_dir);
    let store = Arc::new(CsvStore::open(&data_dir)?);
    let service = AssessmentService::new(store, config.pipeline);

    let request = AssessmentRequest {
        customer_id: args.customer,
        booking_id: args.booking,
        refund_reason: args.reason,
    };
    let now = args.as_of.unwrap_or_else(|| Local::now().naive_local());
    let outcome = service.assess(&request, now)?;

    println!("Classification: {}", outcome.classification.label());
    if let Some(score) = outcome.risk_score {
        println!("Risk score: {score}");
    }
    println!("Recommended: {}", outcome.recommended_action);

    println!("\nResolution options");
    for option in &outcome.resolution_options {
        println!("- {option:?}");
    }

    if !outcome.key_factors.is_empty() {
        println!("\nKey factors");
        for factor in &outcome.key_factors {
            println!("- {factor}");
        }
    }

    if !outcome.mitigating_factors.is_empty() {
        println!("\nMitigating factors");
        for factor in &outcome.mitigating_factors {
            println!("- {factor}");
        }
    }

    if let Some(ProfileScore::Scored(scored)) = &outcome.evidence.profile {
        println!("\nSignal breakdown (baseline {})", scored.score);
        for signal in &scored.signals {
            println!(
                "- {} | {} | {}/{} | {}",
                signal.signal.label(),
                signal.raw_value,
                signal.score,
                signal.weight,
                signal.explanation
            );
        }
    }

    if let Some(request_score) = &outcome.evidence.request {
        println!("\nRequest modifiers (final {})", request_score.final_score);
        for modifier in &request_score.modifiers {
            let effect = modifier.effect.as_deref().unwrap_or("—");
            println!(
                "- {} | applied: {} | {} | {}",
                modifier.modifier, modifier.applied, effect, modifier.reason
            );
        }
    }

    Ok(())
}
