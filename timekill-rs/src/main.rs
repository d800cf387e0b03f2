//! timekill-rs service binary
//!
//! Thin HTTP boundary over the core: quota-guarded humanization and
//! note-to-flashcard conversion, plus usage display.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use timekill_rs::config::Config;
use timekill_rs::error::TimekillError;
use timekill_rs::humanizer::mock::{MockDetector, MockRewriter};
use timekill_rs::humanizer::{
    DetectorProvider, HumanizerEngine, HumanizerOptions, OllamaRewriter, RetryPolicy,
    RewriteProvider, SaplingDetector,
};
use timekill_rs::quota::{QuotaGuard, SqliteCounterStore};
use timekill_rs::runs::RunStore;
use timekill_rs::service::TimekillService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

struct AppState {
    service: TimekillService,
    defaults: HumanizerOptions,
}

#[derive(Debug, Deserialize)]
struct HumanizeRequest {
    user_id: String,
    text: String,
    target_score: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ConvertRequest {
    user_id: String,
    notes: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, config_found) = if std::path::Path::new("config.toml").exists() {
        (Config::from_file("config.toml")?, true)
    } else {
        (Config::default(), false)
    };

    let level: Level = config.logging.level.parse().unwrap_or(Level::INFO);
    if config.logging.format == "json" {
        let subscriber = FmtSubscriber::builder().with_max_level(level).json().finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder().with_max_level(level).pretty().finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("🚀 Starting timekill-rs...");
    if !config_found {
        info!("No config file found, using defaults");
    }
    info!("  Listening on: {}", config.server.listen_addr);
    info!("  Provider mode: {}", config.providers.mode);
    info!("  Database: {}", config.storage.database_url);

    let retry = RetryPolicy {
        max_attempts: config.providers.retry_max_attempts,
        base_delay: Duration::from_millis(config.providers.retry_base_delay_ms),
        call_timeout: Duration::from_secs(config.providers.call_timeout_secs),
    };

    let (rewriter, detector): (Arc<dyn RewriteProvider>, Arc<dyn DetectorProvider>) =
        if config.providers.mode == "live" {
            info!("🤖 Using Ollama rewriter ({})", config.providers.ollama_model);
            (
                Arc::new(
                    OllamaRewriter::new(config.providers.ollama_model.clone())
                        .with_base_url(config.providers.ollama_url.clone()),
                ),
                Arc::new(
                    SaplingDetector::new(config.providers.sapling_api_key.clone())
                        .with_base_url(config.providers.sapling_url.clone()),
                ),
            )
        } else {
            info!("🤖 Using mock providers");
            (Arc::new(MockRewriter::new()), Arc::new(MockDetector::new()))
        };

    let runs = Arc::new(RunStore::new(&config.storage.database_url).await?);
    let counters = Arc::new(SqliteCounterStore::new(&config.storage.database_url).await?);

    let quota = QuotaGuard::new(counters, Arc::clone(&runs) as _);
    let engine = HumanizerEngine::new(rewriter, detector, retry);
    let service = TimekillService::new(quota, engine, runs);

    let defaults = HumanizerOptions {
        target_score: config.humanizer.target_score,
        max_iterations: config.humanizer.max_iterations,
        similarity_floor: config.humanizer.similarity_floor,
        deadline: Some(Duration::from_secs(config.humanizer.deadline_secs)),
    };

    let state = Arc::new(AppState { service, defaults });

    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/humanize", post(humanize_handler))
        .route("/convert", post(convert_handler))
        .route("/usage/:user_id", get(usage_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = config.server.listen_addr.clone();
    info!("🌐 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "timekill-rs",
        "version": "0.1.0"
    }))
}

async fn humanize_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<HumanizeRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    info!("📥 Humanize request from {}", payload.user_id);

    let mut options = state.defaults.clone();
    if let Some(target) = payload.target_score {
        options.target_score = target;
    }
    if let Some(max) = payload.max_iterations {
        options.max_iterations = max;
    }

    let outcome = state
        .service
        .humanize(&payload.user_id, &payload.text, options)
        .await
        .map_err(error_response)?;

    Ok(Json(outcome))
}

async fn convert_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ConvertRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    info!("📥 Convert request from {}", payload.user_id);

    let outcome = state
        .service
        .convert_document(&payload.user_id, &payload.notes)
        .await
        .map_err(error_response)?;

    Ok(Json(outcome))
}

async fn usage_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let report = state
        .service
        .usage(&user_id)
        .await
        .map_err(error_response)?;

    Ok(Json(report))
}

fn error_response(e: TimekillError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &e {
        TimekillError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        TimekillError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        TimekillError::QuotaStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        TimekillError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}
