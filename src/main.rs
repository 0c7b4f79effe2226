// Main entry point for the virtual try-on synthesis service

use tryon_workflow::{
    core::{types::*, Config},
    orchestration::SynthesisOrchestrator,
    services::{codec, diagnostics, providers::catalog},
    utils::Metrics,
};

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<SynthesisOrchestrator>,
    metrics: Metrics,
}

type ApiError = (StatusCode, String);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::new()?;

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "tryon_workflow={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== VIRTUAL TRY-ON SYNTHESIS ===");
    info!(
        "Config: timeout={}s circuit={}/{}s body={}MB",
        config.providers.timeout_seconds,
        config.circuit_breaker.failure_threshold,
        config.circuit_breaker.recovery_seconds,
        config.server.max_body_mb
    );

    // Initialize metrics
    let metrics = Metrics::new();

    let orchestrator = Arc::new(SynthesisOrchestrator::from_config(&config, Some(metrics.clone()))?);
    let state = AppState {
        orchestrator,
        metrics,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/providers", get(providers))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/synthesize", post(synthesize))
        .route("/synthesize/upload", post(synthesize_upload))
        .route("/diagnostics/validate", post(diagnostics_validate))
        .route("/diagnostics/probe", post(diagnostics_probe))
        .route("/diagnostics/self-test", get(diagnostics_self_test))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes()))
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                      - Root endpoint");
    info!("  GET  /health                - Health check");
    info!("  GET  /providers             - Provider catalog");
    info!("  GET  /metrics               - Prometheus metrics");
    info!("  GET  /stats                 - Detailed statistics");
    info!("  POST /synthesize            - Try-on from data URLs (JSON)");
    info!("  POST /synthesize/upload     - Try-on from files (multipart/form-data)");
    info!("  POST /diagnostics/validate  - Validate a data URL");
    info!("  POST /diagnostics/probe     - Probe a configured provider endpoint");
    info!("  GET  /diagnostics/self-test - Local compositing self-test");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Virtual Try-On Synthesis Service"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registry = state.orchestrator.registry();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "compositing_backend": registry.local().engine().backend_name(),
        "circuits": registry.circuit_stats(),
    }))
}

async fn providers() -> Json<&'static [ProviderDescriptor]> {
    Json(catalog::all())
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    serde_json::to_value(state.metrics.snapshot())
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialize metrics: {}", e),
            )
        })
}

#[derive(Debug, Deserialize)]
struct SynthesizeBody {
    person_image: Option<String>,
    garment_image: Option<String>,
    provider_id: String,
    credentials: Option<String>,
}

#[derive(Debug, Serialize)]
struct SynthesizeResponse {
    result: ResultBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<FallbackBody>,
}

#[derive(Debug, Serialize)]
struct ResultBody {
    /// Data URL for local results, provider URI for remote ones
    image: String,
    quality: String,
    source: ProviderId,
}

#[derive(Debug, Serialize)]
struct FallbackBody {
    provider: ProviderId,
    reason: &'static str,
    message: String,
}

impl From<SynthesisReport> for SynthesizeResponse {
    fn from(report: SynthesisReport) -> Self {
        let image = match &report.result.result_image {
            ResultImage::Encoded(encoded) => codec::encode(encoded),
            ResultImage::Uri(uri) => uri.clone(),
        };
        Self {
            result: ResultBody {
                image,
                quality: report.result.quality_label,
                source: report.result.source_provider,
            },
            fallback: report.fallback.map(|notice| FallbackBody {
                provider: notice.error.provider(),
                reason: notice.error.reason(),
                message: notice.message,
            }),
        }
    }
}

fn parse_provider(id: &str) -> Result<ProviderId, ApiError> {
    ProviderId::parse(id).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown provider: {}", id),
        )
    })
}

/// Decode an optional data URL; blank counts as absent so validation can name it
fn decode_optional(field: &str, value: Option<&str>) -> Result<Option<EncodedImage>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(data_url) => codec::decode(data_url)
            .map(Some)
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid {}: {}", field, e))),
        None => Ok(None),
    }
}

async fn run_synthesis(state: &AppState, request: SynthesisRequest) -> Result<Json<SynthesizeResponse>, ApiError> {
    match state.orchestrator.run(request).await {
        Ok(report) => {
            if let Some(ref notice) = report.fallback {
                warn!("{}", notice.message);
            }
            Ok(Json(report.into()))
        }
        Err(e) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
    }
}

/// Synthesize from data URLs
///
/// # Request Format:
/// - JSON `{person_image, garment_image, provider_id, credentials?}`
///
/// # Response:
/// - `{result: {image, quality, source}, fallback?: {provider, reason, message}}`
async fn synthesize(
    State(state): State<AppState>,
    Json(body): Json<SynthesizeBody>,
) -> Result<Json<SynthesizeResponse>, ApiError> {
    let provider_id = parse_provider(&body.provider_id)?;
    info!("Received synthesize request for {}", provider_id);

    let request = SynthesisRequest {
        person_image: decode_optional("person_image", body.person_image.as_deref())?,
        garment_image: decode_optional("garment_image", body.garment_image.as_deref())?,
        provider_id,
        credentials: body.credentials,
    };

    run_synthesis(&state, request).await
}

/// Synthesize from uploaded files
///
/// # Request Format:
/// - multipart/form-data
/// - File fields "person_image" and "garment_image"
/// - Text fields "provider_id" and "credentials" (optional)
async fn synthesize_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SynthesizeResponse>, ApiError> {
    let mut person_image = None;
    let mut garment_image = None;
    let mut provider_id = ProviderId::LOCAL;
    let mut credentials = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "person_image" | "garment_image" => {
                let declared = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?;
                if data.is_empty() {
                    continue;
                }

                let mime_type = declared
                    .filter(|m| m.starts_with("image/"))
                    .or_else(|| {
                        image::guess_format(&data)
                            .ok()
                            .map(|f| f.to_mime_type().to_string())
                    })
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                let image = EncodedImage::new(mime_type, data.to_vec())
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid {}: {}", name, e)))?;

                if name == "person_image" {
                    person_image = Some(image);
                } else {
                    garment_image = Some(image);
                }
            }
            "provider_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?;
                provider_id = parse_provider(&text)?;
            }
            "credentials" => {
                credentials = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Read error: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    info!("Received upload synthesize request for {}", provider_id);

    let request = SynthesisRequest {
        person_image,
        garment_image,
        provider_id,
        credentials,
    };

    run_synthesis(&state, request).await
}

#[derive(Debug, Deserialize)]
struct ValidateBody {
    data_url: String,
}

async fn diagnostics_validate(Json(body): Json<ValidateBody>) -> Json<diagnostics::ImageDataReport> {
    Json(diagnostics::validate_image_data(&body.data_url))
}

#[derive(Debug, Deserialize)]
struct ProbeBody {
    url: String,
    method: Option<String>,
}

async fn diagnostics_probe(
    State(state): State<AppState>,
    Json(body): Json<ProbeBody>,
) -> Result<Json<diagnostics::EndpointProbe>, ApiError> {
    let method = body.method.as_deref().unwrap_or("GET").to_uppercase();
    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid method: {}", e)))?;

    let registry = state.orchestrator.registry();
    let target = diagnostics::check_probe_target(&body.url, &method, &registry.endpoints()).map_err(|e| {
        warn!("Rejected probe of {}: {}", body.url, e);
        (StatusCode::FORBIDDEN, e.to_string())
    })?;

    Ok(Json(
        diagnostics::probe_endpoint(registry.http_client(), target.as_str(), method).await,
    ))
}

async fn diagnostics_self_test(State(state): State<AppState>) -> Json<diagnostics::SelfTestReport> {
    let engine = state.orchestrator.registry().local().engine();
    Json(diagnostics::compositing_self_test(engine).await)
}
