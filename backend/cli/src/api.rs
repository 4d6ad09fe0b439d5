use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use fundsync_config::FundSyncConfig;
use fundsync_extraction::client::IMAGE_FIELD;
use fundsync_reconcile::Pipeline;

pub const API_KEY_NOT_CONFIGURED: &str = "API_KEY_NOT_CONFIGURED";

/// Room for multipart boundaries and part headers on top of the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state for API handlers.
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<FundSyncConfig>,
}

/// Build the Axum router with all routes; unknown paths fall through to the
/// static asset directory.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let public_dir = ServeDir::new(&state.config.server.public_dir);

    Router::new()
        .route("/api/ocr", post(ocr))
        .route("/api/get-key", get(get_key))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .fallback_service(public_dir)
}

/// Upload refused before the pipeline ran.
struct UploadRejection {
    status: StatusCode,
    message: String,
}

impl UploadRejection {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for UploadRejection {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

/// Pull the `image` part out of the upload, enforcing type and size.
async fn read_image(
    multipart: Result<Multipart, MultipartRejection>,
    max_bytes: usize,
) -> Result<Bytes, UploadRejection> {
    let mut multipart = multipart.map_err(|e| UploadRejection::new(e.status(), e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadRejection::new(e.status(), e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        if !field.content_type().is_some_and(|ct| ct.starts_with("image/")) {
            return Err(UploadRejection::new(
                StatusCode::BAD_REQUEST,
                "only image files are accepted",
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| UploadRejection::new(e.status(), e.body_text()))?;
        if data.len() > max_bytes {
            return Err(UploadRejection::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("image exceeds the {max_bytes} byte limit"),
            ));
        }
        if data.is_empty() {
            break;
        }
        return Ok(data);
    }

    Err(UploadRejection::new(
        StatusCode::BAD_REQUEST,
        "please upload an image file",
    ))
}

/// Statement upload: extraction, reconciliation, ledger writes.
async fn ocr(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let key = state.config.api_key_status();
    if !key.configured {
        warn!(reason = %key.reason, "Refusing upload without an API key");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": format!("configuration error: {}", key.reason),
                "code": API_KEY_NOT_CONFIGURED,
            })),
        )
            .into_response();
    }

    let image = match read_image(multipart, state.config.server.max_upload_bytes).await {
        Ok(image) => image,
        Err(rejection) => {
            warn!(status = %rejection.status, error = %rejection.message, "Upload rejected");
            return rejection.into_response();
        }
    };

    info!(bytes = image.len(), "Statement upload received");
    let response = state.pipeline.process_statement_image(image).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response)).into_response()
}

/// Whether the proxy API key is configured.
async fn get_key(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!(state.config.api_key_status()))
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let redacted = state.config.redacted();
    Json(json!({
        "status": "healthy",
        "service": "fundsync",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "proxyServer": state.config.extraction.proxy_url,
        "apiKey": state.config.api_key_status(),
        "ledger": redacted["ledger"].clone(),
    }))
}
