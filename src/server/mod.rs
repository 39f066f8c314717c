//! HTTP surface.
//!
//! | Route | Body | Purpose |
//! |-------|------|---------|
//! | `GET /` | none | upload page |
//! | `POST /scan` | `multipart/form-data`: `image` part, optional `force_extraction` | scan an uploaded photo |
//! | `POST /extract` | JSON `{"image": "<base64 or data URL>", "force_extraction": bool}` | scan an inline photo |
//!
//! Both scan routes validate the upload, then make exactly one
//! [`Extractor::extract`] call. Success is `200` with the fields under
//! `data`; every failure is a [`ScanError`] rendered by its `IntoResponse`
//! impl, and never carries a partial result.

use crate::error::ScanError;
use crate::extract::{ExtractOptions, Extractor};
use crate::output::{ExtractionResult, ScanOutput, ScanStats};
use crate::pipeline::upload::LicenseImage;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, warn, Level};

const INDEX_HTML: &str = include_str!("index.html");

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    extractor: Arc<Extractor>,
    max_upload_bytes: usize,
}

/// JSON body accepted by `POST /extract`.
#[derive(Debug, Deserialize)]
pub struct ExtractBody {
    pub image: Option<String>,
    #[serde(default)]
    pub force_extraction: bool,
}

/// Successful scan response.
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub status: &'static str,
    pub data: ExtractionResult,
    pub response_text: String,
    pub model: String,
    pub stats: ScanStats,
}

impl From<ScanOutput> for ScanResponse {
    fn from(output: ScanOutput) -> Self {
        Self {
            status: "success",
            data: output.result,
            response_text: output.response_text,
            model: output.model,
            stats: output.stats,
        }
    }
}

/// Build the application router.
pub fn router(extractor: Arc<Extractor>, max_upload_bytes: usize) -> Router {
    let state = AppState {
        extractor,
        max_upload_bytes,
    };

    Router::new()
        .route("/", get(index))
        .route("/scan", post(scan_upload))
        .route("/extract", post(extract_inline))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn scan_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ScanResponse>, ScanError> {
    let mut multipart = multipart.map_err(|e| {
        ScanError::invalid_input(format!("Expected a multipart/form-data upload: {e}"))
    })?;
    let limit = state.max_upload_bytes;

    let mut image: Option<LicenseImage> = None;
    let mut options = ExtractOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" | "file" if image.is_none() => {
                let declared = field.content_type().unwrap_or("").to_string();
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                debug!(
                    "Got part '{}' ({}, {} bytes, file {:?})",
                    name,
                    declared,
                    bytes.len(),
                    file_name
                );

                let upload = LicenseImage::new(bytes.to_vec(), &declared)?;
                image = Some(match file_name {
                    Some(n) => upload.with_file_name(n),
                    None => upload,
                });
            }
            "force_extraction" => {
                let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
                options.force_extraction = parse_flag(&value);
            }
            other => warn!("Ignoring part '{}'", other),
        }
    }

    let image = image.ok_or_else(|| {
        ScanError::invalid_input("No image file provided (expected a part named 'image')")
    })?;
    let output = state.extractor.extract(image, options).await?;
    Ok(Json(output.into()))
}

async fn extract_inline(
    State(state): State<AppState>,
    body: Result<Json<ExtractBody>, JsonRejection>,
) -> Result<Json<ScanResponse>, ScanError> {
    let Json(body) = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ScanError::PayloadTooLarge {
                limit: state.max_upload_bytes,
            }
        } else {
            ScanError::invalid_input(format!("No JSON data provided: {}", e.body_text()))
        }
    })?;

    let encoded = body
        .image
        .ok_or_else(|| ScanError::invalid_input("No image data provided"))?;
    debug!("Received image data of length: {}", encoded.len());

    let image = LicenseImage::from_base64(&encoded)?;
    let options = ExtractOptions {
        force_extraction: body.force_extraction,
    };
    let output = state.extractor.extract(image, options).await?;
    Ok(Json(output.into()))
}

fn multipart_error(e: MultipartError, limit: usize) -> ScanError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ScanError::PayloadTooLarge { limit }
    } else {
        ScanError::invalid_input(format!("Failed to parse multipart data: {}", e.body_text()))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
