//! Error type for the license-scan library.
//!
//! A scan either produces a best-effort field set or fails outright; there is
//! no partial success. Every failure is a [`ScanError`], and the HTTP layer
//! turns it into a status code plus a short JSON body in exactly one place
//! ([`ScanError::status_code`] and the `IntoResponse` impl below).
//!
//! * Caller mistakes (no file, not an image, body too large) are 4xx.
//! * Anything that went wrong talking to the vision model is
//!   [`ScanError::Upstream`] and maps to `502 Bad Gateway`.
//! * Startup and local problems (no provider, bad config) are 500s, though in
//!   practice the binary refuses to start before a request could see them.

use crate::prompts::PHOTO_SUGGESTIONS;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the license-scan library.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload is missing, malformed, or not an image.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The request body exceeded the configured upload limit.
    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// A local image file could not be read.
    #[error("Failed to read image '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model answered, but saw no driver's license in the image.
    #[error("Could not clearly detect a driver's license in the image")]
    NoLicenseDetected,

    /// The vision API call failed: network, auth, rate limit, or an empty reply.
    #[error("Upstream vision API error: {message}")]
    Upstream { message: String },

    /// The configured provider could not be initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Shorthand for [`ScanError::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ScanError::InvalidInput {
            message: message.into(),
        }
    }

    /// Shorthand for [`ScanError::Upstream`].
    pub fn upstream(message: impl Into<String>) -> Self {
        ScanError::Upstream {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ScanError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ScanError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ScanError::NoLicenseDetected => StatusCode::UNPROCESSABLE_ENTITY,
            ScanError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ScanError::ReadFailed { .. }
            | ScanError::ProviderNotConfigured { .. }
            | ScanError::InvalidConfig(_)
            | ScanError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to an HTTP caller.
    ///
    /// Upstream messages are passed through on purpose: they are the only
    /// diagnostic a caller gets for a rejected key or an exhausted quota.
    pub fn user_message(&self) -> String {
        match self {
            ScanError::ReadFailed { .. }
            | ScanError::ProviderNotConfigured { .. }
            | ScanError::InvalidConfig(_)
            | ScanError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ScanError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Scan failed: {}", self);
        } else {
            tracing::info!("Scan rejected: {}", self);
        }

        let mut body = json!({
            "status": "error",
            "message": self.user_message(),
        });
        if matches!(self, ScanError::NoLicenseDetected) {
            body["analysis"] = json!({ "license_detected": false });
            body["suggestions"] = json!(PHOTO_SUGGESTIONS);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_is_client_error() {
        let e = ScanError::invalid_input("no file");
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert!(e.to_string().contains("no file"));
    }

    #[test]
    fn upstream_is_bad_gateway() {
        let e = ScanError::upstream("connection reset");
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
        assert!(e.user_message().contains("connection reset"));
    }

    #[test]
    fn internal_details_are_hidden() {
        let e = ScanError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "OPENAI_API_KEY is not set".into(),
        };
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.user_message(), "Internal server error");
        assert!(e.to_string().contains("openai"));
    }

    #[test]
    fn payload_too_large_display() {
        let e = ScanError::PayloadTooLarge { limit: 1024 };
        assert_eq!(e.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(e.to_string().contains("1024"));
    }
}
