//! # license-scan
//!
//! Read the fields of a U.S. driver's license from a photo using a Vision
//! Language Model (VLM), behind a small HTTP service.
//!
//! There is no OCR in this crate. The photo is forwarded to a hosted
//! multimodal model with a fixed prompt; the model's `Key: Value` answer is
//! mapped onto [`ExtractionResult`]. Anything the parser cannot place is kept
//! verbatim in `raw_text`.
//!
//! ## Request Flow
//!
//! ```text
//! HTTP upload
//!  │
//!  ├─ 1. Upload   presence + image/* content type check, bytes untouched
//!  ├─ 2. Encode   bytes → base64 ImageData
//!  ├─ 3. VLM      exactly one call to gpt-4o / claude / gemini / …
//!  ├─ 4. Parse    Key: Value lines → ExtractionResult
//!  └─ 5. Respond  JSON fields + model reply + timings
//! ```
//!
//! No state survives a request: nothing is cached, retried or stored.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use license_scan::{ExtractOptions, Extractor, LicenseImage, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let extractor = Extractor::from_config(&ScanConfig::default())?;
//!     let image = LicenseImage::from_path("license.jpg").await?;
//!     let output = extractor.extract(image, ExtractOptions::default()).await?;
//!     println!("{:?}", output.result.license_number);
//!     Ok(())
//! }
//! ```
//!
//! ## Serving
//!
//! ```rust,no_run
//! use license_scan::{server, Extractor, ScanConfig};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScanConfig::default();
//! let extractor = Arc::new(Extractor::from_config(&config)?);
//! let app = server::router(extractor, config.max_upload_bytes);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! server::serve(listener, app, async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `license-scan` binary (clap + anyhow + tracing-subscriber + dotenv) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::ScanError;
pub use extract::{ExtractOptions, Extractor};
pub use output::{ExtractionResult, ScanOutput, ScanStats};
pub use pipeline::llm::{ExtractionRequest, LlmBackend, VisionBackend, VisionReply};
pub use pipeline::upload::LicenseImage;
