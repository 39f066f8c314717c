//! Image encoding: [`LicenseImage`] → base64 `ImageData`.
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 payloads
//! embedded in the JSON request body. The uploaded bytes are forwarded as-is
//! under their declared MIME type; there is no re-encoding step.

use crate::pipeline::upload::LicenseImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap an uploaded image for the vision API.
///
/// `detail` is the provider tiling hint. `"high"` lets GPT-4-class models
/// spend several tiles on the card, which is what keeps the DD# and
/// restriction codes legible.
pub fn encode_image(image: &LicenseImage, detail: &str) -> ImageData {
    let b64 = STANDARD.encode(image.bytes());
    debug!(
        "Encoded {} ({} bytes) → {} bytes base64",
        image.mime_type(),
        image.len(),
        b64.len()
    );
    ImageData::new(b64, image.mime_type()).with_detail(detail)
}
