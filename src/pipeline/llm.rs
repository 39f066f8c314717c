//! The vision-model seam.
//!
//! [`VisionBackend`] is the one narrow interface between this crate and the
//! hosted model: an [`ExtractionRequest`] goes in, the model's reply text
//! comes out. The production implementation, [`LlmBackend`], drives any
//! `edgequake-llm` provider; tests plug in a fake without touching the HTTP
//! layer.
//!
//! Each call is a single request/response exchange. There is no retry, no
//! backoff and no timeout beyond the provider's HTTP client default: an
//! upstream failure is reported to the caller immediately as
//! [`ScanError::Upstream`].

use crate::error::ScanError;
use crate::pipeline::encode::encode_image;
use crate::pipeline::upload::LicenseImage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// One extraction call: the image plus the fixed instructions.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub image: LicenseImage,
    pub system_prompt: String,
    pub instruction: String,
}

/// What the model said, plus token accounting when the provider reports it.
#[derive(Debug, Clone, Default)]
pub struct VisionReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A hosted multimodal completion service.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Human-readable `provider/model` label for logs and responses.
    fn label(&self) -> String;

    /// Send one request and wait for the reply.
    async fn complete(&self, request: &ExtractionRequest) -> Result<VisionReply, ScanError>;
}

/// [`VisionBackend`] over an `edgequake-llm` provider.
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
    image_detail: String,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature: 0.0,
            max_tokens: 500,
            image_detail: "high".to_string(),
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_image_detail(mut self, detail: impl Into<String>) -> Self {
        self.image_detail = detail.into();
        self
    }
}

#[async_trait]
impl VisionBackend for LlmBackend {
    fn label(&self) -> String {
        self.label.clone()
    }

    /// ## Message Layout
    ///
    /// 1. **System message**: the extraction prompt (or the configured override)
    /// 2. **User message**: the short instruction with the license image attached
    async fn complete(&self, request: &ExtractionRequest) -> Result<VisionReply, ScanError> {
        let start = Instant::now();
        let image_data = encode_image(&request.image, &self.image_detail);
        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user_with_images(request.instruction.as_str(), vec![image_data]),
        ];
        let options = build_options(self.temperature, self.max_tokens);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| {
                warn!("{}: vision call failed after {:?}: {}", self.label, start.elapsed(), e);
                ScanError::upstream(format!("{e}"))
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(ScanError::upstream("vision API returned an empty response"));
        }

        Ok(VisionReply {
            text: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }
}

/// Build `CompletionOptions` from the sampling settings.
fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}
