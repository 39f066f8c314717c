//! The scan entry point: one image in, one result (or error) out.
//!
//! [`Extractor::extract`] is the only function the HTTP layer and the CLI
//! call. It builds the [`ExtractionRequest`], makes exactly one call to the
//! [`VisionBackend`], and parses the reply. Nothing is cached: scanning the
//! same image twice makes two upstream calls.

use crate::config::{ScanConfig, MODEL_ENV, PROVIDER_ENV};
use crate::error::ScanError;
use crate::output::{ScanOutput, ScanStats};
use crate::pipeline::llm::{ExtractionRequest, LlmBackend, VisionBackend};
use crate::pipeline::parse::parse_reply;
use crate::pipeline::upload::LicenseImage;
use crate::prompts::{is_no_license_reply, DEFAULT_SYSTEM_PROMPT, EXTRACTION_INSTRUCTION};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Parse the reply even when the model says no license is visible.
    pub force_extraction: bool,
}

/// Reads license fields through a [`VisionBackend`].
///
/// Cheap to share: hold it in an `Arc` and call [`extract`](Self::extract)
/// from as many requests as you like.
pub struct Extractor {
    backend: Arc<dyn VisionBackend>,
    system_prompt: String,
}

impl Extractor {
    /// Wrap an existing backend, using the default system prompt.
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self {
            backend,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Build an extractor backed by the LLM provider the config resolves to.
    ///
    /// Fails with [`ScanError::ProviderNotConfigured`] when no provider can be
    /// created (typically: no API key in the environment).
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        let (provider, label) = resolve_provider(config)?;
        info!("Vision provider ready: {}", label);

        let backend = LlmBackend::new(provider, label)
            .with_sampling(config.temperature, config.max_tokens)
            .with_image_detail(config.image_detail.as_str());
        let extractor = Self::new(Arc::new(backend));

        Ok(match config.system_prompt {
            Some(ref prompt) => extractor.with_system_prompt(prompt.as_str()),
            None => extractor,
        })
    }

    /// `provider/model` label of the backend.
    pub fn model(&self) -> String {
        self.backend.label()
    }

    /// Read the fields off one license image.
    ///
    /// # Errors
    /// - [`ScanError::Upstream`] when the vision call fails
    /// - [`ScanError::NoLicenseDetected`] when the model reports no license
    ///   and `options.force_extraction` is off
    pub async fn extract(
        &self,
        image: LicenseImage,
        options: ExtractOptions,
    ) -> Result<ScanOutput, ScanError> {
        let total_start = Instant::now();
        info!(
            "Sending {} image {:?} ({} bytes) to {}",
            image.mime_type(),
            image.file_name().unwrap_or("<unnamed>"),
            image.len(),
            self.backend.label()
        );

        let request = ExtractionRequest {
            image,
            system_prompt: self.system_prompt.clone(),
            instruction: EXTRACTION_INSTRUCTION.to_string(),
        };

        let extraction_start = Instant::now();
        let reply = self.backend.complete(&request).await?;
        let extraction_ms = extraction_start.elapsed().as_millis() as u64;
        debug!("Model reply ({} chars): {}", reply.text.len(), reply.text);

        if is_no_license_reply(&reply.text) {
            if !options.force_extraction {
                warn!("Model found no driver's license in the image");
                return Err(ScanError::NoLicenseDetected);
            }
            debug!("No license detected, parsing anyway (force_extraction)");
        }

        let result = parse_reply(&reply.text);
        if result.is_unstructured() {
            warn!("No structured license data found, returning raw text");
        }

        let stats = ScanStats {
            extraction_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
        };
        info!(
            "Extracted {}/6 core fields in {}ms",
            result.core_field_count(),
            stats.total_ms
        );

        Ok(ScanOutput {
            result,
            response_text: reply.text,
            model: self.backend.label(),
            stats,
        })
    }

    /// Read an image file from disk and scan it.
    pub async fn extract_path(
        &self,
        path: impl AsRef<Path>,
        options: ExtractOptions,
    ) -> Result<ScanOutput, ScanError> {
        let image = LicenseImage::from_path(path).await?;
        self.extract(image, options).await
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// `provider/model` as reported by the provider itself.
fn provider_label(provider: &dyn LLMProvider) -> String {
    format!("{}/{}", provider.name(), provider.model())
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ScanError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ScanError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key (`OPENAI_API_KEY`, etc.) from the environment.
/// 3. **Environment pair** ([`PROVIDER_ENV`] + [`MODEL_ENV`]).
/// 4. **OpenAI if `OPENAI_API_KEY` is set**, else full auto-detection via
///    `ProviderFactory::from_env`.
///
/// The returned label always names the provider and model actually in use.
fn resolve_provider(config: &ScanConfig) -> Result<(Arc<dyn LLMProvider>, String), ScanError> {
    let provider = select_provider(config)?;
    let label = provider_label(provider.as_ref());
    Ok((provider, label))
}

fn select_provider(config: &ScanConfig) -> Result<Arc<dyn LLMProvider>, ScanError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (std::env::var(PROVIDER_ENV), std::env::var(MODEL_ENV)) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_vision_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ScanError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::VisionReply;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedBackend {
        reply: Result<String, String>,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl ScriptedBackend {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl VisionBackend for ScriptedBackend {
        fn label(&self) -> String {
            "scripted/test".to_string()
        }

        async fn complete(&self, request: &ExtractionRequest) -> Result<VisionReply, ScanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(request.system_prompt.clone());
            match &self.reply {
                Ok(text) => Ok(VisionReply {
                    text: text.clone(),
                    input_tokens: 900,
                    output_tokens: 60,
                }),
                Err(msg) => Err(ScanError::upstream(msg.clone())),
            }
        }
    }

    fn jpeg() -> LicenseImage {
        LicenseImage::new(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg").unwrap()
    }

    #[tokio::test]
    async fn extract_parses_reply_and_reports_stats() {
        let backend = ScriptedBackend::ok("Name: JANE DOE\nDOB: 01/01/1980");
        let extractor = Extractor::new(backend.clone());

        let out = extractor.extract(jpeg(), ExtractOptions::default()).await.unwrap();
        assert_eq!(out.result.name.as_deref(), Some("JANE DOE"));
        assert_eq!(out.response_text, "Name: JANE DOE\nDOB: 01/01/1980");
        assert_eq!(out.model, "scripted/test");
        assert_eq!(out.stats.input_tokens, 900);
        assert_eq!(out.stats.output_tokens, 60);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upstream_failure_propagates() {
        let backend = ScriptedBackend::failing("429 Too Many Requests");
        let extractor = Extractor::new(backend.clone());

        let err = extractor.extract(jpeg(), ExtractOptions::default()).await.unwrap_err();
        assert!(matches!(err, ScanError::Upstream { .. }));
        assert!(err.to_string().contains("429"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_license_is_an_error_unless_forced() {
        let backend = ScriptedBackend::ok("NO_LICENSE_DETECTED");
        let extractor = Extractor::new(backend.clone());

        let err = extractor.extract(jpeg(), ExtractOptions::default()).await.unwrap_err();
        assert!(matches!(err, ScanError::NoLicenseDetected));

        let forced = ExtractOptions {
            force_extraction: true,
        };
        let out = extractor.extract(jpeg(), forced).await.unwrap();
        assert_eq!(out.result.raw_text.as_deref(), Some("NO_LICENSE_DETECTED"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_scans_are_not_cached() {
        let backend = ScriptedBackend::ok("Name: A");
        let extractor = Extractor::new(backend.clone());

        extractor.extract(jpeg(), ExtractOptions::default()).await.unwrap();
        extractor.extract(jpeg(), ExtractOptions::default()).await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn system_prompt_override_is_sent() {
        let backend = ScriptedBackend::ok("Name: A");
        let extractor = Extractor::new(backend.clone()).with_system_prompt("custom prompt");

        extractor.extract(jpeg(), ExtractOptions::default()).await.unwrap();
        assert_eq!(
            backend.last_prompt.lock().unwrap().as_deref(),
            Some("custom prompt")
        );
    }

    #[tokio::test]
    async fn prebuilt_provider_label_comes_from_the_provider() {
        let mock = Arc::new(edgequake_llm::MockProvider::new());
        mock.add_response("Name: JANE DOE").await;
        let config = ScanConfig::builder()
            .model("gpt-4o")
            .provider(mock)
            .build()
            .unwrap();

        let extractor = Extractor::from_config(&config).unwrap();
        assert_eq!(extractor.model(), "mock/mock-model");

        let out = extractor.extract(jpeg(), ExtractOptions::default()).await.unwrap();
        assert_eq!(out.model, "mock/mock-model");
        assert_eq!(out.result.name.as_deref(), Some("JANE DOE"));
    }

    #[tokio::test]
    async fn extract_path_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just some text").unwrap();

        let backend = ScriptedBackend::ok("Name: A");
        let extractor = Extractor::new(backend.clone());
        let err = extractor
            .extract_path(&path, ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
