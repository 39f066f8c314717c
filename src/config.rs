//! Configuration types for license scanning.
//!
//! All scan behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. The config is read once at startup to construct an
//! [`crate::extract::Extractor`] and the HTTP router; nothing in it changes
//! per request.

use crate::error::ScanError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Environment variable naming the LLM provider (`openai`, `anthropic`, ...).
pub const PROVIDER_ENV: &str = "EDGEQUAKE_LLM_PROVIDER";

/// Environment variable naming the model ID.
pub const MODEL_ENV: &str = "EDGEQUAKE_MODEL";

/// Configuration for the scanner and its HTTP surface.
///
/// Built via [`ScanConfig::builder()`] or using [`ScanConfig::default()`].
///
/// # Example
/// ```rust
/// use license_scan::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .model("gpt-4o-mini")
///     .max_tokens(400)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// LLM model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Transcription wants the most literal reading of the card, not variety.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 500.
    ///
    /// Fifteen short `Key: Value` lines fit comfortably.
    pub max_tokens: usize,

    /// Image detail hint forwarded to the provider ("low", "high", "auto"). Default: "high".
    ///
    /// License fine print (DD#, restrictions) is lost at "low".
    pub image_detail: String,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Largest accepted request body in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 500,
            image_detail: "high".to_string(),
            system_prompt: None,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("image_detail", &self.image_detail)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn image_detail(mut self, detail: impl Into<String>) -> Self {
        self.config.image_detail = detail.into().to_lowercase();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ScanError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.max_upload_bytes == 0 {
            return Err(ScanError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if !matches!(c.image_detail.as_str(), "low" | "high" | "auto") {
            return Err(ScanError::InvalidConfig(format!(
                "image detail must be low, high or auto, got '{}'",
                c.image_detail
            )));
        }
        if c.system_prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(ScanError::InvalidConfig(
                "system prompt override is empty".into(),
            ));
        }
        Ok(self.config)
    }
}
