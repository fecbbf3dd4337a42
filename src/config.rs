//! Configuration types for invoice extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The config is created once at start-up
//! and shared read-only by every request; nothing in it is mutated while
//! documents are being processed.
//!
//! # Model chain
//! Models are tried in order until one returns usable JSON. The default chain
//! is a fast Gemini model followed by an older, more conservative one.
//! Any number of fallbacks may be configured.

use crate::error::InvoiceError;
use crate::pipeline::gateway::VisionModel;
use crate::pipeline::reconcile::DEFAULT_MISMATCH_TOLERANCE;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Provider used when a model spec does not name one.
pub const DEFAULT_PROVIDER: &str = "gemini";
/// First model tried.
pub const DEFAULT_PRIMARY_MODEL: &str = "gemini-flash-latest";
/// Model tried when the primary fails.
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-1.5-flash";

/// A named model on a named provider, e.g. `gemini:gemini-1.5-flash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: String,
    pub model: String,
}

impl ModelSpec {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

impl FromStr for ModelSpec {
    type Err = InvoiceError;

    /// Accepts `provider:model` or a bare model id (provider defaults to gemini).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (provider, model) = match s.split_once(':') {
            Some((p, m)) => (p.trim(), m.trim()),
            None => (DEFAULT_PROVIDER, s),
        };
        if provider.is_empty() || model.is_empty() {
            return Err(InvoiceError::InvalidConfig(format!(
                "Model spec must be 'provider:model' or 'model', got '{s}'"
            )));
        }
        Ok(Self::new(provider, model))
    }
}

/// Configuration for invoice extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_invoice::{ExtractionConfig, ModelSpec};
///
/// let config = ExtractionConfig::builder()
///     .models(vec![
///         ModelSpec::new("gemini", "gemini-flash-latest"),
///         ModelSpec::new("openai", "gpt-4.1-mini"),
///     ])
///     .mismatch_tolerance(0.5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Ordered model chain. Default: gemini-flash-latest, then gemini-1.5-flash.
    pub models: Vec<ModelSpec>,

    /// Pre-constructed models. When non-empty, replaces `models` entirely.
    ///
    /// Useful in tests, or when the caller wraps a provider with its own
    /// middleware (caching, rate limiting).
    pub vision_models: Vec<Arc<dyn VisionModel>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction is transcription; low temperature keeps the model faithful
    /// to the digits printed on the page.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// Long pharmacy bills with 60+ rows approach 3 000 output tokens of JSON.
    pub max_tokens: usize,

    /// Timeout for a single model attempt in seconds. Default: 60.
    ///
    /// A timed-out attempt counts as a failure and moves on to the next model.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Absolute difference between the item sum and the printed total that is
    /// tolerated before a mismatch warning is raised. Default: 1.0.
    ///
    /// Expressed in the document's currency units. Raise it for currencies
    /// with large nominal values, lower it for strict cent-level checks.
    pub mismatch_tolerance: f64,

    /// Custom extraction instruction. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Documents processed at once by [`crate::extract_batch`]. Default: 4.
    pub concurrency: usize,

    /// Optional progress callback for batch extraction.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            models: vec![
                ModelSpec::new(DEFAULT_PROVIDER, DEFAULT_PRIMARY_MODEL),
                ModelSpec::new(DEFAULT_PROVIDER, DEFAULT_FALLBACK_MODEL),
            ],
            vision_models: Vec::new(),
            temperature: 0.1,
            max_tokens: 4096,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            mismatch_tolerance: DEFAULT_MISMATCH_TOLERANCE,
            system_prompt: None,
            concurrency: 4,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vision_models: Vec<&str> = self.vision_models.iter().map(|m| m.id()).collect();
        f.debug_struct("ExtractionConfig")
            .field("models", &self.models)
            .field("vision_models", &vision_models)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("mismatch_tolerance", &self.mismatch_tolerance)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn models(mut self, models: Vec<ModelSpec>) -> Self {
        self.config.models = models;
        self
    }

    /// Append one model to the end of the chain.
    pub fn fallback_model(mut self, spec: ModelSpec) -> Self {
        self.config.models.push(spec);
        self
    }

    pub fn vision_models(mut self, models: Vec<Arc<dyn VisionModel>>) -> Self {
        self.config.vision_models = models;
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

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn mismatch_tolerance(mut self, tolerance: f64) -> Self {
        self.config.mismatch_tolerance = tolerance;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.models.is_empty() && c.vision_models.is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "At least one model must be configured".into(),
            ));
        }
        if !c.mismatch_tolerance.is_finite() || c.mismatch_tolerance < 0.0 {
            return Err(InvoiceError::InvalidConfig(format!(
                "Mismatch tolerance must be a finite number ≥ 0, got {}",
                c.mismatch_tolerance
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(InvoiceError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_is_primary_then_fallback() {
        let c = ExtractionConfig::default();
        assert_eq!(
            c.models,
            vec![
                ModelSpec::new("gemini", "gemini-flash-latest"),
                ModelSpec::new("gemini", "gemini-1.5-flash"),
            ]
        );
        assert_eq!(c.mismatch_tolerance, 1.0);
        assert_eq!(c.api_timeout_secs, 60);
    }

    #[test]
    fn model_spec_parsing() {
        assert_eq!(
            "openai:gpt-4.1-mini".parse::<ModelSpec>().unwrap(),
            ModelSpec::new("openai", "gpt-4.1-mini")
        );
        assert_eq!(
            " gemini-1.5-flash ".parse::<ModelSpec>().unwrap(),
            ModelSpec::new("gemini", "gemini-1.5-flash")
        );
        assert!("openai:".parse::<ModelSpec>().is_err());
        assert!("".parse::<ModelSpec>().is_err());
        assert_eq!(ModelSpec::new("a", "b").to_string(), "a:b");
    }

    #[test]
    fn empty_chain_is_rejected() {
        let err = ExtractionConfig::builder().models(vec![]).build().unwrap_err();
        assert!(err.to_string().contains("At least one model"));
    }

    #[test]
    fn bad_tolerance_is_rejected() {
        assert!(ExtractionConfig::builder()
            .mismatch_tolerance(-1.0)
            .build()
            .is_err());
        assert!(ExtractionConfig::builder()
            .mismatch_tolerance(f64::NAN)
            .build()
            .is_err());
        assert!(ExtractionConfig::builder()
            .mismatch_tolerance(0.0)
            .build()
            .is_ok());
    }

    #[test]
    fn builder_clamps() {
        let c = ExtractionConfig::builder()
            .temperature(9.0)
            .concurrency(0)
            .fallback_model(ModelSpec::new("openai", "gpt-4.1"))
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.models.len(), 3);
    }
}
