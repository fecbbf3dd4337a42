//! Model gateway: send the image to the model chain, get JSON back.
//!
//! The gateway is the only stage with network I/O to the model. It walks an
//! ordered list of [`VisionModel`]s, giving each one attempt bounded by a
//! timeout, and stops at the first reply that parses as a JSON object.
//!
//! ## Failure is data
//!
//! [`ModelGateway::extract`] never returns an error. When every model fails,
//! it returns an empty extraction whose `fraud_flags` carry an
//! `AI Error: …` entry describing the last failure. The rest of the pipeline
//! treats that exactly like a model that found no items, so one bad AI call
//! never aborts the request.

use crate::config::{ExtractionConfig, ModelSpec};
use crate::error::{AttemptError, InvoiceError};
use crate::pipeline::encode::encode_image;
use crate::pipeline::preprocess::FALLBACK_MIME;
use crate::prompts::{
    DEFAULT_EXTRACTION_PROMPT, KEY_FRAUD_FLAGS, KEY_INVOICE_TOTAL, KEY_PAGES,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Raw text reply from one model call.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A vision-capable model: image + instruction in, text out.
///
/// Implemented by [`LlmVisionModel`] for real providers. Tests and callers
/// with custom transports can implement it directly.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Identifier used in logs and error messages.
    fn id(&self) -> &str;

    /// Run one completion. Errors are reported, never retried, here.
    async fn complete(&self, instruction: &str, image: ImageData)
        -> Result<ModelReply, AttemptError>;
}

/// `response_format` value that puts providers into JSON-only output.
pub const JSON_RESPONSE_FORMAT: &str = "json_object";

/// [`VisionModel`] backed by an `edgequake-llm` provider.
pub struct LlmVisionModel {
    id: String,
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmVisionModel {
    pub fn new(
        id: impl Into<String>,
        provider: Arc<dyn LLMProvider>,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            id: id.into(),
            provider,
            options: build_options(config),
        }
    }

    /// Instantiate the named provider; reads its API key from the environment.
    pub fn from_spec(spec: &ModelSpec, config: &ExtractionConfig) -> Result<Self, InvoiceError> {
        let provider = ProviderFactory::create_llm_provider(&spec.provider, &spec.model).map_err(
            |e| InvoiceError::ProviderNotConfigured {
                provider: spec.provider.clone(),
                model: spec.model.clone(),
                hint: format!("{e}"),
            },
        )?;
        Ok(Self::new(spec.model.clone(), provider, config))
    }
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(
        &self,
        instruction: &str,
        image: ImageData,
    ) -> Result<ModelReply, AttemptError> {
        // Instruction travels with the image in one user turn; some providers
        // ignore system messages on vision requests.
        let messages = vec![ChatMessage::user_with_images(instruction, vec![image])];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| AttemptError::Api {
                model: self.id.clone(),
                detail: e.to_string(),
            })?;

        Ok(ModelReply {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Completion options for every model in the chain: sampling from the
/// config, JSON-only output.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        response_format: Some(JSON_RESPONSE_FORMAT.to_string()),
        ..Default::default()
    }
}

/// What the gateway produced for one image.
#[derive(Debug, Clone)]
pub struct GatewayOutcome {
    /// Parsed model JSON, or the empty extraction on total failure.
    pub raw: Value,
    /// Model that answered, `None` when every model failed.
    pub model: Option<String>,
    /// Failed attempts, in chain order.
    pub failures: Vec<AttemptError>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

impl GatewayOutcome {
    pub fn succeeded(&self) -> bool {
        self.model.is_some()
    }
}

/// Ordered model chain with a per-attempt timeout.
pub struct ModelGateway {
    models: Vec<Arc<dyn VisionModel>>,
    instruction: String,
    attempt_timeout: Duration,
}

impl ModelGateway {
    pub fn new(models: Vec<Arc<dyn VisionModel>>) -> Self {
        Self {
            models,
            instruction: DEFAULT_EXTRACTION_PROMPT.to_string(),
            attempt_timeout: Duration::from_secs(60),
        }
    }

    /// Build the chain described by `config`.
    ///
    /// Pre-built `vision_models` win; otherwise every [`ModelSpec`] is
    /// instantiated through the provider factory. A spec that cannot be
    /// instantiated is a configuration error.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, InvoiceError> {
        let models: Vec<Arc<dyn VisionModel>> = if !config.vision_models.is_empty() {
            config.vision_models.clone()
        } else {
            config
                .models
                .iter()
                .map(|spec| {
                    LlmVisionModel::from_spec(spec, config)
                        .map(|m| Arc::new(m) as Arc<dyn VisionModel>)
                })
                .collect::<Result<_, _>>()?
        };

        if models.is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "At least one model must be configured".into(),
            ));
        }

        let mut gateway = Self::new(models)
            .with_attempt_timeout(Duration::from_secs(config.api_timeout_secs));
        if let Some(ref prompt) = config.system_prompt {
            gateway = gateway.with_instruction(prompt.clone());
        }
        Ok(gateway)
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Model ids in the order they will be tried.
    pub fn model_ids(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.id()).collect()
    }

    /// Encode raw image bytes and run the chain over them.
    pub async fn extract_image_bytes(&self, bytes: &[u8]) -> GatewayOutcome {
        let mime = image::guess_format(bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or(FALLBACK_MIME);
        self.extract(&encode_image(bytes, mime)).await
    }

    /// Try each model in turn; never fails.
    pub async fn extract(&self, image: &ImageData) -> GatewayOutcome {
        let start = Instant::now();
        let mut failures = Vec::new();

        for (position, model) in self.models.iter().enumerate() {
            if position > 0 {
                warn!("Falling back to model '{}'", model.id());
            }
            info!("Sending request to {}", model.id());

            match self.attempt(model.as_ref(), image).await {
                Ok((raw, reply)) => {
                    let duration = start.elapsed();
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        model.id(),
                        reply.input_tokens,
                        reply.output_tokens,
                        duration
                    );
                    return GatewayOutcome {
                        raw,
                        model: Some(model.id().to_string()),
                        failures,
                        input_tokens: reply.input_tokens,
                        output_tokens: reply.output_tokens,
                        duration_ms: duration.as_millis() as u64,
                    };
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", position + 1, e);
                    failures.push(e);
                }
            }
        }

        let reason = failures
            .last()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no models configured".to_string());
        warn!("All {} models failed; returning empty extraction", self.models.len());

        GatewayOutcome {
            raw: empty_extraction(&reason),
            model: None,
            failures,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn attempt(
        &self,
        model: &dyn VisionModel,
        image: &ImageData,
    ) -> Result<(Value, ModelReply), AttemptError> {
        let reply = tokio::time::timeout(
            self.attempt_timeout,
            model.complete(&self.instruction, image.clone()),
        )
        .await
        .map_err(|_| AttemptError::Timeout {
            model: model.id().to_string(),
            timeout: self.attempt_timeout,
        })??;

        let raw = parse_model_json(model.id(), &reply.text)?;
        Ok((raw, reply))
    }
}

/// The well-formed result used when no model produced usable JSON.
pub fn empty_extraction(reason: &str) -> Value {
    json!({
        KEY_PAGES: [],
        KEY_INVOICE_TOTAL: 0.0,
        KEY_FRAUD_FLAGS: [format!("AI Error: {reason}")],
    })
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\n?(.*?)\n?```$").unwrap());

/// Parse model text as a JSON object, unwrapping a ```json fence if present.
pub fn parse_model_json(model: &str, text: &str) -> Result<Value, AttemptError> {
    let trimmed = text.trim();
    let body = match RE_JSON_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim(),
        None => trimmed,
    };

    if body.is_empty() {
        return Err(AttemptError::EmptyResponse {
            model: model.to_string(),
        });
    }

    let value: Value = serde_json::from_str(body).map_err(|e| AttemptError::InvalidJson {
        model: model.to_string(),
        detail: e.to_string(),
    })?;

    if !value.is_object() {
        return Err(AttemptError::NotAnObject {
            model: model.to_string(),
            found: json_kind(&value),
        });
    }
    Ok(value)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
