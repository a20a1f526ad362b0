//! Transport abstraction over the model server

use std::time::Duration;

use async_trait::async_trait;
use tchat_ai::{
    Capabilities, ChatEventStream, Context, Error, Message, ModelInfo, Result,
    providers::OllamaProvider,
};
use tokio_util::sync::CancellationToken;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Everything the server needs for one streamed reply
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    /// History followed by the current user message
    pub messages: Vec<Message>,
}

/// Connection to a model server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Models available on the server
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Capability flags for one model
    async fn capabilities(&self, model: &str) -> Result<Capabilities>;

    /// Start a streamed reply. Cancelling the token before the stream is
    /// established yields [`Error::Aborted`].
    async fn stream(&self, request: ChatRequest, cancel: CancellationToken)
    -> Result<ChatEventStream>;
}

/// Transport that talks to an Ollama server over HTTP
pub struct OllamaTransport {
    provider: OllamaProvider,
    retry_config: RetryConfig,
}

impl OllamaTransport {
    pub fn new(provider: OllamaProvider) -> Self {
        Self {
            provider,
            retry_config: RetryConfig::default(),
        }
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn base_url(&self) -> &str {
        self.provider.base_url()
    }
}

#[async_trait]
impl Transport for OllamaTransport {
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.provider.list_models().await
    }

    async fn capabilities(&self, model: &str) -> Result<Capabilities> {
        self.provider.capabilities(model).await
    }

    async fn stream(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatEventStream> {
        let context = Context {
            system_prompt: request.system_prompt,
            messages: request.messages,
        };

        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Aborted);
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Aborted),
                result = self.provider.stream(&request.model, &context) => result,
            };

            match result {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < self.retry_config.max_retries && e.is_retryable() => {
                    let delay = self.retry_config.delay_for_attempt(attempt);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt + 1,
                        self.retry_config.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Aborted),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
