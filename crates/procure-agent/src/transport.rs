//! Transport abstraction for LLM calls

use std::{pin::Pin, sync::Arc, sync::LazyLock, time::Duration};

use regex::Regex;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use procure_ai::{
    Context, Message, Model, ResponseFormat, Result, StreamOptions, Tool,
    providers::LlmProvider, stream::MessageEvent,
};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::events::CallEvent;

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

/// Status codes and phrases that mark a failure as transient when only the
/// rendered error text is available.
static TRANSIENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b429\b",
        r"\b50[0234]\b",
        r"(?i)rate.?limit",
        r"(?i)too many requests",
        r"(?i)overloaded",
        r"(?i)timed?.?out",
        r"(?i)connection (reset|refused|closed|aborted)",
        r"(?i)temporarily unavailable",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Check if an error message describes a transient failure
pub fn is_retryable_error(error: &str) -> bool {
    TRANSIENT_PATTERNS.iter().any(|re| re.is_match(error))
}

/// Everything a single LLM call needs besides the messages
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// System prompt
    pub system_prompt: Option<String>,
    /// Provider-hosted tools to enable
    pub tools: Vec<Tool>,
    /// Model to use
    pub model: Model,
    /// Maximum tokens per response
    pub max_tokens: Option<u32>,
    /// Temperature; `None` leaves the provider default
    pub temperature: Option<f32>,
    /// Structured output constraint
    pub response_format: Option<ResponseFormat>,
}

/// A stream of call events
pub type CallEventStream = Pin<Box<dyn Stream<Item = CallEvent> + Send>>;

/// Transport for running LLM calls
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run one call, streaming events until `MessageEnd` or `Error`
    async fn run(
        &self,
        messages: Vec<Message>,
        config: &CallConfig,
        cancel: CancellationToken,
    ) -> Result<CallEventStream>;
}

/// Direct provider transport with bounded retry on transient failures
pub struct ProviderTransport {
    provider: Arc<dyn LlmProvider>,
    retry_config: RetryConfig,
}

impl ProviderTransport {
    /// Create a new provider transport
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            retry_config: RetryConfig::default(),
        }
    }

    /// Create an OpenAI-backed transport with a specific API key
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(Arc::new(procure_ai::providers::openai::OpenAIProvider::new(
            api_key,
        )))
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }
}

/// Outcome of one attempt: the finished message, or the failure text and
/// whether it is worth retrying.
type Attempt = std::result::Result<Message, (String, bool)>;

#[async_trait]
impl Transport for ProviderTransport {
    async fn run(
        &self,
        messages: Vec<Message>,
        config: &CallConfig,
        cancel: CancellationToken,
    ) -> Result<CallEventStream> {
        let context = Context {
            system_prompt: config.system_prompt.clone(),
            messages,
            tools: config.tools.clone(),
        };
        let options = StreamOptions {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            response_format: config.response_format.clone(),
        };

        let model = config.model.clone();
        let provider = Arc::clone(&self.provider);
        let retry_config = self.retry_config.clone();

        let event_stream: CallEventStream = Box::pin(stream! {
            let mut attempt = 0u32;

            loop {
                if cancel.is_cancelled() {
                    yield CallEvent::Error { message: "Cancelled".to_string() };
                    return;
                }

                let outcome: Attempt = match provider.stream(&model, &context, &options).await {
                    Err(e) => {
                        let error_msg = e.to_string();
                        let retryable = e.is_retryable() || is_retryable_error(&error_msg);
                        Err((error_msg, retryable))
                    }
                    Ok(mut message_stream) => {
                        let terminal = tokio::select! {
                            _ = cancel.cancelled() => None,
                            event = message_stream.next() => Some(event),
                        };
                        match terminal {
                            None => {
                                yield CallEvent::Error { message: "Cancelled".to_string() };
                                return;
                            }
                            Some(Some(MessageEvent::Done { message, .. })) => Ok(message),
                            Some(Some(MessageEvent::Error { message, retryable })) => {
                                let retryable = retryable || is_retryable_error(&message);
                                Err((message, retryable))
                            }
                            Some(None) => Err((
                                "Provider stream closed without a final message".to_string(),
                                true,
                            )),
                        }
                    }
                };

                match outcome {
                    Ok(message) => {
                        yield CallEvent::MessageEnd { message };
                        return;
                    }
                    Err((error_msg, retryable)) => {
                        if attempt < retry_config.max_retries && retryable {
                            let delay = retry_config.delay_for_attempt(attempt);
                            tracing::warn!(
                                "LLM call failed (attempt {}/{}): {}. Retrying in {:?}...",
                                attempt + 1,
                                retry_config.max_retries + 1,
                                error_msg,
                                delay
                            );
                            yield CallEvent::Retry {
                                attempt: attempt + 1,
                                delay_ms: delay.as_millis() as u64,
                                error: error_msg,
                            };
                            attempt += 1;

                            let interrupted = tokio::select! {
                                _ = cancel.cancelled() => true,
                                _ = tokio::time::sleep(delay) => false,
                            };
                            if interrupted {
                                yield CallEvent::Error { message: "Cancelled".to_string() };
                                return;
                            }
                            continue;
                        }

                        // Non-retryable or max retries exceeded
                        yield CallEvent::Error { message: error_msg };
                        return;
                    }
                }
            }
        });

        Ok(event_stream)
    }
}
