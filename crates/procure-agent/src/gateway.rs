//! Single entry point for every LLM call the orchestrator makes.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use procure_ai::{Message, Model, ResponseFormat, Tool};
use tokio_util::sync::CancellationToken;

use crate::contracts::{self, Contract, SchemaMismatch};
use crate::error::{Error, Result};
use crate::events::CallEvent;
use crate::transport::{CallConfig, Transport};

/// Default per-call deadline
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// One call as the nodes describe it
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
    pub temperature: Option<f32>,
    pub response_format: Option<ResponseFormat>,
    /// Overrides the gateway's default model
    pub model: Option<Model>,
}

impl CallRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_model(mut self, model: Option<Model>) -> Self {
        self.model = model;
        self
    }
}

/// Wraps a [`Transport`] with a deadline, cancellation and output decoding
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    model: Model,
    call_timeout: Duration,
    max_tokens: Option<u32>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, model: Model) -> Self {
        Self {
            transport,
            model,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_tokens: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Default model for calls that do not override it
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Model for a per-turn override id, served from the default model's endpoint
    pub fn override_model(&self, id: Option<&str>) -> Option<Model> {
        id.map(|id| procure_ai::models::get_model(id, &self.model.base_url))
    }

    /// Run one call to completion and return the assistant message.
    pub async fn complete(&self, request: CallRequest, cancel: &CancellationToken) -> Result<Message> {
        let config = CallConfig {
            system_prompt: request.system_prompt,
            tools: request.tools,
            model: request.model.unwrap_or_else(|| self.model.clone()),
            max_tokens: self.max_tokens,
            temperature: request.temperature,
            response_format: request.response_format,
        };

        tracing::debug!(
            model = %config.model.id,
            messages = request.messages.len(),
            tools = config.tools.len(),
            structured = config.response_format.is_some(),
            "LLM call"
        );

        let call = self.drive(request.messages, config, cancel.clone());

        let message = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(self.call_timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("LLM call exceeded {:?}", self.call_timeout);
                    Err(Error::Timeout(self.call_timeout))
                }
            },
        }?;

        tracing::debug!(
            hosted_tool_items = message.content().other_block_count(),
            "LLM call complete"
        );
        Ok(message)
    }

    /// Run a call constrained to `C`'s schema.
    ///
    /// Transport failures are errors; a reply that does not fit the contract
    /// is returned as the inner `Err` so the caller can fall back.
    pub async fn structured<C: Contract>(
        &self,
        mut request: CallRequest,
        cancel: &CancellationToken,
    ) -> Result<std::result::Result<C, SchemaMismatch>> {
        request.response_format = Some(C::response_format());
        let message = self.complete(request, cancel).await?;
        Ok(contracts::decode::<C>(&message.text()))
    }

    async fn drive(
        &self,
        messages: Vec<Message>,
        config: CallConfig,
        cancel: CancellationToken,
    ) -> Result<Message> {
        let mut events = self.transport.run(messages, &config, cancel.clone()).await?;

        while let Some(event) = events.next().await {
            match event {
                CallEvent::MessageEnd { message } => return Ok(message),
                CallEvent::Retry { attempt, delay_ms, error } => {
                    tracing::debug!(attempt, delay_ms, "retrying LLM call: {}", error);
                }
                CallEvent::Error { message } => {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    return Err(Error::Call(message));
                }
            }
        }

        Err(Error::Call("stream ended without a response".to_string()))
    }
}
