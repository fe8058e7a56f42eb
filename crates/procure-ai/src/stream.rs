//! Streaming event types

use crate::types::{Message, StopReason, Usage};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Terminal outcome of one provider response.
///
/// The provider folds the wire events itself and yields exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    /// Message completed
    Done {
        message: Message,
        stop_reason: StopReason,
        usage: Usage,
    },
    /// Error occurred
    Error {
        message: String,
        /// Whether the failure is transient and worth another attempt
        #[serde(default)]
        retryable: bool,
    },
}

impl MessageEvent {
    /// Build an error event from a provider error
    pub fn from_error(error: &crate::Error) -> Self {
        MessageEvent::Error {
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// A stream of message events
pub type MessageEventStream = Pin<Box<dyn Stream<Item = MessageEvent> + Send>>;
