//! Error types for procure-agent

use std::time::Duration;

use thiserror::Error;

/// Result type alias using procure-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Text returned to callers for any failure that is not their fault.
pub const GENERIC_FAILURE_MESSAGE: &str = "Agent execution failed.";

/// Errors that can end a turn
#[derive(Error, Debug)]
pub enum Error {
    /// The request carried no messages at all
    #[error("Messages cannot be empty.")]
    NoMessages,

    /// A message carried a role other than system, user or assistant
    #[error("Unsupported message role: {0}")]
    InvalidRole(String),

    /// Temperature outside 0..=2
    #[error("Temperature must be between 0 and 2, got {0}")]
    InvalidTemperature(f32),

    /// The history holds no user-authored message to act on
    #[error("At least one user message is required.")]
    EmptyInput,

    /// An error from the provider layer
    #[error(transparent)]
    Provider(#[from] procure_ai::Error),

    /// The provider stream reported a failure after retries were exhausted
    #[error("LLM call failed: {0}")]
    Call(String),

    /// A single LLM call exceeded its deadline
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the turn
    #[error("Turn cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the caller sent something unusable (as opposed to a failure on our side)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NoMessages | Error::InvalidRole(_) | Error::InvalidTemperature(_) | Error::EmptyInput
        )
    }

    /// Message safe to show the caller. Server-side detail stays in the logs.
    pub fn public_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            GENERIC_FAILURE_MESSAGE.to_string()
        }
    }
}
