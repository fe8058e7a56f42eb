//! procure-ai: client for the OpenAI Responses API
//!
//! Message and content types, provider-hosted tool declarations, JSON schema
//! response formats, and a streaming provider whose events assemble into one
//! complete assistant message.

pub mod error;
pub mod models;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::MessageEventStream;
pub use types::*;
