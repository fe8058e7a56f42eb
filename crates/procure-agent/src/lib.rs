//! procure-agent: intent routing and procurement investigation
//!
//! This crate runs one conversational turn at a time: classify the request,
//! then either answer it directly or plan and carry out a company
//! investigation, all through a single LLM gateway.

pub mod chat;
pub mod checkpoint;
pub mod contracts;
pub mod error;
pub mod events;
pub mod executor;
pub mod gateway;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod request;
pub mod router;
pub mod state;
pub mod tool;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use checkpoint::{CheckpointStore, MemoryCheckpointStore};
pub use contracts::{InvestigationPlan, RouterDecision, SchemaMismatch};
pub use error::{Error, Result};
pub use events::{CallEvent, OrchestratorEvent};
pub use gateway::{CallRequest, Gateway};
pub use orchestrator::{Node, Orchestrator, OrchestratorConfig, TurnOutcome};
pub use request::{InboundMessage, TurnRequest};
pub use state::{ConversationState, Mode};
pub use tool::ToolSet;
pub use transport::{ProviderTransport, RetryConfig, Transport};
