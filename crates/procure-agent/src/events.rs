//! Event types

use serde::{Deserialize, Serialize};
use procure_ai::{Message, Usage};

use crate::orchestrator::Node;
use crate::state::Mode;

/// Events emitted by a transport during one LLM call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    /// Message completed
    MessageEnd { message: Message },

    /// A transient failure will be retried after `delay_ms`
    Retry {
        attempt: u32,
        delay_ms: u64,
        error: String,
    },

    /// The call failed for good
    Error { message: String },
}

/// Progress events published by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// A turn started on a thread
    TurnStart {
        thread_id: String,
        message_count: usize,
    },

    /// A node began running
    NodeStart { node: Node },

    /// The router picked a branch
    RouteDecided {
        mode: Mode,
        company: Option<String>,
    },

    /// The planner produced its checklist
    PlanReady {
        company: Option<String>,
        plan_markdown: String,
    },

    /// A node finished
    NodeEnd { node: Node },

    /// The turn completed
    TurnEnd {
        thread_id: String,
        mode: Mode,
        usage: Usage,
    },

    /// The turn failed
    Error { message: String },
}
