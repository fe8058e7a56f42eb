//! The turn state machine
//!
//! ```text
//! Router ──chat──────────────────────────► Chat ─────────────► End
//!    └────investigate──► PlanInvestigation ──► RunInvestigation ──► End
//! ```
//!
//! The graph has no cycles, so each node runs at most once per turn.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{self, CheckpointStore, MemoryCheckpointStore};
use crate::error::{Error, Result};
use crate::events::OrchestratorEvent;
use crate::gateway::Gateway;
use crate::request::{TurnOptions, TurnRequest};
use crate::state::{ConversationState, Mode};
use crate::tool::ToolSet;
use crate::{chat, executor, planner, router};

/// A stage of the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Router,
    Chat,
    PlanInvestigation,
    RunInvestigation,
    End,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Router => "router",
            Node::Chat => "chat",
            Node::PlanInvestigation => "plan_investigation",
            Node::RunInvestigation => "run_investigation",
            Node::End => "end",
        }
    }
}

/// Transition function of the turn graph.
pub fn next(node: Node, state: &ConversationState) -> Node {
    match node {
        Node::Router => match state.mode() {
            Mode::Investigate => Node::PlanInvestigation,
            Mode::Chat => Node::Chat,
        },
        Node::PlanInvestigation => Node::RunInvestigation,
        Node::Chat | Node::RunInvestigation | Node::End => Node::End,
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Vector store searched by the hosted file search tool
    pub knowledge_base_id: Option<String>,
}

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub thread_id: String,
    pub state: ConversationState,
}

impl TurnOutcome {
    /// The single text the turn produced: a chat answer or a report
    pub fn response_text(&self) -> &str {
        self.state.last_response_text.as_deref().unwrap_or_default()
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }
}

/// Runs turns against a shared gateway.
///
/// Built once and shared by `Arc`; holds no per-turn state.
pub struct Orchestrator {
    gateway: Gateway,
    tools: ToolSet,
    checkpoints: Arc<dyn CheckpointStore>,
    event_tx: broadcast::Sender<OrchestratorEvent>,
}

impl Orchestrator {
    pub fn new(gateway: Gateway, config: OrchestratorConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            gateway,
            tools: ToolSet::new(config.knowledge_base_id),
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            event_tx,
        }
    }

    /// Use a different checkpoint store
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = store;
        self
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.event_tx.subscribe()
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Drop a thread's saved history
    pub fn end_thread(&self, thread_id: &str) {
        tracing::debug!(thread_id = %thread_id, "thread ended");
        self.checkpoints.clear(thread_id);
    }

    fn emit(&self, event: OrchestratorEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Run one turn.
    ///
    /// The request is validated before any LLM call. On success the thread's
    /// history is checkpointed; on failure nothing is saved.
    pub async fn invoke(&self, request: TurnRequest, cancel: CancellationToken) -> Result<TurnOutcome> {
        let turn = request.validate()?;
        let thread_id = turn
            .thread_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let messages = checkpoint::merge_history(self.checkpoints.load(&thread_id), turn.messages);
        self.emit(OrchestratorEvent::TurnStart {
            thread_id: thread_id.clone(),
            message_count: messages.len(),
        });

        let state = match self.run(ConversationState::new(messages), &turn.options, &cancel).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(thread_id = %thread_id, "turn failed: {}", e);
                self.emit(OrchestratorEvent::Error { message: e.to_string() });
                return Err(e);
            }
        };

        tracing::info!(
            thread_id = %thread_id,
            mode = state.mode().as_str(),
            input_tokens = state.usage.input,
            output_tokens = state.usage.output,
            "turn complete"
        );
        self.checkpoints.save(&thread_id, state.messages.clone());
        self.emit(OrchestratorEvent::TurnEnd {
            thread_id: thread_id.clone(),
            mode: state.mode(),
            usage: state.usage.clone(),
        });

        Ok(TurnOutcome { thread_id, state })
    }

    /// Walk the graph from the router to the end.
    pub async fn run(
        &self,
        mut state: ConversationState,
        options: &TurnOptions,
        cancel: &CancellationToken,
    ) -> Result<ConversationState> {
        let mut node = Node::Router;

        while node != Node::End {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            tracing::debug!(node = node.as_str(), "node start");
            self.emit(OrchestratorEvent::NodeStart { node });
            self.run_node(node, &mut state, options, cancel).await?;
            self.emit(OrchestratorEvent::NodeEnd { node });

            node = next(node, &state);
        }

        Ok(state)
    }

    async fn run_node(
        &self,
        node: Node,
        state: &mut ConversationState,
        options: &TurnOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match node {
            Node::Router => {
                let decision = router::route(&self.gateway, state, options, cancel).await?;
                state.mode = Some(decision.mode);
                state.company = decision.company;
                self.emit(OrchestratorEvent::RouteDecided {
                    mode: decision.mode,
                    company: state.company.clone(),
                });
            }
            Node::Chat => {
                chat::respond(&self.gateway, &self.tools, state, options, cancel).await?;
            }
            Node::PlanInvestigation => {
                planner::plan(&self.gateway, state, options, cancel).await?;
                self.emit(OrchestratorEvent::PlanReady {
                    company: state.company.clone(),
                    plan_markdown: state.plan_markdown.clone().unwrap_or_default(),
                });
            }
            Node::RunInvestigation => {
                executor::execute(&self.gateway, &self.tools, state, options, cancel).await?;
            }
            Node::End => {}
        }
        Ok(())
    }
}
