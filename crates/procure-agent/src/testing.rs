//! Scripted transport for unit tests

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use procure_ai::{Message, Result};
use tokio_util::sync::CancellationToken;

use crate::events::CallEvent;
use crate::gateway::Gateway;
use crate::transport::{CallConfig, CallEventStream, Transport};

/// What the next call returns
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
    /// Never completes
    Hang,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }
}

/// A call as the transport saw it
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub config: CallConfig,
}

#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn run(
        &self,
        messages: Vec<Message>,
        config: &CallConfig,
        _cancel: CancellationToken,
    ) -> Result<CallEventStream> {
        self.calls.lock().push(RecordedCall {
            messages,
            config: config.clone(),
        });

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Reply::Fail("script exhausted".into()));

        let stream: CallEventStream = match reply {
            Reply::Text(text) => Box::pin(futures::stream::iter(vec![CallEvent::MessageEnd {
                message: Message::assistant(text),
            }])),
            Reply::Fail(message) => Box::pin(futures::stream::iter(vec![CallEvent::Error { message }])),
            Reply::Hang => Box::pin(futures::stream::pending::<CallEvent>()),
        };
        Ok(stream)
    }
}

/// Gateway over a scripted transport with the default model
pub fn gateway(transport: &Arc<ScriptedTransport>) -> Gateway {
    Gateway::new(
        transport.clone(),
        procure_ai::models::get_model("test-model", "http://localhost"),
    )
}

pub const CHAT_DECISION: &str = r#"{"mode": "chat"}"#;
pub const ACME_DECISION: &str = r#"{"mode": "investigate", "company": "Acme Corp"}"#;
pub const ACME_PLAN: &str = r#"{"company": "Acme Corp", "steps": ["Profile and revenues", "Owners and beneficial owners", "Procurement and public tenders", "Competitors"]}"#;

/// A report carrying every mandated section
pub fn acme_report() -> String {
    crate::prompts::REPORT_SECTIONS
        .iter()
        .map(|h| format!("{}\nUnclear.", h))
        .collect::<Vec<_>>()
        .join("\n\n")
}
