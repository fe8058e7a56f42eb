//! Per-thread conversation history kept between turns

use std::collections::HashMap;

use parking_lot::Mutex;
use procure_ai::Message;

/// Storage for the history of each conversation thread
pub trait CheckpointStore: Send + Sync {
    /// History saved for a thread, if any
    fn load(&self, thread_id: &str) -> Option<Vec<Message>>;

    /// Replace the saved history of a thread
    fn save(&self, thread_id: &str, messages: Vec<Message>);

    /// Forget a thread
    fn clear(&self, thread_id: &str);
}

/// Process-local store. Lost on restart.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    threads: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with saved history
    pub fn len(&self) -> usize {
        self.threads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.lock().is_empty()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, thread_id: &str) -> Option<Vec<Message>> {
        self.threads.lock().get(thread_id).cloned()
    }

    fn save(&self, thread_id: &str, messages: Vec<Message>) {
        self.threads.lock().insert(thread_id.to_string(), messages);
    }

    fn clear(&self, thread_id: &str) {
        self.threads.lock().remove(thread_id);
    }
}

/// Combine saved history with the messages a caller sent.
///
/// Callers that resend the whole conversation are taken as is; callers that
/// send only the new messages get them appended to the saved history.
pub fn merge_history(saved: Option<Vec<Message>>, incoming: Vec<Message>) -> Vec<Message> {
    let Some(mut saved) = saved else {
        return incoming;
    };

    let resent = incoming.len() >= saved.len()
        && saved.iter().zip(&incoming).all(|(a, b)| a.same_turn(b));
    if resent {
        return incoming;
    }

    saved.extend(incoming);
    saved
}
