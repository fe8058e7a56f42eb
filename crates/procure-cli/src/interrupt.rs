//! Ctrl-C routing for the whole session
//!
//! Once a Ctrl-C handler is installed the default SIGINT action is gone for
//! the rest of the process, so a single listener decides what each press
//! means: cancel the running turn, or leave when nothing is running.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Exit status after an interrupt at the prompt
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What a Ctrl-C press did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// A turn was running and has been cancelled
    CancelledTurn,
    /// Nothing was running; the session should end
    Exit,
}

#[derive(Clone, Default)]
pub struct TurnGuard {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl TurnGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a new turn. Ctrl-C cancels it until [`TurnGuard::finish`].
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.active.lock() = Some(token.clone());
        token
    }

    /// The turn is over; Ctrl-C ends the session again
    pub fn finish(&self) {
        self.active.lock().take();
    }

    /// Handle one Ctrl-C press
    pub fn interrupt(&self) -> Interrupt {
        match self.active.lock().as_ref() {
            Some(token) => {
                token.cancel();
                Interrupt::CancelledTurn
            }
            None => Interrupt::Exit,
        }
    }

    /// Listen for Ctrl-C for the rest of the process
    pub fn listen(&self) -> tokio::task::JoinHandle<()> {
        let guard = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                match guard.interrupt() {
                    Interrupt::CancelledTurn => tracing::debug!("turn cancelled by Ctrl-C"),
                    Interrupt::Exit => {
                        eprintln!();
                        std::process::exit(INTERRUPTED_EXIT_CODE);
                    }
                }
            }
        })
    }
}
