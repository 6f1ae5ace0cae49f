//! Session lifecycle notifications.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::AuthError;

const CHANNEL_CAPACITY: usize = 16;

/// A change in session state the surrounding application may react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A refresh episode failed and the stored credentials were cleared.
    /// Raised once per episode, however many requests were waiting on it.
    Ended {
        episode: Uuid,
        reason: AuthError,
        at: DateTime<Utc>,
    },
    /// Credentials were cleared by an explicit logout.
    LoggedOut { at: DateTime<Utc> },
}

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Fan-out point for [`SessionEvent`]s.
///
/// Listeners either subscribe to a broadcast channel or register a handler
/// closure. Emitting never fails: an event nobody listens for is dropped.
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
    handlers: Mutex<Vec<Handler>>,
}

impl std::fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEvents")
            .field("subscribers", &self.sender.receiver_count())
            .finish_non_exhaustive()
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Register a handler called synchronously for every event.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    pub fn emit(&self, event: SessionEvent) {
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            // A panicking handler must not stall the refresh episode that emitted.
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::warn!("session event handler panicked");
            }
        }
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}
