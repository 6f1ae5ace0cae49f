//! Single-flight refresh state machine.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::events::{SessionEvent, SessionEvents};
use super::exchange::RefreshExchange;
use crate::auth::{AuthError, CredentialPair, CredentialStore};

type Outcome = Result<String, AuthError>;
type Waiter = oneshot::Sender<Outcome>;

enum RefreshState {
    Idle,
    Refreshing {
        episode: Uuid,
        waiters: VecDeque<Waiter>,
    },
}

/// Turns any number of concurrent refresh requests into one exchange.
///
/// The first caller moves the coordinator from idle to refreshing and starts
/// the exchange; callers arriving while it is in flight queue behind it.
/// When the exchange settles the store is updated (or cleared) first, then
/// every waiter is released in arrival order with the same outcome.
/// An episode that finds no stored pair fails with `NotLoggedIn` and neither
/// clears the store nor emits [`SessionEvent::Ended`].
///
/// The exchange runs on its own task, so it settles even if the caller that
/// started it is dropped.
pub struct RefreshCoordinator {
    store: Arc<CredentialStore>,
    exchange: Arc<dyn RefreshExchange>,
    events: Arc<SessionEvents>,
    state: Mutex<RefreshState>,
    completed: AtomicU64,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("completed", &self.completed_episodes())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        exchange: Arc<dyn RefreshExchange>,
        events: Arc<SessionEvents>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            exchange,
            events,
            state: Mutex::new(RefreshState::Idle),
            completed: AtomicU64::new(0),
        })
    }

    /// Obtain a fresh access credential, joining an in-flight refresh if any.
    pub async fn request_refresh(self: &Arc<Self>) -> Result<String, AuthError> {
        let (tx, rx) = oneshot::channel();
        // Check and transition under one lock, with no await in between.
        let started = {
            let mut state = self.lock();
            match &mut *state {
                RefreshState::Refreshing { episode, waiters } => {
                    waiters.push_back(tx);
                    tracing::debug!(%episode, position = waiters.len(), "joined in-flight refresh");
                    None
                }
                RefreshState::Idle => {
                    let episode = Uuid::new_v4();
                    *state = RefreshState::Refreshing {
                        episode,
                        waiters: VecDeque::from([tx]),
                    };
                    Some(episode)
                }
            }
        };

        if let Some(episode) = started {
            tracing::debug!(%episode, "starting refresh exchange");
            let coordinator = Arc::clone(self);
            tokio::spawn(async move { coordinator.run_episode(episode).await });
        }

        rx.await.unwrap_or(Err(AuthError::Interrupted))
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of callers waiting on the in-flight refresh, the trigger included.
    pub fn waiting(&self) -> usize {
        match &*self.lock() {
            RefreshState::Refreshing { waiters, .. } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Number of refresh exchanges that have settled.
    pub fn completed_episodes(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    async fn run_episode(&self, episode: Uuid) {
        // With nothing stored there is no session to end: a late 401 after a
        // failed episode, or an anonymous caller.
        let outcome = match self.store.get() {
            Ok(None) => {
                tracing::debug!(%episode, "no stored session to refresh");
                Err(AuthError::NotLoggedIn)
            }
            Ok(Some(current)) => {
                let result = self.exchange_and_store(current).await;
                if let Err(reason) = &result {
                    self.end_session(episode, reason);
                }
                result
            }
            Err(err) => {
                self.end_session(episode, &err);
                Err(err)
            }
        };

        let waiters = match std::mem::replace(&mut *self.lock(), RefreshState::Idle) {
            RefreshState::Refreshing { waiters, .. } => waiters,
            RefreshState::Idle => VecDeque::new(),
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            %episode,
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "refresh settled"
        );

        for waiter in waiters {
            // A waiter whose caller went away is skipped.
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn exchange_and_store(&self, current: CredentialPair) -> Result<String, AuthError> {
        let exchange = Arc::clone(&self.exchange);
        let refresh = current.refresh().to_string();
        let payload = match tokio::spawn(async move { exchange.exchange(&refresh).await }).await {
            Ok(result) => result?,
            Err(join_err) => {
                tracing::warn!(error = %join_err, "refresh exchange task aborted");
                return Err(AuthError::Interrupted);
            }
        };
        let pair = payload.into_pair(current.refresh()).ok_or_else(|| {
            AuthError::InvalidResponse("refresh response carried an empty token".to_string())
        })?;
        self.store.set(&pair)?;
        Ok(pair.access().to_string())
    }

    /// Clear stored credentials and announce the end of the session.
    fn end_session(&self, episode: Uuid, reason: &AuthError) {
        if let Err(clear_err) = self.store.clear() {
            tracing::warn!(%episode, error = %clear_err, "clearing credentials failed");
        }
        tracing::warn!(%episode, error = %reason, "refresh failed, session ended");
        self.events.emit(SessionEvent::Ended {
            episode,
            reason: reason.clone(),
            at: Utc::now(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
