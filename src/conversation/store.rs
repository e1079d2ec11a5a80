//! In-memory conversation sessions with a per-user critical section.
//!
//! Every event for a user is handled while holding that user's
//! `tokio::sync::Mutex`, so two events from the same user never interleave
//! while different users proceed in parallel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

use crate::conversation::state::ConversationState;
use crate::core::config;

#[derive(Debug)]
pub struct Session {
    state: ConversationState,
    touched_at: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            state: ConversationState::Idle,
            touched_at: Instant::now(),
        }
    }

    fn is_expired(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(timeout) => !self.state.is_idle() && self.touched_at.elapsed() >= timeout,
            None => false,
        }
    }
}

/// Exclusive access to one user's session until dropped.
pub struct SessionLock {
    guard: OwnedMutexGuard<Session>,
    expired: bool,
}

impl SessionLock {
    pub fn state(&self) -> &ConversationState {
        &self.guard.state
    }

    /// Takes the state out, leaving `Idle` until [`set`](Self::set) is called.
    pub fn take(&mut self) -> ConversationState {
        std::mem::take(&mut self.guard.state)
    }

    pub fn set(&mut self, state: ConversationState) {
        self.guard.state = state;
        self.guard.touched_at = Instant::now();
    }

    /// Whether an abandoned flow was reset to `Idle` when this lock was taken.
    pub fn was_expired(&self) -> bool {
        self.expired
    }
}

pub struct SessionStore {
    sessions: DashMap<i64, Arc<Mutex<Session>>>,
    idle_timeout: Option<Duration>,
}

impl SessionStore {
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn from_config() -> Self {
        Self::new(*config::conversation::IDLE_TIMEOUT)
    }

    /// Waits for the user's critical section.
    ///
    /// A flow idle for longer than the timeout is reset to `Idle` here, before
    /// the caller sees it.
    pub async fn lock(&self, user_id: i64) -> SessionLock {
        // Clone the Arc out so the shard lock is released before awaiting.
        let entry = self
            .sessions
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Session::new())))
            .clone();

        let mut guard = entry.lock_owned().await;
        let expired = guard.is_expired(self.idle_timeout);
        if expired {
            log::info!("user={} flow {} expired, back to Idle", user_id, guard.state.tag());
            guard.state = ConversationState::Idle;
            guard.touched_at = Instant::now();
        }
        SessionLock { guard, expired }
    }

    /// Current state without waiting; `None` while the session is locked.
    pub fn peek(&self, user_id: i64) -> Option<ConversationState> {
        match self.sessions.get(&user_id) {
            Some(entry) => entry.try_lock().ok().map(|s| s.state.clone()),
            None => Some(ConversationState::Idle),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops idle and expired sessions nobody is using. Returns how many went.
    pub fn prune(&self) -> usize {
        let before = self.sessions.len();
        let timeout = self.idle_timeout;
        self.sessions.retain(|_, entry| {
            // A clone outside the map means a handler is about to lock it.
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            match entry.try_lock() {
                Ok(session) => !(session.state.is_idle() || session.is_expired(timeout)),
                Err(_) => true,
            }
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Runs [`prune`](Self::prune) every `interval` until the runtime stops.
    pub fn spawn_pruner(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.prune();
                if removed > 0 {
                    log::debug!("Pruned {} idle sessions, {} left", removed, self.len());
                }
            }
        })
    }
}
