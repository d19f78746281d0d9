//! Per-user conversation sessions
//!
//! Sessions live in memory only and expire after an idle TTL. Events for
//! one user are serialized by [`KeyedLocks`].

use crate::db::UserId;
use crate::state_machine::SessionState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;

/// Storage for conversation state
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current state; `Idle` when absent or expired
    async fn load(&self, user: UserId) -> SessionState;

    /// Replace the state. Saving `Idle` drops the entry.
    async fn save(&self, user: UserId, state: SessionState);

    /// Drop expired entries, returning how many were removed
    async fn sweep(&self) -> usize;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn load(&self, user: UserId) -> SessionState {
        (**self).load(user).await
    }

    async fn save(&self, user: UserId, state: SessionState) {
        (**self).save(user, state).await;
    }

    async fn sweep(&self) -> usize {
        (**self).sweep().await
    }
}

type SessionMap = RwLock<HashMap<UserId, (SessionState, Instant)>>;

/// In-process session store with idle expiry
pub struct InMemorySessionStore {
    sessions: SessionMap,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    #[allow(dead_code)] // Used in tests
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, user: UserId) -> SessionState {
        let sessions = self.sessions.read().await;
        match sessions.get(&user) {
            Some((state, touched)) if touched.elapsed() < self.ttl => state.clone(),
            Some(_) => {
                tracing::debug!(user_id = %user, "Session expired");
                SessionState::Idle
            }
            None => SessionState::Idle,
        }
    }

    async fn save(&self, user: UserId, state: SessionState) {
        let mut sessions = self.sessions.write().await;
        if state.is_idle() {
            sessions.remove(&user);
        } else {
            sessions.insert(user, (state, Instant::now()));
        }
    }

    async fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, (_, touched)| touched.elapsed() < self.ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!(before, after = sessions.len(), "Expired sessions swept");
        }
        removed
    }
}

/// One async mutex per user, created on demand
#[derive(Default)]
pub struct KeyedLocks {
    locks: std::sync::Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user`'s session
    pub async fn lock(&self, user: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(locks.entry(user).or_default())
        };
        lock.lock_owned().await
    }

    /// Forget locks nobody holds or waits on
    pub fn prune(&self) -> usize {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    #[allow(dead_code)] // Used in tests
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
