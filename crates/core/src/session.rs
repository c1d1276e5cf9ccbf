//! Per-user conversation state kept outside the relational store.
//!
//! Three keys exist per user: the dialog cursor (`<id>`), the login typed
//! during registration (`login<id>`), and the teammate a task is being
//! created for (`task_<id>`). Every write refreshes the entry's TTL.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::commands::CommandKey;
use crate::domain::UserId;
use crate::flows::{DialogEvent, DialogFlow, DialogState, DialogTransitionError, TransitionOutcome};

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionKey {
    Cursor(UserId),
    PendingLogin(UserId),
    PendingTaskTarget(UserId),
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cursor(user_id) => write!(f, "{user_id}"),
            Self::PendingLogin(user_id) => write!(f, "login{user_id}"),
            Self::PendingTaskTarget(user_id) => write!(f, "task_{user_id}"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session store operation failed: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Transition(#[from] DialogTransitionError),
    #[error("session value under `{key}` is corrupt: `{value}`")]
    CorruptValue { key: String, value: String },
}

/// Key/value store with per-entry expiry.
///
/// `get` distinguishes an absent key (`None`) from a key holding an empty
/// string (`Some("")`).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn set(&self, key: &SessionKey, value: &str, ttl: Duration) -> Result<(), SessionError>;
    async fn get(&self, key: &SessionKey) -> Result<Option<String>, SessionError>;
    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry, including ones nobody reads again.
    pub async fn purge_expired(&self) -> u64 {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        (before - entries.len()) as u64
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn set(&self, key: &SessionKey, value: &str, ttl: Duration) -> Result<(), SessionError> {
        let expires_at = Instant::now() + ttl;
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_owned(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<String>, SessionError> {
        let rendered = key.to_string();
        {
            let entries = self.entries.read().await;
            match entries.get(&rendered) {
                None => return Ok(None),
                Some((value, expires_at)) if Instant::now() < *expires_at => {
                    return Ok(Some(value.clone()));
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if let Some((_, expires_at)) = entries.get(&rendered) {
            if Instant::now() >= *expires_at {
                entries.remove(&rendered);
            }
        }
        Ok(None)
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries.remove(&key.to_string());
        Ok(())
    }
}

/// Cursor protocol on top of a [`SessionStore`].
///
/// The dispatcher only ever reads the cursor; handlers move it forward with
/// [`DialogSessions::advance`], which validates the step against the
/// [`DialogFlow`] transition table before writing.
#[derive(Clone)]
pub struct DialogSessions {
    store: Arc<dyn SessionStore>,
    flow: DialogFlow,
    ttl: Duration,
}

impl DialogSessions {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, flow: DialogFlow::new(), ttl }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySessionStore::new()), DEFAULT_SESSION_TTL)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn raw_cursor(&self, user_id: UserId) -> Result<Option<String>, SessionError> {
        self.store.get(&SessionKey::Cursor(user_id)).await
    }

    pub async fn cursor(&self, user_id: UserId) -> Result<Option<DialogState>, SessionError> {
        Ok(self.raw_cursor(user_id).await?.as_deref().and_then(DialogState::decode))
    }

    pub async fn awaited_command(
        &self,
        user_id: UserId,
    ) -> Result<Option<CommandKey>, SessionError> {
        Ok(self.cursor(user_id).await?.and_then(|state| state.awaited_command()))
    }

    pub async fn advance(
        &self,
        user_id: UserId,
        event: DialogEvent,
    ) -> Result<TransitionOutcome, DialogError> {
        let current = self.cursor(user_id).await?.unwrap_or_else(|| self.flow.initial_state());
        let outcome = self.flow.apply(&current, &event)?;
        self.store.set(&SessionKey::Cursor(user_id), outcome.to.encode(), self.ttl).await?;
        Ok(outcome)
    }

    pub async fn set_pending_login(
        &self,
        user_id: UserId,
        login: &str,
    ) -> Result<(), SessionError> {
        self.store.set(&SessionKey::PendingLogin(user_id), login, self.ttl).await
    }

    pub async fn pending_login(&self, user_id: UserId) -> Result<Option<String>, SessionError> {
        self.store.get(&SessionKey::PendingLogin(user_id)).await
    }

    pub async fn set_pending_task_target(
        &self,
        user_id: UserId,
        target: UserId,
    ) -> Result<(), SessionError> {
        self.store.set(&SessionKey::PendingTaskTarget(user_id), &target.to_string(), self.ttl).await
    }

    pub async fn pending_task_target(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserId>, DialogError> {
        let key = SessionKey::PendingTaskTarget(user_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        raw.parse::<UserId>()
            .map(Some)
            .map_err(|_| DialogError::CorruptValue { key: key.to_string(), value: raw })
    }

    pub async fn clear_pending_task_target(&self, user_id: UserId) -> Result<(), SessionError> {
        self.store.delete(&SessionKey::PendingTaskTarget(user_id)).await
    }
}
