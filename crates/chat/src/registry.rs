use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use taskbot_core::commands::{CallbackKey, CommandKey};
use taskbot_core::credentials::CredentialError;
use taskbot_core::errors::DomainError;
use taskbot_core::session::{DialogError, SessionError};
use taskbot_db::repositories::RepositoryError;

use crate::events::Situation;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Dialog(#[from] DialogError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Input(#[from] DomainError),
    #[error("handler expected a {expected} payload")]
    UnexpectedPayload { expected: &'static str },
}

impl HandlerError {
    /// Malformed user input: dropped without telling the user.
    pub fn is_decode(&self) -> bool {
        match self {
            Self::Input(error) => error.is_decode_failure(),
            Self::Dialog(DialogError::CorruptValue { .. }) => true,
            Self::UnexpectedPayload { .. } => true,
            _ => false,
        }
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

pub type Handler = Arc<dyn Fn(Situation) -> HandlerFuture + Send + Sync>;

/// Wraps a service method taking `self: Arc<S>` into a [`Handler`].
pub fn bind<S, F, Fut>(service: &Arc<S>, method: F) -> Handler
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Situation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    let service = Arc::clone(service);
    Arc::new(move |situation| Box::pin(method(Arc::clone(&service), situation)))
}

/// Exact-key handler table, built once at startup.
pub struct HandlerRegistry<K> {
    handlers: HashMap<K, Handler>,
}

pub type MessageRegistry = HandlerRegistry<CommandKey>;
pub type CallbackRegistry = HandlerRegistry<CallbackKey>;

impl<K> Default for HandlerRegistry<K> {
    fn default() -> Self {
        Self { handlers: HashMap::new() }
    }
}

impl<K> HandlerRegistry<K>
where
    K: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (K, Handler)>) -> Self {
        let mut registry = Self::new();
        for (key, handler) in entries {
            registry.register(key, handler);
        }
        registry
    }

    /// A second registration for the same key replaces the first.
    pub fn register(&mut self, key: K, handler: Handler) {
        self.handlers.insert(key, handler);
    }

    pub fn get(&self, key: &K) -> Option<Handler> {
        self.handlers.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use taskbot_core::commands::CommandKey;
    use taskbot_core::domain::UserId;
    use taskbot_core::errors::DomainError;

    use super::{bind, HandlerError, MessageRegistry};
    use crate::events::{Payload, SenderProfile, Situation};

    struct Counter {
        hits: AtomicUsize,
        weight: usize,
    }

    impl Counter {
        async fn hit(self: Arc<Self>, _situation: Situation) -> Result<(), HandlerError> {
            self.hits.fetch_add(self.weight, Ordering::SeqCst);
            Ok(())
        }
    }

    fn situation() -> Situation {
        Situation {
            user_id: UserId(1),
            payload: Payload::Text("/start".to_owned()),
            team_id: None,
            sender: SenderProfile::default(),
        }
    }

    #[tokio::test]
    async fn lookup_is_exact_and_last_registration_wins() {
        let first = Arc::new(Counter { hits: AtomicUsize::new(0), weight: 1 });
        let second = Arc::new(Counter { hits: AtomicUsize::new(0), weight: 10 });

        let mut registry = MessageRegistry::new();
        registry.register(CommandKey::Start, bind(&first, Counter::hit));
        registry.register(CommandKey::Start, bind(&second, Counter::hit));

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&CommandKey::Team).is_none());

        let handler = registry.get(&CommandKey::Start).expect("registered");
        handler(situation()).await.expect("handler runs");

        assert_eq!(first.hits.load(Ordering::SeqCst), 0);
        assert_eq!(second.hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn invalid_input_classifies_as_decode() {
        let error = HandlerError::from(DomainError::InvalidInput {
            field: "task_id",
            value: "abc".to_owned(),
        });
        assert!(error.is_decode());
    }
}
