#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use taskbot_chat::{
    callback_registry, message_registry, BotService, BotServiceParts, ChatTransport,
    DispatchOutcome, Dispatcher, InboundEvent, OutboundMessage, TransportError,
};
use taskbot_core::domain::UserId;
use taskbot_core::labels::{CommandTable, LabelCatalog};
use taskbot_core::session::{
    DialogSessions, InMemorySessionStore, SessionError, SessionKey, SessionStore,
    DEFAULT_SESSION_TTL,
};
use taskbot_db::repositories::{
    InMemoryTaskRepository, InMemoryTeamRepository, InMemoryUserRepository,
};

pub const BOT_LINK: &str = "https://t.me/taskbot_test";

const TEXTS: &str = include_str!("../../../../assets/texts.json");
const COMMANDS: &str = include_str!("../../../../assets/commands.json");

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingTransport {
    pub async fn all(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn texts_to(&self, user_id: UserId) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|message| message.chat_id == user_id)
            .map(|message| message.text.clone())
            .collect()
    }

    pub async fn last_to(&self, user_id: UserId) -> Option<OutboundMessage> {
        self.sent.lock().await.iter().rev().find(|message| message.chat_id == user_id).cloned()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.sent.lock().await.push(message);
        Ok(())
    }
}

/// Every call fails as if the backing store were down.
pub struct UnavailableSessionStore;

#[async_trait]
impl SessionStore for UnavailableSessionStore {
    async fn set(&self, _: &SessionKey, _: &str, _: Duration) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("connection refused".to_owned()))
    }

    async fn get(&self, _: &SessionKey) -> Result<Option<String>, SessionError> {
        Err(SessionError::Unavailable("connection refused".to_owned()))
    }

    async fn delete(&self, _: &SessionKey) -> Result<(), SessionError> {
        Err(SessionError::Unavailable("connection refused".to_owned()))
    }
}

pub struct RejectingTransport;

#[async_trait]
impl ChatTransport for RejectingTransport {
    async fn send(&self, _: OutboundMessage) -> Result<(), TransportError> {
        Err(TransportError::Send("chat not found".to_owned()))
    }
}

pub fn repository_assets() -> (LabelCatalog, CommandTable) {
    let labels = LabelCatalog::from_json_str("texts.json", TEXTS).expect("texts parse");
    let commands = CommandTable::from_json_str("commands.json", COMMANDS).expect("commands parse");
    (labels, commands)
}

/// Handler stack over fresh in-memory repositories with the given session
/// store, transport and assets.
pub fn dispatcher_over(
    store: Arc<dyn SessionStore>,
    transport: Arc<dyn ChatTransport>,
    labels: LabelCatalog,
    commands: CommandTable,
) -> Dispatcher {
    let users = Arc::new(InMemoryUserRepository::default());
    let teams = Arc::new(InMemoryTeamRepository::new(users.clone()));
    let tasks = Arc::new(InMemoryTaskRepository::default());
    let sessions = DialogSessions::new(store, DEFAULT_SESSION_TTL);
    let labels = Arc::new(labels);

    let service = BotService::new(BotServiceParts {
        users,
        teams,
        tasks,
        sessions: sessions.clone(),
        transport,
        labels: labels.clone(),
        bot_link: BOT_LINK.to_owned(),
    });

    Dispatcher::new(
        message_registry(&service),
        callback_registry(&service),
        sessions,
        labels,
        Arc::new(commands),
    )
}

/// Full handler stack over in-memory repositories and sessions.
pub struct Harness {
    pub users: Arc<InMemoryUserRepository>,
    pub teams: Arc<InMemoryTeamRepository>,
    pub tasks: Arc<InMemoryTaskRepository>,
    pub store: Arc<InMemorySessionStore>,
    pub sessions: DialogSessions,
    pub transport: Arc<RecordingTransport>,
    pub labels: Arc<LabelCatalog>,
    pub dispatcher: Arc<Dispatcher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(false)
    }

    pub fn notifying_unrecognized() -> Self {
        Self::build(true)
    }

    fn build(notify_unrecognized: bool) -> Self {
        let labels = Arc::new(LabelCatalog::from_json_str("texts.json", TEXTS).expect("texts parse"));
        let commands =
            Arc::new(CommandTable::from_json_str("commands.json", COMMANDS).expect("commands parse"));

        let users = Arc::new(InMemoryUserRepository::default());
        let teams = Arc::new(InMemoryTeamRepository::new(users.clone()));
        let tasks = Arc::new(InMemoryTaskRepository::default());
        let store = Arc::new(InMemorySessionStore::new());
        let sessions = DialogSessions::new(store.clone(), DEFAULT_SESSION_TTL);
        let transport = Arc::new(RecordingTransport::default());

        let service = BotService::new(BotServiceParts {
            users: users.clone(),
            teams: teams.clone(),
            tasks: tasks.clone(),
            sessions: sessions.clone(),
            transport: transport.clone(),
            labels: labels.clone(),
            bot_link: BOT_LINK.to_owned(),
        });

        let dispatcher = Dispatcher::new(
            message_registry(&service),
            callback_registry(&service),
            sessions.clone(),
            labels.clone(),
            commands,
        )
        .notify_unrecognized(notify_unrecognized);

        Self {
            users,
            teams,
            tasks,
            store,
            sessions,
            transport,
            labels,
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn label(&self, key: &str) -> String {
        self.labels.text(key)
    }

    pub async fn say(&self, user_id: UserId, text: &str) -> DispatchOutcome {
        self.dispatcher.dispatch(InboundEvent::text(user_id, text)).await
    }

    pub async fn press(&self, user_id: UserId, data: &str) -> DispatchOutcome {
        self.dispatcher.dispatch(InboundEvent::callback(user_id, data)).await
    }

    pub async fn register(&self, user_id: UserId, login: &str) {
        self.say(user_id, "/sign_up").await;
        self.say(user_id, login).await;
        self.say(user_id, "secret-password").await;
        self.say(user_id, "/start").await;
    }

    /// Registers `owner`, creates a team and returns its id.
    pub async fn team_with_owner(&self, owner: UserId, login: &str, team: &str) -> i64 {
        use taskbot_db::repositories::TeamRepository;

        self.register(owner, login).await;
        self.say(owner, "/create_team").await;
        self.say(owner, team).await;
        self.teams.team_of(owner).await.expect("team lookup").expect("team created").0
    }
}
