use std::sync::Arc;
use std::time::Duration;

use taskbot_chat::{
    callback_registry, message_registry, BotService, BotServiceParts, ChatTransport, Dispatcher,
    ReconnectPolicy, UpdateRunner, UpdateSource,
};
use taskbot_core::config::{AppConfig, ConfigError, LoadOptions};
use taskbot_core::labels::{CatalogError, CommandTable, LabelCatalog};
use taskbot_core::session::DialogSessions;
use taskbot_db::repositories::{SqlTaskRepository, SqlTeamRepository, SqlUserRepository};
use taskbot_db::{connect_with_config, migrations, DbPool, SqlSessionStore};
use thiserror::Error;
use tracing::{info, warn};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(600);

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub dispatcher: Arc<Dispatcher>,
    pub session_store: SqlSessionStore,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("static assets failed to load: {0}")]
    Assets(#[from] CatalogError),
}

pub async fn bootstrap(
    options: LoadOptions,
    transport: Arc<dyn ChatTransport>,
) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config, transport).await
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    transport: Arc<dyn ChatTransport>,
) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let labels = Arc::new(LabelCatalog::load(&config.assets.labels_path)?);
    let commands = Arc::new(CommandTable::load(&config.assets.commands_path)?);
    info!(
        event_name = "system.bootstrap.assets_loaded",
        labels = labels.len(),
        commands = commands.len(),
        "label catalog and command table loaded"
    );

    let session_store = SqlSessionStore::new(db_pool.clone());
    let sessions = DialogSessions::new(Arc::new(session_store.clone()), config.session.ttl());

    let service = BotService::new(BotServiceParts {
        users: Arc::new(SqlUserRepository::new(db_pool.clone())),
        teams: Arc::new(SqlTeamRepository::new(db_pool.clone())),
        tasks: Arc::new(SqlTaskRepository::new(db_pool.clone())),
        sessions: sessions.clone(),
        transport,
        labels: Arc::clone(&labels),
        bot_link: config.telegram.bot_link.clone(),
    });

    let dispatcher = Dispatcher::new(
        message_registry(&service),
        callback_registry(&service),
        sessions,
        labels,
        commands,
    )
    .notify_unrecognized(config.dispatch.notify_unrecognized);

    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        message_handlers = dispatcher.message_handler_count(),
        callback_handlers = dispatcher.callback_handler_count(),
        ordering = config.dispatch.ordering.as_str(),
        "dispatcher ready"
    );

    Ok(Application { config, db_pool, dispatcher: Arc::new(dispatcher), session_store })
}

impl Application {
    pub fn runner(&self, source: Arc<dyn UpdateSource>) -> UpdateRunner {
        UpdateRunner::new(source, Arc::clone(&self.dispatcher), ReconnectPolicy::default())
            .with_ordering(
                self.config.dispatch.ordering,
                self.config.dispatch.worker_idle_timeout(),
            )
    }

    /// Periodically deletes expired dialog state.
    pub fn spawn_session_purge(&self) -> tokio::task::JoinHandle<()> {
        let store = self.session_store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
            loop {
                interval.tick().await;
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => {
                        info!(
                            event_name = "system.session.purged",
                            purged,
                            "expired sessions purged"
                        )
                    }
                    Err(error) => warn!(
                        event_name = "system.session.purge_failed",
                        error = %error,
                        "session purge failed"
                    ),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use taskbot_chat::{DispatchOutcome, InboundEvent, NoopTransport, Resolution};
    use taskbot_core::commands::CommandKey;
    use taskbot_core::config::{ConfigOverrides, LoadOptions};
    use taskbot_core::domain::UserId;

    use crate::bootstrap::{bootstrap, BootstrapError};

    const TEXTS: &str = include_str!("../../../assets/texts.json");
    const COMMANDS: &str = include_str!("../../../assets/commands.json");

    fn write_asset(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create asset");
        file.write_all(body.as_bytes()).expect("write asset");
        path
    }

    fn options(
        dir: &tempfile::TempDir,
        labels: std::path::PathBuf,
        commands: std::path::PathBuf,
    ) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(format!("sqlite://{}", dir.path().join("taskbot.db").display())),
                bot_token: Some("12345:test-token".to_string()),
                labels_path: Some(labels),
                commands_path: Some(commands),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_wires_the_dispatcher_against_sqlite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let labels = write_asset(&dir, "texts.json", TEXTS);
        let commands = write_asset(&dir, "commands.json", COMMANDS);

        let app = bootstrap(options(&dir, labels, commands), Arc::new(NoopTransport))
            .await
            .expect("bootstrap should succeed");

        assert_eq!(app.dispatcher.message_handler_count(), CommandKey::ALL.len());
        let outcome = app.dispatcher.dispatch(InboundEvent::text(UserId(9), "/sign_up")).await;
        assert_eq!(outcome, DispatchOutcome::Handled(Resolution::Literal(CommandKey::SignUp)));

        let (cursor,): (String,) =
            sqlx::query_as("SELECT value FROM session_entry WHERE key = '9'")
                .fetch_one(&app.db_pool)
                .await
                .expect("cursor persisted");
        assert_eq!(cursor, "/login");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn missing_assets_abort_startup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let commands = write_asset(&dir, "commands.json", COMMANDS);

        let result =
            bootstrap(options(&dir, dir.path().join("absent.json"), commands), Arc::new(NoopTransport))
                .await;

        assert!(matches!(result, Err(BootstrapError::Assets(_))));
    }

    #[tokio::test]
    async fn malformed_command_table_aborts_startup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let labels = write_asset(&dir, "texts.json", TEXTS);
        let commands = write_asset(&dir, "commands.json", r#"{"team": "/no_such_command"}"#);

        let result = bootstrap(options(&dir, labels, commands), Arc::new(NoopTransport)).await;

        assert!(matches!(result, Err(BootstrapError::Assets(_))));
    }
}
