mod bootstrap;
mod health;
mod telegram;

use std::sync::Arc;

use anyhow::Result;
use secrecy::ExposeSecret;
use taskbot_chat::ChannelSource;
use taskbot_core::config::{AppConfig, LoadOptions};
use teloxide::Bot;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

fn init_logging(config: &AppConfig) {
    use taskbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let bot = Bot::new(config.telegram.bot_token.expose_secret());
    let transport = Arc::new(telegram::TelegramTransport::new(bot.clone()));
    let app = bootstrap::bootstrap_with_config(config, transport).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
        app.config.dispatch.ordering,
    )
    .await?;
    let purge = app.spawn_session_purge();

    let (sender, source) = ChannelSource::channel(UPDATE_CHANNEL_CAPACITY);
    let runner = app.runner(Arc::new(source));
    let running = tokio::spawn(async move { runner.start().await });

    tracing::info!(event_name = "system.server.started", "taskbot-server started");
    let polling = telegram::spawn_polling(bot, sender);
    if let Err(error) = polling.await {
        tracing::warn!(
            event_name = "system.server.polling_failed",
            error = %error,
            "polling task failed"
        );
    }

    tracing::info!(event_name = "system.server.stopping", "draining in-flight updates");
    match tokio::time::timeout(app.config.server.graceful_shutdown(), running).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(error))) => tracing::warn!(
            event_name = "system.server.runner_failed",
            error = %error,
            "update runner failed"
        ),
        Ok(Err(error)) => tracing::warn!(
            event_name = "system.server.runner_failed",
            error = %error,
            "update runner panicked"
        ),
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            "graceful shutdown timed out with updates still in flight"
        ),
    }

    purge.abort();
    app.db_pool.close().await;
    tracing::info!(event_name = "system.server.stopped", "taskbot-server stopped");
    Ok(())
}
