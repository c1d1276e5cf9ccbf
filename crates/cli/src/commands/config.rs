use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use taskbot_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config),
        Err(error) => format!("config validation failed: {error}"),
    }
}

fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: Vec<(&str, String, &str)> = vec![
        ("database.url", config.database.url.clone(), "TASKBOT_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "TASKBOT_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "TASKBOT_DATABASE_TIMEOUT_SECS",
        ),
        ("session.ttl_secs", config.session.ttl_secs.to_string(), "TASKBOT_SESSION_TTL_SECS"),
        (
            "telegram.bot_token",
            redact_token(config.telegram.bot_token.expose_secret()),
            "TASKBOT_TELEGRAM_BOT_TOKEN",
        ),
        ("telegram.bot_link", config.telegram.bot_link.clone(), "TASKBOT_TELEGRAM_BOT_LINK"),
        (
            "assets.labels_path",
            config.assets.labels_path.display().to_string(),
            "TASKBOT_ASSETS_LABELS_PATH",
        ),
        (
            "assets.commands_path",
            config.assets.commands_path.display().to_string(),
            "TASKBOT_ASSETS_COMMANDS_PATH",
        ),
        (
            "dispatch.ordering",
            config.dispatch.ordering.as_str().to_string(),
            "TASKBOT_DISPATCH_ORDERING",
        ),
        (
            "dispatch.worker_idle_secs",
            config.dispatch.worker_idle_secs.to_string(),
            "TASKBOT_DISPATCH_WORKER_IDLE_SECS",
        ),
        (
            "dispatch.notify_unrecognized",
            config.dispatch.notify_unrecognized.to_string(),
            "TASKBOT_DISPATCH_NOTIFY_UNRECOGNIZED",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "TASKBOT_SERVER_BIND_ADDRESS"),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            "TASKBOT_SERVER_HEALTH_CHECK_PORT",
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "TASKBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "TASKBOT_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "TASKBOT_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_key) in entries {
        let source = field_source(
            key_path,
            env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {key_path} = {value} (source: {source})"));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("taskbot.toml"), PathBuf::from("config/taskbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps the numeric bot id and hides the secret half of `<id>:<secret>`.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "<redacted>".to_string(),
    }
}
