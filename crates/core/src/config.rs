use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub telegram: TelegramConfig,
    pub assets: AssetsConfig,
    pub dispatch: DispatchConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub ttl_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Public `https://t.me/<bot>` address; invite links append `?start=...` to it.
    pub bot_link: String,
}

#[derive(Clone, Debug)]
pub struct AssetsConfig {
    pub labels_path: PathBuf,
    pub commands_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct DispatchConfig {
    pub ordering: DispatchOrdering,
    pub worker_idle_secs: u64,
    /// Send the unrecognized-input reply when no handler matches free text.
    pub notify_unrecognized: bool,
}

impl DispatchConfig {
    pub fn worker_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_idle_secs)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

impl ServerConfig {
    pub fn graceful_shutdown(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_secs)
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOrdering {
    /// One task per event; events of one user may overlap.
    #[default]
    Concurrent,
    /// One sequential worker per active user.
    PerUser,
}

impl DispatchOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Concurrent => "concurrent",
            Self::PerUser => "per_user",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub bot_link: Option<String>,
    pub dispatch_ordering: Option<DispatchOrdering>,
    pub labels_path: Option<PathBuf>,
    pub commands_path: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://taskbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            session: SessionConfig { ttl_secs: 7 * 24 * 60 * 60 },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                bot_link: "https://t.me/taskbot".to_string(),
            },
            assets: AssetsConfig {
                labels_path: PathBuf::from("assets/texts.json"),
                commands_path: PathBuf::from("assets/commands.json"),
            },
            dispatch: DispatchConfig {
                ordering: DispatchOrdering::Concurrent,
                worker_idle_secs: 30,
                notify_unrecognized: false,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for DispatchOrdering {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "per_user" | "per-user" => Ok(Self::PerUser),
            other => Err(ConfigError::Validation(format!(
                "unsupported dispatch ordering `{other}` (expected concurrent|per_user)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

/// Invite deep link for `team_id`; the start payload is what the chat
/// normalizer decodes back into a join request.
pub fn invite_link(bot_link: &str, team_id: i64) -> String {
    format!("{}?start=new_team_user_{team_id}", bot_link.trim_end_matches('/'))
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("taskbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn invite_link(&self, team_id: i64) -> String {
        invite_link(&self.telegram.bot_link, team_id)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(session) = patch.session {
            if let Some(ttl_secs) = session.ttl_secs {
                self.session.ttl_secs = ttl_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(bot_link) = telegram.bot_link {
                self.telegram.bot_link = bot_link;
            }
        }

        if let Some(assets) = patch.assets {
            if let Some(labels_path) = assets.labels_path {
                self.assets.labels_path = labels_path;
            }
            if let Some(commands_path) = assets.commands_path {
                self.assets.commands_path = commands_path;
            }
        }

        if let Some(dispatch) = patch.dispatch {
            if let Some(ordering) = dispatch.ordering {
                self.dispatch.ordering = ordering;
            }
            if let Some(worker_idle_secs) = dispatch.worker_idle_secs {
                self.dispatch.worker_idle_secs = worker_idle_secs;
            }
            if let Some(notify_unrecognized) = dispatch.notify_unrecognized {
                self.dispatch.notify_unrecognized = notify_unrecognized;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TASKBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TASKBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("TASKBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TASKBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TASKBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TASKBOT_SESSION_TTL_SECS") {
            self.session.ttl_secs = parse_u64("TASKBOT_SESSION_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("TASKBOT_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("TASKBOT_TELEGRAM_BOT_LINK") {
            self.telegram.bot_link = value;
        }

        if let Some(value) = read_env("TASKBOT_ASSETS_LABELS_PATH") {
            self.assets.labels_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("TASKBOT_ASSETS_COMMANDS_PATH") {
            self.assets.commands_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("TASKBOT_DISPATCH_ORDERING") {
            self.dispatch.ordering = value.parse()?;
        }
        if let Some(value) = read_env("TASKBOT_DISPATCH_WORKER_IDLE_SECS") {
            self.dispatch.worker_idle_secs =
                parse_u64("TASKBOT_DISPATCH_WORKER_IDLE_SECS", &value)?;
        }
        if let Some(value) = read_env("TASKBOT_DISPATCH_NOTIFY_UNRECOGNIZED") {
            self.dispatch.notify_unrecognized =
                parse_bool("TASKBOT_DISPATCH_NOTIFY_UNRECOGNIZED", &value)?;
        }

        if let Some(value) = read_env("TASKBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TASKBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("TASKBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("TASKBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TASKBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("TASKBOT_LOGGING_LEVEL").or_else(|| read_env("TASKBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TASKBOT_LOGGING_FORMAT").or_else(|| read_env("TASKBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(bot_link) = overrides.bot_link {
            self.telegram.bot_link = bot_link;
        }
        if let Some(ordering) = overrides.dispatch_ordering {
            self.dispatch.ordering = ordering;
        }
        if let Some(labels_path) = overrides.labels_path {
            self.assets.labels_path = labels_path;
        }
        if let Some(commands_path) = overrides.commands_path {
            self.assets.commands_path = commands_path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_session(&self.session)?;
        validate_telegram(&self.telegram)?;
        validate_dispatch(&self.dispatch)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("taskbot.toml"), PathBuf::from("config/taskbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.ttl_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let token = telegram.bot_token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather with /newbot".to_string(),
        ));
    }

    let well_formed = token
        .split_once(':')
        .map(|(bot_id, secret)| {
            !bot_id.is_empty() && bot_id.chars().all(|c| c.is_ascii_digit()) && !secret.is_empty()
        })
        .unwrap_or(false);
    if !well_formed {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    let link = telegram.bot_link.trim();
    if !link.starts_with("https://") && !link.starts_with("http://") {
        return Err(ConfigError::Validation(
            "telegram.bot_link must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> Result<(), ConfigError> {
    if dispatch.ordering == DispatchOrdering::PerUser && dispatch.worker_idle_secs == 0 {
        return Err(ConfigError::Validation(
            "dispatch.worker_idle_secs must be greater than zero for per_user ordering"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    session: Option<SessionPatch>,
    telegram: Option<TelegramPatch>,
    assets: Option<AssetsPatch>,
    dispatch: Option<DispatchPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    bot_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetsPatch {
    labels_path: Option<PathBuf>,
    commands_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct DispatchPatch {
    ordering: Option<DispatchOrdering>,
    worker_idle_secs: Option<u64>,
    notify_unrecognized: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
