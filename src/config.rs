//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default admin secret, used when `BOT_ADMIN_SECRET` is not set.
pub const DEFAULT_ADMIN_SECRET: &str = "Dadyar.admin";

/// Stages offered when `BOT_STAGES` is not set.
pub const DEFAULT_STAGES: [&str; 4] = ["Stage 1", "Stage 2", "Stage 3", "Stage 4"];

/// Longest stage name that still fits in a 64-byte callback token.
const MAX_STAGE_NAME_BYTES: usize = 40;

/// Bot configuration.
#[derive(Debug)]
pub struct BotConfig {
    /// Telegram bot token. The Telegram channel is disabled without one.
    pub telegram_token: Option<SecretString>,
    /// Usernames or numeric ids allowed to talk to the bot (`*` = everyone).
    pub allowed_users: Vec<String>,
    /// Text file with one access code per line.
    pub codes_path: PathBuf,
    /// Secret that unlocks the admin dump. Fixed for the life of the process.
    pub admin_secret: SecretString,
    /// Stage names, in display order.
    pub stages: Vec<String>,
    /// Conversations idle longer than this are discarded.
    pub session_idle_timeout: Duration,
    /// How often idle conversations are swept.
    pub sweep_interval: Duration,
    /// Whether to run the stdin/stdout channel.
    pub enable_cli: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            allowed_users: vec!["*".to_string()],
            codes_path: PathBuf::from("codes.txt"),
            admin_secret: SecretString::from(DEFAULT_ADMIN_SECRET.to_string()),
            stages: DEFAULT_STAGES.map(String::from).to_vec(),
            session_idle_timeout: Duration::from_secs(3600), // 1 hour
            sweep_interval: Duration::from_secs(60),
            enable_cli: true,
        }
    }
}

impl BotConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_token = get("BOT_TOKEN").map(SecretString::from);

        let allowed_users = get("BOT_ALLOWED_USERS")
            .map(|v| split_list(&v))
            .unwrap_or(defaults.allowed_users);

        let codes_path = get("BOT_CODES_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.codes_path);

        let admin_secret = get("BOT_ADMIN_SECRET")
            .map(SecretString::from)
            .unwrap_or(defaults.admin_secret);

        let stages = match get("BOT_STAGES") {
            Some(v) => split_list(&v),
            None => defaults.stages,
        };
        validate_stages(&stages)?;

        let session_idle_timeout = match get("BOT_SESSION_IDLE_SECS") {
            Some(v) => Duration::from_secs(parse_positive("BOT_SESSION_IDLE_SECS", &v)?),
            None => defaults.session_idle_timeout,
        };

        let sweep_interval = match get("BOT_SWEEP_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(parse_positive("BOT_SWEEP_INTERVAL_SECS", &v)?),
            None => defaults.sweep_interval,
        };

        let enable_cli = match get("BOT_ENABLE_CLI") {
            Some(v) => parse_bool("BOT_ENABLE_CLI", &v)?,
            None => telegram_token.is_none(),
        };

        Ok(Self {
            telegram_token,
            allowed_users,
            codes_path,
            admin_secret,
            stages,
            session_idle_timeout,
            sweep_interval,
            enable_cli,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn validate_stages(stages: &[String]) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "BOT_STAGES".into(),
        message,
    };

    if stages.is_empty() {
        return Err(invalid("at least one stage is required".into()));
    }
    for (i, stage) in stages.iter().enumerate() {
        if stage.len() > MAX_STAGE_NAME_BYTES {
            return Err(invalid(format!(
                "stage name {stage:?} is longer than {MAX_STAGE_NAME_BYTES} bytes"
            )));
        }
        if stages[..i].contains(stage) {
            return Err(invalid(format!("duplicate stage name {stage:?}")));
        }
    }
    Ok(())
}

fn parse_positive(key: &str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a positive integer, got {value:?}"),
        }),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {value:?}"),
        }),
    }
}
