//! Error types for the signup bot.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Registration errors.
///
/// All of these are recoverable: the conversation shows a short corrective
/// message and stays in (or re-enters) the step that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("access code is not valid")]
    InvalidCode,

    #[error("access code belongs to another user")]
    UnauthorizedCode,

    #[error("unknown stage: {stage}")]
    InvalidStage { stage: String },

    #[error("wrong admin secret")]
    WrongAdminSecret,

    #[error("draft is missing its {field}")]
    IncompleteDraft { field: &'static str },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
