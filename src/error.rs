//! Error types
//!
//! `RaceError` covers every recoverable race condition; its `Display` text is
//! the short notice shown to the user. `BotError` is the top-level type used
//! by the Discord layer.

use thiserror::Error;

/// Recoverable race conditions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceError {
    /// Participant tried to join the same race twice
    #[error("You already joined the race! 🐌")]
    AlreadyJoined,

    /// Enrollment closed with nobody signed up
    #[error("Nobody joined the race, so it was called off 🐌")]
    NoEntrants,

    /// A race is already enrolling or running on this track
    #[error("A race is already underway here, wait for it to finish!")]
    AlreadyRunning,

    /// Join attempted while no enrollment window is open
    #[error("This race is no longer accepting snails.")]
    NotEnrolling,

    /// Race settings failed validation
    #[error("invalid race settings: {0}")]
    InvalidConfig(String),
}

/// Configuration errors raised at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingEnvVar(String),

    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnvVar { name: String, value: String },

    #[error("failed to read race settings from {path}: {source}")]
    SettingsRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse race settings from {path}: {source}")]
    SettingsParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Race(#[from] RaceError),
}

/// Top-level bot error
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Race(#[from] RaceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Boxed, `serenity::Error` is large
    #[error(transparent)]
    Discord(#[from] Box<serenity::Error>),
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord(Box::new(err))
    }
}
