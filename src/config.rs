//! Bot configuration loaded from the environment

use std::time::Duration;

use crate::error::ConfigError;
use crate::race_engine::race::RaceConfig;

/// Longest enrollment window a `/race` caller may ask for
pub const MAX_ENROLLMENT_SECS: u64 = 30;

const DEFAULT_ENROLLMENT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// Register commands on this guild only, otherwise globally
    pub guild_id: Option<u64>,
    /// Enrollment window when `/race` is called without a delay
    pub default_enrollment_secs: u64,
    pub race: RaceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DISCORD_TOKEN".to_string()))?;

        // Discord snowflakes are never zero
        let guild_id = match lookup("DISCORD_GUILD_ID") {
            Some(value) => match parse_var::<u64>("DISCORD_GUILD_ID", value.clone())? {
                0 => {
                    return Err(ConfigError::InvalidEnvVar {
                        name: "DISCORD_GUILD_ID".to_string(),
                        value,
                    })
                }
                id => Some(id),
            },
            None => None,
        };

        let default_enrollment_secs = match lookup("RACE_ENROLLMENT_SECS") {
            Some(value) => {
                let secs: u64 = parse_var("RACE_ENROLLMENT_SECS", value.clone())?;
                if secs > MAX_ENROLLMENT_SECS {
                    return Err(ConfigError::InvalidEnvVar {
                        name: "RACE_ENROLLMENT_SECS".to_string(),
                        value,
                    });
                }
                secs
            }
            None => DEFAULT_ENROLLMENT_SECS,
        };

        let race = match lookup("RACE_SETTINGS") {
            Some(path) => load_race_settings(&path)?,
            None => RaceConfig::default(),
        };

        Ok(Self {
            discord_token,
            guild_id,
            default_enrollment_secs,
            race,
        })
    }

    pub fn default_enrollment(&self) -> Duration {
        Duration::from_secs(self.default_enrollment_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value,
    })
}

/// Read a JSON `RaceConfig`, missing fields take their defaults
pub fn load_race_settings(path: &str) -> Result<RaceConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::SettingsRead {
        path: path.to_string(),
        source,
    })?;
    let config: RaceConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::SettingsParse {
            path: path.to_string(),
            source,
        })?;
    config.validate()?;
    log::info!("Loaded race settings from {}", path);
    Ok(config)
}
