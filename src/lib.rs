//! Snail Race Bot
//!
//! Discord bot running turn-based snail races, one per channel.

pub mod bot;
pub mod config;
pub mod error;
pub mod race_engine;

use config::Config;
use error::BotError;

fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::warn!("Logger already initialized");
    }
}

/// Load configuration and run the bot until it disconnects
pub async fn run() -> Result<(), BotError> {
    // Load before the logger so RUST_LOG can come from .env
    let dotenv = dotenvy::dotenv();
    init_logging();
    if let Err(e) = dotenv {
        log::debug!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;
    log::info!(
        "Snail race bot configured: finish line {}, steps {}..={}, default window {}s",
        config.race.finish_line,
        config.race.min_step,
        config.race.max_step,
        config.default_enrollment_secs
    );

    bot::start::start_bot(config).await
}
