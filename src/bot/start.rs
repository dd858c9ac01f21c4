use std::sync::Arc;

use serenity::all::{Client, GatewayIntents};

use crate::bot::handler::Handler;
use crate::config::Config;
use crate::error::BotError;
use crate::race_engine::track::RaceTracks;

/// Starts the Discord bot, blocking until the client shuts down
pub async fn start_bot(config: Config) -> Result<(), BotError> {
    // Slash commands and buttons arrive as interactions, no privileged intents needed
    let intents = GatewayIntents::GUILDS;

    let token = config.discord_token.clone();
    let handler = Handler::new(Arc::new(config), Arc::new(RaceTracks::new()));

    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await?;

    log::info!("Starting Discord bot...");

    client.start().await?;

    Ok(())
}
