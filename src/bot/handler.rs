use std::sync::Arc;

use serenity::all::{Command, Context, EventHandler, GuildId, Interaction, Ready};
use serenity::async_trait;

use crate::bot::race;
use crate::config::Config;
use crate::error::BotError;
use crate::race_engine::track::RaceTracks;

/// Discord bot event handler
pub struct Handler {
    config: Arc<Config>,
    tracks: Arc<RaceTracks>,
}

impl Handler {
    pub fn new(config: Arc<Config>, tracks: Arc<RaceTracks>) -> Self {
        Self { config, tracks }
    }
}

#[async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready and connected to Discord
    async fn ready(&self, ctx: Context, ready: Ready) {
        log::info!("{} is connected to Discord", ready.user.name);

        if let Err(e) = register_commands(&ctx, self.config.guild_id).await {
            log::error!("Failed to register slash commands: {}", e);
        }
    }

    /// Routes slash commands and button clicks
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let outcome = match interaction {
            Interaction::Command(command) if command.data.name == race::COMMAND_NAME => {
                log::info!("Received '{}' command from {}", command.data.name, command.user.name);
                race::handle_race_command(&ctx, &command, &self.tracks, &self.config).await
            }
            Interaction::Component(component) => {
                match race::parse_join_button_id(&component.data.custom_id) {
                    Some(generation) => {
                        race::handle_join_button(&ctx, &component, generation, &self.tracks)
                            .await
                    }
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        };

        if let Err(e) = outcome {
            log::error!("Failed to handle interaction: {}", e);
        }
    }
}

async fn register_commands(ctx: &Context, guild_id: Option<u64>) -> Result<(), BotError> {
    let commands = vec![race::register()];

    match guild_id {
        Some(id) => {
            let registered = GuildId::new(id).set_commands(&ctx.http, commands).await?;
            log::info!("Registered {} commands on guild {}", registered.len(), id);
        }
        None => {
            for command in commands {
                Command::create_global_command(&ctx.http, command).await?;
            }
            log::info!("Registered global commands");
        }
    }
    Ok(())
}
