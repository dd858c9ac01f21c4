//! `/race` slash command and the "Join Race" button

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serenity::all::{
    ButtonStyle, ChannelId, CommandInteraction, CommandOptionType, ComponentInteraction, Context,
    CreateActionRow, CreateButton, CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditMessage, Http, Mentionable, Message, UserId,
};

use crate::config::{Config, MAX_ENROLLMENT_SECS};
use crate::error::{BotError, RaceError};
use crate::race_engine::race::{display_len, RaceResult, RoundReport};
use crate::race_engine::snail::{ParticipantId, SnailSnapshot};
use crate::race_engine::track::{run_race, RaceObserver, RaceTracks};

pub const COMMAND_NAME: &str = "race";

/// Join button ids are `snail_race:join:<generation>`
pub const JOIN_BUTTON_PREFIX: &str = "snail_race:join:";

/// Discord rejects longer message contents
const MAX_MESSAGE_LEN: usize = 2000;

const DELAY_OPTION: &str = "delay";

/// Slash command definition
pub fn register() -> CreateCommand {
    CreateCommand::new(COMMAND_NAME)
        .description("Start a Snail Race")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                DELAY_OPTION,
                "Seconds to wait for snails before the race starts",
            )
            .required(false),
        )
}

/// Resolve the enrollment window, returning the user notice on rejection
pub fn enrollment_window(requested: Option<i64>, config: &Config) -> Result<Duration, String> {
    let Some(secs) = requested else {
        return Ok(config.default_enrollment());
    };
    if secs < 0 {
        return Err("Delay cannot be negative".to_string());
    }
    if secs as u64 > MAX_ENROLLMENT_SECS {
        return Err(format!(
            "Delay must be less than {} seconds",
            MAX_ENROLLMENT_SECS
        ));
    }
    Ok(Duration::from_secs(secs as u64))
}

pub fn join_button_id(generation: u64) -> String {
    format!("{}{}", JOIN_BUTTON_PREFIX, generation)
}

/// Race generation carried by a join button id
pub fn parse_join_button_id(custom_id: &str) -> Option<u64> {
    custom_id.strip_prefix(JOIN_BUTTON_PREFIX)?.parse().ok()
}

fn join_button_row(generation: u64) -> CreateActionRow {
    CreateActionRow::Buttons(vec![CreateButton::new(join_button_id(generation))
        .label("Join Race")
        .style(ButtonStyle::Primary)])
}

/// Progress message for one round, kept within the message limit
pub fn progress_message(report: &RoundReport) -> String {
    let header = "Race in progress...\n";
    let board = report.render_within(MAX_MESSAGE_LEN - display_len(header));
    format!("{}{}", header, board)
}

fn notice(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

/// Open enrollment in the caller's channel and spawn the race loop
pub async fn handle_race_command(
    ctx: &Context,
    command: &CommandInteraction,
    tracks: &Arc<RaceTracks>,
    config: &Config,
) -> Result<(), BotError> {
    let requested = command
        .data
        .options
        .iter()
        .find(|option| option.name == DELAY_OPTION)
        .and_then(|option| option.value.as_i64());

    let enrollment = match enrollment_window(requested, config) {
        Ok(window) => window,
        Err(message) => {
            command.create_response(&ctx.http, notice(message)).await?;
            return Ok(());
        }
    };

    let track = command.channel_id.get();
    let generation = match tracks.open(track) {
        Ok(generation) => generation,
        Err(err) => {
            log::warn!(
                "Race rejected on track {} ({:?}): {:?}",
                track,
                tracks.state(track),
                err
            );
            command.create_response(&ctx.http, notice(err.to_string())).await?;
            return Ok(());
        }
    };

    let announcement = CreateInteractionResponseMessage::new()
        .content(format!(
            "{} has started a race!\nRace starting in {} seconds",
            command.user.id.mention(),
            enrollment.as_secs()
        ))
        .components(vec![join_button_row(generation)]);

    if let Err(err) = command
        .create_response(&ctx.http, CreateInteractionResponse::Message(announcement))
        .await
    {
        tracks.reset(track, generation);
        return Err(err.into());
    }

    let tracks = tracks.clone();
    let race_config = config.race.clone();
    let mut observer = ChannelObserver::new(ctx.http.clone(), command.channel_id);
    tokio::spawn(async move {
        let rng = StdRng::from_entropy();
        let outcome = run_race(
            tracks,
            track,
            generation,
            race_config,
            enrollment,
            rng,
            &mut observer,
        )
        .await;
        match outcome {
            Ok(result) => log::debug!("Race on track {} took {} rounds", track, result.rounds),
            Err(BotError::Race(RaceError::NoEntrants)) => {
                log::info!("Race on track {} called off, no entrants", track);
                if let Err(err) = observer.announce(RaceError::NoEntrants.to_string()).await {
                    log::error!("Failed to announce cancelled race: {}", err);
                }
            }
            Err(err) => log::error!("Race on track {} aborted: {}", track, err),
        }
    });

    Ok(())
}

/// Enter the clicking user into the race the button belongs to
pub async fn handle_join_button(
    ctx: &Context,
    component: &ComponentInteraction,
    generation: u64,
    tracks: &RaceTracks,
) -> Result<(), BotError> {
    let track = component.channel_id.get();
    let user = &component.user;
    let joined = tracks.join(
        track,
        generation,
        ParticipantId(user.id.get()),
        user.name.clone(),
    );

    let response = match joined {
        Ok(field) => {
            log::info!("{} joined track {} ({} snails)", user.name, track, field);
            let names: Vec<String> = tracks
                .entrants(track)
                .into_iter()
                .map(|snail| snail.name)
                .collect();
            let content = format!(
                "{} has joined the race!\nSnails on the line: {}",
                user.id.mention(),
                names.join(", ")
            );
            // A big field can outgrow the message, drop the roster then
            let content = if display_len(&content) > MAX_MESSAGE_LEN {
                format!("{} has joined the race! ({} snails)", user.id.mention(), field)
            } else {
                content
            };
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new().content(content),
            )
        }
        Err(err) => {
            log::warn!("{} could not join track {}: {:?}", user.name, track, err);
            notice(err.to_string())
        }
    };

    component.create_response(&ctx.http, response).await?;
    Ok(())
}

/// Posts race progress to a channel, editing one message per round
pub struct ChannelObserver {
    http: Arc<Http>,
    channel: ChannelId,
    board: Option<Message>,
}

impl ChannelObserver {
    pub fn new(http: Arc<Http>, channel: ChannelId) -> Self {
        Self {
            http,
            channel,
            board: None,
        }
    }

    pub async fn announce(&self, content: impl Into<String>) -> Result<Message, BotError> {
        Ok(self.channel.say(&self.http, content).await?)
    }
}

#[async_trait]
impl RaceObserver for ChannelObserver {
    async fn race_started(&mut self, _field: &[SnailSnapshot]) -> Result<(), BotError> {
        self.board = Some(self.announce("Race is starting").await?);
        Ok(())
    }

    async fn round_finished(&mut self, report: &RoundReport) -> Result<(), BotError> {
        let content = progress_message(report);
        if let Some(board) = self.board.as_mut() {
            board
                .edit(&self.http, EditMessage::new().content(content))
                .await?;
        } else {
            self.board = Some(self.announce(content).await?);
        }
        Ok(())
    }

    async fn race_won(&mut self, result: &RaceResult) -> Result<(), BotError> {
        let winner = UserId::new(result.winner.id.get());
        self.announce(format!("{} wins the race!", winner.mention()))
            .await?;
        Ok(())
    }
}
