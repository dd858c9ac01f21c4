//! Track - Per-channel engines and the async race loop
//!
//! Each chat channel gets its own `RaceEngine`. `run_race` drives one race
//! from enrollment countdown to winner, suspending between rounds without
//! blocking the runtime, and always leaves the track `Idle` when it returns
//! or is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::{BotError, RaceError};
use crate::race_engine::engine::{EngineState, RaceEngine};
use crate::race_engine::race::{Race, RaceConfig, RaceResult, RoundReport};
use crate::race_engine::snail::{ParticipantId, SnailSnapshot};

/// Track key, the id of the channel the race runs in
pub type TrackId = u64;

/// Registry of race engines keyed by channel
#[derive(Debug, Default)]
pub struct RaceTracks {
    engines: Mutex<HashMap<TrackId, RaceEngine>>,
}

impl RaceTracks {
    pub fn new() -> Self {
        Self::default()
    }

    fn engines(&self) -> MutexGuard<'_, HashMap<TrackId, RaceEngine>> {
        // Engine operations never panic midway, the map stays consistent
        self.engines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self, track: TrackId) -> EngineState {
        self.engines()
            .get(&track)
            .map(RaceEngine::state)
            .unwrap_or_default()
    }

    pub fn entrants(&self, track: TrackId) -> Vec<SnailSnapshot> {
        self.engines()
            .get(&track)
            .map(RaceEngine::entrants)
            .unwrap_or_default()
    }

    /// Open enrollment on a track. Returns the new race's generation.
    pub fn open(&self, track: TrackId) -> Result<u64, RaceError> {
        let mut engines = self.engines();
        let generation = engines.entry(track).or_default().open_enrollment()?;
        let active = engines.values().filter(|engine| !engine.is_idle()).count();
        log::info!(
            "Enrollment opened on track {} (race {}, {} active tracks)",
            track,
            generation,
            active
        );
        Ok(generation)
    }

    /// Enter a snail in race `generation` on a track. Returns the field size
    /// after joining. Joins aimed at an older race are `NotEnrolling`.
    pub fn join(
        &self,
        track: TrackId,
        generation: u64,
        id: ParticipantId,
        name: impl Into<String>,
    ) -> Result<usize, RaceError> {
        let mut engines = self.engines();
        let engine = engines
            .get_mut(&track)
            .filter(|engine| engine.generation() == generation)
            .ok_or(RaceError::NotEnrolling)?;
        engine.join(id, name)
    }

    pub fn start(&self, track: TrackId, config: RaceConfig) -> Result<Race, RaceError> {
        self.engines().entry(track).or_default().start(config)
    }

    pub fn finish(&self, track: TrackId, result: &RaceResult) {
        if let Some(engine) = self.engines().get_mut(&track) {
            engine.finish(result);
            log::debug!(
                "Track {} has completed {} races",
                track,
                engine.races_completed()
            );
        }
    }

    /// Put race `generation` back to `Idle`. A newer race on the same track
    /// is left alone.
    pub fn reset(&self, track: TrackId, generation: u64) {
        if let Some(engine) = self.engines().get_mut(&track) {
            if engine.reset_generation(generation) {
                log::info!("Track {} reset (race {})", track, generation);
            }
        }
    }
}

/// Receives race progress for display
#[async_trait]
pub trait RaceObserver: Send {
    /// Enrollment closed and the field is set
    async fn race_started(&mut self, field: &[SnailSnapshot]) -> Result<(), BotError>;

    /// A round finished
    async fn round_finished(&mut self, report: &RoundReport) -> Result<(), BotError>;

    /// The race has a winner
    async fn race_won(&mut self, result: &RaceResult) -> Result<(), BotError>;
}

/// Resets its own race when dropped, covering errors and task cancellation
struct ResetGuard {
    tracks: Arc<RaceTracks>,
    track: TrackId,
    generation: u64,
}

impl Drop for ResetGuard {
    fn drop(&mut self) {
        self.tracks.reset(self.track, self.generation);
    }
}

/// Run race `generation` on a track whose enrollment is already open.
///
/// Waits out the enrollment window, then plays rounds until a winner is
/// found, reporting each one to `observer`.
pub async fn run_race<R, O>(
    tracks: Arc<RaceTracks>,
    track: TrackId,
    generation: u64,
    config: RaceConfig,
    enrollment: Duration,
    mut rng: R,
    observer: &mut O,
) -> Result<RaceResult, BotError>
where
    R: Rng + Send,
    O: RaceObserver + ?Sized,
{
    let _guard = ResetGuard {
        tracks: tracks.clone(),
        track,
        generation,
    };

    tokio::time::sleep(enrollment).await;

    let mut race = tracks.start(track, config)?;
    let field = race.standings();
    log::info!("Race started on track {} with {} snails", track, field.len());
    observer.race_started(&field).await?;

    // next_round only returns None after a winner is set
    let result = loop {
        if let Some(report) = race.next_round(&mut rng) {
            let delay = race.config().round_delay(&mut rng);
            tokio::time::sleep(delay).await;
            observer.round_finished(&report).await?;
        }
        if let Some(result) = race.result() {
            break result;
        }
    };

    // The track is free again from here, a new race may open while we announce
    tracks.finish(track, &result);
    observer.race_won(&result).await?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Default)]
    struct Recorder {
        started: Vec<SnailSnapshot>,
        rounds: Vec<RoundReport>,
        won: Option<RaceResult>,
        fail_on_round: Option<u32>,
        /// Open the next race on this track while the win is announced
        reopen: Option<Arc<RaceTracks>>,
        next_generation: Option<u64>,
    }

    #[async_trait]
    impl RaceObserver for Recorder {
        async fn race_started(&mut self, field: &[SnailSnapshot]) -> Result<(), BotError> {
            self.started = field.to_vec();
            Ok(())
        }

        async fn round_finished(&mut self, report: &RoundReport) -> Result<(), BotError> {
            if self.fail_on_round == Some(report.round) {
                return Err(RaceError::InvalidConfig("observer gave up".to_string()).into());
            }
            self.rounds.push(report.clone());
            Ok(())
        }

        async fn race_won(&mut self, result: &RaceResult) -> Result<(), BotError> {
            if let Some(tracks) = &self.reopen {
                let generation = tracks.open(1)?;
                tracks.join(1, generation, ParticipantId(77), "next")?;
                self.next_generation = Some(generation);
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.won = Some(result.clone());
            Ok(())
        }
    }

    async fn run(
        tracks: &Arc<RaceTracks>,
        generation: u64,
        enrollment_secs: u64,
        recorder: &mut Recorder,
    ) -> Result<RaceResult, BotError> {
        run_race(
            tracks.clone(),
            1,
            generation,
            RaceConfig::default(),
            Duration::from_secs(enrollment_secs),
            StdRng::seed_from_u64(3),
            recorder,
        )
        .await
    }

    #[test]
    fn tracks_are_isolated_per_channel() {
        let tracks = RaceTracks::new();
        let first = tracks.open(1).unwrap();
        tracks.open(2).unwrap();
        assert_eq!(tracks.open(1), Err(RaceError::AlreadyRunning));

        tracks.join(1, first, ParticipantId(10), "a").unwrap();
        assert_eq!(tracks.entrants(1).len(), 1);
        assert!(tracks.entrants(2).is_empty());
        assert_eq!(tracks.state(2), EngineState::Enrolling);
    }

    #[test]
    fn join_on_unknown_track_is_not_enrolling() {
        let tracks = RaceTracks::new();
        assert_eq!(
            tracks.join(5, 1, ParticipantId(1), "a"),
            Err(RaceError::NotEnrolling)
        );
        assert_eq!(tracks.state(5), EngineState::Idle);
    }

    #[test]
    fn join_for_an_older_race_is_rejected() {
        let tracks = RaceTracks::new();
        let old = tracks.open(1).unwrap();
        tracks.reset(1, old);
        let current = tracks.open(1).unwrap();

        assert_eq!(
            tracks.join(1, old, ParticipantId(10), "stale click"),
            Err(RaceError::NotEnrolling)
        );
        assert_eq!(tracks.join(1, current, ParticipantId(10), "fresh click"), Ok(1));
    }

    #[test]
    fn reset_with_old_generation_keeps_current_race() {
        let tracks = RaceTracks::new();
        let old = tracks.open(1).unwrap();
        tracks.reset(1, old);
        let current = tracks.open(1).unwrap();
        tracks.join(1, current, ParticipantId(10), "a").unwrap();

        tracks.reset(1, old);
        assert_eq!(tracks.state(1), EngineState::Enrolling);
        assert_eq!(tracks.entrants(1).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn race_runs_to_a_winner_and_resets() {
        let tracks = Arc::new(RaceTracks::new());
        let generation = tracks.open(1).unwrap();
        tracks.join(1, generation, ParticipantId(10), "a").unwrap();
        tracks.join(1, generation, ParticipantId(20), "b").unwrap();

        let mut recorder = Recorder::default();
        let result = run(&tracks, generation, 10, &mut recorder).await.unwrap();

        assert_eq!(recorder.started.len(), 2);
        assert_eq!(recorder.rounds.len() as u32, result.rounds);
        assert_eq!(recorder.rounds.last().unwrap().winner.as_ref(), Some(&result.winner));
        assert!(result.winner.progress >= 10);
        assert_eq!(recorder.won, Some(result));
        assert_eq!(tracks.state(1), EngineState::Idle);
        assert!(tracks.entrants(1).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn next_race_opened_during_announcement_survives() {
        let tracks = Arc::new(RaceTracks::new());
        let generation = tracks.open(1).unwrap();
        tracks.join(1, generation, ParticipantId(10), "a").unwrap();

        let mut recorder = Recorder {
            reopen: Some(tracks.clone()),
            ..Default::default()
        };
        run(&tracks, generation, 1, &mut recorder).await.unwrap();

        let next = recorder.next_generation.unwrap();
        assert_ne!(next, generation);
        assert_eq!(tracks.state(1), EngineState::Enrolling);
        assert_eq!(tracks.entrants(1)[0].name, "next");
        assert_eq!(tracks.join(1, next, ParticipantId(78), "another"), Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn joins_during_the_window_are_counted() {
        let tracks = Arc::new(RaceTracks::new());
        let generation = tracks.open(1).unwrap();

        let joiner = {
            let tracks = tracks.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                tracks.join(1, generation, ParticipantId(10), "late but welcome")
            })
        };

        let mut recorder = Recorder::default();
        run(&tracks, generation, 5, &mut recorder).await.unwrap();

        assert_eq!(joiner.await.unwrap(), Ok(1));
        assert_eq!(recorder.started[0].name, "late but welcome");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_window_reports_no_entrants() {
        let tracks = Arc::new(RaceTracks::new());
        let generation = tracks.open(1).unwrap();

        let mut recorder = Recorder::default();
        let err = run(&tracks, generation, 1, &mut recorder).await.unwrap_err();

        assert!(matches!(err, BotError::Race(RaceError::NoEntrants)));
        assert!(recorder.started.is_empty());
        assert_eq!(tracks.state(1), EngineState::Idle);
        assert!(tracks.open(1).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn observer_failure_still_resets() {
        let tracks = Arc::new(RaceTracks::new());
        let generation = tracks.open(1).unwrap();
        tracks.join(1, generation, ParticipantId(10), "a").unwrap();

        let mut recorder = Recorder {
            fail_on_round: Some(1),
            ..Default::default()
        };
        let result = run(&tracks, generation, 1, &mut recorder).await;

        assert!(result.is_err());
        assert!(recorder.won.is_none());
        assert_eq!(tracks.state(1), EngineState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_race_resets() {
        let tracks = Arc::new(RaceTracks::new());
        let generation = tracks.open(1).unwrap();
        tracks.join(1, generation, ParticipantId(10), "a").unwrap();

        let handle = {
            let tracks = tracks.clone();
            tokio::spawn(async move {
                let mut recorder = Recorder::default();
                run(&tracks, generation, 60, &mut recorder).await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(tracks.state(1), EngineState::Enrolling);
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(tracks.state(1), EngineState::Idle);
    }
}
