//! Engine - Race lifecycle state machine
//!
//! Owns enrollment for a single track and hands a `Race` to whoever drives
//! the rounds: `Idle → Enrolling → Running → Finished → Idle`.

use serde::{Deserialize, Serialize};

use crate::error::RaceError;
use crate::race_engine::race::{Race, RaceConfig, RaceResult};
use crate::race_engine::snail::{ParticipantId, Snail, SnailSnapshot};

/// Lifecycle state of a track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    #[default]
    Idle,
    Enrolling,
    Running,
    Finished,
}

/// Race engine for one track
#[derive(Debug, Default)]
pub struct RaceEngine {
    /// Current lifecycle state
    state: EngineState,
    /// Snails signed up so far, in join order
    entrants: Vec<Snail>,
    /// Bumped on every enrollment so stale callers can be told apart
    generation: u64,
    /// Races that reached a winner
    races_completed: u64,
}

impl RaceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == EngineState::Idle
    }

    /// Generation of the current or most recent race
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn races_completed(&self) -> u64 {
        self.races_completed
    }

    pub fn entrants(&self) -> Vec<SnailSnapshot> {
        self.entrants.iter().map(SnailSnapshot::from).collect()
    }

    /// Open the enrollment window. Only allowed from `Idle`.
    ///
    /// Returns the generation identifying this race.
    pub fn open_enrollment(&mut self) -> Result<u64, RaceError> {
        if !self.is_idle() {
            return Err(RaceError::AlreadyRunning);
        }
        self.entrants.clear();
        self.generation += 1;
        self.state = EngineState::Enrolling;
        Ok(self.generation)
    }

    /// Enter a snail. Returns the field size after joining.
    pub fn join(&mut self, id: ParticipantId, name: impl Into<String>) -> Result<usize, RaceError> {
        if self.state != EngineState::Enrolling {
            return Err(RaceError::NotEnrolling);
        }
        if self.entrants.iter().any(|snail| snail.id == id) {
            return Err(RaceError::AlreadyJoined);
        }
        self.entrants.push(Snail::new(id, name));
        Ok(self.entrants.len())
    }

    /// Close enrollment and hand back the race to drive.
    ///
    /// A race already in flight is rejected with `AlreadyRunning`. An empty
    /// field or invalid settings reset the engine to `Idle`.
    pub fn start(&mut self, config: RaceConfig) -> Result<Race, RaceError> {
        match self.state {
            EngineState::Running | EngineState::Finished => {
                return Err(RaceError::AlreadyRunning)
            }
            EngineState::Idle | EngineState::Enrolling => {}
        }

        match Race::new(config, std::mem::take(&mut self.entrants)) {
            Ok(race) => {
                self.state = EngineState::Running;
                Ok(race)
            }
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    /// Record the outcome and return to `Idle`
    pub fn finish(&mut self, result: &RaceResult) {
        self.state = EngineState::Finished;
        self.races_completed += 1;
        log::info!(
            "{} won after {} rounds ({} snails, race #{})",
            result.winner.name,
            result.rounds,
            result.standings.len(),
            self.races_completed
        );
        self.reset();
    }

    /// Clear all race state
    pub fn reset(&mut self) {
        self.state = EngineState::Idle;
        self.entrants.clear();
    }

    /// Reset only if `generation` is still the current race.
    /// Returns whether anything was cleared.
    pub fn reset_generation(&mut self, generation: u64) -> bool {
        if self.generation != generation || self.is_idle() {
            return false;
        }
        self.reset();
        true
    }
}
