//! Race - Race configuration and round simulation
//!
//! Handles race setup, the per-round crawl, and finish detection.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::RaceError;
use crate::race_engine::snail::{Snail, SnailSnapshot};

/// How a winner is picked when several snails cross in the same round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Highest progress wins, equal progress goes to the earliest joiner
    #[default]
    FurthestAhead,
    /// First crossing snail in join order wins
    JoinOrder,
}

/// Race configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Progress needed to win
    pub finish_line: u32,
    /// Smallest crawl per round
    pub min_step: u32,
    /// Largest crawl per round
    pub max_step: u32,
    /// Pause between rounds, lower bound in seconds
    pub min_round_delay_secs: u64,
    /// Pause between rounds, upper bound in seconds
    pub max_round_delay_secs: u64,
    pub tie_break: TieBreak,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            finish_line: 10,
            min_step: 1,
            max_step: 3,
            min_round_delay_secs: 1,
            max_round_delay_secs: 3,
            tie_break: TieBreak::default(),
        }
    }
}

impl RaceConfig {
    pub fn validate(&self) -> Result<(), RaceError> {
        if self.finish_line == 0 {
            return Err(RaceError::InvalidConfig(
                "finish_line must be greater than zero".to_string(),
            ));
        }
        // A zero step could leave every snail parked forever
        if self.min_step == 0 {
            return Err(RaceError::InvalidConfig(
                "min_step must be greater than zero".to_string(),
            ));
        }
        if self.min_step > self.max_step {
            return Err(RaceError::InvalidConfig(format!(
                "min_step ({}) exceeds max_step ({})",
                self.min_step, self.max_step
            )));
        }
        if self.min_round_delay_secs > self.max_round_delay_secs {
            return Err(RaceError::InvalidConfig(format!(
                "min_round_delay_secs ({}) exceeds max_round_delay_secs ({})",
                self.min_round_delay_secs, self.max_round_delay_secs
            )));
        }
        Ok(())
    }

    /// Pick the pause before the next progress update
    pub fn round_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs(rng.gen_range(self.min_round_delay_secs..=self.max_round_delay_secs))
    }
}

/// Progress after one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    /// 1-based round number
    pub round: u32,
    pub finish_line: u32,
    /// Every snail in join order
    pub standings: Vec<SnailSnapshot>,
    /// Set on the final round only
    pub winner: Option<SnailSnapshot>,
}

/// Room kept for the "…and N more snails" footer
const OVERFLOW_RESERVE: usize = 32;

/// Length as chat platforms count it, in UTF-16 code units
pub fn display_len(text: &str) -> usize {
    text.encode_utf16().count()
}

impl RoundReport {
    /// Multi-line progress board
    pub fn render(&self) -> String {
        self.standings
            .iter()
            .map(|snail| snail.render(self.finish_line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Progress board no longer than `max_len` (see `display_len`).
    /// Snails that don't fit are summarised on a last line.
    pub fn render_within(&self, max_len: usize) -> String {
        let budget = max_len.saturating_sub(OVERFLOW_RESERVE);
        let mut board = String::new();
        let mut used = 0;

        for (shown, snail) in self.standings.iter().enumerate() {
            let line = snail.render(self.finish_line);
            let cost = display_len(&line) + usize::from(shown > 0);
            if shown > 0 {
                if used + cost > budget {
                    let hidden = self.standings.len() - shown;
                    board.push_str(&format!("\n…and {} more snails", hidden));
                    break;
                }
                board.push('\n');
            }
            board.push_str(&line);
            used += cost;
        }
        board
    }
}

/// Final race outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResult {
    pub winner: SnailSnapshot,
    pub rounds: u32,
    pub standings: Vec<SnailSnapshot>,
}

/// A race in progress. Built by `RaceEngine::start` from the enrolled snails.
#[derive(Debug, Clone)]
pub struct Race {
    config: RaceConfig,
    snails: Vec<Snail>,
    round: u32,
    winner: Option<usize>,
}

impl Race {
    /// Create a race from snails in join order. Fails on an empty field.
    pub fn new(config: RaceConfig, snails: Vec<Snail>) -> Result<Self, RaceError> {
        config.validate()?;
        if snails.is_empty() {
            return Err(RaceError::NoEntrants);
        }
        Ok(Self {
            config,
            snails,
            round: 0,
            winner: None,
        })
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    pub fn standings(&self) -> Vec<SnailSnapshot> {
        self.snails.iter().map(SnailSnapshot::from).collect()
    }

    pub fn winner(&self) -> Option<SnailSnapshot> {
        self.winner.map(|i| SnailSnapshot::from(&self.snails[i]))
    }

    /// Advance every snail once, in join order, then check the finish line.
    /// Returns `None` once the race has a winner.
    pub fn next_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<RoundReport> {
        if self.is_finished() {
            return None;
        }

        for snail in &mut self.snails {
            let step = rng.gen_range(self.config.min_step..=self.config.max_step);
            snail.crawl(step);
        }
        self.round += 1;
        self.winner = self.pick_winner();

        log::debug!(
            "Round {} done, leader at {}",
            self.round,
            self.snails.iter().map(|s| s.progress).max().unwrap_or(0)
        );

        Some(RoundReport {
            round: self.round,
            finish_line: self.config.finish_line,
            standings: self.standings(),
            winner: self.winner(),
        })
    }

    /// Lazily yield one report per round until the race is won
    pub fn rounds<'a, R: Rng + ?Sized>(&'a mut self, rng: &'a mut R) -> Rounds<'a, R> {
        Rounds { race: self, rng }
    }

    /// Final outcome, available once a winner exists
    pub fn result(&self) -> Option<RaceResult> {
        self.winner().map(|winner| RaceResult {
            winner,
            rounds: self.round,
            standings: self.standings(),
        })
    }

    fn pick_winner(&self) -> Option<usize> {
        let finish_line = self.config.finish_line;
        let mut crossed = self
            .snails
            .iter()
            .enumerate()
            .filter(|(_, snail)| snail.has_finished(finish_line));

        match self.config.tie_break {
            TieBreak::JoinOrder => crossed.next().map(|(i, _)| i),
            TieBreak::FurthestAhead => crossed
                .max_by(|(ia, a), (ib, b)| a.progress.cmp(&b.progress).then(ib.cmp(ia)))
                .map(|(i, _)| i),
        }
    }
}

/// Iterator over the remaining rounds of a race
pub struct Rounds<'a, R: Rng + ?Sized> {
    race: &'a mut Race,
    rng: &'a mut R,
}

impl<R: Rng + ?Sized> Iterator for Rounds<'_, R> {
    type Item = RoundReport;

    fn next(&mut self) -> Option<Self::Item> {
        self.race.next_round(&mut *self.rng)
    }
}
