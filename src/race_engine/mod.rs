//! Race Engine Module
//!
//! Turn-based snail race: enrollment, rounds of random crawling, and a
//! single winner per race. Platform-agnostic, the bot layer drives it.

pub mod engine;
pub mod race;
pub mod snail;
pub mod track;

pub use engine::{EngineState, RaceEngine};
pub use race::{Race, RaceConfig, RaceResult, RoundReport, TieBreak};
pub use snail::{ParticipantId, Snail, SnailSnapshot};
pub use track::{run_race, RaceObserver, RaceTracks, TrackId};
