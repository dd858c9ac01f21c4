//! Snail - Individual participant state
//!
//! Each snail carries the platform id of the user who entered it, the name
//! shown on the progress board, and how far it has crawled.

use serde::{Deserialize, Serialize};

/// Opaque, platform-assigned participant id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub u64);

impl ParticipantId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Trail length of a snail sitting on the finish line
pub const TRAIL_WIDTH: u32 = 10;

/// Names longer than this are cut on the board
const NAME_WIDTH: usize = 32;

/// Complete state for a single snail
#[derive(Debug, Clone)]
pub struct Snail {
    /// Owner of the snail
    pub id: ParticipantId,
    /// Display name captured at join time
    pub name: String,
    /// Distance crawled, never decreases
    pub progress: u32,
}

impl Snail {
    /// Create a snail on the start line
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            progress: 0,
        }
    }

    /// Move forward by `step`
    pub fn crawl(&mut self, step: u32) {
        self.progress = self.progress.saturating_add(step);
    }

    pub fn has_finished(&self, finish_line: u32) -> bool {
        self.progress >= finish_line
    }
}

/// Compact snail state handed to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnailSnapshot {
    pub id: ParticipantId,
    pub name: String,
    pub progress: u32,
}

impl SnailSnapshot {
    /// One board line: `name: 🐌🐌🐌 (3/10)`. The trail is scaled to
    /// `TRAIL_WIDTH` and stops growing past the finish line.
    pub fn render(&self, finish_line: u32) -> String {
        let finish_line = finish_line.max(1);
        let trail = u64::from(self.progress.min(finish_line)) * u64::from(TRAIL_WIDTH)
            / u64::from(finish_line);
        let name: String = self.name.chars().take(NAME_WIDTH).collect();
        format!(
            "{}: {} ({}/{})",
            name,
            "🐌".repeat(trail as usize),
            self.progress,
            finish_line
        )
    }
}

impl From<&Snail> for SnailSnapshot {
    fn from(snail: &Snail) -> Self {
        Self {
            id: snail.id,
            name: snail.name.clone(),
            progress: snail.progress,
        }
    }
}
