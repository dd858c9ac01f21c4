//! Discord surface
//!
//! Registers the `/race` slash command on connect and routes command and
//! button interactions to the race tracks. Each channel runs its own race.

pub mod handler;
pub mod race;
pub mod start;
