//! Run economy and skill progression for the henhouse game.
//!
//! [`gameplay::GameSession`] is the entry point: it owns the economy, the
//! skill levels and derived stats, the round state machine and the save slot.

pub mod config;
pub mod gameplay;
