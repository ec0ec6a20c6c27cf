//! Bracket tournaments and rating ladders for a battle server.
//!
//! Two independent subsystems: a single-elimination bracket controller
//! (best-of-N series, standard seeding, freeze/resume, crash-safe CSV
//! persistence) and per-format rating ladders (dual ELO + Glicko-1 with GXE
//! and head-to-head records, TSV persistence). The chat/battle layer asks
//! the controller whether two players may battle and reports winners; it
//! asks a ladder store for ratings and submits finished rated battles.

pub mod config;
pub mod logic;
pub mod models;
pub mod storage;

pub use config::{load_defaults, Defaults};
pub use models::{
    to_user_id, Bracket, BracketError, BracketMatch, Gxe, H2hRecord, LadderEntry, LadderError,
    MatchStatus, Outcome, UserId, MAX_RD, MIN_RD, PROVISIONAL_RD, STARTING_ELO,
};
pub use storage::{BracketController, LadderRegistry, LadderStore, MessageSink};
