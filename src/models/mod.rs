//! Data structures for brackets and ladders: identities, matches, rows.

mod bracket;
mod identity;
mod ladder;
mod matchup;

pub use bracket::{Bracket, BracketError};
pub use identity::{to_user_id, UserId};
pub use ladder::{
    Gxe, H2hRecord, LadderEntry, LadderError, Outcome, MAX_RD, MIN_RD, PROVISIONAL_RD,
    STARTING_ELO, STARTING_GLICKO, STARTING_RD,
};
pub use matchup::{BracketMatch, MatchStatus};
