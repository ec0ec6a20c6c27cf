//! Bracket and BracketError.

use crate::models::identity::UserId;
use crate::models::matchup::{BracketMatch, MatchStatus};
use serde::Serialize;
use std::collections::HashMap;

/// Errors that can occur during bracket admin operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BracketError {
    /// A tournament is already in progress.
    AlreadyStarted,
    /// No tournament is in progress.
    NotStarted,
    /// Participant count must be a power of two and at least 2.
    BadPlayerCount(usize),
    /// Series length must be between 1 and 999.
    BestOfOutOfRange(u32),
    /// Two entrants canonicalize to the same id.
    DuplicatePlayer(String),
    /// A name canonicalizes to the empty id.
    InvalidName(String),
    /// The tournament is already frozen.
    AlreadyFrozen,
    /// The tournament is not frozen.
    NotFrozen,
    /// The player has no active series (force-win).
    NoActiveMatch(String),
    /// Persisting or removing the bracket file failed.
    Storage(String),
}

impl std::fmt::Display for BracketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BracketError::AlreadyStarted => write!(f, "A tournament is already in progress"),
            BracketError::NotStarted => write!(f, "No tournament is in progress"),
            BracketError::BadPlayerCount(n) => {
                write!(f, "Participant count must be a power of two and at least 2 (got {})", n)
            }
            BracketError::BestOfOutOfRange(n) => {
                write!(f, "Series length must be between 1 and 999 (got {})", n)
            }
            BracketError::DuplicatePlayer(name) => {
                write!(f, "Duplicate entrant: {}", name)
            }
            BracketError::InvalidName(name) => {
                write!(f, "Name has no usable characters: {}", name)
            }
            BracketError::AlreadyFrozen => write!(f, "The tournament is already frozen"),
            BracketError::NotFrozen => write!(f, "The tournament is not frozen"),
            BracketError::NoActiveMatch(name) => {
                write!(f, "{} has no active series", name)
            }
            BracketError::Storage(msg) => write!(f, "Could not persist tournament: {}", msg),
        }
    }
}

/// Full single-elimination bracket state for one tournament.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Bracket {
    pub format: String,
    /// Power of two, at least 2.
    pub participants: u32,
    pub best_of: u32,
    /// Deepest round that has gone active.
    pub current_round: u32,
    /// All matches, ascending `match_id`, round-major.
    pub matches: Vec<BracketMatch>,
    /// Back references: player id to the `match_id` of their non-complete
    /// match. Kept in sync with status transitions.
    pub player_to_match: HashMap<UserId, u32>,
    /// Original-case display name for every id seen in any match.
    pub display_names: HashMap<UserId, String>,
    pub frozen: bool,
}

impl Bracket {
    /// Number of rounds: log2 of the participant count.
    pub fn total_rounds(&self) -> u32 {
        self.participants.trailing_zeros()
    }

    /// Wins needed to take a best-of-N series. Draws do not count.
    pub fn wins_needed(&self) -> u32 {
        self.best_of / 2 + 1
    }

    pub fn match_by_id(&self, match_id: u32) -> Option<&BracketMatch> {
        self.matches.iter().find(|m| m.match_id == match_id)
    }

    pub fn match_by_id_mut(&mut self, match_id: u32) -> Option<&mut BracketMatch> {
        self.matches.iter_mut().find(|m| m.match_id == match_id)
    }

    /// Lowest `match_id` in `round`, if the round exists.
    pub fn first_match_id_of_round(&self, round: u32) -> Option<u32> {
        self.matches
            .iter()
            .filter(|m| m.round == round)
            .map(|m| m.match_id)
            .min()
    }

    /// Minimum round over all `Active` or `Waiting` matches; `current_round`
    /// when none exist. Gates matchmaking while frozen.
    pub fn earliest_incomplete_round(&self) -> u32 {
        self.matches
            .iter()
            .filter(|m| matches!(m.status, MatchStatus::Active | MatchStatus::Waiting))
            .map(|m| m.round)
            .min()
            .unwrap_or(self.current_round)
    }

    /// Display form for an id, falling back to the id itself.
    pub fn display_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.display_names.get(id).map(String::as_str).unwrap_or(id)
    }
}
