//! Bracket match record and its lifecycle status.

use crate::models::identity::UserId;
use serde::{Deserialize, Serialize};

/// Where a match is in its lifecycle.
///
/// Transitions run `Pending -> Waiting -> Active -> Complete`, or directly
/// `Pending -> Active` when both slots fill at once.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Later-round match with no players assigned yet.
    Pending,
    /// Exactly one player assigned.
    Waiting,
    /// Both players assigned, series in progress.
    Active,
    /// Winner decided.
    Complete,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Waiting => "waiting",
            MatchStatus::Active => "active",
            MatchStatus::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MatchStatus::Pending),
            "waiting" => Some(MatchStatus::Waiting),
            "active" => Some(MatchStatus::Active),
            "complete" => Some(MatchStatus::Complete),
            _ => None,
        }
    }
}

/// One bracket match: a best-of-N series between two slots.
///
/// Empty strings in `p1` / `p2` / `winner` mean "not assigned yet".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BracketMatch {
    pub round: u32,
    /// Unique, ascending from 1, round-major.
    pub match_id: u32,
    pub p1: UserId,
    pub p2: UserId,
    pub p1_display: String,
    pub p2_display: String,
    pub p1_wins: u32,
    pub p2_wins: u32,
    pub status: MatchStatus,
    pub winner: UserId,
    pub winner_display: String,
    /// When the series went active. In-memory only, not persisted.
    pub started_at: Option<String>,
}

impl BracketMatch {
    /// A round-one match with both players assigned and the series live.
    pub fn active(
        round: u32,
        match_id: u32,
        p1: UserId,
        p1_display: String,
        p2: UserId,
        p2_display: String,
        started_at: String,
    ) -> Self {
        Self {
            round,
            match_id,
            p1,
            p2,
            p1_display,
            p2_display,
            p1_wins: 0,
            p2_wins: 0,
            status: MatchStatus::Active,
            winner: String::new(),
            winner_display: String::new(),
            started_at: Some(started_at),
        }
    }

    /// A later-round match with both slots still empty.
    pub fn pending(round: u32, match_id: u32) -> Self {
        Self {
            round,
            match_id,
            p1: String::new(),
            p2: String::new(),
            p1_display: String::new(),
            p2_display: String::new(),
            p1_wins: 0,
            p2_wins: 0,
            status: MatchStatus::Pending,
            winner: String::new(),
            winner_display: String::new(),
            started_at: None,
        }
    }

    /// Whether `id` occupies one of this match's slots.
    pub fn has_player(&self, id: &str) -> bool {
        !id.is_empty() && (self.p1 == id || self.p2 == id)
    }

    /// The other slot's id, if `id` is in this match.
    pub fn opponent_of(&self, id: &str) -> Option<&UserId> {
        if self.p1 == id {
            Some(&self.p2)
        } else if self.p2 == id {
            Some(&self.p1)
        } else {
            None
        }
    }
}
