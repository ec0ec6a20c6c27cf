//! Ladder rows: dual ELO/Glicko-1 ratings, GXE, and head-to-head records.

use crate::models::identity::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Starting ELO for a fresh row; also the hard floor after every update.
pub const STARTING_ELO: f64 = 1000.0;
/// Glicko-1 starting rating for a fresh row.
pub const STARTING_GLICKO: f64 = 1500.0;
/// Glicko-1 starting deviation for a fresh row.
pub const STARTING_RD: f64 = 130.0;
/// Deviation bounds enforced after every update.
pub const MIN_RD: f64 = 10.0;
pub const MAX_RD: f64 = 350.0;
/// Above this deviation the rating is provisional and no GXE is shown.
pub const PROVISIONAL_RD: f64 = 100.0;

/// Errors from ladder persistence. Rating updates are battle-end hooks, so
/// these are logged rather than raised; the type names the failure for the
/// log line and for any future admin-facing caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LadderError {
    /// Writing the ladder file failed.
    Storage(String),
}

impl std::fmt::Display for LadderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LadderError::Storage(msg) => write!(f, "Could not persist ladder: {}", msg),
        }
    }
}

/// Confidence-weighted expected win probability against a 1500-rated
/// reference opponent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gxe {
    /// Percentage in [0, 100], two decimals.
    Percent(f64),
    /// Deviation above 100: rating still provisional.
    Unknown,
}

impl std::fmt::Display for Gxe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gxe::Percent(p) => write!(f, "{:.2}", p),
            Gxe::Unknown => write!(f, "Unknown"),
        }
    }
}

impl Gxe {
    /// Parse the TSV field: the literal `Unknown` or a percentage.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "Unknown" {
            return Some(Gxe::Unknown);
        }
        s.parse::<f64>().ok().map(Gxe::Percent)
    }
}

/// Outcome bucket for the win/loss/tie counters, from one side's score.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

impl Outcome {
    /// Counter thresholds: above 0.6 is a win, below 0.4 a loss, else a tie.
    pub fn from_score(score: f64) -> Self {
        if score > 0.6 {
            Outcome::Win
        } else if score < 0.4 {
            Outcome::Loss
        } else {
            Outcome::Tie
        }
    }

    /// The same battle seen from the other side.
    pub fn reversed(self) -> Self {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Tie => Outcome::Tie,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Win => "won",
            Outcome::Loss => "lost",
            Outcome::Tie => "tied",
        }
    }
}

/// Head-to-head record against one opponent.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct H2hRecord {
    pub w: u32,
    pub l: u32,
    pub t: u32,
}

/// One player's row on a format ladder.
#[derive(Clone, Debug, PartialEq)]
pub struct LadderEntry {
    pub user_id: UserId,
    pub elo: f64,
    pub display_name: String,
    pub w: u32,
    pub l: u32,
    pub t: u32,
    pub glicko: f64,
    /// Rating deviation, always within [`MIN_RD`, `MAX_RD`].
    pub rd: f64,
    pub gxe: Gxe,
    pub games: u32,
    pub last_update: String,
    /// Opponent id to lifetime record. JSON-encoded in the TSV.
    pub h2h: HashMap<UserId, H2hRecord>,
}

impl LadderEntry {
    /// A fresh, unrated row.
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            elo: STARTING_ELO,
            display_name: display_name.into(),
            w: 0,
            l: 0,
            t: 0,
            glicko: STARTING_GLICKO,
            rd: STARTING_RD,
            gxe: Gxe::Unknown,
            games: 0,
            last_update: String::new(),
            h2h: HashMap::new(),
        }
    }

    /// This row's record against `opponent` (all-zero if they never played).
    pub fn h2h_against(&self, opponent: &str) -> H2hRecord {
        self.h2h.get(opponent).copied().unwrap_or_default()
    }

    /// Bump the per-opponent record by one battle.
    pub fn record_h2h(&mut self, opponent: &str, outcome: Outcome) {
        let rec = self.h2h.entry(opponent.to_string()).or_default();
        match outcome {
            Outcome::Win => rec.w += 1,
            Outcome::Loss => rec.l += 1,
            Outcome::Tie => rec.t += 1,
        }
    }

    /// Bump the win/loss/tie counters and the game count.
    pub fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.w += 1,
            Outcome::Loss => self.l += 1,
            Outcome::Tie => self.t += 1,
        }
        self.games += 1;
    }
}
