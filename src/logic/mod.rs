//! Business logic: seeding, series play, and rating math.

pub mod elo;
pub mod glicko;
pub mod rating;
pub mod seeding;
pub mod series;

pub use rating::apply_battle;
pub use seeding::{first_round_pairs, seed_order};
pub use series::{
    advance_blocked_winners, build_bracket, can_match, can_search, force_win, opponent_of,
    record_win, status_text,
};
