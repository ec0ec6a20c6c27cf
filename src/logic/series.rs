//! Series scoring, winner advancement, freeze handling, and status text.
//!
//! Everything here operates on a [`Bracket`] in memory; persistence and
//! admin-level validation live in the storage layer.

use crate::logic::seeding;
use crate::models::{to_user_id, Bracket, BracketError, BracketMatch, MatchStatus, UserId};
use rand::seq::SliceRandom;
use std::collections::HashMap;

fn now_string() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Build a fresh bracket.
///
/// 1. Validate the series length (1..=999) and the entrant count (power of
///    two, at least 2) and reject duplicate or empty canonical ids.
/// 2. Optionally shuffle the entrants (Fisher-Yates).
/// 3. Pair round one by standard seeding; later rounds are pre-allocated
///    empty with sequential match ids.
pub fn build_bracket(
    format: &str,
    players: &[String],
    best_of: u32,
    randomize: bool,
) -> Result<Bracket, BracketError> {
    if !(1..=999).contains(&best_of) {
        return Err(BracketError::BestOfOutOfRange(best_of));
    }
    let n = players.len();
    if n < 2 || !n.is_power_of_two() {
        return Err(BracketError::BadPlayerCount(n));
    }

    let mut names: Vec<String> = players.iter().map(|p| p.trim().to_string()).collect();
    let mut display_names: HashMap<UserId, String> = HashMap::new();
    for name in &names {
        let id = to_user_id(name);
        if id.is_empty() {
            return Err(BracketError::InvalidName(name.clone()));
        }
        if display_names.insert(id, name.clone()).is_some() {
            return Err(BracketError::DuplicatePlayer(name.clone()));
        }
    }
    if randomize {
        names.shuffle(&mut rand::thread_rng());
    }

    let participants = n as u32;
    let started = now_string();
    let mut matches = Vec::with_capacity(n - 1);
    let mut player_to_match = HashMap::new();
    let mut match_id = 1u32;
    for (i, j) in seeding::first_round_pairs(participants) {
        let p1 = to_user_id(&names[i]);
        let p2 = to_user_id(&names[j]);
        player_to_match.insert(p1.clone(), match_id);
        player_to_match.insert(p2.clone(), match_id);
        matches.push(BracketMatch::active(
            1,
            match_id,
            p1,
            names[i].clone(),
            p2,
            names[j].clone(),
            started.clone(),
        ));
        match_id += 1;
    }
    let total_rounds = participants.trailing_zeros();
    for round in 2..=total_rounds {
        for _ in 0..(participants >> round) {
            matches.push(BracketMatch::pending(round, match_id));
            match_id += 1;
        }
    }

    Ok(Bracket {
        format: format.to_string(),
        participants,
        best_of,
        current_round: 1,
        matches,
        player_to_match,
        display_names,
        frozen: false,
    })
}

/// Whether `a` and `b` are each other's opponents in an active series.
/// While frozen, the series must also sit in the earliest incomplete round.
pub fn can_match(b: &Bracket, player_a: &str, player_b: &str) -> bool {
    let id_a = to_user_id(player_a);
    let id_b = to_user_id(player_b);
    let Some(&match_id) = b.player_to_match.get(&id_a) else {
        return false;
    };
    let Some(m) = b.match_by_id(match_id) else {
        return false;
    };
    if m.status != MatchStatus::Active || m.opponent_of(&id_a).map(String::as_str) != Some(id_b.as_str()) {
        return false;
    }
    !b.frozen || m.round == b.earliest_incomplete_round()
}

/// Whether `player` may look for their bracket battle: their match is active
/// or waiting, with the same freeze restriction as [`can_match`].
pub fn can_search(b: &Bracket, player: &str) -> bool {
    let id = to_user_id(player);
    let Some(&match_id) = b.player_to_match.get(&id) else {
        return false;
    };
    let Some(m) = b.match_by_id(match_id) else {
        return false;
    };
    if !matches!(m.status, MatchStatus::Active | MatchStatus::Waiting) {
        return false;
    }
    !b.frozen || m.round == b.earliest_incomplete_round()
}

/// Opponent id for a player in an active series, if any.
pub fn opponent_of(b: &Bracket, player: &str) -> Option<UserId> {
    let id = to_user_id(player);
    let &match_id = b.player_to_match.get(&id)?;
    let m = b.match_by_id(match_id)?;
    if m.status != MatchStatus::Active {
        return None;
    }
    m.opponent_of(&id).cloned()
}

/// Record one battle win in the series shared by `winner` and `loser`.
///
/// Battle-end hook: when no active series pairs the two, this logs and
/// reports no change instead of failing. Returns whether state changed.
pub fn record_win(b: &mut Bracket, winner: &str, loser: &str) -> bool {
    let win_id = to_user_id(winner);
    let lose_id = to_user_id(loser);
    let Some(&match_id) = b.player_to_match.get(&win_id) else {
        log::warn!("battle result {} vs {} matches no active series", winner, loser);
        return false;
    };
    let needed = b.wins_needed();
    let finished = {
        let Some(m) = b.match_by_id_mut(match_id) else {
            log::error!("player map points at missing match {}", match_id);
            return false;
        };
        if m.status != MatchStatus::Active
            || m.opponent_of(&win_id).map(String::as_str) != Some(lose_id.as_str())
        {
            log::warn!("battle result {} vs {} matches no active series", winner, loser);
            return false;
        }
        if m.p1 == win_id {
            m.p1_wins += 1;
        } else {
            m.p2_wins += 1;
        }
        m.p1_wins >= needed || m.p2_wins >= needed
    };
    if finished {
        complete_match(b, match_id);
    }
    true
}

/// Admin verb: end the winner's active series immediately by raising their
/// score to the threshold, then run the normal completion path.
pub fn force_win(b: &mut Bracket, winner: &str) -> Result<(), BracketError> {
    let win_id = to_user_id(winner);
    let Some(&match_id) = b.player_to_match.get(&win_id) else {
        return Err(BracketError::NoActiveMatch(winner.to_string()));
    };
    let needed = b.wins_needed();
    {
        let m = b
            .match_by_id_mut(match_id)
            .ok_or_else(|| BracketError::NoActiveMatch(winner.to_string()))?;
        if m.status != MatchStatus::Active {
            return Err(BracketError::NoActiveMatch(winner.to_string()));
        }
        if m.p1 == win_id {
            m.p1_wins = needed;
        } else {
            m.p2_wins = needed;
        }
    }
    complete_match(b, match_id);
    Ok(())
}

/// Advance every completed match whose winner is not yet placed in the
/// following round, in ascending match id order. Called on resume.
pub fn advance_blocked_winners(b: &mut Bracket) {
    let total = b.total_rounds();
    let blocked: Vec<u32> = b
        .matches
        .iter()
        .filter(|m| m.status == MatchStatus::Complete && m.round < total)
        .filter(|m| !winner_already_placed(b, m))
        .map(|m| m.match_id)
        .collect();
    for match_id in blocked {
        place_winner(b, match_id);
    }
}

/// Multi-line human-readable bracket overview, rounds in order.
pub fn status_text(b: &Bracket) -> String {
    let mut out = format!(
        "{} single elimination: {} players, best of {}",
        b.format, b.participants, b.best_of
    );
    if b.frozen {
        out.push_str(" (frozen)");
    }
    for round in 1..=b.total_rounds() {
        out.push_str(&format!("\nRound {}:", round));
        for m in b.matches.iter().filter(|m| m.round == round) {
            let p1 = if m.p1_display.is_empty() { "(tbd)" } else { &m.p1_display };
            let p2 = if m.p2_display.is_empty() { "(tbd)" } else { &m.p2_display };
            out.push_str(&match m.status {
                MatchStatus::Pending => format!("\n  #{} {} vs {}", m.match_id, p1, p2),
                MatchStatus::Waiting => format!("\n  #{} {} vs {} [waiting]", m.match_id, p1, p2),
                MatchStatus::Active => format!(
                    "\n  #{} {} vs {} [{}-{}]",
                    m.match_id, p1, p2, m.p1_wins, m.p2_wins
                ),
                MatchStatus::Complete => format!(
                    "\n  #{} {} vs {} [{}-{}] winner: {}",
                    m.match_id, p1, p2, m.p1_wins, m.p2_wins, m.winner_display
                ),
            });
        }
    }
    out
}

/// Mark a decided series complete, clear both back references, and advance
/// the winner.
fn complete_match(b: &mut Bracket, match_id: u32) {
    let needed = b.wins_needed();
    let (p1, p2, winner_display) = {
        let Some(m) = b.match_by_id_mut(match_id) else {
            return;
        };
        m.status = MatchStatus::Complete;
        if m.p1_wins >= needed {
            m.winner = m.p1.clone();
            m.winner_display = m.p1_display.clone();
        } else {
            m.winner = m.p2.clone();
            m.winner_display = m.p2_display.clone();
        }
        (m.p1.clone(), m.p2.clone(), m.winner_display.clone())
    };
    b.player_to_match.remove(&p1);
    b.player_to_match.remove(&p2);
    log::info!("match {} complete: {} takes the series", match_id, winner_display);
    advance_winner(b, match_id);
}

/// Move a completed match's winner toward the next round, unless this was
/// the final or the bracket is frozen.
fn advance_winner(b: &mut Bracket, match_id: u32) {
    let Some(m) = b.match_by_id(match_id) else {
        return;
    };
    let round = m.round;
    let display = m.winner_display.clone();
    if round >= b.total_rounds() {
        log::info!("tournament over: {} wins the {} bracket", display, b.format);
        return;
    }
    if b.frozen {
        log::info!("bracket is frozen; {} will advance on resume", display);
        return;
    }
    place_winner(b, match_id);
}

/// The next-round match a completed match feeds into:
/// `floor((match_id - first id of round) / 2)` into round + 1.
fn advancement_target(b: &Bracket, match_id: u32, round: u32) -> Option<u32> {
    let first_id = b.first_match_id_of_round(round)?;
    let next_index = ((match_id - first_id) / 2) as usize;
    b.matches
        .iter()
        .filter(|m| m.round == round + 1)
        .map(|m| m.match_id)
        .nth(next_index)
}

fn winner_already_placed(b: &Bracket, m: &BracketMatch) -> bool {
    match advancement_target(b, m.match_id, m.round) {
        Some(target_id) => b
            .match_by_id(target_id)
            .map(|n| n.has_player(&m.winner))
            .unwrap_or(false),
        // Nowhere to place; leave the match alone rather than corrupt others.
        None => true,
    }
}

/// Place a completed match's winner into its next-round slot and update that
/// slot's status and the back references.
fn place_winner(b: &mut Bracket, match_id: u32) {
    let (round, winner, winner_display) = match b.match_by_id(match_id) {
        Some(m) => (m.round, m.winner.clone(), m.winner_display.clone()),
        None => return,
    };
    let Some(target_id) = advancement_target(b, match_id, round) else {
        log::error!(
            "match {} has no round-{} slot to advance into",
            match_id,
            round + 1
        );
        return;
    };
    let next_round = round + 1;
    let started = now_string();
    let activated = {
        let Some(n) = b.match_by_id_mut(target_id) else {
            return;
        };
        if n.p1.is_empty() {
            n.p1 = winner.clone();
            n.p1_display = winner_display;
        } else if n.p2.is_empty() {
            n.p2 = winner.clone();
            n.p2_display = winner_display;
        } else {
            log::error!(
                "both slots of match {} are already filled; cannot place {}",
                target_id,
                winner
            );
            return;
        }
        if !n.p1.is_empty() && !n.p2.is_empty() {
            n.status = MatchStatus::Active;
            n.started_at = Some(started);
            Some((n.p1.clone(), n.p2.clone()))
        } else {
            n.status = MatchStatus::Waiting;
            None
        }
    };
    match activated {
        Some((p1, p2)) => {
            log::info!(
                "match {} is live: {} vs {}",
                target_id,
                b.display_of(&p1),
                b.display_of(&p2)
            );
            b.player_to_match.insert(p1, target_id);
            b.player_to_match.insert(p2, target_id);
            if next_round > b.current_round {
                b.current_round = next_round;
            }
        }
        None => {
            b.player_to_match.insert(winner, target_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn four_player_bracket_shape() {
        let b = build_bracket("gen1ou", &players(&["Alice", "Bob", "Carol", "Dave"]), 20, false)
            .unwrap();
        assert_eq!(b.matches.len(), 3);
        assert_eq!(b.total_rounds(), 2);
        assert_eq!(b.wins_needed(), 11);
        // Standard seeding for 4: (1, 4) and (2, 3).
        assert_eq!((b.matches[0].p1.as_str(), b.matches[0].p2.as_str()), ("alice", "dave"));
        assert_eq!((b.matches[1].p1.as_str(), b.matches[1].p2.as_str()), ("bob", "carol"));
        assert_eq!(b.matches[2].status, MatchStatus::Pending);
        assert_eq!(b.matches[2].match_id, 3);
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            build_bracket("f", &players(&["A", "B", "C"]), 3, false),
            Err(BracketError::BadPlayerCount(3))
        );
        assert_eq!(
            build_bracket("f", &players(&["A", "B"]), 0, false),
            Err(BracketError::BestOfOutOfRange(0))
        );
        assert_eq!(
            build_bracket("f", &players(&["A", "B"]), 1000, false),
            Err(BracketError::BestOfOutOfRange(1000))
        );
        assert_eq!(
            build_bracket("f", &players(&["Ann", "ann!"]), 3, false),
            Err(BracketError::DuplicatePlayer("ann!".to_string()))
        );
        assert_eq!(
            build_bracket("f", &players(&["A", "??"]), 3, false),
            Err(BracketError::InvalidName("??".to_string()))
        );
    }

    #[test]
    fn force_win_completes_and_advances() {
        let mut b =
            build_bracket("f", &players(&["Alice", "Bob", "Carol", "Dave"]), 5, false).unwrap();
        force_win(&mut b, "alice").unwrap();
        assert_eq!(b.matches[0].status, MatchStatus::Complete);
        assert_eq!(b.matches[0].winner, "alice");
        assert_eq!(b.matches[2].status, MatchStatus::Waiting);
        assert_eq!(b.matches[2].p1, "alice");
        assert!(can_search(&b, "alice"));
        assert!(!can_match(&b, "alice", "dave"));
        assert_eq!(
            force_win(&mut b, "dave"),
            Err(BracketError::NoActiveMatch("dave".to_string()))
        );
    }
}
