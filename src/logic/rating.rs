//! Applying one rated battle to both players' ladder rows.

use crate::logic::{elo, glicko};
use crate::models::{LadderEntry, Outcome};

/// Apply `p1_score` (p1's result in [0, 1]: 1 win, 0 loss, 0.5 tie) to both
/// rows in place: ELO, Glicko-1, GXE, win/loss/tie counters, head-to-head,
/// and the last-update stamp.
///
/// A negative score marks a scored-invalidated battle: both sides are forced
/// to 0 and get no rating credit.
///
/// Returns (p1 score used, p1 new ELO, p2 new ELO).
pub fn apply_battle(
    p1: &mut LadderEntry,
    p2: &mut LadderEntry,
    p1_score: f64,
    timestamp: &str,
) -> (f64, f64, f64) {
    let (s1, s2) = if p1_score < 0.0 {
        (0.0, 0.0)
    } else {
        (p1_score, 1.0 - p1_score)
    };

    let (old_elo1, old_elo2) = (p1.elo, p2.elo);
    p1.elo = elo::updated_elo(old_elo1, old_elo2, p1.games, s1);
    p2.elo = elo::updated_elo(old_elo2, old_elo1, p2.games, s2);

    let (old_g1, old_rd1) = (p1.glicko, p1.rd);
    let (old_g2, old_rd2) = (p2.glicko, p2.rd);
    let (g1, rd1) = glicko::updated_glicko(old_g1, old_rd1, old_g2, old_rd2, s1);
    let (g2, rd2) = glicko::updated_glicko(old_g2, old_rd2, old_g1, old_rd1, s2);
    p1.glicko = g1;
    p1.rd = rd1;
    p1.gxe = glicko::gxe(g1, rd1);
    p2.glicko = g2;
    p2.rd = rd2;
    p2.gxe = glicko::gxe(g2, rd2);

    p1.record_outcome(Outcome::from_score(s1));
    p2.record_outcome(Outcome::from_score(s2));

    // The head-to-head patch is driven by p1's outcome alone so the two maps
    // stay mirror images of each other.
    let h2h_outcome = Outcome::from_score(s1);
    let p2_id = p2.user_id.clone();
    p1.record_h2h(&p2_id, h2h_outcome);
    p2.record_h2h(&p1.user_id, h2h_outcome.reversed());

    p1.last_update = timestamp.to_string();
    p2.last_update = timestamp.to_string();

    (s1, p1.elo, p2.elo)
}
