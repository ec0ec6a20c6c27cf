//! ELO updates with experience- and band-dependent K factors.

use crate::models::STARTING_ELO;

/// Expected score for a player rated `elo` against `foe_elo`.
/// Standard formula: E = 1 / (1 + 10^((foe - elo) / 400)).
pub fn expected_score(elo: f64, foe_elo: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((foe_elo - elo) / 400.0))
}

/// Effective K-factor for one player in one battle.
///
/// Base by experience: 32 under 20 games, 24 under 50, 16 after. Low ratings
/// (< 1100) move 8 points faster, capped at 32; high ratings (> 1600) move 4
/// points slower, floored at 12. With a gap over 200 points, an underdog win
/// is weighted 1.1x and a favorite loss 1.05x.
pub fn k_factor(games: u32, elo: f64, foe_elo: f64, score: f64) -> f64 {
    let mut k: f64 = if games < 20 {
        32.0
    } else if games < 50 {
        24.0
    } else {
        16.0
    };
    if elo < 1100.0 {
        k = (k + 8.0).min(32.0);
    }
    if elo > 1600.0 {
        k = (k - 4.0).max(12.0);
    }
    if (elo - foe_elo).abs() > 200.0 {
        let underdog = elo < foe_elo;
        if underdog && score > 0.5 {
            k *= 1.1;
        } else if !underdog && score < 0.5 {
            k *= 1.05;
        }
    }
    k
}

/// New rating after one battle, clamped at the 1000 floor.
pub fn updated_elo(elo: f64, foe_elo: f64, games: u32, score: f64) -> f64 {
    let k = k_factor(games, elo, foe_elo, score);
    let next = elo + k * (score - expected_score(elo, foe_elo));
    next.max(STARTING_ELO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_score_midpoint() {
        assert!((expected_score(1000.0, 1000.0) - 0.5).abs() < 1e-12);
        assert!(expected_score(1200.0, 1000.0) > 0.5);
        assert!(expected_score(1000.0, 1200.0) < 0.5);
    }

    #[test]
    fn k_factor_experience_bands() {
        // Mid-band rating so only experience applies.
        assert_eq!(k_factor(0, 1300.0, 1300.0, 1.0), 32.0);
        assert_eq!(k_factor(19, 1300.0, 1300.0, 1.0), 32.0);
        assert_eq!(k_factor(20, 1300.0, 1300.0, 1.0), 24.0);
        assert_eq!(k_factor(49, 1300.0, 1300.0, 1.0), 24.0);
        assert_eq!(k_factor(50, 1300.0, 1300.0, 1.0), 16.0);
    }

    #[test]
    fn k_factor_rating_bands() {
        // Low band boost is capped at 32.
        assert_eq!(k_factor(0, 1050.0, 1050.0, 1.0), 32.0);
        assert_eq!(k_factor(25, 1050.0, 1050.0, 1.0), 32.0);
        // High band reduction, floored at 12.
        assert_eq!(k_factor(60, 1700.0, 1700.0, 1.0), 12.0);
        assert_eq!(k_factor(25, 1700.0, 1700.0, 1.0), 20.0);
    }

    #[test]
    fn k_factor_upset_adjustments() {
        // Underdog win across a 200+ gap.
        let k = k_factor(60, 1300.0, 1600.0, 1.0);
        assert!((k - 16.0 * 1.1).abs() < 1e-12);
        // Favorite loss across a 200+ gap.
        let k = k_factor(60, 1600.0, 1300.0, 0.0);
        assert!((k - 16.0 * 1.05).abs() < 1e-12);
        // No adjustment on a tie.
        assert_eq!(k_factor(60, 1300.0, 1600.0, 0.5), 16.0);
    }

    #[test]
    fn first_win_from_the_floor() {
        // Fresh 1000 vs 1000: K = 32, E = 0.5.
        assert_eq!(updated_elo(1000.0, 1000.0, 0, 1.0), 1016.0);
        // The loser is held at the floor.
        assert_eq!(updated_elo(1000.0, 1000.0, 0, 0.0), 1000.0);
    }

    #[test]
    fn floor_binds_above_thousand_too() {
        assert!(updated_elo(1005.0, 1400.0, 30, 0.0) >= STARTING_ELO);
    }
}
