//! Glicko-1 rating update and the GXE (Glixare) estimate.

use crate::models::{Gxe, MAX_RD, MIN_RD, PROVISIONAL_RD};
use std::f64::consts::{LN_10, PI};

const Q: f64 = LN_10 / 400.0;

/// Attenuation for the opponent's deviation.
fn g(rd: f64) -> f64 {
    1.0 / (1.0 + 3.0 * (Q * rd) * (Q * rd) / (PI * PI)).sqrt()
}

/// One-battle Glicko-1 update.
///
/// Returns (rating, deviation), both rounded to one decimal, with the
/// deviation clamped to [10, 350].
pub fn updated_glicko(r: f64, rd: f64, foe_r: f64, foe_rd: f64, score: f64) -> (f64, f64) {
    let g_foe = g(foe_rd);
    let e = 1.0 / (1.0 + 10.0_f64.powf(-g_foe * (r - foe_r) / 400.0));
    let d2 = 1.0 / (Q * Q * g_foe * g_foe * e * (1.0 - e));
    let denom = 1.0 / (rd * rd) + 1.0 / d2;
    let new_r = r + (Q / denom) * g_foe * (score - e);
    let new_rd = (1.0 / denom).sqrt().clamp(MIN_RD, MAX_RD);
    (round1(new_r), round1(new_rd))
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// GXE for a row: the Glixare percentage, or `Unknown` while the rating is
/// provisional (deviation above 100).
pub fn gxe(rating: f64, rd: f64) -> Gxe {
    if rd > PROVISIONAL_RD {
        Gxe::Unknown
    } else {
        Gxe::Percent(gxe_percent(rating, rd))
    }
}

/// Raw Glixare percentage (two decimals), without the provisional cutoff:
/// the chance of beating a 1500-rated reference opponent, discounted by the
/// rating's own deviation.
pub fn gxe_percent(rating: f64, rd: f64) -> f64 {
    let spread =
        (3.0 * LN_10 * LN_10 * rd * rd + 2500.0 * (64.0 * PI * PI + 147.0 * LN_10 * LN_10)).sqrt();
    (10000.0 / (1.0 + 10.0_f64.powf((1500.0 - rating) * PI / spread))).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_matchup_expected_half() {
        let (r, _) = updated_glicko(1500.0, 130.0, 1500.0, 130.0, 0.5);
        // A tie between equals moves nothing.
        assert_eq!(r, 1500.0);
    }

    #[test]
    fn win_moves_rating_up_and_shrinks_rd() {
        let (r, rd) = updated_glicko(1500.0, 130.0, 1500.0, 130.0, 1.0);
        assert!(r > 1500.0);
        assert!(rd < 130.0);
        // One decimal of storage precision.
        assert_eq!(r, (r * 10.0).round() / 10.0);
        assert_eq!(rd, (rd * 10.0).round() / 10.0);
    }

    #[test]
    fn rd_stays_in_bounds() {
        let (_, rd) = updated_glicko(1500.0, MIN_RD, 1500.0, 130.0, 1.0);
        assert!(rd >= MIN_RD);
        let (_, rd) = updated_glicko(1500.0, MAX_RD, 1500.0, MAX_RD, 0.0);
        assert!(rd <= MAX_RD);
    }

    #[test]
    fn gxe_at_reference_rating_is_fifty() {
        assert_eq!(gxe_percent(1500.0, 130.0), 50.0);
        assert_eq!(gxe_percent(1500.0, 30.0), 50.0);
    }

    #[test]
    fn gxe_provisional_cutoff() {
        assert_eq!(gxe(1500.0, 101.0), Gxe::Unknown);
        assert_eq!(gxe(1500.0, 130.0), Gxe::Unknown);
        match gxe(1500.0, 100.0) {
            Gxe::Percent(p) => assert_eq!(p, 50.0),
            Gxe::Unknown => panic!("rd = 100 is not provisional"),
        }
    }

    #[test]
    fn gxe_orders_with_rating() {
        let low = gxe_percent(1300.0, 50.0);
        let high = gxe_percent(1700.0, 50.0);
        assert!(low < 50.0);
        assert!(high > 50.0);
    }
}
