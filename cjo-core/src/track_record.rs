//! Per-dog Beta-distributed accuracy ledger.

use serde::{Deserialize, Serialize};

use crate::constants::PHI_INV;

/// `Beta(alpha, beta)` accuracy estimate for one dog. `alpha, beta >= 1` at
/// all times.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrackRecord {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for TrackRecord {
    fn default() -> Self {
        Self { alpha: 1.0, beta: 1.0 }
    }
}

impl TrackRecord {
    pub fn accuracy(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn strength(&self) -> f64 {
        self.alpha + self.beta
    }

    pub fn record_success(&mut self) {
        self.alpha += 1.0;
    }

    pub fn record_failure(&mut self) {
        self.beta += 1.0;
    }

    /// `w = min(phi_inv, accuracy)`.
    pub fn vote_weight(&self) -> f64 {
        self.accuracy().min(PHI_INV)
    }

    /// `confidence = min(phi_inv, strength/20)`.
    pub fn vote_confidence(&self) -> f64 {
        (self.strength() / 20.0).min(PHI_INV)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_track_record_has_alpha_beta_at_least_one() {
        let t = TrackRecord::default();
        assert!(t.alpha >= 1.0);
        assert!(t.beta >= 1.0);
        assert!((t.accuracy() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn record_success_and_failure_never_drop_below_one() {
        let mut t = TrackRecord::default();
        for _ in 0..50 {
            t.record_success();
        }
        assert!(t.alpha >= 1.0 && t.beta >= 1.0);
        assert!(t.accuracy() > 0.9);
    }

    #[test]
    fn vote_weight_is_capped_at_phi_inv() {
        let t = TrackRecord { alpha: 1000.0, beta: 1.0 };
        assert!(t.vote_weight() <= PHI_INV + 1e-12);
    }

    #[test]
    fn vote_confidence_is_capped_at_phi_inv() {
        let t = TrackRecord { alpha: 1000.0, beta: 1000.0 };
        assert!(t.vote_confidence() <= PHI_INV + 1e-12);
    }

    proptest::proptest! {
        #[test]
        fn successes_and_failures_keep_alpha_beta_above_one(
            successes in 0usize..200,
            failures in 0usize..200,
        ) {
            let mut t = TrackRecord::default();
            for _ in 0..successes {
                t.record_success();
            }
            for _ in 0..failures {
                t.record_failure();
            }
            prop_assert!(t.alpha >= 1.0);
            prop_assert!(t.beta >= 1.0);
            prop_assert!(t.vote_weight() <= PHI_INV + 1e-12);
            prop_assert!(t.vote_confidence() <= PHI_INV + 1e-12);
        }
    }
}
