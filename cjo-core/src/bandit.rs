//! Thompson-sampled bandit selection over candidate voter weights.

use rand::Rng;
use rand_distr::{Beta, Distribution};

use crate::track_record::TrackRecord;

/// Draw a sampled weight from a dog's `Beta(alpha, beta)` posterior.
pub fn sample_weight(track_record: &TrackRecord, rng: &mut impl Rng) -> f64 {
    match Beta::new(track_record.alpha, track_record.beta) {
        Ok(dist) => dist.sample(rng),
        Err(_) => track_record.accuracy(),
    }
}

/// Retain only the candidates whose Thompson-sampled weight sums at or above
/// `min_weight`, in descending sampled-weight order. If none clear the bar,
/// the single best-sampled candidate is kept so the router always has a
/// fallback.
pub fn select_above_threshold<T: Clone>(
    candidates: &[(T, TrackRecord)],
    min_weight: f64,
    rng: &mut impl Rng,
) -> Vec<(T, f64)> {
    let mut sampled: Vec<(T, f64)> = candidates
        .iter()
        .map(|(item, track)| (item.clone(), sample_weight(track, rng)))
        .collect();
    sampled.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut running = 0.0;
    let mut retained = Vec::new();
    for (item, weight) in sampled.iter() {
        if running >= min_weight {
            break;
        }
        retained.push((item.clone(), *weight));
        running += weight;
    }
    if retained.is_empty() {
        if let Some((item, weight)) = sampled.into_iter().next() {
            retained.push((item, weight));
        }
    }
    retained
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn sample_weight_falls_back_on_invalid_beta_params() {
        let track = TrackRecord { alpha: 0.0, beta: 0.0 };
        let mut rng = StdRng::seed_from_u64(1);
        let w = sample_weight(&track, &mut rng);
        assert!((0.0..=1.0).contains(&w));
    }

    #[test]
    fn select_above_threshold_always_returns_at_least_one() {
        let candidates = vec![
            ("analyst", TrackRecord { alpha: 1.0, beta: 10.0 }),
            ("scout", TrackRecord { alpha: 1.0, beta: 10.0 }),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let retained = select_above_threshold(&candidates, 5.0, &mut rng);
        assert!(!retained.is_empty());
    }

    #[test]
    fn select_above_threshold_retains_strong_candidates_cheaply() {
        let candidates = vec![
            ("oracle", TrackRecord { alpha: 100.0, beta: 1.0 }),
            ("cynic", TrackRecord { alpha: 1.0, beta: 100.0 }),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let retained = select_above_threshold(&candidates, 0.5, &mut rng);
        assert_eq!(retained[0].0, "oracle");
    }
}
