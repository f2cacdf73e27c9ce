use crate::config::ScoreWeights;

/// Normalized inputs of the telemetry privacy-score model, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFeatures {
    pub scaled_total: f64,
    pub scaled_ad_total: f64,
    pub scaled_companies: f64,
    pub tracked: f64,
    pub scaled_requests_tracking: f64,
    pub scaled_trackers: f64,
    pub referer_leaked: f64,
}

/// `10 × Σ wᵢ × (1 − fᵢ)`, with every feature clamped to `[0, 1]` and the
/// result clamped to `[0, 10]`.
pub fn privacy_score(features: &ScoreFeatures, weights: &ScoreWeights) -> f64 {
    let terms = [
        (features.scaled_total, weights.total_trackers),
        (features.scaled_ad_total, weights.ad_trackers),
        (features.scaled_companies, weights.companies),
        (features.tracked, weights.tracked),
        (features.scaled_requests_tracking, weights.requests_tracking),
        (features.scaled_trackers, weights.trackers_present),
        (features.referer_leaked, weights.referer_leaked),
    ];

    let weighted: f64 = terms
        .iter()
        .map(|(feature, weight)| weight * (1.0 - unit(*feature)))
        .sum();

    (10.0 * weighted).clamp(0.0, 10.0)
}

/// Clamp to `[0, 1]`, mapping NaN to 0.
fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(value: f64) -> ScoreFeatures {
        ScoreFeatures {
            scaled_total: value,
            scaled_ad_total: value,
            scaled_companies: value,
            tracked: value,
            scaled_requests_tracking: value,
            scaled_trackers: value,
            referer_leaked: value,
        }
    }

    #[test]
    fn test_best_and_worst_scores() {
        let weights = ScoreWeights::default();
        assert!((privacy_score(&uniform(0.0), &weights) - 10.0).abs() < 1e-9);
        assert!(privacy_score(&uniform(1.0), &weights).abs() < 1e-9);
        assert!((privacy_score(&uniform(0.5), &weights) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_reference_weighting() {
        let weights = ScoreWeights::default();
        let features = ScoreFeatures {
            tracked: 1.0,
            ..uniform(0.0)
        };
        // Only `tracked` (weight 0.20) is maxed out.
        assert!((privacy_score(&features, &weights) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let weights = ScoreWeights::default();
        let score = privacy_score(&uniform(-3.0), &weights);
        assert!((score - 10.0).abs() < 1e-9);
        let score = privacy_score(&uniform(7.0), &weights);
        assert_eq!(score, 0.0);
        let score = privacy_score(&uniform(f64::NAN), &weights);
        assert!((0.0..=10.0).contains(&score));
    }

    #[test]
    fn test_score_always_bounded() {
        let weights = ScoreWeights::default();
        for step in 0..=20 {
            let v = f64::from(step) / 20.0;
            let features = ScoreFeatures {
                scaled_total: v,
                scaled_ad_total: 1.0 - v,
                scaled_companies: v * v,
                tracked: v,
                scaled_requests_tracking: 0.3,
                scaled_trackers: 1.0,
                referer_leaked: 0.0,
            };
            let score = privacy_score(&features, &weights);
            assert!((0.0..=10.0).contains(&score), "score {score} out of range");
        }
    }
}
