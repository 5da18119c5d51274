//! Weight invariants shared by the sampler and the update engine.

/// Weight assigned to new items and restored by a reset.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Lowest weight the sampler will use. Suppressed or negative items stay
/// selectable but are the least likely choice.
pub const WEIGHT_FLOOR: f64 = 0.1;

/// The weight actually used in sampling math.
pub fn effective_weight(stored: f64) -> f64 {
    if stored.is_nan() {
        return WEIGHT_FLOOR;
    }
    stored.max(WEIGHT_FLOOR)
}

/// Clamp a relevance score into `[0.0, 1.0]`.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_weight_floors_small_values() {
        assert_eq!(effective_weight(0.0), WEIGHT_FLOOR);
        assert_eq!(effective_weight(-3.0), WEIGHT_FLOOR);
        assert_eq!(effective_weight(0.05), WEIGHT_FLOOR);
        assert_eq!(effective_weight(f64::NAN), WEIGHT_FLOOR);
    }

    #[test]
    fn effective_weight_keeps_larger_values() {
        assert_eq!(effective_weight(0.1), 0.1);
        assert_eq!(effective_weight(2.5), 2.5);
        assert_eq!(effective_weight(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn clamp_score_bounds() {
        assert_eq!(clamp_score(1.7), 1.0);
        assert_eq!(clamp_score(-0.2), 0.0);
        assert_eq!(clamp_score(0.42), 0.42);
        assert_eq!(clamp_score(f64::NAN), 0.0);
    }
}
