//! Weighted random sampling without replacement.
//!
//! Implements the Efraimidis–Spirakis A-ES scheme: every candidate draws one
//! uniform `u` in `[0, 1)` and receives the key `u^(1/w)`; the `k` largest keys
//! win. Higher weights push keys towards 1, so selection probability grows
//! monotonically with weight while each call needs only a single pass.

use keepsake_common::{MemoryItem, effective_weight};
use rand::Rng;
use std::cmp::Ordering;

/// An item chosen by [`sample`] together with the key that ranked it.
#[derive(Debug, Clone)]
pub struct Selected {
    pub item: MemoryItem,
    pub key: f64,
}

/// Selection key for one candidate.
///
/// `u == 0.0` would give `0^(1/w) = 0` for every weight, so it is mapped to
/// `+inf` instead and the draw is guaranteed to be picked.
pub fn selection_key(u: f64, weight: f64) -> f64 {
    if u == 0.0 {
        return f64::INFINITY;
    }
    u.powf(1.0 / effective_weight(weight))
}

/// Pick up to `k` distinct indices from `weights`, heaviest-key first.
pub fn sample_indices<R: Rng + ?Sized>(weights: &[f64], k: usize, rng: &mut R) -> Vec<usize> {
    ranked(weights, k, rng).into_iter().map(|(i, _)| i).collect()
}

/// Pick up to `k` distinct items, ordered by descending key.
///
/// Returns `min(k, items.len())` entries; an empty slice yields an empty result.
pub fn sample<R: Rng + ?Sized>(items: &[MemoryItem], k: usize, rng: &mut R) -> Vec<Selected> {
    let weights: Vec<f64> = items.iter().map(|i| i.weight).collect();

    ranked(&weights, k, rng)
        .into_iter()
        .map(|(idx, key)| Selected {
            item: items[idx].clone(),
            key,
        })
        .collect()
}

fn ranked<R: Rng + ?Sized>(weights: &[f64], k: usize, rng: &mut R) -> Vec<(usize, f64)> {
    if k == 0 || weights.is_empty() {
        return Vec::new();
    }

    let mut keyed: Vec<(usize, f64)> = weights
        .iter()
        .enumerate()
        .map(|(idx, &w)| {
            let u: f64 = rng.random();
            (idx, selection_key(u, w))
        })
        .collect();

    let by_key_desc = |a: &(usize, f64), b: &(usize, f64)| b.1.total_cmp(&a.1);

    let take = k.min(keyed.len());
    if take < keyed.len() {
        keyed.select_nth_unstable_by(take - 1, by_key_desc);
        keyed.truncate(take);
    }
    keyed.sort_unstable_by(|a, b| match by_key_desc(a, b) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    keyed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn items(weights: &[f64]) -> Vec<MemoryItem> {
        weights
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                MemoryItem::new(&format!("{i}.jpg"), format!("https://cdn.example/{i}.jpg"))
                    .with_caption(format!("memory {i}"))
                    .with_weight(w)
            })
            .collect()
    }

    #[test]
    fn test_selects_exactly_k_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        let pool = items(&[1.0, 2.0, 0.5, 3.0, 1.0, 0.0, 4.0]);

        for k in 1..=pool.len() {
            let picked = sample(&pool, k, &mut rng);
            assert_eq!(picked.len(), k);
            let ids: HashSet<_> = picked.iter().map(|s| s.item.id.clone()).collect();
            assert_eq!(ids.len(), k, "duplicate ids for k={k}");
        }
    }

    #[test]
    fn test_k_larger_than_pool_returns_all() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool = items(&[1.0, 1.0, 1.0]);
        let picked = sample(&pool, 10, &mut rng);
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn test_empty_pool_returns_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample(&[], 3, &mut rng).is_empty());
        assert!(sample_indices(&[], 1, &mut rng).is_empty());
    }

    #[test]
    fn test_k_zero_returns_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample(&items(&[1.0, 2.0]), 0, &mut rng).is_empty());
    }

    #[test]
    fn test_results_in_descending_key_order() {
        let mut rng = StdRng::seed_from_u64(99);
        let pool = items(&[1.0, 5.0, 0.2, 2.0, 8.0, 0.0]);
        let picked = sample(&pool, 4, &mut rng);
        for pair in picked.windows(2) {
            assert!(pair[0].key >= pair[1].key);
        }
    }

    #[test]
    fn test_heavy_item_dominates() {
        let mut rng = StdRng::seed_from_u64(2024);
        let weights = [10.0, 0.1, 0.1];
        let trials = 10_000;

        let heavy_wins = (0..trials)
            .filter(|_| sample_indices(&weights, 1, &mut rng) == vec![0])
            .count();

        // Theoretical share is 10 / 10.2, roughly 98%.
        assert!(
            heavy_wins as f64 / trials as f64 > 0.8,
            "heavy item won {heavy_wins} of {trials}"
        );
    }

    #[test]
    fn test_probability_increases_with_weight() {
        let mut rng = StdRng::seed_from_u64(5);
        let weights = [1.0, 2.0, 4.0];
        let mut wins = [0usize; 3];

        for _ in 0..20_000 {
            wins[sample_indices(&weights, 1, &mut rng)[0]] += 1;
        }

        assert!(wins[0] < wins[1], "{wins:?}");
        assert!(wins[1] < wins[2], "{wins:?}");
    }

    #[test]
    fn test_zero_and_negative_weights_remain_selectable() {
        let mut rng = StdRng::seed_from_u64(11);
        let weights = [0.0, -1.0];
        let mut seen = [false; 2];
        for _ in 0..200 {
            seen[sample_indices(&weights, 1, &mut rng)[0]] = true;
        }
        assert!(seen[0] && seen[1]);
    }

    #[test]
    fn test_zero_draw_yields_infinite_key() {
        assert_eq!(selection_key(0.0, 1.0), f64::INFINITY);
        assert_eq!(selection_key(0.0, 0.0), f64::INFINITY);
        assert_eq!(selection_key(0.25, 1.0), 0.25);
        assert!((selection_key(0.25, 2.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_floor_applies_to_key() {
        // Weight 0 is treated as 0.1, giving u^10.
        let key = selection_key(0.5, 0.0);
        assert!((key - 0.5f64.powi(10)).abs() < 1e-15);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let weights = [1.0, 2.0, 3.0, 4.0, 5.0];
        let a = sample_indices(&weights, 3, &mut StdRng::seed_from_u64(42));
        let b = sample_indices(&weights, 3, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
