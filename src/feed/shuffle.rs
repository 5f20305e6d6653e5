//! Daily deterministic discovery shuffle
//!
//! Every viewer sees the same discovery ordering on a given calendar day,
//! and a different one the next day, without any stored random state. The
//! seed is the day key concatenated with the item id, hashed with a
//! 32-bit character-weighted sum and pushed through a sine transform to a
//! value in [0, 1). Not cryptographic; never use where unpredictability
//! matters.

use chrono::{DateTime, Utc};

/// Day key for the shuffle: the UTC calendar day, e.g. "Mon Dec 15 2025".
pub fn day_key(now: DateTime<Utc>) -> String {
    now.format("%a %b %d %Y").to_string()
}

/// Character-weighted 32-bit hash (h = code + h*31 per char, wrapping).
fn string_hash(seed: &str) -> i32 {
    let mut hash: i32 = 0;
    for c in seed.chars() {
        hash = (c as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    hash
}

/// Map a seed string to a pseudo-random value in [0, 1).
pub fn seeded_unit(seed: &str) -> f64 {
    let x = (string_hash(seed) as f64).sin() * 10000.0;
    x - x.floor()
}

/// Sort `items` by the derived daily value and keep the first `take`.
///
/// Empty input stays empty; a single item is trivially sorted.
pub fn daily_shuffle<T, F>(mut items: Vec<T>, date_key: &str, id_of: F, take: usize) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|a, b| {
        let va = seeded_unit(&format!("{}{}", date_key, id_of(a)));
        let vb = seeded_unit(&format!("{}{}", date_key, id_of(b)));
        va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
    });
    items.truncate(take);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<String> {
        (0..8).map(|i| format!("process-{}", i)).collect()
    }

    #[test]
    fn test_deterministic_within_a_day() {
        let a = daily_shuffle(ids(), "Mon Dec 15 2025", |s| s.as_str(), 8);
        let b = daily_shuffle(ids(), "Mon Dec 15 2025", |s| s.as_str(), 8);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_days_reorder() {
        let a = daily_shuffle(ids(), "Mon Dec 15 2025", |s| s.as_str(), 8);
        let b = daily_shuffle(ids(), "Tue Dec 16 2025", |s| s.as_str(), 8);
        // With 8 items the odds of an identical permutation are negligible
        assert_ne!(a, b);
    }

    #[test]
    fn test_truncates_to_take() {
        let picked = daily_shuffle(ids(), "Mon Dec 15 2025", |s| s.as_str(), 3);
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn test_empty_and_single() {
        let empty: Vec<String> = daily_shuffle(Vec::new(), "Mon Dec 15 2025", |s| s.as_str(), 3);
        assert!(empty.is_empty());

        let single = daily_shuffle(vec!["only".to_string()], "Mon Dec 15 2025", |s| s.as_str(), 3);
        assert_eq!(single, vec!["only".to_string()]);
    }

    #[test]
    fn test_unit_range() {
        for seed in ["", "a", "Mon Dec 15 2025process-1", "zzzz"] {
            let v = seeded_unit(seed);
            assert!((0.0..1.0).contains(&v), "out of range for {:?}: {}", seed, v);
        }
    }
}
