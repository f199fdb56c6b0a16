//! Bijective scrambling of sequential ids.
//!
//! Maps a sequential id onto `[0, SPACE)` with a linear congruential transform
//! so that short codes do not reveal creation order or volume. Because
//! `MULTIPLIER` (the Mersenne prime `2^31 - 1`) is coprime with `SPACE`, the
//! map is a permutation of the space: distinct ids below `SPACE` never collide.
//!
//! This is not a cipher. Anyone holding two codes and the constants can
//! recover the ordering.

/// Size of the code space. Ids at or above this value wrap around.
pub const SPACE: u64 = 1_000_000_000_000;

const MULTIPLIER: u64 = 2_147_483_647;
const INCREMENT: u64 = 123_456_789;

/// Scrambles a sequential id into the code space.
///
/// Computed in 128-bit arithmetic, so the product never overflows.
pub fn shuffle(id: u64) -> u64 {
    let mixed = id as u128 * MULTIPLIER as u128 + INCREMENT as u128;
    (mixed % SPACE as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_shuffle_is_collision_free_over_sequential_run() {
        let start = 1_254_u64;
        let count = 100_000_u64;

        let results: HashSet<u64> = (start..start + count).map(shuffle).collect();

        assert_eq!(results.len() as u64, count);
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        for id in [0, 1, 10, 61, 62, 12_345, 99_999, SPACE - 1, u64::MAX] {
            assert_eq!(shuffle(id), shuffle(id));
        }
    }

    #[test]
    fn test_shuffle_stays_inside_space() {
        for id in [0, 1, SPACE - 1, SPACE, u64::MAX] {
            assert!(shuffle(id) < SPACE);
        }
    }

    #[test]
    fn test_shuffle_known_values() {
        assert_eq!(shuffle(0), INCREMENT);
        assert_eq!(shuffle(1), MULTIPLIER + INCREMENT);
    }

    #[test]
    fn test_shuffle_hides_sequence() {
        let a = shuffle(1_000);
        let b = shuffle(1_001);
        assert!(a.abs_diff(b) > 1_000);
    }

    #[test]
    fn test_multiplier_is_coprime_with_space() {
        fn gcd(mut a: u64, mut b: u64) -> u64 {
            while b != 0 {
                (a, b) = (b, a % b);
            }
            a
        }
        assert_eq!(gcd(MULTIPLIER, SPACE), 1);
    }
}
