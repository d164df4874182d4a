//! Power-of-two helpers for FFT and buffer sizing
//!
//! Both operations are total (defined for every input), constant time,
//! and never allocate, so they are safe anywhere including the audio
//! callback.

/// Returns true iff `n` is a positive power of two.
///
/// Powers of two have exactly one bit set, so `n & (n - 1)` clears the
/// lowest set bit and leaves zero only for powers of two.
pub fn is_power_of_two(n: i64) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

/// Returns the smallest power of two greater than or equal to `n`.
///
/// Non-positive inputs return 1. The `n - 1` is what keeps exact powers
/// of two fixed points: without it, 8 would round up to 16.
pub fn next_power_of_two(n: i64) -> i64 {
    if n <= 0 {
        return 1;
    }
    let bits = 64 - ((n - 1) as u64).leading_zeros();
    1i64 << bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_power_of_two_table() {
        let cases: &[(i64, i64)] = &[
            (-10, 1),
            (0, 1),
            (1, 1),
            (3, 4),
            (8, 8),
            (1000, 1024),
            ((1 << 30) + 1, 1 << 31),
        ];
        for &(input, expected) in cases {
            assert_eq!(
                next_power_of_two(input),
                expected,
                "next_power_of_two({})",
                input
            );
        }
    }

    #[test]
    fn test_is_power_of_two_table() {
        let cases: &[(i64, bool)] = &[
            (-10, false),
            (0, false),
            (1, true),
            (3, false),
            (8, true),
            (1000, false),
            ((1 << 30) + 1, false),
            (1 << 31, true),
        ];
        for &(input, expected) in cases {
            assert_eq!(is_power_of_two(input), expected, "is_power_of_two({})", input);
        }
    }

    #[test]
    fn test_round_trip_invariants() {
        for n in 1..10_000i64 {
            let rounded = next_power_of_two(n);
            assert!(
                is_power_of_two(rounded),
                "next_power_of_two({}) = {} is not a power of two",
                n,
                rounded
            );
            assert!(rounded >= n);
            if is_power_of_two(n) {
                assert_eq!(rounded, n, "powers of two must be preserved");
            }
        }
    }

    #[test]
    fn test_non_positive_inputs() {
        for n in [i64::MIN, -1024, -1, 0] {
            assert_eq!(next_power_of_two(n), 1);
            assert!(!is_power_of_two(n));
        }
    }
}
