//! Exponential backoff with jitter for the client pull/push loops (§4.5 Timing parameters).

use rand::Rng;

pub const MIN_BACKOFF_MS: u64 = 1_000;
pub const MAX_BACKOFF_MS: u64 = 20_000;
pub const BACKOFF_MULTIPLIER: u64 = 2;

/// Advances the un-jittered backoff value: `clamp(max(min, backoff*2), min, max)`.
/// Pass `0` as `current_ms` to get the first backoff after an initial failure.
pub fn next_backoff_ms(current_ms: u64) -> u64 {
    let doubled = current_ms.saturating_mul(BACKOFF_MULTIPLIER).max(MIN_BACKOFF_MS);
    doubled.clamp(MIN_BACKOFF_MS, MAX_BACKOFF_MS)
}

/// Applies a `[0.5, 1.5)` jitter factor to a backoff value, as the actual sleep duration.
pub fn with_jitter(backoff_ms: u64, rng: &mut impl Rng) -> u64 {
    let factor = 0.5 + rng.gen::<f64>();
    ((backoff_ms as f64) * factor).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn first_backoff_is_min() {
        assert_eq!(next_backoff_ms(0), MIN_BACKOFF_MS);
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let mut b = next_backoff_ms(0);
        assert_eq!(b, 1_000);
        b = next_backoff_ms(b);
        assert_eq!(b, 2_000);
        b = next_backoff_ms(b);
        assert_eq!(b, 4_000);
        b = next_backoff_ms(b);
        assert_eq!(b, 8_000);
        b = next_backoff_ms(b);
        assert_eq!(b, 16_000);
        b = next_backoff_ms(b);
        assert_eq!(b, MAX_BACKOFF_MS); // 32_000 clamps to 20_000
        b = next_backoff_ms(b);
        assert_eq!(b, MAX_BACKOFF_MS); // stays capped
    }

    #[test]
    fn jitter_stays_within_half_to_one_and_half_times() {
        // StepRng always yields the same u64, so gen::<f64>() is deterministic per stream position;
        // exercise both ends by constructing rngs that land near 0.0 and near 1.0.
        let mut low = StepRng::new(0, 0);
        let low_jittered = with_jitter(10_000, &mut low);
        assert_eq!(low_jittered, 5_000);

        let mut high = StepRng::new(u64::MAX, 0);
        let high_jittered = with_jitter(10_000, &mut high);
        assert!(high_jittered >= 9_000 && high_jittered < 15_000);
    }
}
