//! Seeded Random Source
//!
//! Xorshift128+ seeded through SplitMix64 from a 32-bit signed seed.
//! Given the same seed and the same call sequence, produces a bit-identical
//! sequence on every platform. Nothing in here can fail or panic.

use serde::{Deserialize, Serialize};

/// Level/session seed. Negative values and zero are valid.
pub type Seed = i32;

/// Deterministic PRNG used by every replay-sensitive draw.
///
/// # Determinism Guarantee
///
/// Two instances built from the same seed produce identical sequences for
/// identical call orders. `reset()` rewinds to the last seed applied.
///
/// # Example
///
/// ```
/// use pocket_cascade::core::rng::SeededRandom;
///
/// let mut rng = SeededRandom::new(42);
/// let first = rng.value();
/// rng.reset();
/// assert_eq!(rng.value(), first);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRandom {
    seed: Seed,
    state: [u64; 2],
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SeededRandom {
    /// Create a generator keyed by `seed`.
    pub fn new(seed: Seed) -> Self {
        Self {
            seed,
            state: expand_seed(seed),
        }
    }

    /// Re-key the generator. Subsequent `reset()` calls return here.
    pub fn set_seed(&mut self, seed: Seed) {
        self.seed = seed;
        self.state = expand_seed(seed);
    }

    /// Restore the state derived from the last applied seed.
    pub fn reset(&mut self) {
        self.state = expand_seed(self.seed);
    }

    /// Seed last applied.
    pub fn seed(&self) -> Seed {
        self.seed
    }

    /// Generate the next raw 64-bit value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Uniform value in `[0, 1)` built from the top 53 bits.
    #[inline]
    pub fn value(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Integer in the half-open range `[min, max)`.
    ///
    /// Returns `min` when the range is empty.
    #[inline]
    pub fn range_int(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = (max as i64 - min as i64) as u64;
        (min as i64 + (self.next_u64() % span) as i64) as i32
    }

    /// Float in the half-open range `[min, max)`.
    #[inline]
    pub fn range_float(&mut self, min: f64, max: f64) -> f64 {
        if !(max > min) {
            return min;
        }
        min + self.value() * (max - min)
    }

    /// True with probability `p`. Always consumes exactly one draw.
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        self.value() < p
    }

    /// Shuffle a slice in place using Fisher-Yates.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = self.range_int(0, (i + 1) as i32) as usize;
            slice.swap(i, j);
        }
    }

    /// Pick an index proportionally to `weights`.
    ///
    /// Non-finite and non-positive weights count as zero. Returns `None`
    /// without drawing when nothing has weight.
    pub fn choose_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let usable = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let total: f64 = weights.iter().copied().map(usable).sum();
        if total <= 0.0 {
            return None;
        }

        let roll = self.value() * total;
        let mut cumulative = 0.0;
        let mut last = None;
        for (idx, weight) in weights.iter().copied().map(usable).enumerate() {
            if weight == 0.0 {
                continue;
            }
            cumulative += weight;
            last = Some(idx);
            if roll < cumulative {
                return Some(idx);
            }
        }
        // Rounding can leave roll == total; fall back to the last weighted slot.
        last
    }

    /// Get current state (for checkpointing).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: [u64; 2]) {
        self.state = state;
    }
}

/// Sign-extend the seed and expand it into a non-zero 128-bit state.
fn expand_seed(seed: Seed) -> [u64; 2] {
    let mut s = seed as i64 as u64;
    let state0 = splitmix64(&mut s);
    let state1 = splitmix64(&mut s);

    if state0 == 0 && state1 == 0 {
        [1, 1]
    } else {
        [state0, state1]
    }
}

/// SplitMix64 step for seed expansion.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = SeededRandom::new(12345);
        let mut rng2 = SeededRandom::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.value(), rng2.value());
            assert_eq!(rng1.range_int(-50, 50), rng2.range_int(-50, 50));
        }
    }

    #[test]
    fn test_rng_known_values() {
        // These values must never change or stored replays stop verifying.
        let mut rng = SeededRandom::new(42);
        assert_eq!(rng.next_u64(), 16629283624882167704);
        assert_eq!(rng.next_u64(), 1420492921613871959);
        assert_eq!(rng.next_u64(), 9768315062676884790);

        let mut rng = SeededRandom::new(42);
        assert_eq!(rng.value(), 0.9014752716487434);
        assert_eq!(rng.value(), 0.07700507558070202);
        assert_eq!(rng.value(), 0.5295414206238577);

        let mut rng = SeededRandom::new(42);
        let ints: Vec<i32> = (0..8).map(|_| rng.range_int(0, 10)).collect();
        assert_eq!(ints, vec![4, 9, 0, 4, 2, 3, 1, 8]);
    }

    #[test]
    fn test_negative_and_zero_seeds() {
        let mut rng = SeededRandom::new(-7);
        let ints: Vec<i32> = (0..6).map(|_| rng.range_int(-5, 5)).collect();
        assert_eq!(ints, vec![1, 0, -5, 3, -3, 2]);

        let mut zero = SeededRandom::new(0);
        assert_eq!(zero.next_u64(), 5807750865143411619);
        assert_eq!(SeededRandom::default(), SeededRandom::new(0));
    }

    #[test]
    fn test_reset_replays_sequence() {
        let mut rng = SeededRandom::new(9001);
        let first: Vec<f64> = (0..32).map(|_| rng.value()).collect();
        rng.reset();
        let second: Vec<f64> = (0..32).map(|_| rng.value()).collect();
        assert_eq!(first, second);

        rng.set_seed(17);
        let a = rng.range_int(0, 1000);
        rng.reset();
        assert_eq!(rng.seed(), 17);
        assert_eq!(rng.range_int(0, 1000), a);
    }

    #[test]
    fn test_empty_ranges() {
        let mut rng = SeededRandom::new(3);
        assert_eq!(rng.range_int(5, 5), 5);
        assert_eq!(rng.range_int(9, 2), 9);
        assert_eq!(rng.range_float(1.5, 1.5), 1.5);
        assert!(rng.range_int(i32::MIN, i32::MAX) < i32::MAX);
    }

    #[test]
    fn test_chance_consumes_one_draw() {
        let mut a = SeededRandom::new(77);
        let mut b = SeededRandom::new(77);
        let _ = a.chance(0.0);
        let _ = a.chance(1.0);
        b.value();
        b.value();
        assert_eq!(a.state(), b.state());
        assert!(!SeededRandom::new(1).chance(0.0));
        assert!(SeededRandom::new(1).chance(1.0));
    }

    #[test]
    fn test_shuffle_known_order() {
        let mut rng = SeededRandom::new(1111);
        let mut arr = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        rng.shuffle(&mut arr);
        assert_eq!(arr, [2, 5, 6, 7, 4, 8, 10, 3, 9, 1]);
    }

    #[test]
    fn test_choose_weighted() {
        let mut rng = SeededRandom::new(5);
        assert_eq!(rng.choose_weighted(&[]), None);
        assert_eq!(rng.choose_weighted(&[0.0, -1.0, f64::NAN]), None);

        for _ in 0..200 {
            assert_eq!(rng.choose_weighted(&[0.0, 3.0, 0.0]), Some(1));
        }

        let mut hits = [0u32; 2];
        for _ in 0..2000 {
            let idx = rng.choose_weighted(&[1.0, 3.0]).unwrap();
            hits[idx] += 1;
        }
        assert!(hits[1] > hits[0] * 2);
    }

    #[test]
    fn test_state_checkpoint() {
        let mut rng = SeededRandom::new(5555);
        for _ in 0..50 {
            rng.next_u64();
        }
        let saved = rng.state();
        let next: Vec<u64> = (0..10).map(|_| rng.next_u64()).collect();
        rng.set_state(saved);
        for expected in next {
            assert_eq!(rng.next_u64(), expected);
        }
    }

    proptest! {
        #[test]
        fn prop_range_int_is_half_open(seed in any::<i32>(), min in -1000i32..1000, len in 1i32..500) {
            let mut rng = SeededRandom::new(seed);
            let max = min + len;
            for _ in 0..32 {
                let v = rng.range_int(min, max);
                prop_assert!(v >= min && v < max);
            }
        }

        #[test]
        fn prop_value_in_unit_interval(seed in any::<i32>()) {
            let mut rng = SeededRandom::new(seed);
            for _ in 0..64 {
                let v = rng.value();
                prop_assert!((0.0..1.0).contains(&v));
            }
        }
    }
}
