// Deterministic, portable pseudo-random number generator.
//
// xoshiro256++ (Blackman & Vigna, 2019) seeded through SplitMix64. The
// generator is hand-rolled so that a seed produces the same stream on every
// platform and compiler, which is what makes Hillbillies runs replayable:
// spawn rolls, cave-in debris, combat trials, default behaviour and unit
// names all draw from one `GameRng` owned by the world.
//
// The integer core never touches floating point. Float helpers only convert
// already-drawn integer bits, so they are deterministic as well.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG, the simulation's sole source of randomness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRng {
    s: [u64; 4],
}

impl GameRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// SplitMix64 expands the seed into the 256-bit state, so two generators
    /// built from the same seed produce identical sequences.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f64` in [0, 1) from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform `f64` in `[low, high)`. Panics if `low >= high`.
    pub fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        assert!(low < high, "range_f64: low must be less than high");
        low + self.next_f64() * (high - low)
    }

    /// Uniform integer in `[low, high)`, rejection-sampled to avoid modulo
    /// bias. Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range; // = (2^64 - range) % range
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Uniform `usize` in `[low, high)`. Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Uniform `u32` in `[low, high]`, inclusive on both ends.
    /// Panics if `low > high`.
    pub fn range_u32_inclusive(&mut self, low: u32, high: u32) -> u32 {
        assert!(low <= high, "range_u32_inclusive: low must be <= high");
        self.range_u64(low as u64, high as u64 + 1) as u32
    }

    /// Pick a uniformly random element of a slice, or `None` when empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            items.get(self.range_usize(0, items.len()))
        }
    }

    /// Return `true` with probability `p`. `p <= 0.0` never fires and
    /// `p >= 1.0` always does.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// SplitMix64, used only to expand a `u64` seed into the xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = GameRng::new(42);
        let mut b = GameRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = GameRng::new(42);
        let mut b = GameRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = GameRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn range_f64_within_bounds() {
        let mut rng = GameRng::new(777);
        for _ in 0..10_000 {
            let v = rng.range_f64(0.0, 30.0);
            assert!((0.0..30.0).contains(&v), "range_f64 out of range: {v}");
        }
    }

    #[test]
    fn range_u32_inclusive_reaches_both_ends() {
        let mut rng = GameRng::new(666);
        let mut saw_low = false;
        let mut saw_high = false;
        for _ in 0..10_000 {
            let v = rng.range_u32_inclusive(25, 100);
            assert!((25..=100).contains(&v));
            saw_low |= v == 25;
            saw_high |= v == 100;
        }
        assert!(saw_low && saw_high, "inclusive range should hit both bounds");
    }

    #[test]
    fn choose_from_empty_is_none() {
        let mut rng = GameRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
        assert_eq!(rng.choose(&[7]), Some(&7));
    }

    #[test]
    fn random_bool_quarter_probability() {
        // Cave-in debris uses p = 0.25; check the generator honours it.
        let mut rng = GameRng::new(42);
        let n = 20_000;
        let hits = (0..n).filter(|_| rng.random_bool(0.25)).count();
        let pct = hits as f64 / n as f64;
        assert!((0.22..0.28).contains(&pct), "expected ~25%, got {pct}");
    }

    #[test]
    fn random_bool_extremes() {
        let mut rng = GameRng::new(42);
        for _ in 0..100 {
            assert!(!rng.random_bool(0.0));
            assert!(rng.random_bool(1.0));
        }
    }

    #[test]
    fn serialization_roundtrip_continues_stream() {
        let mut rng = GameRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: GameRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
