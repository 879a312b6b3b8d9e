use crate::random::{
    GaussianSource, RandomDeriver, RandomDeriverImpl, RandomGenerator, RandomImpl,
};

const MULTIPLIER: u64 = 0x5DEECE66D;
const INCREMENT: u64 = 0xB;
const MASK: u64 = (1 << 48) - 1;

const DOUBLE_UNIT: f64 = 1.110_223_024_625_156_5E-16; // 2^-53
const FLOAT_UNIT: f32 = 5.960_464_5E-8; // 2^-24

/// 48-bit linear congruential generator.
///
/// Statistically weaker than xoroshiro128++ but bit-compatible with
/// `java.util.Random`, which matters when reproducing streams seeded by
/// older tooling.
pub struct LegacyRand {
    seed: u64,
    cached_gaussian: Option<f64>,
}

impl LegacyRand {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed: (seed ^ MULTIPLIER) & MASK,
            cached_gaussian: None,
        }
    }

    fn next_bits(&mut self, bits: u64) -> i32 {
        self.seed = self
            .seed
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT)
            & MASK;
        (self.seed >> (48 - bits)) as i32
    }
}

impl GaussianSource for LegacyRand {
    fn take_cached_gaussian(&mut self) -> Option<f64> {
        self.cached_gaussian.take()
    }

    fn cache_gaussian(&mut self, value: f64) {
        self.cached_gaussian = Some(value);
    }
}

impl RandomImpl for LegacyRand {
    fn split(&mut self) -> Self {
        Self::from_seed(self.next_i64() as u64)
    }

    fn next_splitter(&mut self) -> RandomDeriver {
        RandomDeriver::Legacy(LegacySplitter {
            seed: self.next_i64() as u64,
        })
    }

    fn next_i32(&mut self) -> i32 {
        self.next_bits(32)
    }

    fn next_bounded_i32(&mut self, bound: i32) -> i32 {
        debug_assert!(bound > 0);
        if (bound & bound.wrapping_neg()) == bound {
            // Power-of-two bound reduces to a high-bits multiply.
            (((bound as i64).wrapping_mul(self.next_bits(31) as i64)) >> 31) as i32
        } else {
            loop {
                let bits = self.next_bits(31);
                let value = bits % bound;
                // Reject draws from the truncated top range.
                if bits.wrapping_sub(value).wrapping_add(bound - 1) >= 0 {
                    return value;
                }
            }
        }
    }

    fn next_i64(&mut self) -> i64 {
        ((self.next_bits(32) as i64) << 32).wrapping_add(self.next_bits(32) as i64)
    }

    fn next_bool(&mut self) -> bool {
        self.next_bits(1) != 0
    }

    fn next_f32(&mut self) -> f32 {
        self.next_bits(24) as f32 * FLOAT_UNIT
    }

    fn next_f64(&mut self) -> f64 {
        (((self.next_bits(26) as i64) << 27) + self.next_bits(27) as i64) as f64 * DOUBLE_UNIT
    }

    fn next_gaussian(&mut self) -> f64 {
        self.sample_gaussian()
    }
}

#[derive(Clone)]
pub struct LegacySplitter {
    seed: u64,
}

impl LegacySplitter {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl RandomDeriverImpl for LegacySplitter {
    fn split_u64(&self, seed: u64) -> RandomGenerator {
        RandomGenerator::Legacy(LegacyRand::from_seed(seed ^ self.seed))
    }

    fn split_index(&self, index: usize) -> RandomGenerator {
        self.split_u64(index as u64)
    }
}
