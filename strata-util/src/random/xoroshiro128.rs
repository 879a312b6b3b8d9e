use crate::random::{
    GaussianSource, RandomDeriver, RandomDeriverImpl, RandomGenerator, RandomImpl,
};

const SILVER_RATIO_64: u64 = 0x6A09E667F3BCC909;
const GOLDEN_RATIO_64: u64 = 0x9E3779B97F4A7C15;

const DOUBLE_UNIT: f64 = 1.110_223_024_625_156_5E-16; // 2^-53
const FLOAT_UNIT: f32 = 5.960_464_5E-8; // 2^-24

pub fn mix_stafford_13(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// xoroshiro128++ generator.
///
/// 128 bits of state, never all zero; the seed expansion runs both words
/// through a stafford-13 mix so trivially related seeds (0, 1, 2, ...) still
/// produce unrelated streams.
pub struct Xoroshiro {
    lo: u64,
    hi: u64,
    cached_gaussian: Option<f64>,
}

impl Xoroshiro {
    pub fn new(lo: u64, hi: u64) -> Self {
        let (lo, hi) = if (lo | hi) == 0 {
            // All-zero state is a fixed point; fall back to the ratio seeds.
            (SILVER_RATIO_64, GOLDEN_RATIO_64)
        } else {
            (lo, hi)
        };
        Self {
            lo,
            hi,
            cached_gaussian: None,
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        let lo = seed ^ SILVER_RATIO_64;
        let hi = lo.wrapping_add(GOLDEN_RATIO_64);
        Self::new(mix_stafford_13(lo), mix_stafford_13(hi))
    }

    pub fn next_u64(&mut self) -> u64 {
        let lo = self.lo;
        let mut hi = self.hi;
        let value = lo.wrapping_add(hi).rotate_left(17).wrapping_add(lo);

        hi ^= lo;
        self.lo = lo.rotate_left(49) ^ hi ^ (hi << 21);
        self.hi = hi.rotate_left(28);

        value
    }

    fn next_bits(&mut self, bits: u64) -> u64 {
        self.next_u64() >> (64 - bits)
    }
}

impl GaussianSource for Xoroshiro {
    fn take_cached_gaussian(&mut self) -> Option<f64> {
        self.cached_gaussian.take()
    }

    fn cache_gaussian(&mut self, value: f64) {
        self.cached_gaussian = Some(value);
    }
}

impl RandomImpl for Xoroshiro {
    fn split(&mut self) -> Self {
        let lo = self.next_u64();
        let hi = self.next_u64();
        Self::new(lo, hi)
    }

    fn next_splitter(&mut self) -> RandomDeriver {
        RandomDeriver::Xoroshiro(XoroshiroSplitter {
            lo: self.next_u64(),
            hi: self.next_u64(),
        })
    }

    fn next_i32(&mut self) -> i32 {
        self.next_u64() as i32
    }

    fn next_bounded_i32(&mut self, bound: i32) -> i32 {
        debug_assert!(bound > 0);
        // Lemire-style rejection keeps the distribution exactly uniform.
        let bound = bound as u64;
        let mut product = (self.next_u64() & 0xFFFFFFFF).wrapping_mul(bound);
        let mut low = product & 0xFFFFFFFF;
        if low < bound {
            let threshold = bound.wrapping_neg() % bound;
            while low < threshold {
                product = (self.next_u64() & 0xFFFFFFFF).wrapping_mul(bound);
                low = product & 0xFFFFFFFF;
            }
        }
        (product >> 32) as i32
    }

    fn next_i64(&mut self) -> i64 {
        self.next_u64() as i64
    }

    fn next_bool(&mut self) -> bool {
        (self.next_u64() & 1) != 0
    }

    fn next_f32(&mut self) -> f32 {
        self.next_bits(24) as f32 * FLOAT_UNIT
    }

    fn next_f64(&mut self) -> f64 {
        self.next_bits(53) as f64 * DOUBLE_UNIT
    }

    fn next_gaussian(&mut self) -> f64 {
        self.sample_gaussian()
    }
}

/// Immutable seed pair from which independent generators are derived,
/// e.g. one per octave layer.
#[derive(Clone)]
pub struct XoroshiroSplitter {
    lo: u64,
    hi: u64,
}

impl XoroshiroSplitter {
    pub fn new(lo: u64, hi: u64) -> Self {
        Self { lo, hi }
    }
}

impl RandomDeriverImpl for XoroshiroSplitter {
    fn split_u64(&self, seed: u64) -> RandomGenerator {
        RandomGenerator::Xoroshiro(Xoroshiro::new(
            mix_stafford_13(seed ^ self.lo),
            mix_stafford_13(seed.wrapping_mul(GOLDEN_RATIO_64) ^ self.hi),
        ))
    }

    fn split_index(&self, index: usize) -> RandomGenerator {
        self.split_u64(index as u64)
    }
}
