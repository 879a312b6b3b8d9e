use strata_util::math::is_power_of_two;
use strata_util::random::{RandomGenerator, next_unit_vector};

use crate::error::NoiseError;

pub const MIN_DIMENSIONS: usize = 1;
pub const MAX_DIMENSIONS: usize = 5;

/// Hard cap on the gradient table, in `f64` elements (512 MiB).
const MAX_TABLE_ELEMENTS: usize = 1 << 26;

/// Precomputed table of random unit vectors on an N-dimensional integer
/// lattice, `size` points per axis.
///
/// `size` must be a power of two so that lookups wrap with a bitmask instead
/// of a modulo, which is also what makes the field tile with period `size`
/// along every axis. The table is filled once from the seed and never mutated.
pub struct GradientLattice {
    dimensions: usize,
    size: usize,
    mask: i64,
    strides: [usize; MAX_DIMENSIONS],
    vectors: Vec<f64>,
}

impl GradientLattice {
    pub fn new(dimensions: usize, size: usize, seed: u64) -> Result<Self, NoiseError> {
        if !(MIN_DIMENSIONS..=MAX_DIMENSIONS).contains(&dimensions) {
            return Err(NoiseError::invalid_configuration(format!(
                "dimension count {dimensions} outside [{MIN_DIMENSIONS}, {MAX_DIMENSIONS}]"
            )));
        }
        if !is_power_of_two(size) {
            return Err(NoiseError::invalid_configuration(format!(
                "lattice size {size} is not a power of two"
            )));
        }

        let mut cell_count: usize = 1;
        for _ in 0..dimensions {
            cell_count = cell_count.checked_mul(size).ok_or_else(|| {
                NoiseError::invalid_configuration(format!(
                    "gradient table {size}^{dimensions} overflows"
                ))
            })?;
        }
        let element_count = cell_count.checked_mul(dimensions).ok_or_else(|| {
            NoiseError::invalid_configuration(format!(
                "gradient table {size}^{dimensions} overflows"
            ))
        })?;
        if element_count > MAX_TABLE_ELEMENTS {
            return Err(NoiseError::invalid_configuration(format!(
                "gradient table {size}^{dimensions} exceeds the {MAX_TABLE_ELEMENTS} element cap"
            )));
        }

        let mut strides = [0usize; MAX_DIMENSIONS];
        let mut stride = 1;
        for axis in 0..dimensions {
            strides[axis] = stride;
            stride *= size;
        }

        let mut rand = RandomGenerator::from_seed(seed);
        let mut vectors = vec![0.0; element_count];
        for vector in vectors.chunks_exact_mut(dimensions) {
            next_unit_vector(&mut rand, vector);
        }

        Ok(Self {
            dimensions,
            size,
            mask: (size - 1) as i64,
            strides,
            vectors,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The unit vector at integer lattice coordinates `cell`, each axis
    /// wrapped with the size mask.
    pub fn gradient(&self, cell: &[i64]) -> &[f64] {
        debug_assert_eq!(cell.len(), self.dimensions);
        let mut index = 0;
        for (axis, &coordinate) in cell.iter().enumerate() {
            index += ((coordinate & self.mask) as usize) * self.strides[axis];
        }
        let start = index * self.dimensions;
        &self.vectors[start..start + self.dimensions]
    }

    /// Dot product of the gradient at `cell + corner-offset` with the offset
    /// distance vector, for corner `corner` of the enclosing unit hypercube.
    ///
    /// Bit `a` of `corner` selects the high side on axis `a`; the distance
    /// component on a high-side axis is `distances[a] - 1`.
    #[inline]
    pub fn corner_dot(&self, cell: &[i64], corner: usize, distances: &[f64]) -> f64 {
        debug_assert!(corner < (1 << self.dimensions));
        let mut index = 0;
        for (axis, &coordinate) in cell.iter().enumerate() {
            let offset = ((corner >> axis) & 1) as i64;
            index += (((coordinate + offset) & self.mask) as usize) * self.strides[axis];
        }
        let start = index * self.dimensions;
        let gradient = &self.vectors[start..start + self.dimensions];

        let mut dot = 0.0;
        for (axis, &component) in gradient.iter().enumerate() {
            let offset = ((corner >> axis) & 1) as f64;
            dot += component * (distances[axis] - offset);
        }
        dot
    }
}
