use strata_util::math::floor_split;
use strata_util::pool::ObjectPool;

use crate::corner::{collapse, normalize};
use crate::error::NoiseError;
use crate::lattice::GradientLattice;

/// Per-sample scratch state: the coordinate vector, its integer cell parts,
/// fractional distances and the corner dot-product buffer.
///
/// One context is reused for every sample a generator produces serially;
/// parallel leaves borrow separate instances from a [`ContextPool`] so no
/// context is ever shared between concurrent workers.
pub struct SampleContext {
    dimensions: usize,
    coords: Vec<f64>,
    cells: Vec<i64>,
    distances: Vec<f64>,
    corners: Vec<f64>,
    periods: Vec<Option<i64>>,
}

impl SampleContext {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            coords: vec![0.0; dimensions],
            cells: vec![0; dimensions],
            distances: vec![0.0; dimensions],
            corners: vec![0.0; 1 << dimensions],
            periods: vec![None; dimensions],
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Restricts `axis` to repeat every `period` lattice cells. Used for
    /// circular axes, where the loop length in cells is usually not a power
    /// of two and so cannot rely on the lattice mask alone.
    pub fn set_period(&mut self, axis: usize, period: Option<i64>) {
        debug_assert!(period.map_or(true, |p| p > 0));
        self.periods[axis] = period;
    }

    /// Positions the context at `coordinate` along `axis`, splitting it into
    /// the integer cell and the fractional in-cell distance.
    #[inline]
    pub fn set_axis(&mut self, axis: usize, coordinate: f64) {
        let (mut cell, distance) = floor_split(coordinate);
        if let Some(period) = self.periods[axis] {
            cell = cell.rem_euclid(period);
        }
        self.coords[axis] = coordinate;
        self.cells[axis] = cell;
        self.distances[axis] = distance;
    }

    /// Noise value in [0, 1] at the current position.
    pub fn sample(&mut self, lattice: &GradientLattice) -> Result<f64, NoiseError> {
        debug_assert_eq!(lattice.dimensions(), self.dimensions);
        let corner_count = 1 << self.dimensions;
        for corner in 0..corner_count {
            self.corners[corner] = lattice.corner_dot(&self.cells, corner, &self.distances);
        }
        let value = collapse(&mut self.corners[..corner_count], &self.distances)?;
        Ok(normalize(value, self.dimensions))
    }

    /// Returns the context to a known-blank state before it goes back into a
    /// pool. Axis periods are part of the pool template and survive.
    pub fn reset(&mut self) {
        self.coords.fill(0.0);
        self.cells.fill(0);
        self.distances.fill(0.0);
        self.corners.fill(0.0);
    }
}

/// Free-list of [`SampleContext`] instances for one generator, all sharing
/// the generator's dimensionality and circular-axis periods.
pub struct ContextPool {
    pool: ObjectPool<SampleContext>,
    dimensions: usize,
    periods: Vec<Option<i64>>,
}

impl ContextPool {
    pub fn new(dimensions: usize, periods: Vec<Option<i64>>) -> Self {
        debug_assert_eq!(periods.len(), dimensions);
        Self {
            pool: ObjectPool::default(),
            dimensions,
            periods,
        }
    }

    pub fn acquire(&self) -> SampleContext {
        self.pool.acquire(|| {
            let mut context = SampleContext::new(self.dimensions);
            for (axis, &period) in self.periods.iter().enumerate() {
                context.set_period(axis, period);
            }
            context
        })
    }

    pub fn release(&self, mut context: SampleContext) {
        context.reset();
        self.pool.release(context);
    }
}
