use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_util::math::is_power_of_two;
use strata_util::random::fresh_seed;

use crate::error::NoiseError;
use crate::lattice::{MAX_DIMENSIONS, MIN_DIMENSIONS};
use crate::shape::OutputShape;

/// Default lattice size per dimension count; higher dimensions get smaller
/// tables because the table grows as `size^N`.
const DEFAULT_LATTICE_SIZES: [usize; MAX_DIMENSIONS] = [256, 256, 64, 32, 16];

/// Default element count above which a line or slice is generated on the
/// thread pool instead of serially.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 8192;

/// Cap on the element count of one sample, bounding segment memory
/// (1 << 20 values is 8 MiB of `f64`).
pub const MAX_SAMPLE_ELEMENTS: usize = 1 << 20;

/// Every knob of one stream generator, fixed at construction.
///
/// The cursor advances along axis 0; `shape` occupies the trailing axes
/// (line length on the last axis, slice width then height on the last two).
/// Any axes in between are sampled at coordinate 0. All fields are plain
/// data; there is no global or hidden state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub dimensions: usize,
    /// Gradient lattice points per axis; must be a power of two.
    pub lattice_size: usize,
    pub seed: u64,
    /// Coordinate advance per sample index on each axis, in lattice cells.
    pub step_sizes: Vec<f64>,
    /// Output scale: values lie in [0, amplitude].
    pub amplitude: f64,
    /// Correct shaped-axis step sizes so the output tiles seamlessly.
    pub circular: bool,
    pub shape: OutputShape,
    /// Element count at which line/slice generation moves onto the pool.
    pub parallel_threshold: usize,
    /// Cooperative deadline for one parallel segment, if any.
    pub timeout: Option<Duration>,
}

impl GeneratorConfig {
    /// A point-stream configuration with documented defaults: lattice size
    /// from `DEFAULT_LATTICE_SIZES`, step 0.01 on every axis, amplitude 1.0,
    /// not circular, serial below `DEFAULT_PARALLEL_THRESHOLD`, no timeout.
    pub fn new(dimensions: usize, seed: u64) -> Self {
        let lattice_size = DEFAULT_LATTICE_SIZES
            .get(dimensions.saturating_sub(1))
            .copied()
            .unwrap_or(16);
        Self {
            dimensions,
            lattice_size,
            seed,
            step_sizes: vec![0.01; dimensions],
            amplitude: 1.0,
            circular: false,
            shape: OutputShape::Point,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            timeout: None,
        }
    }

    /// Like [`Self::new`] but with a process-unique seed, for callers that
    /// want distinct streams rather than reproducible ones.
    pub fn with_fresh_seed(dimensions: usize) -> Self {
        Self::new(dimensions, fresh_seed())
    }

    pub(crate) fn validate(&self) -> Result<(), NoiseError> {
        if !(MIN_DIMENSIONS..=MAX_DIMENSIONS).contains(&self.dimensions) {
            return Err(NoiseError::invalid_configuration(format!(
                "dimension count {} outside [{MIN_DIMENSIONS}, {MAX_DIMENSIONS}]",
                self.dimensions
            )));
        }
        if !is_power_of_two(self.lattice_size) {
            return Err(NoiseError::invalid_configuration(format!(
                "lattice size {} is not a power of two",
                self.lattice_size
            )));
        }
        if self.step_sizes.len() != self.dimensions {
            return Err(NoiseError::invalid_configuration(format!(
                "{} step sizes for {} dimensions",
                self.step_sizes.len(),
                self.dimensions
            )));
        }
        for &step in &self.step_sizes {
            if !step.is_finite() || step <= 0.0 {
                return Err(NoiseError::invalid_configuration(format!(
                    "step size {step} must be a positive finite value"
                )));
            }
        }
        if !self.amplitude.is_finite() || self.amplitude <= 0.0 {
            return Err(NoiseError::invalid_configuration(format!(
                "amplitude {} must be a positive finite value",
                self.amplitude
            )));
        }

        let shaped_axes = self.shape.shaped_axes();
        if shaped_axes + 1 > self.dimensions {
            return Err(NoiseError::invalid_configuration(format!(
                "shape {:?} needs at least {} dimensions, configured with {}",
                self.shape,
                shaped_axes + 1,
                self.dimensions
            )));
        }
        let elements = self.shape.elements_per_sample();
        if elements == 0 {
            return Err(NoiseError::invalid_configuration(
                "output shape has zero-length axes",
            ));
        }
        if elements > MAX_SAMPLE_ELEMENTS {
            return Err(NoiseError::invalid_configuration(format!(
                "one sample of shape {:?} holds {elements} values, above the {MAX_SAMPLE_ELEMENTS} cap",
                self.shape
            )));
        }
        if self.circular && shaped_axes == 0 {
            return Err(NoiseError::invalid_configuration(
                "circular output requires a line or slice shape",
            ));
        }
        if self.parallel_threshold == 0 {
            return Err(NoiseError::invalid_configuration(
                "parallel threshold must be at least 1",
            ));
        }
        Ok(())
    }

    /// Index of the first shaped axis, after the cursor and any interior
    /// axes.
    pub(crate) fn first_shaped_axis(&self) -> usize {
        self.dimensions - self.shape.shaped_axes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_for_every_dimension() {
        for dimensions in 1..=MAX_DIMENSIONS {
            assert!(GeneratorConfig::new(dimensions, 0).validate().is_ok());
        }
    }

    #[test]
    fn fresh_seeds_give_distinct_valid_configs() {
        let a = GeneratorConfig::with_fresh_seed(2);
        let b = GeneratorConfig::with_fresh_seed(2);
        assert!(a.validate().is_ok());
        assert_ne!(a.seed, b.seed);
    }

    #[test]
    fn rejects_bad_fields() {
        let mut config = GeneratorConfig::new(2, 0);
        config.lattice_size = 100;
        assert!(config.validate().is_err());

        let mut config = GeneratorConfig::new(2, 0);
        config.step_sizes = vec![0.1];
        assert!(config.validate().is_err());

        let mut config = GeneratorConfig::new(2, 0);
        config.step_sizes[1] = -0.5;
        assert!(config.validate().is_err());

        let mut config = GeneratorConfig::new(2, 0);
        config.amplitude = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shape_needs_room_beyond_the_cursor() {
        let mut config = GeneratorConfig::new(1, 0);
        config.shape = OutputShape::Line { length: 16 };
        assert!(config.validate().is_err());

        let mut config = GeneratorConfig::new(2, 0);
        config.shape = OutputShape::Line { length: 16 };
        assert!(config.validate().is_ok());
        assert_eq!(config.first_shaped_axis(), 1);

        let mut config = GeneratorConfig::new(2, 0);
        config.shape = OutputShape::Slice {
            width: 4,
            height: 4,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn circular_points_are_rejected() {
        let mut config = GeneratorConfig::new(3, 0);
        config.circular = true;
        assert!(config.validate().is_err());
        config.shape = OutputShape::Line { length: 10 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn oversized_samples_are_rejected() {
        let mut config = GeneratorConfig::new(3, 0);
        config.shape = OutputShape::Slice {
            width: 2048,
            height: 2048,
        };
        assert!(config.validate().is_err());
    }
}
