use std::sync::Arc;

use rayon::prelude::*;
use strata_util::pool::ObjectPool;
use strata_util::random::{RandomDeriverImpl, RandomImpl, xoroshiro128::Xoroshiro};

use crate::config::GeneratorConfig;
use crate::error::NoiseError;
use crate::shape::{OutputShape, Segment};
use crate::stream::StreamGenerator;

/// Composes K independently seeded stream generators (octaves) into one
/// normalized stream.
///
/// Layer outputs are element-wise summed and divided by the total amplitude,
/// so composite values always land in [0, 1] regardless of how the layers
/// line up. The composite is only circular when every layer is circular;
/// one non-circular layer breaks the seam for the whole sum.
pub struct LayeredComposer {
    layers: Vec<StreamGenerator>,
    total_amplitude: f64,
    circular: bool,
    shape: OutputShape,
    pool: Option<Arc<rayon::ThreadPool>>,
    parallel_threshold: usize,
    accumulators: ObjectPool<Vec<f64>>,
}

impl LayeredComposer {
    pub fn new(
        layers: Vec<StreamGenerator>,
        pool: Option<Arc<rayon::ThreadPool>>,
    ) -> Result<Self, NoiseError> {
        let first = layers
            .first()
            .ok_or_else(|| NoiseError::invalid_configuration("composer needs at least one layer"))?;
        let shape = first.output_shape();
        let parallel_threshold = first.config().parallel_threshold;

        for (index, layer) in layers.iter().enumerate() {
            if layer.output_shape() != shape {
                return Err(NoiseError::invalid_configuration(format!(
                    "layer {index} has shape {:?}, first layer has {:?}",
                    layer.output_shape(),
                    shape
                )));
            }
        }

        let total_amplitude: f64 = layers.iter().map(StreamGenerator::max_amplitude).sum();
        if !total_amplitude.is_finite() || total_amplitude <= 0.0 {
            return Err(NoiseError::invalid_configuration(format!(
                "total amplitude {total_amplitude} must be a positive finite value"
            )));
        }

        let circular = layers.iter().all(StreamGenerator::is_circular);
        if !circular && layers.iter().any(StreamGenerator::is_circular) {
            log::debug!("mixed layer periodicity; composite stream is not circular");
        }

        Ok(Self {
            layers,
            total_amplitude,
            circular,
            shape,
            pool,
            parallel_threshold,
            accumulators: ObjectPool::default(),
        })
    }

    /// Builds a classic octave ladder: `octaves` layers derived from one
    /// configuration, the step sizes of layer k scaled by `lacunarity^k` and
    /// its amplitude by `persistence^k`, each layer seeded independently
    /// from `master_seed`. Deterministic for a given master seed.
    pub fn octave_stack(
        base: &GeneratorConfig,
        octaves: usize,
        persistence: f64,
        lacunarity: f64,
        master_seed: u64,
        pool: Option<Arc<rayon::ThreadPool>>,
    ) -> Result<Self, NoiseError> {
        if octaves < 1 {
            return Err(NoiseError::invalid_configuration(
                "octave stack needs at least one octave",
            ));
        }
        if !persistence.is_finite() || persistence <= 0.0 {
            return Err(NoiseError::invalid_configuration(format!(
                "persistence {persistence} must be a positive finite value"
            )));
        }
        if !lacunarity.is_finite() || lacunarity <= 0.0 {
            return Err(NoiseError::invalid_configuration(format!(
                "lacunarity {lacunarity} must be a positive finite value"
            )));
        }

        let mut master = Xoroshiro::from_seed(master_seed);
        let splitter = master.next_splitter();

        let mut layers = Vec::with_capacity(octaves);
        for octave in 0..octaves {
            let mut config = base.clone();
            let scale = lacunarity.powi(octave as i32);
            for step in &mut config.step_sizes {
                *step *= scale;
            }
            config.amplitude = base.amplitude * persistence.powi(octave as i32);
            config.seed = splitter.split_index(octave).next_i64() as u64;
            layers.push(StreamGenerator::new(config, pool.clone())?);
        }
        Self::new(layers, pool)
    }

    pub fn max_amplitude(&self) -> f64 {
        self.total_amplitude
    }

    pub fn is_circular(&self) -> bool {
        self.circular
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn output_shape(&self) -> OutputShape {
        self.shape
    }

    pub fn dimensions(&self) -> usize {
        self.layers[0].dimensions()
    }

    /// The next `count` composite samples, in [0, 1].
    pub fn next(&mut self, count: usize) -> Result<Segment, NoiseError> {
        if count < 1 {
            return Err(NoiseError::invalid_argument(
                "sample count must be at least 1",
            ));
        }

        let segments = self.collect_layer_segments(count)?;

        let elements = self.shape.elements_per_sample();
        let mut values = self.accumulators.acquire(Vec::new);
        values.clear();
        values.resize(count * elements, 0.0);

        for segment in &segments {
            debug_assert_eq!(segment.count(), count);
            for (accumulated, &value) in values.iter_mut().zip(segment.values()) {
                *accumulated += value;
            }
        }
        for value in &mut values {
            *value /= self.total_amplitude;
        }

        for (layer, segment) in self.layers.iter().zip(segments) {
            layer.recycle(segment);
        }

        Ok(Segment::new(self.shape, count, values))
    }

    /// Hands a delivered composite segment's buffer back for reuse.
    pub fn recycle(&self, segment: Segment) {
        if segment.shape() == self.shape {
            let mut values = segment.into_values();
            values.clear();
            self.accumulators.release(values);
        }
    }

    /// Pulls `count` samples from every layer, fanning out across the pool
    /// when the combined element count warrants it. On failure the segments
    /// of the layers that did succeed are pushed back so all layer cursors
    /// stay aligned for the next call.
    fn collect_layer_segments(&mut self, count: usize) -> Result<Vec<Segment>, NoiseError> {
        let combined = count * self.shape.elements_per_sample() * self.layers.len();
        let fan_out = match &self.pool {
            Some(pool) => combined >= self.parallel_threshold && pool.current_num_threads() > 1,
            None => false,
        };

        let results: Vec<Result<Segment, NoiseError>> = if fan_out {
            let pool = self.pool.as_deref().unwrap();
            let layers = &mut self.layers;
            pool.install(|| {
                layers
                    .par_iter_mut()
                    .map(|layer| layer.next(count))
                    .collect()
            })
        } else {
            self.layers
                .iter_mut()
                .map(|layer| layer.next(count))
                .collect()
        };

        if results.iter().all(Result::is_ok) {
            return Ok(results.into_iter().map(Result::unwrap).collect());
        }

        let mut failure = None;
        for (layer, result) in self.layers.iter_mut().zip(results) {
            match result {
                Ok(segment) => layer.requeue_front(segment),
                Err(error) => failure = Some(error),
            }
        }
        Err(failure.expect("at least one layer failed"))
    }
}
