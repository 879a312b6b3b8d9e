use serde::{Deserialize, Serialize};

/// Natural shape of one sample emitted by a generator.
///
/// A `Point` generator emits scalars, a `Line` generator emits 1-D arrays of
/// `length` values and a `Slice` generator emits row-major 2-D arrays of
/// `width * height` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputShape {
    Point,
    Line { length: usize },
    Slice { width: usize, height: usize },
}

impl OutputShape {
    /// Number of scalar values in one sample of this shape.
    pub fn elements_per_sample(&self) -> usize {
        match self {
            Self::Point => 1,
            Self::Line { length } => *length,
            Self::Slice { width, height } => width * height,
        }
    }

    /// Number of coordinate axes the shape itself occupies (the streaming
    /// cursor axis is not counted).
    pub fn shaped_axes(&self) -> usize {
        match self {
            Self::Point => 0,
            Self::Line { .. } => 1,
            Self::Slice { .. } => 2,
        }
    }
}

/// A batch of samples handed to the caller by `next`.
///
/// Values are stored flat: sample `i` occupies
/// `[i * elements_per_sample, (i + 1) * elements_per_sample)`. Slices are
/// row-major within a sample. The backing buffer can be handed back to the
/// generator it came from via `recycle`.
pub struct Segment {
    shape: OutputShape,
    count: usize,
    values: Vec<f64>,
}

impl Segment {
    pub(crate) fn new(shape: OutputShape, count: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), count * shape.elements_per_sample());
        Self {
            shape,
            count,
            values,
        }
    }

    pub fn shape(&self) -> OutputShape {
        self.shape
    }

    /// Number of samples in this segment.
    pub fn count(&self) -> usize {
        self.count
    }

    /// All values, samples concatenated in order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The values of sample `index`.
    pub fn sample(&self, index: usize) -> &[f64] {
        let elements = self.shape.elements_per_sample();
        &self.values[index * elements..(index + 1) * elements]
    }

    /// One value of a 2-D sample by row/column.
    pub fn slice_value(&self, index: usize, x: usize, y: usize) -> f64 {
        match self.shape {
            OutputShape::Slice { width, .. } => self.sample(index)[y * width + x],
            _ => panic!("slice_value on a non-slice segment"),
        }
    }

    pub(crate) fn into_values(self) -> Vec<f64> {
        self.values
    }
}
