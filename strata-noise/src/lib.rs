//! Deterministic, seeded, streaming Perlin-style noise in 1 to 5 dimensions.
//!
//! A [`StreamGenerator`] produces an unbounded sequence of scalar, line or
//! slice samples from a seeded gradient lattice, optionally seamless along
//! its shaped axes and optionally computed on a shared rayon pool.
//! [`LayeredComposer`] sums independently seeded generators into normalized
//! octave noise.

pub mod circular;
pub mod config;
pub mod corner;
pub mod domain_split;
pub mod error;
pub mod lattice;
pub mod layered;
pub mod sample_context;
pub mod shape;
pub mod stream;

pub use config::GeneratorConfig;
pub use domain_split::CancellationToken;
pub use error::NoiseError;
pub use lattice::GradientLattice;
pub use layered::LayeredComposer;
pub use shape::{OutputShape, Segment};
pub use stream::StreamGenerator;
