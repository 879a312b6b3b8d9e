pub mod math;
pub mod pool;
pub mod random;
