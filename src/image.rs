//! Screen rasters and their reduction to a brightness value

mod estimator;
pub use estimator::*;

mod sample;
pub use sample::*;
