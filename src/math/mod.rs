pub mod exact;
pub mod geodesy;

pub use exact::{ExactPoint, ExactVector, Orientation, Scalar};
pub use geodesy::CoordinateSystem;

/// 2D point type used for metric and output coordinates.
pub type Point2 = nalgebra::Point2<f64>;

/// 2D vector type used for metric and output coordinates.
pub type Vector2 = nalgebra::Vector2<f64>;

/// Global tolerance for floating-point comparisons.
///
/// Only metric code (lengths, headings, texture coordinates) compares floats;
/// topological decisions go through the exact kernel.
pub const TOLERANCE: f64 = 1e-10;

/// Length of one degree of latitude in metres, used as the degree-equivalent
/// conversion for tolerances expressed in metres.
pub const METRES_PER_DEGREE: f64 = 111_319.490_793_273_6;
