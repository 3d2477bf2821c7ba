pub mod arrangement;
pub mod constraint;
pub mod error;
pub mod geometry;
pub mod intersection;
pub mod math;
pub mod network;
pub mod tessellation;

pub use error::{Result, RoadError};
pub use intersection::{GeneratorConfig, GeneratorOutput, IntersectionGenerator, RoadPolygon, TexInfo};
pub use network::{NetworkConfig, SegmentNetwork};
