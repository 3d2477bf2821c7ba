pub mod intersect;
pub mod linear;

pub use intersect::{clip_to_box, intersect_linear, BoundingBox, Intersection};
pub use linear::{Domain, Line, Linear, Ray, Segment};
