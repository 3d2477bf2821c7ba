use thiserror::Error;

/// Top-level error type for the road intersection generator.
#[derive(Debug, Error)]
pub enum RoadError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Intersection(#[from] IntersectionError),

    #[error(transparent)]
    Tessellation(#[from] TessellationError),
}

/// Errors related to exact geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("coordinate {0} is not finite")]
    NonFinite(f64),

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,
}

/// Errors raised while building or cleaning the segment network.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid road segment: {0}")]
    InvalidSegment(String),

    #[error("invalid configuration: {parameter} = {value}")]
    InvalidConfig { parameter: &'static str, value: f64 },
}

/// Errors related to the node/edge arena of the intersection generator.
#[derive(Debug, Error)]
pub enum IntersectionError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("generator is in state {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Errors related to triangulating generated polygons.
#[derive(Debug, Error)]
pub enum TessellationError {
    #[error("invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("tessellation failed: {0}")]
    Failed(String),
}

/// Convenience type alias for results using [`RoadError`].
pub type Result<T> = std::result::Result<T, RoadError>;
