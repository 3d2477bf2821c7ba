mod tessellate_polygon;

pub use tessellate_polygon::TessellatePolygon;

use crate::math::Point2;

/// A textured triangle mesh of one road polygon.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions in input coordinates.
    pub vertices: Vec<Point2>,
    /// UV coordinates.
    pub uvs: Vec<Point2>,
    /// Triangle indices (each triple defines a triangle).
    pub indices: Vec<[u32; 3]>,
}
