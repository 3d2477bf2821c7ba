use std::collections::HashMap;

use geo::{Contains, LineString, Point, Polygon};
use spade::{ConstrainedDelaunayTriangulation, Point2 as SpadePoint2, Triangulation};

use crate::error::{Result, TessellationError};
use crate::intersection::RoadPolygon;
use crate::math::{CoordinateSystem, Point2, Vector2};

use super::TriangleMesh;

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// Triangulates a generated road polygon with per-vertex texture coordinates.
pub struct TessellatePolygon<'a> {
    polygon: &'a RoadPolygon,
}

impl<'a> TessellatePolygon<'a> {
    #[must_use]
    pub fn new(polygon: &'a RoadPolygon) -> Self {
        Self { polygon }
    }

    /// Executes the triangulation.
    ///
    /// The outline is projected to ground metres around the texture's
    /// reference point, so geodetic polygons triangulate without distortion.
    /// Triangles whose centroid falls outside the outline are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if the outline has fewer than three vertices or the
    /// triangulation rejects a vertex.
    pub fn execute(&self, coordinates: CoordinateSystem) -> Result<TriangleMesh> {
        let placement = &self.polygon.texture;
        let local: Vec<Vector2> = self
            .polygon
            .points
            .iter()
            .map(|&p| coordinates.local_metres(placement.reference, p))
            .collect();
        if local.len() < 3 {
            return Err(TessellationError::InvalidPolygon(format!("{} vertices", local.len())).into());
        }

        let mut cdt = Cdt::new();
        // CDT vertex index to the outline vertex it was inserted for.
        let mut outline_index: HashMap<usize, usize> = HashMap::new();
        let mut handles = Vec::with_capacity(local.len());
        for (i, v) in local.iter().enumerate() {
            let handle = cdt
                .insert(SpadePoint2::new(v.x, v.y))
                .map_err(|e| TessellationError::Failed(format!("vertex {i}: {e}")))?;
            outline_index.entry(handle.index()).or_insert(i);
            handles.push(handle);
        }
        for (&from, &to) in handles.iter().zip(handles.iter().cycle().skip(1)) {
            if from != to {
                cdt.add_constraint(from, to);
            }
        }

        let ring: Vec<(f64, f64)> = local.iter().map(|v| (v.x, v.y)).collect();
        let region = Polygon::new(LineString::from(ring), vec![]);

        let mut mesh = TriangleMesh::default();
        let mut emitted: HashMap<usize, u32> = HashMap::new();
        for face in cdt.inner_faces() {
            let [a, b, c] = face.positions();
            let centroid = Point::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0);
            if !region.contains(&centroid) {
                continue;
            }
            let mut triangle = [0u32; 3];
            for (slot, vh) in triangle.iter_mut().zip(face.vertices()) {
                let idx = vh.fix().index();
                if let Some(&existing) = emitted.get(&idx) {
                    *slot = existing;
                    continue;
                }
                let pos = vh.position();
                let offset = Vector2::new(pos.x, pos.y);
                let Some(&source) = outline_index.get(&idx) else {
                    return Err(TessellationError::Failed(format!("unexpected vertex at {offset:?}")).into());
                };
                let (u, v) = placement.uv(offset);
                let next = u32::try_from(mesh.vertices.len())
                    .map_err(|_| TessellationError::Failed("too many vertices".into()))?;
                mesh.vertices.push(self.polygon.points[source]);
                mesh.uvs.push(Point2::new(u, v));
                emitted.insert(idx, next);
                *slot = next;
            }
            mesh.indices.push(triangle);
        }
        Ok(mesh)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::intersection::{TextureMethod, TexturePlacement};
    use crate::math::ExactPoint;

    fn polygon(points: &[(f64, f64)], method: TextureMethod) -> RoadPolygon {
        let points: Vec<Point2> = points.iter().map(|&(x, y)| Point2::new(x, y)).collect();
        RoadPolygon {
            edge_label: 1,
            kind: 1,
            width: 4.0,
            zorder: 1,
            is_cap: method == TextureMethod::Cap,
            exact: points.iter().map(|p| ExactPoint::from_f64(p.x, p.y).unwrap()).collect(),
            points,
            texture: TexturePlacement {
                method,
                material: "asphalt".into(),
                reference: Point2::new(0.0, 0.0),
                heading: 90.0,
                width: 4.0,
                length: 10.0,
                atlas_u: (0.0, 1.0),
                atlas_v: (0.0, 1.0),
                v_start: 2.0,
                v_end: 4.0,
            },
            mesh: None,
        }
    }

    #[test]
    fn road_rectangle_produces_two_triangles() {
        let rect = polygon(&[(0.0, -2.0), (10.0, -2.0), (10.0, 2.0), (0.0, 2.0)], TextureMethod::Tiled);
        let mesh = TessellatePolygon::new(&rect).execute(CoordinateSystem::Projected).unwrap();
        assert_eq!(mesh.indices.len(), 2);
        assert_eq!(mesh.vertices.len(), 4);
        for (p, uv) in mesh.vertices.iter().zip(&mesh.uvs) {
            // Right of an eastbound road is south: u runs from north to south.
            let u = if p.y < 0.0 { 1.0 } else { 0.0 };
            let v = if p.x > 5.0 { 4.0 } else { 2.0 };
            assert_abs_diff_eq!(uv.x, u, epsilon = 1e-12);
            assert_abs_diff_eq!(uv.y, v, epsilon = 1e-12);
        }
    }

    #[test]
    fn concave_outline_tessellates_inside_only() {
        let l = polygon(
            &[(0.0, 0.0), (4.0, 0.0), (4.0, 2.0), (2.0, 2.0), (2.0, 4.0), (0.0, 4.0)],
            TextureMethod::Cap,
        );
        let mesh = TessellatePolygon::new(&l).execute(CoordinateSystem::Projected).unwrap();
        assert_eq!(mesh.indices.len(), 4);
        assert_eq!(mesh.vertices.len(), 6);
        let area: f64 = mesh
            .indices
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| mesh.vertices[i as usize]);
                ((b - a).perp(&(c - a)) / 2.0).abs()
            })
            .sum();
        assert_abs_diff_eq!(area, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_outline_is_rejected() {
        let sliver = polygon(&[(0.0, 0.0), (1.0, 0.0)], TextureMethod::Cap);
        assert!(TessellatePolygon::new(&sliver).execute(CoordinateSystem::Projected).is_err());
    }
}
