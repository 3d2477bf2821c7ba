use std::cmp::Ordering;
use std::collections::HashSet;

use crate::geometry::{intersect_linear, Intersection, Segment};
use crate::math::{ExactPoint, ExactVector, Scalar};

use super::{Arrangement, CurveData, CurveId, FaceMap, VertexId};

/// First curve crossed by a bounded ray cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RayHit {
    pub point: ExactPoint,
    pub curve: CurveId,
}

impl<D: CurveData> Arrangement<D> {
    /// Casts the segment `from -> from + reach` and returns the first curve it
    /// crosses.
    ///
    /// The cast starts in the face lying in the angular wedge that contains
    /// `reach` around `from`, and only that face's boundary is searched.
    /// Touching `from` itself never counts as a hit.
    #[must_use]
    pub fn shoot_ray(&self, from: VertexId, reach: &ExactVector, faces: &FaceMap) -> Option<RayHit> {
        let origin = self.point(from)?.clone();
        let probe = Segment::new(origin.clone(), origin.translate(reach)).ok()?;

        let outgoing = self.outgoing(from);
        let face = if outgoing.is_empty() {
            faces.face_containing(&origin)
        } else {
            let wedge = outgoing
                .iter()
                .rev()
                .find(|&&h| {
                    self.direction(h)
                        .is_some_and(|d| d.cmp_ccw(reach) != Ordering::Greater)
                })
                .or_else(|| outgoing.last())
                .copied()?;
            faces.face_of(wedge)?
        };

        let mut seen = HashSet::new();
        let mut best: Option<(RayHit, Scalar)> = None;
        for h in faces.boundary(face) {
            if !seen.insert(h.curve) {
                continue;
            }
            let Some(other) = self.segment(h.curve) else {
                continue;
            };
            let hit = match intersect_linear(&probe, &other) {
                Intersection::None => continue,
                Intersection::Point(p) => p,
                Intersection::Overlap { from, .. } => match from {
                    Some(p) => p,
                    None => continue,
                },
            };
            if hit == origin {
                continue;
            }
            let d = origin.squared_distance(&hit);
            if best.as_ref().map_or(true, |(_, bd)| &d < bd) {
                best = Some((
                    RayHit {
                        point: hit,
                        curve: h.curve,
                    },
                    d,
                ));
            }
        }
        best.map(|(hit, _)| hit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> ExactPoint {
        ExactPoint::from_f64(x, y).unwrap()
    }

    fn v(x: f64, y: f64) -> ExactVector {
        &p(x, y) - &ExactPoint::origin()
    }

    #[test]
    fn cast_stops_at_nearest_crossing() {
        let mut arr: Arrangement<()> = Arrangement::new();
        arr.insert_segment(&p(0.0, 0.0), &p(2.0, 0.0), ()).unwrap();
        arr.insert_segment(&p(3.0, -1.0), &p(3.0, 1.0), ()).unwrap();
        arr.insert_segment(&p(5.0, -1.0), &p(5.0, 1.0), ()).unwrap();
        let tip = arr.vertex_at(&p(2.0, 0.0)).unwrap();
        let faces = arr.faces();

        let hit = arr.shoot_ray(tip, &v(5.0, 0.0), &faces).unwrap();
        assert_eq!(hit.point, p(3.0, 0.0));

        assert!(arr.shoot_ray(tip, &v(0.5, 0.0), &faces).is_none());
        assert!(arr.shoot_ray(tip, &v(0.0, 5.0), &faces).is_none());
    }

    #[test]
    fn cast_inside_a_closed_face() {
        let mut arr: Arrangement<()> = Arrangement::new();
        let c = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        for i in 0..4 {
            arr.insert_segment(&c[i], &c[(i + 1) % 4], ()).unwrap();
        }
        arr.insert_segment(&p(0.0, 5.0), &p(4.0, 5.0), ()).unwrap();
        let tip = arr.vertex_at(&p(4.0, 5.0)).unwrap();
        let faces = arr.faces();
        let hit = arr.shoot_ray(tip, &v(0.0, -20.0), &faces).unwrap();
        assert_eq!(hit.point, p(4.0, 0.0));
        let hit = arr.shoot_ray(tip, &v(20.0, 0.0), &faces).unwrap();
        assert_eq!(hit.point, p(10.0, 5.0));
    }
}
