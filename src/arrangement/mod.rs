//! Exact planar arrangement of line segments.
//!
//! Vertices and curves live in slotmap arenas. Curves never cross: every
//! insertion splits existing curves at intersection points and merges the
//! data of overlapping pieces. Half-edges and faces are derived on demand
//! from the angular order of curves around each vertex.

mod face;
mod ray_shoot;

pub use face::{Cycle, Face, FaceId, FaceMap, Location};
pub use ray_shoot::RayHit;

use std::collections::HashMap;
use std::fmt::Debug;

use slotmap::SlotMap;

use crate::error::GeometryError;
use crate::geometry::{intersect_linear, Intersection, Linear, Segment};
use crate::math::{ExactPoint, ExactVector};

slotmap::new_key_type! {
    /// Unique identifier for an arrangement vertex.
    pub struct VertexId;
}

slotmap::new_key_type! {
    /// Unique identifier for an arrangement curve.
    pub struct CurveId;
}

/// Payload carried by arrangement curves.
///
/// When two inserted segments overlap, the data of the later one is merged
/// into the existing piece.
pub trait CurveData: Clone + Debug {
    fn merge(&mut self, other: &Self);
}

impl CurveData for () {
    fn merge(&mut self, _other: &Self) {}
}

/// Bit flags; merging unions the flags.
impl CurveData for u32 {
    fn merge(&mut self, other: &Self) {
        *self |= *other;
    }
}

/// A point of the arrangement and the curves incident to it.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub point: ExactPoint,
    curves: Vec<CurveId>,
}

impl Vertex {
    #[must_use]
    pub fn curves(&self) -> &[CurveId] {
        &self.curves
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.curves.len()
    }
}

/// A straight curve between two distinct vertices.
#[derive(Debug, Clone)]
pub struct Curve<D> {
    pub source: VertexId,
    pub target: VertexId,
    pub data: D,
}

impl<D> Curve<D> {
    /// The endpoint opposite to `v`.
    #[must_use]
    pub fn opposite(&self, v: VertexId) -> VertexId {
        if self.source == v {
            self.target
        } else {
            self.source
        }
    }
}

/// One direction of a curve. The face to its left is the face it bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Halfedge {
    pub curve: CurveId,
    pub forward: bool,
}

impl Halfedge {
    #[must_use]
    pub fn twin(self) -> Self {
        Self {
            curve: self.curve,
            forward: !self.forward,
        }
    }
}

/// Planar arrangement of segments carrying data of type `D`.
#[derive(Debug, Clone)]
pub struct Arrangement<D> {
    vertices: SlotMap<VertexId, Vertex>,
    curves: SlotMap<CurveId, Curve<D>>,
    index: HashMap<ExactPoint, VertexId>,
}

impl<D> Default for Arrangement<D> {
    fn default() -> Self {
        Self {
            vertices: SlotMap::with_key(),
            curves: SlotMap::with_key(),
            index: HashMap::new(),
        }
    }
}

impl<D: CurveData> Arrangement<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Queries ---

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    #[must_use]
    pub fn curve(&self, id: CurveId) -> Option<&Curve<D>> {
        self.curves.get(id)
    }

    pub fn curve_mut(&mut self, id: CurveId) -> Option<&mut Curve<D>> {
        self.curves.get_mut(id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter()
    }

    pub fn curves(&self) -> impl Iterator<Item = (CurveId, &Curve<D>)> {
        self.curves.iter()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn curve_count(&self) -> usize {
        self.curves.len()
    }

    #[must_use]
    pub fn vertex_at(&self, p: &ExactPoint) -> Option<VertexId> {
        self.index.get(p).copied()
    }

    #[must_use]
    pub fn degree(&self, v: VertexId) -> usize {
        self.vertices.get(v).map_or(0, Vertex::degree)
    }

    /// Point of a vertex. Stale ids yield `None`.
    #[must_use]
    pub fn point(&self, v: VertexId) -> Option<&ExactPoint> {
        self.vertices.get(v).map(|vx| &vx.point)
    }

    /// The curve joining `a` and `b`, in either orientation.
    #[must_use]
    pub fn curve_between(&self, a: VertexId, b: VertexId) -> Option<CurveId> {
        let va = self.vertices.get(a)?;
        va.curves.iter().copied().find(|&c| {
            self.curves
                .get(c)
                .is_some_and(|cv| (cv.source == a && cv.target == b) || (cv.source == b && cv.target == a))
        })
    }

    /// Geometry of a curve as an exact segment, oriented source to target.
    #[must_use]
    pub fn segment(&self, c: CurveId) -> Option<Segment> {
        let cv = self.curves.get(c)?;
        let a = self.point(cv.source)?.clone();
        let b = self.point(cv.target)?.clone();
        Segment::new(a, b).ok()
    }

    // --- Half-edges ---

    #[must_use]
    pub fn source(&self, h: Halfedge) -> Option<VertexId> {
        let c = self.curves.get(h.curve)?;
        Some(if h.forward { c.source } else { c.target })
    }

    #[must_use]
    pub fn target(&self, h: Halfedge) -> Option<VertexId> {
        self.source(h.twin())
    }

    /// Direction vector of a half-edge.
    #[must_use]
    pub fn direction(&self, h: Halfedge) -> Option<ExactVector> {
        let s = self.point(self.source(h)?)?;
        let t = self.point(self.target(h)?)?;
        Some(t - s)
    }

    /// Half-edges leaving `v`, sorted counter-clockwise by direction.
    #[must_use]
    pub fn outgoing(&self, v: VertexId) -> Vec<Halfedge> {
        let Some(vx) = self.vertices.get(v) else {
            return Vec::new();
        };
        let mut out: Vec<(Halfedge, ExactVector)> = vx
            .curves
            .iter()
            .filter_map(|&c| {
                let cv = self.curves.get(c)?;
                let h = Halfedge {
                    curve: c,
                    forward: cv.source == v,
                };
                Some((h, self.direction(h)?))
            })
            .collect();
        out.sort_by(|a, b| a.1.cmp_ccw(&b.1));
        out.into_iter().map(|(h, _)| h).collect()
    }

    /// Successor of `h` along the boundary of the face to its left.
    ///
    /// At the target vertex this is the outgoing half-edge immediately
    /// clockwise from the twin of `h`. A dangling end turns back on itself.
    #[must_use]
    pub fn next(&self, h: Halfedge) -> Option<Halfedge> {
        let t = self.target(h)?;
        let out = self.outgoing(t);
        let twin = h.twin();
        let pos = out.iter().position(|&o| o == twin)?;
        Some(out[(pos + out.len() - 1) % out.len()])
    }

    // --- Editing ---

    /// Inserts a point, splitting the curve it lies on if necessary.
    pub fn insert_point(&mut self, p: &ExactPoint) -> VertexId {
        if let Some(v) = self.vertex_at(p) {
            return v;
        }
        let host = self
            .curves
            .keys()
            .find(|&c| self.segment(c).is_some_and(|s| s.has_on_interior(p)));
        let v = self.add_vertex(p.clone());
        if let Some(c) = host {
            self.split_curve(c, v);
        }
        v
    }

    /// Inserts the segment `a -> b`, splitting it and every curve it crosses
    /// at their intersection points.
    ///
    /// Returns the curves that now cover the segment, in order from `a`.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` if `a == b`.
    pub fn insert_segment(
        &mut self,
        a: &ExactPoint,
        b: &ExactPoint,
        data: D,
    ) -> Result<Vec<CurveId>, GeometryError> {
        let seg = Segment::new(a.clone(), b.clone())?;

        let mut cuts = vec![a.clone(), b.clone()];
        for c in self.curves.keys() {
            let Some(other) = self.segment(c) else {
                continue;
            };
            match intersect_linear(&seg, &other) {
                Intersection::None => {}
                Intersection::Point(p) => cuts.push(p),
                Intersection::Overlap { from, to } => cuts.extend(from.into_iter().chain(to)),
            }
        }
        cuts.extend(
            self.vertices
                .values()
                .filter(|vx| seg.contains(&vx.point))
                .map(|vx| vx.point.clone()),
        );

        let dir = seg.direction();
        cuts.sort_by(|p, q| (p - seg.source()).dot(&dir).cmp(&(q - seg.source()).dot(&dir)));
        cuts.dedup();

        let ids: Vec<VertexId> = cuts.iter().map(|p| self.insert_point(p)).collect();
        let mut pieces = Vec::with_capacity(ids.len().saturating_sub(1));
        for pair in ids.windows(2) {
            let (u, v) = (pair[0], pair[1]);
            if let Some(existing) = self.curve_between(u, v) {
                if let Some(cv) = self.curves.get_mut(existing) {
                    cv.data.merge(&data);
                }
                pieces.push(existing);
            } else {
                pieces.push(self.add_curve(u, v, data.clone()));
            }
        }
        Ok(pieces)
    }

    /// Removes a curve. Its endpoints stay, possibly isolated.
    pub fn remove_curve(&mut self, c: CurveId) -> Option<Curve<D>> {
        let cv = self.curves.remove(c)?;
        for v in [cv.source, cv.target] {
            if let Some(vx) = self.vertices.get_mut(v) {
                vx.curves.retain(|&x| x != c);
            }
        }
        Some(cv)
    }

    /// Removes a vertex with no incident curves.
    ///
    /// Returns `false` if the vertex is unknown or still has curves.
    pub fn remove_isolated_vertex(&mut self, v: VertexId) -> bool {
        match self.vertices.get(v) {
            Some(vx) if vx.curves.is_empty() => {}
            _ => return false,
        }
        if let Some(vx) = self.vertices.remove(v) {
            self.index.remove(&vx.point);
        }
        true
    }

    fn add_vertex(&mut self, p: ExactPoint) -> VertexId {
        let v = self.vertices.insert(Vertex {
            point: p.clone(),
            curves: Vec::new(),
        });
        self.index.insert(p, v);
        v
    }

    fn add_curve(&mut self, source: VertexId, target: VertexId, data: D) -> CurveId {
        let c = self.curves.insert(Curve { source, target, data });
        for v in [source, target] {
            if let Some(vx) = self.vertices.get_mut(v) {
                vx.curves.push(c);
            }
        }
        c
    }

    /// Splits `c` at vertex `w`, which must lie on its interior.
    fn split_curve(&mut self, c: CurveId, w: VertexId) {
        let Some(cv) = self.curves.get_mut(c) else {
            return;
        };
        let old_target = cv.target;
        let data = cv.data.clone();
        cv.target = w;
        if let Some(vx) = self.vertices.get_mut(old_target) {
            vx.curves.retain(|&x| x != c);
        }
        if let Some(vx) = self.vertices.get_mut(w) {
            vx.curves.push(c);
        }
        self.add_curve(w, old_target, data);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> ExactPoint {
        ExactPoint::from_f64(x, y).unwrap()
    }

    #[test]
    fn crossing_segments_split_each_other() {
        let mut arr: Arrangement<u32> = Arrangement::new();
        arr.insert_segment(&p(0.0, 0.0), &p(2.0, 2.0), 1).unwrap();
        let pieces = arr.insert_segment(&p(0.0, 2.0), &p(2.0, 0.0), 2).unwrap();
        assert_eq!(pieces.len(), 2);
        assert_eq!(arr.vertex_count(), 5);
        assert_eq!(arr.curve_count(), 4);
        let centre = arr.vertex_at(&p(1.0, 1.0)).unwrap();
        assert_eq!(arr.degree(centre), 4);
    }

    #[test]
    fn overlapping_segments_merge_data() {
        let mut arr: Arrangement<u32> = Arrangement::new();
        arr.insert_segment(&p(0.0, 0.0), &p(4.0, 0.0), 0b01).unwrap();
        arr.insert_segment(&p(2.0, 0.0), &p(6.0, 0.0), 0b10).unwrap();
        assert_eq!(arr.curve_count(), 3);
        let a = arr.vertex_at(&p(2.0, 0.0)).unwrap();
        let b = arr.vertex_at(&p(4.0, 0.0)).unwrap();
        let shared = arr.curve_between(a, b).unwrap();
        assert_eq!(arr.curve(shared).unwrap().data, 0b11);
    }

    #[test]
    fn next_walks_a_triangle() {
        let mut arr: Arrangement<()> = Arrangement::new();
        arr.insert_segment(&p(0.0, 0.0), &p(4.0, 0.0), ()).unwrap();
        arr.insert_segment(&p(4.0, 0.0), &p(0.0, 4.0), ()).unwrap();
        arr.insert_segment(&p(0.0, 4.0), &p(0.0, 0.0), ()).unwrap();
        let a = arr.vertex_at(&p(0.0, 0.0)).unwrap();
        let b = arr.vertex_at(&p(4.0, 0.0)).unwrap();
        let c = arr.curve_between(a, b).unwrap();
        let h = Halfedge { curve: c, forward: arr.curve(c).unwrap().source == a };
        let h2 = arr.next(h).unwrap();
        let h3 = arr.next(h2).unwrap();
        assert_eq!(arr.next(h3).unwrap(), h);
        assert_eq!(arr.point(arr.target(h2).unwrap()).unwrap(), &p(0.0, 4.0));
    }

    #[test]
    fn dangling_end_turns_back() {
        let mut arr: Arrangement<()> = Arrangement::new();
        let c = arr.insert_segment(&p(0.0, 0.0), &p(1.0, 0.0), ()).unwrap()[0];
        let h = Halfedge { curve: c, forward: true };
        assert_eq!(arr.next(h).unwrap(), h.twin());
    }

    #[test]
    fn removal_keeps_index_consistent() {
        let mut arr: Arrangement<()> = Arrangement::new();
        let c = arr.insert_segment(&p(0.0, 0.0), &p(1.0, 0.0), ()).unwrap()[0];
        let cv = arr.remove_curve(c).unwrap();
        assert!(arr.remove_isolated_vertex(cv.target));
        assert!(arr.vertex_at(&p(1.0, 0.0)).is_none());
        assert_eq!(arr.vertex_count(), 1);
    }
}
