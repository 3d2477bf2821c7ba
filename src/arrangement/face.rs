use std::collections::{HashMap, HashSet, VecDeque};

use num_traits::{Signed, Zero};

use crate::math::exact::orientation;
use crate::math::{ExactPoint, Orientation, Scalar};

use super::{Arrangement, CurveData, CurveId, Halfedge, VertexId};

/// Index of a face in a [`FaceMap`]. Face 0 is the unbounded face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceId(pub usize);

impl FaceId {
    pub const UNBOUNDED: FaceId = FaceId(0);

    #[must_use]
    pub fn is_unbounded(self) -> bool {
        self == Self::UNBOUNDED
    }
}

/// A closed chain of half-edges, each followed by its `next`.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub halfedges: Vec<Halfedge>,
    /// Source vertex of every half-edge, in walk order.
    pub points: Vec<ExactPoint>,
    /// Twice the signed area enclosed by `points`.
    pub area2: Scalar,
}

/// A face: one outer boundary (absent for the unbounded face) and any number
/// of inner boundaries.
#[derive(Debug, Clone, Default)]
pub struct Face {
    pub outer: Option<usize>,
    pub holes: Vec<usize>,
}

/// Where a query point lies in the arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Vertex(VertexId),
    Curve(CurveId),
    Face(FaceId),
}

/// Snapshot of the face structure of an arrangement.
///
/// Must be rebuilt after the arrangement is edited.
#[derive(Debug, Clone)]
pub struct FaceMap {
    cycles: Vec<Cycle>,
    faces: Vec<Face>,
    face_of: HashMap<Halfedge, FaceId>,
}

impl FaceMap {
    #[must_use]
    pub fn cycle(&self, index: usize) -> Option<&Cycle> {
        self.cycles.get(index)
    }

    #[must_use]
    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id.0)
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// The face to the left of `h`.
    #[must_use]
    pub fn face_of(&self, h: Halfedge) -> Option<FaceId> {
        self.face_of.get(&h).copied()
    }

    /// All half-edges on the boundary of `face`, outer boundary first.
    pub fn boundary(&self, face: FaceId) -> impl Iterator<Item = Halfedge> + '_ {
        self.faces
            .get(face.0)
            .into_iter()
            .flat_map(|f| f.outer.iter().chain(f.holes.iter()))
            .filter_map(|&i| self.cycles.get(i))
            .flat_map(|c| c.halfedges.iter().copied())
    }

    /// Half-edges of the outer boundary of `face` in walk order, skipping
    /// antennas: half-edges whose twin bounds the same face.
    #[must_use]
    pub fn outer_boundary(&self, face: FaceId) -> Option<Vec<Halfedge>> {
        let cycle = self.cycles.get(self.faces.get(face.0)?.outer?)?;
        Some(
            cycle
                .halfedges
                .iter()
                .copied()
                .filter(|&h| self.face_of(h.twin()) != Some(face))
                .collect(),
        )
    }

    /// The bounded face whose outer boundary is the smallest one winding
    /// around `p`, or the unbounded face.
    ///
    /// `p` must not lie on any curve.
    #[must_use]
    pub fn face_containing(&self, p: &ExactPoint) -> FaceId {
        self.smallest_enclosing(p, |_| true)
    }

    fn smallest_enclosing(&self, p: &ExactPoint, accept: impl Fn(usize) -> bool) -> FaceId {
        let mut best: Option<(usize, &Scalar)> = None;
        for (fi, face) in self.faces.iter().enumerate().skip(1) {
            let Some(ci) = face.outer else { continue };
            if !accept(ci) {
                continue;
            }
            let cycle = &self.cycles[ci];
            if winding_number(p, &cycle.points) == 0 {
                continue;
            }
            if best.map_or(true, |(_, area)| &cycle.area2 < area) {
                best = Some((fi, &cycle.area2));
            }
        }
        best.map_or(FaceId::UNBOUNDED, |(fi, _)| FaceId(fi))
    }
}

impl<D: CurveData> Arrangement<D> {
    /// Computes every boundary cycle and assigns cycles to faces.
    ///
    /// Counter-clockwise cycles are outer boundaries of bounded faces. Every
    /// other cycle is an inner boundary of the smallest bounded face of a
    /// different connected component that encloses it, or of the unbounded
    /// face.
    #[must_use]
    pub fn faces(&self) -> FaceMap {
        let cycles = self.cycles();
        let component = self.components();

        let mut faces = vec![Face::default()];
        let mut face_of = HashMap::new();
        for (ci, cycle) in cycles.iter().enumerate() {
            if cycle.area2.is_positive() {
                let id = FaceId(faces.len());
                faces.push(Face {
                    outer: Some(ci),
                    holes: Vec::new(),
                });
                for &h in &cycle.halfedges {
                    face_of.insert(h, id);
                }
            }
        }

        let mut map = FaceMap {
            cycles,
            faces,
            face_of,
        };

        let cycle_component = |c: &Cycle| {
            c.halfedges
                .first()
                .and_then(|&h| self.source(h))
                .and_then(|v| component.get(&v).copied())
        };
        let comps: Vec<Option<usize>> = map.cycles.iter().map(cycle_component).collect();

        for ci in 0..map.cycles.len() {
            if map.cycles[ci].area2.is_positive() {
                continue;
            }
            let Some(p) = map.cycles[ci].points.first().cloned() else {
                continue;
            };
            let own = comps[ci];
            let face = map.smallest_enclosing(&p, |other| comps[other] != own);
            map.faces[face.0].holes.push(ci);
            for &h in &map.cycles[ci].halfedges {
                map.face_of.insert(h, face);
            }
        }
        map
    }

    /// Locates `p`: on a vertex, inside a curve, or inside a face.
    #[must_use]
    pub fn locate(&self, p: &ExactPoint, faces: &FaceMap) -> Location {
        if let Some(v) = self.vertex_at(p) {
            return Location::Vertex(v);
        }
        for c in self.curves.keys() {
            if self.segment(c).is_some_and(|s| s.has_on_interior(p)) {
                return Location::Curve(c);
            }
        }
        Location::Face(faces.face_containing(p))
    }

    /// Source points of the outer boundary of `face`, antennas removed.
    #[must_use]
    pub fn face_outline(&self, face: FaceId, faces: &FaceMap) -> Option<Vec<ExactPoint>> {
        faces
            .outer_boundary(face)?
            .into_iter()
            .map(|h| self.source(h).and_then(|v| self.point(v)).cloned())
            .collect()
    }

    fn cycles(&self) -> Vec<Cycle> {
        let mut visited: HashSet<Halfedge> = HashSet::new();
        let mut cycles = Vec::new();
        let limit = 2 * self.curves.len() + 1;

        for c in self.curves.keys() {
            for forward in [true, false] {
                let start = Halfedge { curve: c, forward };
                if visited.contains(&start) {
                    continue;
                }
                let mut halfedges = Vec::new();
                let mut points = Vec::new();
                let mut h = start;
                loop {
                    visited.insert(h);
                    halfedges.push(h);
                    if let Some(p) = self.source(h).and_then(|v| self.point(v)) {
                        points.push(p.clone());
                    }
                    match self.next(h) {
                        Some(n) if n != start && halfedges.len() < limit => h = n,
                        _ => break,
                    }
                }
                let area2 = signed_area2(&points);
                cycles.push(Cycle {
                    halfedges,
                    points,
                    area2,
                });
            }
        }
        cycles
    }

    /// Connected component label of every vertex.
    fn components(&self) -> HashMap<VertexId, usize> {
        let mut label = HashMap::new();
        let mut next_label = 0;
        for start in self.vertices.keys() {
            if label.contains_key(&start) {
                continue;
            }
            let mut queue = VecDeque::from([start]);
            label.insert(start, next_label);
            while let Some(v) = queue.pop_front() {
                let Some(vx) = self.vertices.get(v) else { continue };
                for &c in &vx.curves {
                    let Some(cv) = self.curves.get(c) else { continue };
                    let w = cv.opposite(v);
                    if !label.contains_key(&w) {
                        label.insert(w, next_label);
                        queue.push_back(w);
                    }
                }
            }
            next_label += 1;
        }
        label
    }
}

/// Twice the signed area of a closed polygon (positive when counter-clockwise).
#[must_use]
pub fn signed_area2(points: &[ExactPoint]) -> Scalar {
    let n = points.len();
    let mut sum = Scalar::zero();
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        sum += &a.x * &b.y - &b.x * &a.y;
    }
    sum
}

/// Exact winding number of a closed polygon around `p`.
#[must_use]
pub fn winding_number(p: &ExactPoint, polygon: &[ExactPoint]) -> i32 {
    let n = polygon.len();
    let mut wn = 0;
    for i in 0..n {
        let a = &polygon[i];
        let b = &polygon[(i + 1) % n];
        if a.y <= p.y {
            if b.y > p.y && orientation(a, b, p) == Orientation::CounterClockwise {
                wn += 1;
            }
        } else if b.y <= p.y && orientation(a, b, p) == Orientation::Clockwise {
            wn -= 1;
        }
    }
    wn
}
