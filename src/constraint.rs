use std::fmt;

use crate::geometry::{clip_to_box, intersect_linear, BoundingBox, Intersection, Line, Linear, Ray, Segment};
use crate::intersection::EdgeId;
use crate::math::{ExactPoint, Scalar};

/// The geometric carrier of a constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintShape {
    Segment(Segment),
    Ray(Ray),
    Line(Line),
}

impl ConstraintShape {
    fn as_linear(&self) -> &dyn Linear {
        match self {
            ConstraintShape::Segment(s) => s,
            ConstraintShape::Ray(r) => r,
            ConstraintShape::Line(l) => l,
        }
    }
}

/// A line, ray or segment bounding one corner or side of a road polygon.
///
/// `owner` is the edge whose polygon the constraint bounds; `peer` is the
/// neighbouring edge that shares it, if any.
#[derive(Debug, Clone)]
pub struct Constraint {
    shape: ConstraintShape,
    owner: Option<EdgeId>,
    peer: Option<EdgeId>,
    description: String,
}

impl Constraint {
    #[must_use]
    pub fn new(
        shape: ConstraintShape,
        owner: Option<EdgeId>,
        peer: Option<EdgeId>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            shape,
            owner,
            peer,
            description: description.into(),
        }
    }

    #[must_use]
    pub fn segment(segment: Segment, owner: Option<EdgeId>, description: impl Into<String>) -> Self {
        Self::new(ConstraintShape::Segment(segment), owner, None, description)
    }

    #[must_use]
    pub fn ray(ray: Ray, owner: Option<EdgeId>, description: impl Into<String>) -> Self {
        Self::new(ConstraintShape::Ray(ray), owner, None, description)
    }

    #[must_use]
    pub fn line(line: Line, owner: Option<EdgeId>, description: impl Into<String>) -> Self {
        Self::new(ConstraintShape::Line(line), owner, None, description)
    }

    /// Sets the neighbouring edge sharing this constraint.
    #[must_use]
    pub fn with_peer(mut self, peer: EdgeId) -> Self {
        self.peer = Some(peer);
        self
    }

    #[must_use]
    pub fn shape(&self) -> &ConstraintShape {
        &self.shape
    }

    #[must_use]
    pub fn owner(&self) -> Option<EdgeId> {
        self.owner
    }

    #[must_use]
    pub fn peer(&self) -> Option<EdgeId> {
        self.peer
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Exact intersection with another constraint.
    ///
    /// Every shape pair is dispatched to the concrete intersection routine so
    /// that each of the nine combinations is handled explicitly.
    #[must_use]
    pub fn intersect(&self, other: &Constraint) -> Intersection {
        use ConstraintShape::{Line as L, Ray as R, Segment as S};
        match (&self.shape, &other.shape) {
            (S(a), S(b)) => intersect_linear(a, b),
            (S(a), R(b)) => intersect_linear(a, b),
            (S(a), L(b)) => intersect_linear(a, b),
            (R(a), S(b)) => intersect_linear(a, b),
            (R(a), R(b)) => intersect_linear(a, b),
            (R(a), L(b)) => intersect_linear(a, b),
            (L(a), S(b)) => intersect_linear(a, b),
            (L(a), R(b)) => intersect_linear(a, b),
            (L(a), L(b)) => intersect_linear(a, b),
        }
    }

    /// Exact point membership.
    #[must_use]
    pub fn contains(&self, p: &ExactPoint) -> bool {
        self.shape.as_linear().contains(p)
    }

    /// Closest point where `ray` meets this constraint, excluding the ray's
    /// own source, together with its squared distance from that source.
    #[must_use]
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(ExactPoint, Scalar)> {
        let hit = match intersect_linear(ray, self.shape.as_linear()) {
            Intersection::None => return None,
            Intersection::Point(p) => p,
            // Parametrised along the ray: the first end past the source wins.
            Intersection::Overlap { from, to } => {
                [from, to].into_iter().flatten().find(|p| p != ray.source())?
            }
        };
        if &hit == ray.source() {
            return None;
        }
        let d = ray.squared_distance_to(&hit);
        Some((hit, d))
    }

    /// Points that pin the constraint down: segment ends, ray source or the
    /// line's anchor point.
    #[must_use]
    pub fn defining_points(&self) -> Vec<ExactPoint> {
        match &self.shape {
            ConstraintShape::Segment(s) => vec![s.source().clone(), s.target().clone()],
            ConstraintShape::Ray(r) => vec![r.source().clone()],
            ConstraintShape::Line(l) => vec![l.point().clone()],
        }
    }

    /// The part of the constraint inside `bbox`, as a segment.
    #[must_use]
    pub fn clip(&self, bbox: &BoundingBox) -> Option<Segment> {
        clip_to_box(self.shape.as_linear(), bbox)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.shape {
            ConstraintShape::Segment(_) => "segment",
            ConstraintShape::Ray(_) => "ray",
            ConstraintShape::Line(_) => "line",
        };
        write!(f, "{kind} '{}'", self.description)
    }
}
