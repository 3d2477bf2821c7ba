use num_traits::{One, Signed, Zero};

use crate::error::GeometryError;
use crate::math::exact::{orientation, project_onto_line};
use crate::math::{ExactPoint, ExactVector, Orientation, Scalar};

/// Parameter interval of a linear object over its supporting line.
///
/// `None` bounds are unbounded in that direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub lower: Option<Scalar>,
    pub upper: Option<Scalar>,
}

impl Domain {
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    #[must_use]
    pub fn contains(&self, t: &Scalar) -> bool {
        self.lower.as_ref().map_or(true, |lo| t >= lo)
            && self.upper.as_ref().map_or(true, |hi| t <= hi)
    }

    /// Intersection of two domains, or `None` if empty.
    #[must_use]
    pub fn intersect(&self, other: &Domain) -> Option<Domain> {
        let lower = max_lower(self.lower.as_ref(), other.lower.as_ref());
        let upper = min_upper(self.upper.as_ref(), other.upper.as_ref());
        if let (Some(lo), Some(hi)) = (&lower, &upper) {
            if lo > hi {
                return None;
            }
        }
        Some(Domain { lower, upper })
    }
}

fn max_lower(a: Option<&Scalar>, b: Option<&Scalar>) -> Option<Scalar> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if x >= y { x.clone() } else { y.clone() }),
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (None, None) => None,
    }
}

fn min_upper(a: Option<&Scalar>, b: Option<&Scalar>) -> Option<Scalar> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if x <= y { x.clone() } else { y.clone() }),
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (None, None) => None,
    }
}

/// Common view of lines, rays and segments: `origin + t * direction` for `t`
/// in `domain`.
pub trait Linear {
    fn origin(&self) -> &ExactPoint;
    fn direction(&self) -> ExactVector;
    fn domain(&self) -> Domain;

    /// Point at parameter `t` on the supporting line.
    fn point_at(&self, t: &Scalar) -> ExactPoint {
        self.origin().offset(&self.direction(), t)
    }

    /// Exact membership test.
    fn contains(&self, p: &ExactPoint) -> bool {
        let d = self.direction();
        let q = self.origin().translate(&d);
        if orientation(self.origin(), &q, p) != Orientation::Collinear {
            return false;
        }
        let t = (p - self.origin()).dot(&d) / d.squared_length();
        self.domain().contains(&t)
    }
}

/// An infinite line through `point` with direction `direction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    point: ExactPoint,
    direction: ExactVector,
}

impl Line {
    /// Creates a line from a point and a direction.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::ZeroVector` if the direction is zero.
    pub fn new(point: ExactPoint, direction: ExactVector) -> Result<Self, GeometryError> {
        if direction.is_zero() {
            return Err(GeometryError::ZeroVector);
        }
        Ok(Self { point, direction })
    }

    /// Line through two distinct points.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::ZeroVector` if the points coincide.
    pub fn through(a: &ExactPoint, b: &ExactPoint) -> Result<Self, GeometryError> {
        Self::new(a.clone(), b - a)
    }

    #[must_use]
    pub fn point(&self) -> &ExactPoint {
        &self.point
    }

    /// The perpendicular line through `p`.
    #[must_use]
    pub fn perpendicular(&self, p: &ExactPoint) -> Line {
        Line {
            point: p.clone(),
            direction: self.direction.perp_left(),
        }
    }

    #[must_use]
    pub fn is_parallel(&self, other: &Line) -> bool {
        self.direction.is_parallel(&other.direction)
    }

    /// Foot of the perpendicular from `p`.
    #[must_use]
    pub fn projection(&self, p: &ExactPoint) -> ExactPoint {
        project_onto_line(p, &self.point, &self.direction).map_or_else(|| self.point.clone(), |(q, _)| q)
    }

    /// Exact squared distance from `p` to the line.
    #[must_use]
    pub fn squared_distance(&self, p: &ExactPoint) -> Scalar {
        let c = self.direction.cross(&(p - &self.point));
        &c * &c / self.direction.squared_length()
    }
}

impl Linear for Line {
    fn origin(&self) -> &ExactPoint {
        &self.point
    }

    fn direction(&self) -> ExactVector {
        self.direction.clone()
    }

    fn domain(&self) -> Domain {
        Domain::unbounded()
    }
}

/// A half-line starting at `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ray {
    source: ExactPoint,
    direction: ExactVector,
}

impl Ray {
    /// Creates a ray from a source and a direction.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::ZeroVector` if the direction is zero.
    pub fn new(source: ExactPoint, direction: ExactVector) -> Result<Self, GeometryError> {
        if direction.is_zero() {
            return Err(GeometryError::ZeroVector);
        }
        Ok(Self { source, direction })
    }

    /// Ray from `source` passing through `through`.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::ZeroVector` if the points coincide.
    pub fn through(source: &ExactPoint, through: &ExactPoint) -> Result<Self, GeometryError> {
        Self::new(source.clone(), through - source)
    }

    #[must_use]
    pub fn source(&self) -> &ExactPoint {
        &self.source
    }

    /// Squared distance from the source to `p`, used to rank hits along the ray.
    #[must_use]
    pub fn squared_distance_to(&self, p: &ExactPoint) -> Scalar {
        self.source.squared_distance(p)
    }

    #[must_use]
    pub fn supporting_line(&self) -> Line {
        Line {
            point: self.source.clone(),
            direction: self.direction.clone(),
        }
    }
}

impl Linear for Ray {
    fn origin(&self) -> &ExactPoint {
        &self.source
    }

    fn direction(&self) -> ExactVector {
        self.direction.clone()
    }

    fn domain(&self) -> Domain {
        Domain {
            lower: Some(Scalar::zero()),
            upper: None,
        }
    }
}

/// A closed segment between two distinct points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    source: ExactPoint,
    target: ExactPoint,
}

impl Segment {
    /// Creates a segment.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` if both endpoints coincide.
    pub fn new(source: ExactPoint, target: ExactPoint) -> Result<Self, GeometryError> {
        if source == target {
            return Err(GeometryError::Degenerate(format!("zero-length segment at {source}")));
        }
        Ok(Self { source, target })
    }

    #[must_use]
    pub fn source(&self) -> &ExactPoint {
        &self.source
    }

    #[must_use]
    pub fn target(&self) -> &ExactPoint {
        &self.target
    }

    #[must_use]
    pub fn reversed(&self) -> Segment {
        Segment {
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }

    /// True if `p` lies on the segment but is not one of its endpoints.
    #[must_use]
    pub fn has_on_interior(&self, p: &ExactPoint) -> bool {
        p != &self.source && p != &self.target && self.contains(p)
    }

    /// Parameter of `p` along the segment (0 at source, 1 at target).
    #[must_use]
    pub fn parameter(&self, p: &ExactPoint) -> Scalar {
        let d = &self.target - &self.source;
        (p - &self.source).dot(&d) / d.squared_length()
    }

    /// Exact closest point on the segment to `p`.
    #[must_use]
    pub fn closest_point(&self, p: &ExactPoint) -> ExactPoint {
        let t = self.parameter(p);
        if t.is_negative() {
            self.source.clone()
        } else if t > Scalar::one() {
            self.target.clone()
        } else {
            self.point_at(&t)
        }
    }
}

impl Linear for Segment {
    fn origin(&self) -> &ExactPoint {
        &self.source
    }

    fn direction(&self) -> ExactVector {
        &self.target - &self.source
    }

    fn domain(&self) -> Domain {
        Domain {
            lower: Some(Scalar::zero()),
            upper: Some(Scalar::one()),
        }
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
    fn membership_respects_domain() {
        let seg = Segment::new(p(0.0, 0.0), p(2.0, 0.0)).unwrap();
        assert!(seg.contains(&p(1.0, 0.0)));
        assert!(seg.contains(&p(2.0, 0.0)));
        assert!(!seg.contains(&p(3.0, 0.0)));
        assert!(seg.has_on_interior(&p(0.5, 0.0)));
        assert!(!seg.has_on_interior(&p(0.0, 0.0)));

        let ray = Ray::through(&p(0.0, 0.0), &p(1.0, 1.0)).unwrap();
        assert!(ray.contains(&p(5.0, 5.0)));
        assert!(!ray.contains(&p(-1.0, -1.0)));

        let line = Line::through(&p(0.0, 0.0), &p(1.0, 1.0)).unwrap();
        assert!(line.contains(&p(-1.0, -1.0)));
        assert!(!line.contains(&p(-1.0, -1.5)));
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(Segment::new(p(1.0, 1.0), p(1.0, 1.0)).is_err());
        assert!(Ray::through(&p(1.0, 1.0), &p(1.0, 1.0)).is_err());
        assert!(Line::new(p(0.0, 0.0), ExactVector::new(Scalar::zero(), Scalar::zero())).is_err());
    }

    #[test]
    fn projection_and_distance() {
        let line = Line::through(&p(0.0, 1.0), &p(4.0, 1.0)).unwrap();
        assert_eq!(line.projection(&p(2.0, 5.0)), p(2.0, 1.0));
        assert_eq!(line.squared_distance(&p(2.0, 5.0)), crate::math::exact::scalar_int(16));
        let seg = Segment::new(p(0.0, 0.0), p(4.0, 0.0)).unwrap();
        assert_eq!(seg.closest_point(&p(-3.0, 2.0)), p(0.0, 0.0));
        assert_eq!(seg.closest_point(&p(3.0, 2.0)), p(3.0, 0.0));
    }
}
