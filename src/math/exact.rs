use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::GeometryError;

use super::{Point2, Vector2};

/// Exact scalar used for every topological decision.
pub type Scalar = BigRational;

/// Converts a finite float to an exact scalar without rounding.
///
/// # Errors
///
/// Returns `GeometryError::NonFinite` for NaN or infinite input.
pub fn scalar(value: f64) -> Result<Scalar, GeometryError> {
    BigRational::from_float(value).ok_or(GeometryError::NonFinite(value))
}

/// Converts a small integer to an exact scalar.
#[must_use]
pub fn scalar_int(value: i64) -> Scalar {
    BigRational::from_integer(BigInt::from(value))
}

/// Rounds an exact scalar to the nearest float.
#[must_use]
pub fn to_f64(value: &Scalar) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Result of the orientation predicate for three points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Clockwise,
    Collinear,
    CounterClockwise,
}

/// A point with exact rational coordinates.
///
/// Ordering is lexicographic (x, then y), which gives arrangements a
/// deterministic vertex order.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExactPoint {
    pub x: Scalar,
    pub y: Scalar,
}

impl ExactPoint {
    #[must_use]
    pub fn new(x: Scalar, y: Scalar) -> Self {
        Self { x, y }
    }

    /// Builds an exact point from float coordinates.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::NonFinite` if either coordinate is not finite.
    pub fn from_f64(x: f64, y: f64) -> Result<Self, GeometryError> {
        Ok(Self {
            x: scalar(x)?,
            y: scalar(y)?,
        })
    }

    #[must_use]
    pub fn origin() -> Self {
        Self {
            x: Scalar::zero(),
            y: Scalar::zero(),
        }
    }

    #[must_use]
    pub fn to_point2(&self) -> Point2 {
        Point2::new(to_f64(&self.x), to_f64(&self.y))
    }

    /// Returns `self + v * t`.
    #[must_use]
    pub fn offset(&self, v: &ExactVector, t: &Scalar) -> Self {
        Self {
            x: &self.x + &v.x * t,
            y: &self.y + &v.y * t,
        }
    }

    #[must_use]
    pub fn translate(&self, v: &ExactVector) -> Self {
        Self {
            x: &self.x + &v.x,
            y: &self.y + &v.y,
        }
    }

    #[must_use]
    pub fn squared_distance(&self, other: &ExactPoint) -> Scalar {
        (other - self).squared_length()
    }

    /// Exact centroid of a non-empty point set.
    #[must_use]
    pub fn centroid(points: &[ExactPoint]) -> Option<ExactPoint> {
        if points.is_empty() {
            return None;
        }
        let mut sx = Scalar::zero();
        let mut sy = Scalar::zero();
        for p in points {
            sx += &p.x;
            sy += &p.y;
        }
        let n = scalar_int(i64::try_from(points.len()).ok()?);
        Some(Self {
            x: sx / &n,
            y: sy / n,
        })
    }
}

impl fmt::Debug for ExactPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.9}, {:.9})", to_f64(&self.x), to_f64(&self.y))
    }
}

impl fmt::Display for ExactPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A vector with exact rational components.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ExactVector {
    pub x: Scalar,
    pub y: Scalar,
}

impl ExactVector {
    #[must_use]
    pub fn new(x: Scalar, y: Scalar) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }

    #[must_use]
    pub fn dot(&self, other: &ExactVector) -> Scalar {
        &self.x * &other.x + &self.y * &other.y
    }

    /// Z component of the 3D cross product.
    #[must_use]
    pub fn cross(&self, other: &ExactVector) -> Scalar {
        &self.x * &other.y - &self.y * &other.x
    }

    #[must_use]
    pub fn squared_length(&self) -> Scalar {
        self.dot(self)
    }

    #[must_use]
    pub fn scale(&self, t: &Scalar) -> Self {
        Self {
            x: &self.x * t,
            y: &self.y * t,
        }
    }

    /// Rotates by +90 degrees.
    #[must_use]
    pub fn perp_left(&self) -> Self {
        Self {
            x: -self.y.clone(),
            y: self.x.clone(),
        }
    }

    /// Rotates by -90 degrees.
    #[must_use]
    pub fn perp_right(&self) -> Self {
        Self {
            x: self.y.clone(),
            y: -self.x.clone(),
        }
    }

    #[must_use]
    pub fn is_parallel(&self, other: &ExactVector) -> bool {
        self.cross(other).is_zero()
    }

    #[must_use]
    pub fn to_vector2(&self) -> Vector2 {
        Vector2::new(to_f64(&self.x), to_f64(&self.y))
    }

    /// Float approximation of the Euclidean length.
    #[must_use]
    pub fn approx_length(&self) -> f64 {
        self.to_vector2().norm()
    }

    /// Scales the vector so that its length is approximately `length`.
    ///
    /// The scale factor goes through `f64`; the direction stays exact.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::ZeroVector` if the vector has no direction.
    pub fn with_approx_length(&self, length: f64) -> Result<Self, GeometryError> {
        let norm = self.approx_length();
        if self.is_zero() || norm < f64::MIN_POSITIVE {
            return Err(GeometryError::ZeroVector);
        }
        Ok(self.scale(&scalar(length / norm)?))
    }

    /// Compares directions counter-clockwise from the positive x axis.
    #[must_use]
    pub fn cmp_ccw(&self, other: &ExactVector) -> Ordering {
        let ha = self.half_plane();
        let hb = other.half_plane();
        if ha != hb {
            return ha.cmp(&hb);
        }
        let c = self.cross(other);
        if c.is_positive() {
            Ordering::Less
        } else if c.is_negative() {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// Compares directions as compass bearings: clockwise from north (+y).
    #[must_use]
    pub fn cmp_compass(&self, other: &ExactVector) -> Ordering {
        let a = Self::new(self.y.clone(), self.x.clone());
        let b = Self::new(other.y.clone(), other.x.clone());
        a.cmp_ccw(&b)
    }

    /// 0 for angles in `[0, pi)`, 1 for `[pi, 2pi)`.
    fn half_plane(&self) -> u8 {
        if self.y.is_positive() || (self.y.is_zero() && self.x.is_positive()) {
            0
        } else {
            1
        }
    }
}

impl fmt::Debug for ExactVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:.9}, {:.9}>", to_f64(&self.x), to_f64(&self.y))
    }
}

impl Sub for &ExactPoint {
    type Output = ExactVector;

    fn sub(self, rhs: &ExactPoint) -> ExactVector {
        ExactVector {
            x: &self.x - &rhs.x,
            y: &self.y - &rhs.y,
        }
    }
}

impl Add for &ExactVector {
    type Output = ExactVector;

    fn add(self, rhs: &ExactVector) -> ExactVector {
        ExactVector {
            x: &self.x + &rhs.x,
            y: &self.y + &rhs.y,
        }
    }
}

impl Neg for &ExactVector {
    type Output = ExactVector;

    fn neg(self) -> ExactVector {
        ExactVector {
            x: -self.x.clone(),
            y: -self.y.clone(),
        }
    }
}

/// Exact orientation of the triangle `(a, b, c)`.
#[must_use]
pub fn orientation(a: &ExactPoint, b: &ExactPoint, c: &ExactPoint) -> Orientation {
    let det = (b - a).cross(&(c - a));
    if det.is_positive() {
        Orientation::CounterClockwise
    } else if det.is_negative() {
        Orientation::Clockwise
    } else {
        Orientation::Collinear
    }
}

/// Exact orthogonal projection of `p` onto the line `origin + t * dir`.
///
/// Returns the projected point and its parameter `t`.
#[must_use]
pub fn project_onto_line(
    p: &ExactPoint,
    origin: &ExactPoint,
    dir: &ExactVector,
) -> Option<(ExactPoint, Scalar)> {
    let len2 = dir.squared_length();
    if len2.is_zero() {
        return None;
    }
    let t = (p - origin).dot(dir) / len2;
    Some((origin.offset(dir, &t), t))
}

/// Returns `1/2` as an exact scalar.
#[must_use]
pub fn half() -> Scalar {
    Scalar::one() / scalar_int(2)
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
    fn orientation_is_exact_for_nearly_collinear_points() {
        let a = p(0.1, 0.1);
        let b = p(0.2, 0.2);
        let c = p(0.3, 0.3);
        // 0.1, 0.2, 0.3 are not exactly representable; their binary values are
        // not collinear, and the exact predicate must still be consistent.
        let o1 = orientation(&a, &b, &c);
        let o2 = orientation(&b, &c, &a);
        assert_eq!(o1, o2);
        assert_eq!(orientation(&p(0.0, 0.0), &p(1.0, 1.0), &p(2.0, 2.0)), Orientation::Collinear);
        assert_eq!(orientation(&p(0.0, 0.0), &p(1.0, 0.0), &p(0.0, 1.0)), Orientation::CounterClockwise);
    }

    #[test]
    fn ccw_ordering_starts_at_positive_x() {
        let mut dirs = vec![v(0.0, -1.0), v(-1.0, 0.0), v(1.0, 0.0), v(0.0, 1.0), v(1.0, 1.0)];
        dirs.sort_by(ExactVector::cmp_ccw);
        assert_eq!(dirs, vec![v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0), v(-1.0, 0.0), v(0.0, -1.0)]);
    }

    #[test]
    fn compass_ordering_is_clockwise_from_north() {
        let mut dirs = vec![v(-1.0, 0.0), v(0.0, -1.0), v(1.0, 0.0), v(0.0, 1.0)];
        dirs.sort_by(ExactVector::cmp_compass);
        assert_eq!(dirs, vec![v(0.0, 1.0), v(1.0, 0.0), v(0.0, -1.0), v(-1.0, 0.0)]);
    }

    #[test]
    fn centroid_and_projection() {
        let c = ExactPoint::centroid(&[p(0.0, 0.0), p(2.0, 0.0), p(1.0, 3.0)]).unwrap();
        assert_eq!(c, p(1.0, 1.0));
        let (q, t) = project_onto_line(&p(1.0, 5.0), &p(0.0, 0.0), &v(2.0, 0.0)).unwrap();
        assert_eq!(q, p(1.0, 0.0));
        assert_eq!(t, half());
    }

    #[test]
    fn non_finite_input_is_rejected() {
        assert!(ExactPoint::from_f64(f64::NAN, 0.0).is_err());
        assert!(ExactPoint::from_f64(0.0, f64::INFINITY).is_err());
    }
}
