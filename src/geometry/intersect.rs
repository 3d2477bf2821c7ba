use num_traits::{Signed, Zero};

use crate::math::{ExactPoint, Scalar};

use super::linear::{Domain, Linear, Segment};

/// Outcome of intersecting two linear objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intersection {
    None,
    Point(ExactPoint),
    /// Collinear overlap of positive length. Unbounded ends are `None`.
    Overlap {
        from: Option<ExactPoint>,
        to: Option<ExactPoint>,
    },
}

impl Intersection {
    /// The single intersection point, if there is exactly one.
    #[must_use]
    pub fn point(self) -> Option<ExactPoint> {
        match self {
            Intersection::Point(p) => Some(p),
            Intersection::None | Intersection::Overlap { .. } => None,
        }
    }
}

/// Exact intersection of any two linear objects.
///
/// Both objects are parametrised over their supporting lines; the result is
/// clipped to both domains.
pub fn intersect_linear<A: Linear + ?Sized, B: Linear + ?Sized>(a: &A, b: &B) -> Intersection {
    let o1 = a.origin();
    let d1 = a.direction();
    let o2 = b.origin();
    let d2 = b.direction();

    let cross = d1.cross(&d2);
    let w = o2 - o1;

    if !cross.is_zero() {
        let t = w.cross(&d2) / &cross;
        let u = w.cross(&d1) / &cross;
        if a.domain().contains(&t) && b.domain().contains(&u) {
            return Intersection::Point(a.point_at(&t));
        }
        return Intersection::None;
    }

    // Parallel: disjoint unless collinear.
    if !w.cross(&d1).is_zero() {
        return Intersection::None;
    }

    // Map b's domain into a's parameter space: t(u) = (w.d1 + u * d2.d1) / d1.d1.
    let d1_len2 = d1.squared_length();
    let base = w.dot(&d1) / &d1_len2;
    let slope = d2.dot(&d1) / &d1_len2;
    let map = |u: &Scalar| &base + &slope * u;
    let b_dom = b.domain();
    let (lower, upper) = if slope.is_positive() {
        (b_dom.lower.as_ref().map(map), b_dom.upper.as_ref().map(map))
    } else {
        (b_dom.upper.as_ref().map(map), b_dom.lower.as_ref().map(map))
    };
    let Some(common) = a.domain().intersect(&Domain { lower, upper }) else {
        return Intersection::None;
    };

    match (&common.lower, &common.upper) {
        (Some(lo), Some(hi)) if lo == hi => Intersection::Point(a.point_at(lo)),
        _ => Intersection::Overlap {
            from: common.lower.as_ref().map(|t| a.point_at(t)),
            to: common.upper.as_ref().map(|t| a.point_at(t)),
        },
    }
}

/// Axis-aligned exact bounding box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: ExactPoint,
    pub max: ExactPoint,
}

impl BoundingBox {
    /// Smallest box containing all points, or `None` if there are none.
    pub fn from_points<'a, I: IntoIterator<Item = &'a ExactPoint>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut min = first.clone();
        let mut max = first.clone();
        for p in iter {
            if p.x < min.x {
                min.x = p.x.clone();
            }
            if p.y < min.y {
                min.y = p.y.clone();
            }
            if p.x > max.x {
                max.x = p.x.clone();
            }
            if p.y > max.y {
                max.y = p.y.clone();
            }
        }
        Some(Self { min, max })
    }

    /// Grows the box by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: &Scalar) -> Self {
        Self {
            min: ExactPoint::new(&self.min.x - margin, &self.min.y - margin),
            max: ExactPoint::new(&self.max.x + margin, &self.max.y + margin),
        }
    }

    /// The larger of width and height.
    #[must_use]
    pub fn extent(&self) -> Scalar {
        let w = &self.max.x - &self.min.x;
        let h = &self.max.y - &self.min.y;
        if w > h {
            w
        } else {
            h
        }
    }

    /// Corners in counter-clockwise order starting at `min`.
    #[must_use]
    pub fn corners(&self) -> [ExactPoint; 4] {
        [
            self.min.clone(),
            ExactPoint::new(self.max.x.clone(), self.min.y.clone()),
            self.max.clone(),
            ExactPoint::new(self.min.x.clone(), self.max.y.clone()),
        ]
    }

    #[must_use]
    pub fn contains(&self, p: &ExactPoint) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Clips a linear object to a box, returning the visible piece as a segment.
///
/// Returns `None` if nothing of positive length remains.
pub fn clip_to_box<L: Linear + ?Sized>(linear: &L, bbox: &BoundingBox) -> Option<Segment> {
    let o = linear.origin();
    let d = linear.direction();
    let mut dom = linear.domain();

    for (origin, dir, lo, hi) in [
        (&o.x, &d.x, &bbox.min.x, &bbox.max.x),
        (&o.y, &d.y, &bbox.min.y, &bbox.max.y),
    ] {
        if dir.is_zero() {
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }
        let t1 = (lo - origin) / dir;
        let t2 = (hi - origin) / dir;
        let (a, b) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        dom = dom.intersect(&Domain {
            lower: Some(a),
            upper: Some(b),
        })?;
    }

    let (Some(lo), Some(hi)) = (dom.lower, dom.upper) else {
        return None;
    };
    Segment::new(linear.point_at(&lo), linear.point_at(&hi)).ok()
}
