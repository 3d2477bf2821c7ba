use geo::{Bearing, Destination, Distance, Geodesic, Point};

use super::{Point2, Vector2, METRES_PER_DEGREE, TOLERANCE};

/// How input coordinates are interpreted for metric work.
///
/// Topology never depends on this choice; it only decides how lengths,
/// headings and metre tolerances are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSystem {
    /// `x` is longitude, `y` is latitude, both in degrees (WGS84 ellipsoid).
    #[default]
    Geodetic,
    /// Planar coordinates already expressed in metres.
    Projected,
}

impl CoordinateSystem {
    /// Distance between two points in metres.
    #[must_use]
    pub fn distance(self, a: Point2, b: Point2) -> f64 {
        match self {
            Self::Geodetic => Geodesic.distance(to_geo(a), to_geo(b)),
            Self::Projected => (b - a).norm(),
        }
    }

    /// True heading from `a` to `b` in degrees, clockwise from north, in `[0, 360)`.
    #[must_use]
    pub fn heading(self, a: Point2, b: Point2) -> f64 {
        let raw = match self {
            Self::Geodetic => Geodesic.bearing(to_geo(a), to_geo(b)),
            Self::Projected => {
                let d = b - a;
                d.x.atan2(d.y).to_degrees()
            }
        };
        normalize_heading(raw)
    }

    /// Point reached from `origin` after `metres` along `heading` degrees.
    #[must_use]
    pub fn destination(self, origin: Point2, heading: f64, metres: f64) -> Point2 {
        match self {
            Self::Geodetic => {
                let p = Geodesic.destination(to_geo(origin), heading, metres);
                Point2::new(p.x(), p.y())
            }
            Self::Projected => {
                let rad = heading.to_radians();
                Point2::new(origin.x + metres * rad.sin(), origin.y + metres * rad.cos())
            }
        }
    }

    /// Converts a metre tolerance to isotropic coordinate units.
    ///
    /// Geodetic coordinates use the degree-of-latitude equivalent.
    #[must_use]
    pub fn metres_to_units(self, metres: f64) -> f64 {
        match self {
            Self::Geodetic => metres / METRES_PER_DEGREE,
            Self::Projected => metres,
        }
    }

    /// Coordinate-space vector that lies `metres` to the left of `dir`,
    /// measured perpendicular to `dir` on the ground at `at`.
    ///
    /// Returns `None` for a zero direction.
    #[must_use]
    pub fn left_offset(self, at: Point2, dir: Vector2, metres: f64) -> Option<Vector2> {
        let (kx, ky) = self.unit_scales(at);
        let ground = Vector2::new(dir.x * kx, dir.y * ky);
        let len = ground.norm();
        if len < TOLERANCE * TOLERANCE {
            return None;
        }
        let left = Vector2::new(-ground.y, ground.x) * (metres / len);
        Some(Vector2::new(left.x / kx, left.y / ky))
    }

    /// Ground offset from `origin` to `p` in metres, east then north, using
    /// the local scale at `origin`.
    #[must_use]
    pub fn local_metres(self, origin: Point2, p: Point2) -> Vector2 {
        let (kx, ky) = self.unit_scales(origin);
        Vector2::new((p.x - origin.x) * kx, (p.y - origin.y) * ky)
    }

    /// Metres per coordinate unit along x and y near `at`.
    fn unit_scales(self, at: Point2) -> (f64, f64) {
        match self {
            Self::Geodetic => {
                let cos_lat = at.y.to_radians().cos().abs().max(1e-6);
                (METRES_PER_DEGREE * cos_lat, METRES_PER_DEGREE)
            }
            Self::Projected => (1.0, 1.0),
        }
    }
}

/// Wraps a heading in degrees into `[0, 360)`.
#[must_use]
pub fn normalize_heading(degrees: f64) -> f64 {
    let r = degrees.rem_euclid(360.0);
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

fn to_geo(p: Point2) -> Point<f64> {
    Point::new(p.x, p.y)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn projected_heading_is_compass() {
        let cs = CoordinateSystem::Projected;
        let o = Point2::new(0.0, 0.0);
        assert_abs_diff_eq!(cs.heading(o, Point2::new(0.0, 1.0)), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cs.heading(o, Point2::new(1.0, 0.0)), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cs.heading(o, Point2::new(0.0, -1.0)), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cs.heading(o, Point2::new(-1.0, 0.0)), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn geodetic_distance_of_one_degree_latitude() {
        let cs = CoordinateSystem::Geodetic;
        let d = cs.distance(Point2::new(10.0, 45.0), Point2::new(10.0, 46.0));
        assert!((d - 111_150.0).abs() < 200.0, "unexpected distance {d}");
        let h = cs.heading(Point2::new(10.0, 45.0), Point2::new(10.0, 46.0));
        assert!(h < 1e-6 || h > 360.0 - 1e-6);
    }

    #[test]
    fn geodetic_destination_round_trips_distance() {
        let cs = CoordinateSystem::Geodetic;
        let a = Point2::new(-122.3, 47.6);
        let b = cs.destination(a, 45.0, 250.0);
        assert_abs_diff_eq!(cs.distance(a, b), 250.0, epsilon = 1e-6);
        assert_abs_diff_eq!(cs.heading(a, b), 45.0, epsilon = 1e-6);
    }

    #[test]
    fn left_offset_is_perpendicular_on_the_ground() {
        let cs = CoordinateSystem::Projected;
        let off = cs
            .left_offset(Point2::origin(), Vector2::new(3.0, 0.0), 4.0)
            .unwrap();
        assert_abs_diff_eq!(off.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(off.y, 4.0, epsilon = 1e-12);
        assert!(cs.left_offset(Point2::origin(), Vector2::zeros(), 1.0).is_none());
    }

    #[test]
    fn local_metres_shrinks_longitude_with_latitude() {
        let cs = CoordinateSystem::Geodetic;
        let origin = Point2::new(0.0, 60.0);
        let east = cs.local_metres(origin, Point2::new(0.001, 60.0));
        let north = cs.local_metres(origin, Point2::new(0.0, 60.001));
        assert_abs_diff_eq!(east.x, north.y / 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(east.y, 0.0, epsilon = 1e-12);
        let flat = CoordinateSystem::Projected.local_metres(origin, Point2::new(3.0, 64.0));
        assert_abs_diff_eq!(flat.x, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(flat.y, 4.0, epsilon = 1e-12);
    }
}
