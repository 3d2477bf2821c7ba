//! Raw road segments in, clean planar road graph out.

mod cluster;
mod config;
mod fingers;

pub use config::NetworkConfig;
pub(crate) use config::positive;

use tracing::{debug, debug_span, warn};

use crate::arrangement::{Arrangement, CurveData};
use crate::error::{NetworkError, Result};
use crate::math::{ExactPoint, Point2, TOLERANCE};

/// Width and category contributed by one input segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadAttr {
    pub width: f64,
    pub kind: u32,
}

/// Every contribution to one arrangement curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadData {
    pub attrs: Vec<RoadAttr>,
}

impl RoadData {
    #[must_use]
    pub fn single(width: f64, kind: u32) -> Self {
        Self {
            attrs: vec![RoadAttr { width, kind }],
        }
    }

    /// Widest width and highest category, or `None` if nothing contributed.
    #[must_use]
    pub fn resolved(&self) -> Option<RoadAttr> {
        let width = self.attrs.iter().map(|a| a.width).reduce(f64::max)?;
        let kind = self.attrs.iter().map(|a| a.kind).max()?;
        Some(RoadAttr { width, kind })
    }
}

impl CurveData for RoadData {
    fn merge(&mut self, other: &Self) {
        self.attrs.extend_from_slice(&other.attrs);
    }
}

/// One edge of the cleaned network.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkEdge {
    pub source: ExactPoint,
    pub target: ExactPoint,
    pub width: f64,
    pub kind: u32,
}

/// Counts of what a cleaning pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub clustered_vertices: usize,
    pub removed_fingers: usize,
    pub extended_fingers: usize,
}

/// Exact arrangement of road centerlines with cleanup passes.
#[derive(Debug, Clone)]
pub struct SegmentNetwork {
    config: NetworkConfig,
    arrangement: Arrangement<RoadData>,
    inserted: usize,
}

impl SegmentNetwork {
    /// Creates an empty network.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            arrangement: Arrangement::new(),
            inserted: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    #[must_use]
    pub fn arrangement(&self) -> &Arrangement<RoadData> {
        &self.arrangement
    }

    /// Number of segments passed to [`SegmentNetwork::add`].
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Inserts a road segment. Overlaps with earlier segments are merged and
    /// their data united.
    ///
    /// # Errors
    ///
    /// Returns an error for non-finite coordinates, a non-positive width or a
    /// zero-length segment.
    pub fn add(&mut self, source: Point2, target: Point2, width: f64, kind: u32) -> Result<()> {
        if !(width.is_finite() && width > 0.0) {
            return Err(NetworkError::InvalidSegment(format!("width {width}")).into());
        }
        let a = ExactPoint::from_f64(source.x, source.y)?;
        let b = ExactPoint::from_f64(target.x, target.y)?;
        if a == b {
            return Err(NetworkError::InvalidSegment(format!("zero length at {a}")).into());
        }
        self.arrangement.insert_segment(&a, &b, RoadData::single(width, kind))?;
        self.inserted += 1;
        Ok(())
    }

    /// Runs cluster, finger removal and finger extension, then emits the
    /// resulting edge list.
    pub fn clean(&mut self) -> (Vec<NetworkEdge>, CleanReport) {
        let _span = debug_span!("clean").entered();
        let report = CleanReport {
            clustered_vertices: self.cluster(),
            removed_fingers: self.remove_fingers(),
            extended_fingers: self.extend_fingers(),
        };
        debug!(
            clustered = report.clustered_vertices,
            removed = report.removed_fingers,
            extended = report.extended_fingers,
            "network cleaned"
        );
        (self.generate_output(), report)
    }

    /// One record per arrangement curve with its widest width and highest
    /// category. Curves without data are skipped.
    #[must_use]
    pub fn generate_output(&self) -> Vec<NetworkEdge> {
        let mut out = Vec::with_capacity(self.arrangement.curve_count());
        for (id, curve) in self.arrangement.curves() {
            let Some(attr) = curve.data.resolved() else {
                warn!(?id, "network edge has no contributing data");
                continue;
            };
            if attr.width < TOLERANCE {
                warn!(?id, width = attr.width, "network edge width below tolerance");
            }
            let (Some(source), Some(target)) = (
                self.arrangement.point(curve.source),
                self.arrangement.point(curve.target),
            ) else {
                continue;
            };
            out.push(NetworkEdge {
                source: source.clone(),
                target: target.clone(),
                width: attr.width,
                kind: attr.kind,
            });
        }
        out
    }

    /// Metric length of the segment between two points.
    fn metres(&self, a: &ExactPoint, b: &ExactPoint) -> f64 {
        self.config.coordinates.distance(a.to_point2(), b.to_point2())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn net() -> SegmentNetwork {
        SegmentNetwork::new(NetworkConfig::projected()).unwrap()
    }

    #[test]
    fn overlapping_inputs_take_the_widest_width() {
        let mut n = net();
        n.add(Point2::new(0.0, 0.0), Point2::new(100.0, 0.0), 6.0, 1).unwrap();
        n.add(Point2::new(100.0, 0.0), Point2::new(0.0, 0.0), 9.0, 3).unwrap();
        let out = n.generate_output();
        assert_eq!(out.len(), 1);
        assert!((out[0].width - 9.0).abs() < f64::EPSILON);
        assert_eq!(out[0].kind, 3);
    }

    #[test]
    fn crossing_inputs_become_four_edges() {
        let mut n = net();
        n.add(Point2::new(-50.0, 0.0), Point2::new(50.0, 0.0), 6.0, 1).unwrap();
        n.add(Point2::new(0.0, -50.0), Point2::new(0.0, 50.0), 6.0, 1).unwrap();
        assert_eq!(n.generate_output().len(), 4);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let mut n = net();
        assert!(n.add(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), 0.0, 1).is_err());
        assert!(n.add(Point2::new(0.0, 0.0), Point2::new(0.0, 0.0), 4.0, 1).is_err());
        assert!(n.add(Point2::new(f64::NAN, 0.0), Point2::new(1.0, 0.0), 4.0, 1).is_err());
        assert_eq!(n.inserted(), 0);
    }

    #[test]
    fn resolved_data_uses_maxima() {
        let mut d = RoadData::single(4.0, 2);
        d.merge(&RoadData::single(7.0, 1));
        let r = d.resolved().unwrap();
        assert!((r.width - 7.0).abs() < f64::EPSILON);
        assert_eq!(r.kind, 2);
        assert!(RoadData::default().resolved().is_none());
    }
}
