use std::collections::{HashSet, VecDeque};

use rstar::primitives::GeomWithData;
use rstar::RTree;
use tracing::{debug, trace, warn};

use crate::arrangement::VertexId;
use crate::math::ExactPoint;

use super::{RoadData, SegmentNetwork};

type VertexEntry = GeomWithData<[f64; 2], VertexId>;

impl SegmentNetwork {
    /// Merges groups of vertices lying within the cluster tolerance of each
    /// other into their centroid.
    ///
    /// Groups are single-linkage components. Rounds repeat until no two
    /// vertices are within tolerance, so a second call changes nothing.
    /// Returns the number of vertices that were merged away.
    pub fn cluster(&mut self) -> usize {
        let tol = self
            .config
            .coordinates
            .metres_to_units(self.config.cluster_tolerance_m);
        let mut merged = 0;
        for round in 0..self.config.max_cluster_rounds {
            let groups = self.find_clusters(tol);
            if groups.is_empty() {
                debug!(round, merged, "clustering stable");
                return merged;
            }
            debug!(round, groups = groups.len(), "clustering vertices");
            for group in groups {
                merged += group.len() - 1;
                self.collapse(&group);
            }
        }
        if !self.find_clusters(tol).is_empty() {
            warn!(
                rounds = self.config.max_cluster_rounds,
                "clustering did not converge"
            );
        }
        merged
    }

    /// Connected groups (size > 1) of vertices within `tol` of a neighbour.
    fn find_clusters(&self, tol: f64) -> Vec<Vec<VertexId>> {
        let entries: Vec<VertexEntry> = self
            .arrangement
            .vertices()
            .map(|(id, v)| {
                let p = v.point.to_point2();
                GeomWithData::new([p.x, p.y], id)
            })
            .collect();
        let tree = RTree::bulk_load(entries.clone());

        let mut seen: HashSet<VertexId> = HashSet::with_capacity(entries.len());
        let mut groups = Vec::new();
        for entry in &entries {
            if !seen.insert(entry.data) {
                continue;
            }
            let mut group = vec![entry.data];
            let mut queue = VecDeque::from([*entry.geom()]);
            while let Some(at) = queue.pop_front() {
                for near in tree.locate_within_distance(at, tol * tol) {
                    if seen.insert(near.data) {
                        group.push(near.data);
                        queue.push_back(*near.geom());
                    }
                }
            }
            if group.len() > 1 {
                groups.push(group);
            }
        }
        groups
    }

    /// Replaces `group` by one vertex at its centroid and re-inserts every
    /// incident edge from there. Edges inside the group disappear.
    fn collapse(&mut self, group: &[VertexId]) {
        let points: Vec<ExactPoint> = group
            .iter()
            .filter_map(|&v| self.arrangement.point(v).cloned())
            .collect();
        let Some(centroid) = ExactPoint::centroid(&points) else {
            return;
        };

        // (far point, data, edge started inside the group)
        let mut rewired: Vec<(ExactPoint, RoadData, bool)> = Vec::new();
        for &v in group {
            let incident = self
                .arrangement
                .vertex(v)
                .map(|vx| vx.curves().to_vec())
                .unwrap_or_default();
            for c in incident {
                let Some(curve) = self.arrangement.remove_curve(c) else {
                    continue;
                };
                let far = curve.opposite(v);
                if group.contains(&far) {
                    continue;
                }
                if let Some(p) = self.arrangement.point(far) {
                    rewired.push((p.clone(), curve.data, curve.source == v));
                }
            }
        }
        for &v in group {
            self.arrangement.remove_isolated_vertex(v);
        }

        self.arrangement.insert_point(&centroid);
        for (far, data, outgoing) in rewired {
            if far == centroid {
                continue;
            }
            let (a, b) = if outgoing { (&centroid, &far) } else { (&far, &centroid) };
            if let Err(err) = self.arrangement.insert_segment(a, b, data) {
                warn!(%err, "dropping edge while clustering");
            }
        }
        trace!(size = group.len(), at = %centroid, "collapsed cluster");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use crate::math::{ExactPoint, Point2};
    use crate::network::{NetworkConfig, SegmentNetwork};

    fn snapshot(n: &SegmentNetwork) -> Vec<(ExactPoint, ExactPoint)> {
        let mut edges: Vec<_> = n
            .generate_output()
            .into_iter()
            .map(|e| (e.source, e.target))
            .collect();
        edges.sort();
        edges
    }

    #[test]
    fn near_duplicate_junction_points_merge() {
        let mut n = SegmentNetwork::new(NetworkConfig::projected()).unwrap();
        n.add(Point2::new(-50.0, 0.0), Point2::new(0.0, 0.0), 6.0, 1).unwrap();
        n.add(Point2::new(0.1, 0.05), Point2::new(50.0, 0.0), 6.0, 1).unwrap();
        n.add(Point2::new(0.0, 0.1), Point2::new(0.0, 50.0), 6.0, 1).unwrap();
        let merged = n.cluster();
        assert_eq!(merged, 2);
        let hub = n
            .arrangement()
            .vertices()
            .find(|(_, v)| v.degree() == 3)
            .map(|(_, v)| v.point.clone())
            .unwrap();
        assert_abs_diff_eq!(hub.to_point2().x, 0.1 / 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hub.to_point2().y, 0.05, epsilon = 1e-9);
        assert_eq!(n.generate_output().len(), 3);
    }

    #[test]
    fn clustering_is_idempotent() {
        let mut n = SegmentNetwork::new(NetworkConfig::projected()).unwrap();
        n.add(Point2::new(0.0, 0.0), Point2::new(30.0, 0.0), 6.0, 1).unwrap();
        n.add(Point2::new(30.1, 0.1), Point2::new(30.0, 40.0), 6.0, 1).unwrap();
        n.add(Point2::new(29.9, -0.1), Point2::new(60.0, 0.0), 6.0, 2).unwrap();
        n.cluster();
        let first = snapshot(&n);
        assert_eq!(n.cluster(), 0);
        assert_eq!(snapshot(&n), first);
    }

    #[test]
    fn distant_vertices_are_left_alone() {
        let mut n = SegmentNetwork::new(NetworkConfig::projected()).unwrap();
        n.add(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), 6.0, 1).unwrap();
        n.add(Point2::new(0.0, 5.0), Point2::new(10.0, 5.0), 6.0, 1).unwrap();
        assert_eq!(n.cluster(), 0);
        assert_eq!(n.generate_output().len(), 2);
    }
}
