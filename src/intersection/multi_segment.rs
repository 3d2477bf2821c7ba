use std::cmp::Ordering;

use tracing::{debug, error, trace};

use crate::constraint::Constraint;
use crate::error::Result;
use crate::geometry::{Ray, Segment};
use crate::math::{ExactPoint, TOLERANCE};

use super::edge::{Corner, CornerPosition};
use super::node::EdgeInfo;
use super::{EdgeId, IntersectionGraph, NodeId};

/// A junction corner that was resolved across several edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSegmentWalk {
    /// Node the walk started from.
    pub node: NodeId,
    /// Edge-to-edge steps taken before both sides resolved.
    pub hops: usize,
    /// Every edge whose corner was replaced.
    pub edges: Vec<EdgeId>,
}

/// One edge visited on one side of the walk.
#[derive(Debug, Clone)]
struct Leg {
    edge: EdgeId,
    /// Node the walk entered the edge from.
    node: NodeId,
    originating: bool,
    entry: ExactPoint,
    /// Index into the walk path of the first point on this edge.
    from: usize,
}

impl Leg {
    fn start(node: NodeId, entry: ExactPoint, info: &EdgeInfo) -> Self {
        Self {
            edge: info.edge(),
            node,
            originating: info.originating(),
            entry,
            from: 0,
        }
    }
}

impl IntersectionGraph {
    /// Runs the multi-segment walk for every clockwise-adjacent pair of
    /// edges at `node` and returns the corners it replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena is inconsistent.
    pub fn complete_special_intersections(&mut self, node: NodeId) -> Result<Vec<MultiSegmentWalk>> {
        let infos = self.node(node)?.edges().to_vec();
        if infos.len() < 2 {
            return Ok(Vec::new());
        }
        let mut walks = Vec::new();
        for (i, cur) in infos.iter().enumerate() {
            let next = &infos[(i + 1) % infos.len()];
            let widths = (self.edge(cur.edge())?.width(), self.edge(next.edge())?.width());
            if (widths.0 - widths.1).abs() > TOLERANCE {
                trace!(node = self.node(node)?.label(), "unequal widths, walk skipped");
                continue;
            }
            if let Some(walk) = self.complete_multi_segment_intersection(node, cur, next)? {
                walks.push(walk);
            }
        }
        Ok(walks)
    }

    /// Follows the bisector of the corner between `a` (on its right) and `b`
    /// (on its left) until it lands on both side lines.
    ///
    /// Whenever an edge ends before the bisector reaches the sides, the walk
    /// steps to the neighbouring edge at that edge's far node and restarts
    /// the bisector from the crossing. Nothing is changed unless a step was
    /// taken. A walk that stepped and then cannot close marks the corners
    /// it visited as failed.
    fn complete_multi_segment_intersection(
        &mut self,
        node: NodeId,
        a: &EdgeInfo,
        b: &EdgeInfo,
    ) -> Result<Option<MultiSegmentWalk>> {
        let origin = self.node(node)?.point().clone();
        let label = self.node(node)?.label();
        let mut a_legs = vec![Leg::start(node, origin.clone(), a)];
        let mut b_legs = vec![Leg::start(node, origin.clone(), b)];
        let mut path = vec![origin];
        let limit = self.edge_count();
        let mut hops = 0;

        loop {
            let (Some(la), Some(lb), Some(anchor)) =
                (a_legs.last().cloned(), b_legs.last().cloned(), path.last().cloned())
            else {
                return Ok(None);
            };
            let ea = self.edge(la.edge)?;
            let eb = self.edge(lb.edge)?;
            let Some(target) = ea
                .side(la.originating, true)
                .intersect(eb.side(lb.originating, false))
                .point()
            else {
                if hops == 0 {
                    return Ok(None);
                }
                return self.abort_walk(label, &a_legs, &b_legs, "sides do not meet");
            };
            let Ok(bisector) = Ray::through(&anchor, &target) else {
                if hops == 0 {
                    return Ok(None);
                }
                return self.abort_walk(label, &a_legs, &b_legs, "bisector collapsed");
            };
            let hit_a = ea.intersect_with_bisector(la.originating, true, &bisector);
            let hit_b = eb.intersect_with_bisector(lb.originating, false, &bisector);
            let reach = anchor.squared_distance(&target);
            let short_a = hit_a.end.filter(|(_, d)| *d < reach);
            let short_b = hit_b.end.filter(|(_, d)| *d < reach);

            let (advance_a, advance_b, crossing) = match (short_a, short_b) {
                (None, None) if hops == 0 => return Ok(None),
                (None, None) => {
                    let walk = self.install_multi_segment(node, &a_legs, &b_legs, &path, &target, hops)?;
                    return Ok(Some(walk));
                }
                (Some((x, _)), None) => (true, false, x),
                (None, Some((x, _))) => (false, true, x),
                (Some((xa, da)), Some((xb, db))) => match da.cmp(&db) {
                    Ordering::Less => (true, false, xa),
                    Ordering::Greater => (false, true, xb),
                    Ordering::Equal => (true, true, xa),
                },
            };

            hops += 1;
            if hops > limit {
                return self.abort_walk(label, &a_legs, &b_legs, "hop limit exceeded");
            }
            path.push(crossing.clone());
            let from = path.len() - 1;
            let mut dead_end = false;
            for (advance, legs, right) in [(advance_a, &mut a_legs, true), (advance_b, &mut b_legs, false)] {
                if !advance {
                    continue;
                }
                let Some(last) = legs.last() else {
                    return Ok(None);
                };
                match self.step(last, &crossing, right, from)? {
                    Some(leg) => legs.push(leg),
                    None => {
                        dead_end = true;
                        break;
                    }
                }
            }
            if dead_end {
                let reason = format!("no continuing edge at {crossing}");
                return self.abort_walk(label, &a_legs, &b_legs, &reason);
            }
            if let (Some(la), Some(lb)) = (a_legs.last(), b_legs.last()) {
                if la.edge == lb.edge {
                    return self.abort_walk(label, &a_legs, &b_legs, "walk closed on itself");
                }
            }
            trace!(node = label, hops, at = %crossing, "multi-segment step");
        }
    }

    /// Marks the walked corner of every visited edge as failed and clears
    /// its generated polygon, so verification drops the edge.
    fn abort_walk(
        &mut self,
        label: u64,
        a_legs: &[Leg],
        b_legs: &[Leg],
        reason: &str,
    ) -> Result<Option<MultiSegmentWalk>> {
        error!(node = label, reason, "multi-segment walk aborted");
        for (legs, right) in [(a_legs, true), (b_legs, false)] {
            for leg in legs {
                let corner = CornerPosition::at_node(leg.originating, right);
                let edge = self.edge_mut(leg.edge)?;
                edge.set_corner(corner, Corner::Failed(format!("multi-segment walk at node {label}: {reason}")));
                edge.clear_generated();
            }
        }
        Ok(None)
    }

    /// The edge that continues `leg` past its far node on the walk's
    /// `right` (or left) side, checked to share the crossing point.
    fn step(&self, leg: &Leg, crossing: &ExactPoint, right: bool, from: usize) -> Result<Option<Leg>> {
        let far_node = self.edge(leg.edge)?.other_node(leg.node);
        let far = self.node(far_node)?;
        let neighbour = if right {
            far.prev_edge_info(leg.edge)
        } else {
            far.next_edge_info(leg.edge)
        };

        let mut chosen = None;
        if let Some(info) = neighbour {
            if self.continues(info, leg.edge, crossing, right)? {
                chosen = Some(info.clone());
            }
        }
        if chosen.is_none() {
            for info in far.edges() {
                if self.continues(info, leg.edge, crossing, right)? {
                    chosen = Some(info.clone());
                    break;
                }
            }
        }
        Ok(chosen.map(|info| Leg {
            edge: info.edge(),
            node: far_node,
            originating: info.originating(),
            entry: far.point().clone(),
            from,
        }))
    }

    fn continues(&self, info: &EdgeInfo, previous: EdgeId, crossing: &ExactPoint, right: bool) -> Result<bool> {
        if info.edge() == previous {
            return Ok(false);
        }
        let corner = CornerPosition::at_node(info.originating(), right);
        Ok(self.edge(info.edge())?.corner(corner).contains(crossing))
    }

    /// Replaces the near corner of every visited edge by the walked chain:
    /// segments through the crossings, then a ray onto the side lines.
    fn install_multi_segment(
        &mut self,
        node: NodeId,
        a_legs: &[Leg],
        b_legs: &[Leg],
        path: &[ExactPoint],
        target: &ExactPoint,
        hops: usize,
    ) -> Result<MultiSegmentWalk> {
        let mut edges = Vec::new();
        for (legs, right) in [(a_legs, true), (b_legs, false)] {
            for leg in legs {
                let mut points = vec![leg.entry.clone()];
                points.extend(path.iter().skip(leg.from).cloned());
                points.push(target.clone());
                points.dedup();
                let Some(last) = points.len().checked_sub(2) else {
                    continue;
                };
                let mut constraints = Vec::with_capacity(points.len() - 1);
                for (i, pair) in points.windows(2).enumerate() {
                    let owner = Some(leg.edge);
                    let c = if i == last {
                        Constraint::ray(Ray::through(&pair[0], &pair[1])?, owner, "multi-segment ray")
                    } else {
                        Constraint::segment(Segment::new(pair[0].clone(), pair[1].clone())?, owner, "multi-segment")
                    };
                    constraints.push(c);
                }
                let corner = CornerPosition::at_node(leg.originating, right);
                self.edge_mut(leg.edge)?
                    .set_corner(corner, Corner::MultiSegment { points, constraints });
                edges.push(leg.edge);
            }
        }
        debug!(node = self.node(node)?.label(), hops, edges = edges.len(), "multi-segment corner installed");
        Ok(MultiSegmentWalk { node, hops, edges })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::intersection::FLAGS_INTERSECT_CONSTRAINTS_COMPLETE;
    use crate::math::CoordinateSystem;

    fn p(x: f64, y: f64) -> ExactPoint {
        ExactPoint::from_f64(x, y).unwrap()
    }

    fn constrained(g: &mut IntersectionGraph) {
        for n in g.node_ids() {
            g.constrain_edges(n).unwrap();
        }
    }

    #[test]
    fn ordinary_junction_needs_no_walk() {
        let mut g = IntersectionGraph::new(CoordinateSystem::Projected);
        g.add_edge(&p(0.0, 0.0), &p(40.0, 0.0), 8.0, 1).unwrap();
        g.add_edge(&p(0.0, 0.0), &p(-20.0, 35.0), 8.0, 1).unwrap();
        g.add_edge(&p(0.0, 0.0), &p(-20.0, -35.0), 8.0, 1).unwrap();
        constrained(&mut g);
        let hub = g.node_at(&p(0.0, 0.0)).unwrap();
        assert!(g.complete_special_intersections(hub).unwrap().is_empty());
    }

    #[test]
    fn sharp_fork_without_a_landing_fails_its_corners() {
        let mut g = IntersectionGraph::new(CoordinateSystem::Projected);
        g.add_edge(&p(0.0, 0.0), &p(30.0, 2.0), 8.0, 1).unwrap();
        g.add_edge(&p(0.0, 0.0), &p(30.0, -2.0), 8.0, 1).unwrap();
        g.add_cap_edges(1.0).unwrap();
        constrained(&mut g);
        let hub = g.node_at(&p(0.0, 0.0)).unwrap();
        for n in g.node_ids() {
            g.generate_edges(n, 0.05).unwrap();
        }

        assert!(g.complete_special_intersections(hub).unwrap().is_empty());
        let infos = g.node(hub).unwrap().edges().to_vec();
        assert_eq!(infos.len(), 2);
        // The corner between the two roads, on each of them.
        for (info, right) in [(&infos[0], true), (&infos[1], false)] {
            let e = g.edge(info.edge()).unwrap();
            let corner = e.corner(CornerPosition::at_node(info.originating(), right));
            assert!(matches!(corner, Corner::Failed(_)), "{corner:?}");
            assert!(!e.verify(FLAGS_INTERSECT_CONSTRAINTS_COMPLETE));
            assert!(e.polygon().is_empty());
        }
    }

    #[test]
    fn shallow_junction_walks_across_a_short_edge() {
        let mut g = IntersectionGraph::new(CoordinateSystem::Projected);
        let a = g.add_edge(&p(0.0, 0.0), &p(2.0, 0.0), 4.0, 1).unwrap();
        let a2 = g.add_edge(&p(2.0, 0.0), &p(80.0, 0.0), 4.0, 1).unwrap();
        let b = g.add_edge(&p(0.0, 0.0), &p(80.0, -6.0), 4.0, 1).unwrap();
        g.add_edge(&p(0.0, 0.0), &p(-30.0, 0.0), 4.0, 1).unwrap();
        constrained(&mut g);

        let hub = g.node_at(&p(0.0, 0.0)).unwrap();
        let walks = g.complete_special_intersections(hub).unwrap();
        assert_eq!(walks.len(), 1);
        let walk = &walks[0];
        assert_eq!(walk.hops, 1);
        let mut touched = walk.edges.clone();
        touched.sort();
        let mut want = vec![a, a2, b];
        want.sort();
        assert_eq!(touched, want);

        for (id, corner) in [
            (a, CornerPosition::BotRight),
            (a2, CornerPosition::BotRight),
            (b, CornerPosition::BotLeft),
        ] {
            let Corner::MultiSegment { points, constraints } = g.edge(id).unwrap().corner(corner) else {
                panic!("corner of {id:?} not replaced");
            };
            assert_eq!(points.len(), 3);
            assert_eq!(constraints.len(), 2);
            let crossing = points[1].to_point2();
            assert_abs_diff_eq!(crossing.x, 2.0, epsilon = 1e-9);
            assert!(crossing.y < 0.0 && crossing.y > -0.2, "crossing {crossing:?}");
            let landing = points[2].to_point2();
            assert_abs_diff_eq!(landing.y, -2.0, epsilon = 1e-6);
            assert!(landing.x > 50.0 && landing.x < 56.0, "landing {landing:?}");
        }
    }
}
