use tracing::{debug, error, trace, warn};

use crate::constraint::Constraint;
use crate::error::Result;
use crate::geometry::{Intersection, Line, Ray};
use crate::math::exact::scalar;
use crate::math::{ExactPoint, ExactVector, Point2, TOLERANCE};

use super::edge::{Corner, CornerPosition};
use super::{EdgeId, IntersectionGraph, NodeId};

/// One end of an edge as seen from a node.
#[derive(Debug, Clone)]
pub struct EdgeInfo {
    edge: EdgeId,
    originating: bool,
    direction: ExactVector,
    heading: f64,
}

impl EdgeInfo {
    #[must_use]
    pub fn new(edge: EdgeId, originating: bool, direction: ExactVector, heading: f64) -> Self {
        Self {
            edge,
            originating,
            direction,
            heading,
        }
    }

    #[must_use]
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    /// True if the node is the edge's start.
    #[must_use]
    pub fn originating(&self) -> bool {
        self.originating
    }

    /// Exact direction from the node toward the edge's far end.
    #[must_use]
    pub fn direction(&self) -> &ExactVector {
        &self.direction
    }

    /// True heading from the node toward the far end, in degrees.
    #[must_use]
    pub fn heading(&self) -> f64 {
        self.heading
    }
}

/// A junction: the ends of every incident edge, sorted clockwise from north.
#[derive(Debug, Clone)]
pub struct IntersectionNode {
    label: u64,
    point: ExactPoint,
    position: Point2,
    edges: Vec<EdgeInfo>,
    start_v: f64,
    endpoint: bool,
}

impl IntersectionNode {
    #[must_use]
    pub fn new(point: ExactPoint, label: u64) -> Self {
        Self {
            label,
            position: point.to_point2(),
            point,
            edges: Vec::new(),
            start_v: 0.0,
            endpoint: false,
        }
    }

    #[must_use]
    pub fn label(&self) -> u64 {
        self.label
    }

    #[must_use]
    pub fn point(&self) -> &ExactPoint {
        &self.point
    }

    #[must_use]
    pub fn position(&self) -> Point2 {
        self.position
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn edges(&self) -> &[EdgeInfo] {
        &self.edges
    }

    /// Inserts an edge end, keeping the clockwise order by exact direction.
    pub fn add_edge(&mut self, info: EdgeInfo) {
        let at = self
            .edges
            .partition_point(|e| e.direction.cmp_compass(&info.direction).is_lt());
        self.edges.insert(at, info);
    }

    pub fn del_edge(&mut self, edge: EdgeId) {
        self.edges.retain(|e| e.edge != edge);
    }

    #[must_use]
    pub fn edge_info(&self, edge: EdgeId) -> Option<&EdgeInfo> {
        self.edges.iter().find(|e| e.edge == edge)
    }

    /// The edge end following `edge` clockwise.
    #[must_use]
    pub fn next_edge_info(&self, edge: EdgeId) -> Option<&EdgeInfo> {
        let n = self.edges.len();
        let pos = self.edges.iter().position(|e| e.edge == edge)?;
        self.edges.get((pos + 1) % n)
    }

    /// The edge end preceding `edge` clockwise.
    #[must_use]
    pub fn prev_edge_info(&self, edge: EdgeId) -> Option<&EdgeInfo> {
        let n = self.edges.len();
        let pos = self.edges.iter().position(|e| e.edge == edge)?;
        self.edges.get((pos + n - 1) % n)
    }

    /// Texture length cursor at this node.
    #[must_use]
    pub fn start_v(&self) -> f64 {
        self.start_v
    }

    pub fn set_start_v(&mut self, v: f64) {
        self.start_v = v;
    }

    /// True if texture chains start or stop here.
    #[must_use]
    pub fn is_endpoint(&self) -> bool {
        self.endpoint
    }

    pub fn set_endpoint(&mut self, endpoint: bool) {
        self.endpoint = endpoint;
    }
}

impl IntersectionGraph {
    /// Installs the near-end corner constraints of every edge at `node`:
    /// cap rays for a dead end, bisecting rays otherwise.
    ///
    /// Returns the number of corners that received a constraint.
    ///
    /// # Errors
    ///
    /// Returns an error if `node` or one of its edges is stale.
    pub fn constrain_edges(&mut self, node: NodeId) -> Result<usize> {
        match self.node(node)?.degree() {
            0 => Ok(0),
            1 => self.generate_cap_rays(node),
            _ => self.generate_bisect_rays(node),
        }
    }

    /// A pair of rays perpendicular to the single edge, one to each side.
    fn generate_cap_rays(&mut self, node: NodeId) -> Result<usize> {
        let n = self.node(node)?;
        let at = n.point().clone();
        let Some(info) = n.edges().first().cloned() else {
            return Ok(0);
        };
        let id = info.edge;
        let left = Ray::new(at.clone(), info.direction.perp_left())?;
        let right = Ray::new(at, info.direction.perp_right())?;
        let edge = self.edge_mut(id)?;
        edge.add_constraint(
            CornerPosition::at_node(info.originating, false).into(),
            Constraint::ray(left, Some(id), "cap left"),
        );
        edge.add_constraint(
            CornerPosition::at_node(info.originating, true).into(),
            Constraint::ray(right, Some(id), "cap right"),
        );
        trace!(node = self.node(node)?.label(), "cap rays");
        Ok(2)
    }

    /// For every clockwise-adjacent pair (cur, next), a ray from the node
    /// through the crossing of cur's right side and next's left side.
    fn generate_bisect_rays(&mut self, node: NodeId) -> Result<usize> {
        let n = self.node(node)?;
        let at = n.point().clone();
        let label = n.label();
        let infos = n.edges().to_vec();

        let mut installed = 0;
        for (i, cur) in infos.iter().enumerate() {
            let next = &infos[(i + 1) % infos.len()];
            let cur_corner = CornerPosition::at_node(cur.originating, true);
            let next_corner = CornerPosition::at_node(next.originating, false);

            let (cur_width, cur_side) = {
                let e = self.edge(cur.edge)?;
                (e.width(), e.side(cur.originating, true).clone())
            };
            let (next_width, next_side) = {
                let e = self.edge(next.edge)?;
                (e.width(), e.side(next.originating, false).clone())
            };
            if (cur_width - next_width).abs() > TOLERANCE {
                warn!(
                    node = label,
                    cur_width, next_width, "unequal road widths meet; mitring side lines"
                );
            }

            let (cur_target, next_target) = match cur_side.intersect(&next_side) {
                Intersection::Point(p) if p != at => (p.clone(), p),
                _ => {
                    // Parallel sides: cut both straight across at the node.
                    let probe = Line::new(at.clone(), cur.direction.perp_left())?;
                    let probe = Constraint::line(probe, None, "probe");
                    match (
                        probe.intersect(&cur_side).point(),
                        probe.intersect(&next_side).point(),
                    ) {
                        (Some(pc), Some(pn)) if pc != at && pn != at => (pc, pn),
                        _ => {
                            error!(node = label, "bisector construction failed");
                            let reason = format!("no bisector at node {label}");
                            self.edge_mut(cur.edge)?
                                .set_corner(cur_corner, Corner::Failed(reason.clone()));
                            self.edge_mut(next.edge)?
                                .set_corner(next_corner, Corner::Failed(reason));
                            continue;
                        }
                    }
                }
            };

            let cur_ray = Ray::through(&at, &cur_target)?;
            let next_ray = Ray::through(&at, &next_target)?;
            self.edge_mut(cur.edge)?.add_constraint(
                cur_corner.into(),
                Constraint::ray(cur_ray, Some(cur.edge), "bisect right").with_peer(next.edge),
            );
            self.edge_mut(next.edge)?.add_constraint(
                next_corner.into(),
                Constraint::ray(next_ray, Some(next.edge), "bisect left").with_peer(cur.edge),
            );
            installed += 2;
        }
        trace!(node = label, installed, "bisect rays");
        Ok(installed)
    }

    /// Generates the polygon of every edge that starts at `node`.
    ///
    /// Returns the number of edges whose polygon was built.
    ///
    /// # Errors
    ///
    /// Returns an error if `node` or one of its edges is stale.
    pub fn generate_edges(&mut self, node: NodeId, marker_units: f64) -> Result<usize> {
        let starting: Vec<EdgeId> = self
            .node(node)?
            .edges()
            .iter()
            .filter(|e| e.originating)
            .map(|e| e.edge)
            .collect();
        let mut generated = 0;
        for id in starting {
            if self.edge_mut(id)?.generate(marker_units) {
                generated += 1;
            }
        }
        Ok(generated)
    }

    /// Splits a short cap edge off every dead-end road longer than
    /// `cap_length_m`. The original edge keeps the tip and becomes the cap;
    /// a dead-end road no longer than that is a cap as a whole.
    ///
    /// Returns the number of caps split off.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena is inconsistent.
    pub fn add_cap_edges(&mut self, cap_length_m: f64) -> Result<usize> {
        let mut caps = 0;
        for node in self.node_ids() {
            let n = self.node(node)?;
            if n.degree() != 1 {
                continue;
            }
            let Some(info) = n.edges().first().cloned() else {
                continue;
            };
            let tip = n.point().clone();
            let far_node = self.edge(info.edge)?.other_node(node);
            let far = self.node(far_node)?.point().clone();
            let length = self.coordinates().distance(tip.to_point2(), far.to_point2());
            self.edge_mut(info.edge)?.mark_cap();
            if length <= cap_length_m {
                continue;
            }
            let cut = tip.offset(&(&far - &tip), &scalar(cap_length_m / length)?);
            let cut_node = self.get_or_create_node(&cut);
            self.split_edge(info.edge, node, cut_node)?;
            caps += 1;
        }
        debug!(caps, "cap edges added");
        Ok(caps)
    }
}
