//! Road junction resolution.
//!
//! Nodes and edges live in slotmap arenas inside [`IntersectionGraph`] and
//! refer to each other by id. Node-level passes decide the constraints that
//! bound every edge at a junction; edge-level passes turn those constraints
//! into polygons.

mod edge;
mod generator;
mod multi_segment;
mod node;
mod texture;

pub use edge::{
    BisectorHit, ConstraintPosition, Corner, CornerPosition, IntersectionEdge,
    FLAGS_BOTTOM_INTERSECTED, FLAGS_INTERSECT_CONSTRAINTS_COMPLETE, FLAGS_TEXTURED,
    FLAGS_TOP_INTERSECTED,
};
pub use generator::{
    GeneratorConfig, GeneratorOutput, GeneratorState, GeneratorStats, IntersectionGenerator,
    RoadPolygon,
};
pub use multi_segment::MultiSegmentWalk;
pub use node::{EdgeInfo, IntersectionNode};
pub use texture::{repeat_ratio, TexInfo, TextureMethod, TexturePlacement};

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::error::{IntersectionError, Result};
use crate::math::{CoordinateSystem, ExactPoint};

slotmap::new_key_type! {
    /// Unique identifier for a junction node.
    pub struct NodeId;
}

slotmap::new_key_type! {
    /// Unique identifier for a road edge.
    pub struct EdgeId;
}

/// Monotonic labels for log output, fresh per graph.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn next_id(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

/// Arena owning every junction node and road edge of one run.
#[derive(Debug)]
pub struct IntersectionGraph {
    coordinates: CoordinateSystem,
    nodes: SlotMap<NodeId, IntersectionNode>,
    edges: SlotMap<EdgeId, IntersectionEdge>,
    node_index: HashMap<ExactPoint, NodeId>,
    ids: IdGenerator,
}

impl IntersectionGraph {
    #[must_use]
    pub fn new(coordinates: CoordinateSystem) -> Self {
        Self {
            coordinates,
            nodes: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            node_index: HashMap::new(),
            ids: IdGenerator::default(),
        }
    }

    #[must_use]
    pub fn coordinates(&self) -> CoordinateSystem {
        self.coordinates
    }

    // --- Node operations ---

    /// Returns the node, or an error if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `IntersectionError::NodeNotFound` for a stale id.
    pub fn node(&self, id: NodeId) -> Result<&IntersectionNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| IntersectionError::NodeNotFound(format!("{id:?}")).into())
    }

    /// Returns the node mutably, or an error if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `IntersectionError::NodeNotFound` for a stale id.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut IntersectionNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| IntersectionError::NodeNotFound(format!("{id:?}")).into())
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &IntersectionNode)> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn node_at(&self, p: &ExactPoint) -> Option<NodeId> {
        self.node_index.get(p).copied()
    }

    /// The node at `p`, created on first reference.
    pub fn get_or_create_node(&mut self, p: &ExactPoint) -> NodeId {
        if let Some(id) = self.node_at(p) {
            return id;
        }
        let label = self.ids.next_id();
        let node = IntersectionNode::new(p.clone(), label);
        let id = self.nodes.insert(node);
        self.node_index.insert(p.clone(), id);
        id
    }

    // --- Edge operations ---

    /// Returns the edge, or an error if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `IntersectionError::EdgeNotFound` for a stale id.
    pub fn edge(&self, id: EdgeId) -> Result<&IntersectionEdge> {
        self.edges
            .get(id)
            .ok_or_else(|| IntersectionError::EdgeNotFound(format!("{id:?}")).into())
    }

    /// Returns the edge mutably, or an error if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `IntersectionError::EdgeNotFound` for a stale id.
    pub fn edge_mut(&mut self, id: EdgeId) -> Result<&mut IntersectionEdge> {
        self.edges
            .get_mut(id)
            .ok_or_else(|| IntersectionError::EdgeNotFound(format!("{id:?}")).into())
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &IntersectionEdge)> {
        self.edges.iter()
    }

    #[must_use]
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.keys().collect()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Creates an edge between the nodes at `start` and `end` and registers
    /// it with both.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoints coincide.
    pub fn add_edge(
        &mut self,
        start: &ExactPoint,
        end: &ExactPoint,
        width: f64,
        kind: u32,
    ) -> Result<EdgeId> {
        if start == end {
            return Err(IntersectionError::InvalidTopology(format!("edge collapses at {start}")).into());
        }
        let sides = edge::side_lines(start, end, width, self.coordinates)?;
        let s = self.get_or_create_node(start);
        let e = self.get_or_create_node(end);
        let label = self.ids.next_id();
        let id = self.edges.insert_with_key(|id| {
            IntersectionEdge::new(id, label, (s, start.clone()), (e, end.clone()), width, kind, sides)
        });
        self.attach(id)?;
        Ok(id)
    }

    /// Removes an edge and unregisters it from both nodes.
    ///
    /// # Errors
    ///
    /// Returns `IntersectionError::EdgeNotFound` for a stale id.
    pub fn detach_edge(&mut self, id: EdgeId) -> Result<IntersectionEdge> {
        let road = self
            .edges
            .remove(id)
            .ok_or_else(|| IntersectionError::EdgeNotFound(format!("{id:?}")))?;
        for n in [road.start(), road.end()] {
            if let Some(node) = self.nodes.get_mut(n) {
                node.del_edge(id);
            }
        }
        Ok(road)
    }

    /// Registers an edge's end records with its two nodes.
    fn attach(&mut self, id: EdgeId) -> Result<()> {
        let road = self.edge(id)?;
        let (s, e) = (road.start(), road.end());
        let forward = road.direction();
        let back = -&forward;
        let (a, b) = (road.start_point().to_point2(), road.end_point().to_point2());
        let heading_out = self.coordinates.heading(a, b);
        let heading_in = self.coordinates.heading(b, a);
        self.node_mut(s)?.add_edge(EdgeInfo::new(id, true, forward, heading_out));
        self.node_mut(e)?.add_edge(EdgeInfo::new(id, false, back, heading_in));
        Ok(())
    }

    /// Moves the end of `id` opposite `keep` onto `new_node` and creates the
    /// remainder edge from `new_node` to the original far node, preserving
    /// the direction of travel.
    ///
    /// # Errors
    ///
    /// Returns an error if either id is stale or `keep` is not an endpoint.
    pub fn split_edge(&mut self, id: EdgeId, keep: NodeId, new_node: NodeId) -> Result<EdgeId> {
        let current = self.edge(id)?;
        let keep_start = if current.start() == keep {
            true
        } else if current.end() == keep {
            false
        } else {
            return Err(IntersectionError::InvalidTopology(format!(
                "{keep:?} is not an endpoint of edge {}",
                current.label()
            ))
            .into());
        };
        let far = current.other_node(keep);
        let (width, kind) = (current.width(), current.kind());
        let far_point = self.node(far)?.point().clone();
        let new_point = self.node(new_node)?.point().clone();

        if let Some(node) = self.nodes.get_mut(far) {
            node.del_edge(id);
        }
        if let Some(node) = self.nodes.get_mut(keep) {
            node.del_edge(id);
        }
        let (a, b) = {
            let moved = self.edge_mut(id)?;
            if keep_start {
                moved.move_end(new_node, new_point.clone());
            } else {
                moved.move_start(new_node, new_point.clone());
            }
            (moved.start_point().clone(), moved.end_point().clone())
        };
        let sides = edge::side_lines(&a, &b, width, self.coordinates)?;
        self.edge_mut(id)?.set_sides(sides);
        self.attach(id)?;

        let (a, b) = if keep_start {
            (new_point, far_point)
        } else {
            (far_point, new_point)
        };
        self.add_edge(&a, &b, width, kind)
    }
}
