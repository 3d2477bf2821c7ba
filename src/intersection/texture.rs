use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::math::{CoordinateSystem, Point2, Vector2};

use super::edge::{IntersectionEdge, FLAGS_TEXTURED};
use super::{EdgeId, IntersectionGraph, NodeId};

/// Texture parameters for one road category, supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TexInfo {
    pub material: String,
    /// Horizontal window of the texture atlas, across the road.
    pub atlas_u: (f64, f64),
    /// Vertical window of the texture atlas, along the road.
    pub atlas_v: (f64, f64),
    /// Ground length in metres covered by one repeat of the texture.
    pub v_distance: f64,
}

/// How a polygon's texture runs along the road.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureMethod {
    /// Dead-end cap: the atlas window is stretched once over the edge.
    Cap,
    /// Body: the texture repeats every `v_distance` along the road.
    Tiled,
}

/// Where and how a texture lies on a generated polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct TexturePlacement {
    pub method: TextureMethod,
    pub material: String,
    /// Node the texture runs away from.
    pub reference: Point2,
    /// True heading of the texture's v axis, in degrees.
    pub heading: f64,
    /// Road width in metres.
    pub width: f64,
    /// Ground length of the edge in metres.
    pub length: f64,
    pub atlas_u: (f64, f64),
    pub atlas_v: (f64, f64),
    /// Texture repeats at `reference`.
    pub v_start: f64,
    /// Texture repeats at the far node.
    pub v_end: f64,
}

impl TexturePlacement {
    /// Texture coordinates of a point given as its ground offset in metres
    /// (east, north) from `reference`.
    #[must_use]
    pub fn uv(&self, offset: Vector2) -> (f64, f64) {
        let rad = self.heading.to_radians();
        let along = offset.dot(&Vector2::new(rad.sin(), rad.cos()));
        let across = offset.dot(&Vector2::new(rad.cos(), -rad.sin()));
        let s = if self.width > 0.0 { across / self.width + 0.5 } else { 0.5 };
        let t = if self.length > 0.0 { along / self.length } else { 0.0 };
        let u = lerp(self.atlas_u, s);
        let v = match self.method {
            TextureMethod::Cap => lerp(self.atlas_v, t),
            TextureMethod::Tiled => self.v_start + t * (self.v_end - self.v_start),
        };
        (u, v)
    }
}

fn lerp((a, b): (f64, f64), t: f64) -> f64 {
    a + (b - a) * t
}

/// Stretch factor that makes a whole number of repeats fit `length`.
///
/// Rounds the repeat count down (stretching the texture) when the
/// remainder is at most half a repeat, up otherwise, with at least one
/// repeat.
#[must_use]
pub fn repeat_ratio(length: f64, v_distance: f64) -> f64 {
    let repeats = length / v_distance;
    let whole = repeats.floor();
    let n = if repeats - whole <= 0.5 { whole } else { whole + 1.0 };
    length / (n.max(1.0) * v_distance)
}

impl IntersectionEdge {
    /// Assigns a texture running away from the start (`originating`) or end
    /// node, beginning at `v_start` repeats. Returns the repeat count at the
    /// far node.
    pub fn apply_texture(
        &mut self,
        originating: bool,
        v_start: f64,
        ratio: f64,
        info: &TexInfo,
        method: TextureMethod,
        coordinates: CoordinateSystem,
    ) -> f64 {
        let (from, to) = if originating {
            (self.start_point().to_point2(), self.end_point().to_point2())
        } else {
            (self.end_point().to_point2(), self.start_point().to_point2())
        };
        let length = coordinates.distance(from, to);
        let (v_start, v_end) = match method {
            TextureMethod::Cap => (0.0, 1.0),
            TextureMethod::Tiled => (v_start, v_start + length / (info.v_distance * ratio)),
        };
        self.texture = Some(TexturePlacement {
            method,
            material: info.material.clone(),
            reference: from,
            heading: coordinates.heading(from, to),
            width: self.width(),
            length,
            atlas_u: info.atlas_u,
            atlas_v: info.atlas_v,
            v_start,
            v_end,
        });
        self.flags |= FLAGS_TEXTURED;
        trace!(edge = self.label(), ?method, v_start, v_end, "edge textured");
        v_end
    }
}

/// One edge of a texture chain, entered from `from`.
#[derive(Debug, Clone, Copy)]
struct Link {
    edge: EdgeId,
    from: NodeId,
}

impl IntersectionGraph {
    /// Marks the nodes where texture chains start and stop: junctions, dead
    /// ends, neighbours of dead ends and changes of road category.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena is inconsistent.
    pub fn check_endpoints(&mut self) -> Result<usize> {
        let mut endpoints = 0;
        for id in self.node_ids() {
            let endpoint = self.is_texture_endpoint(id)?;
            self.node_mut(id)?.set_endpoint(endpoint);
            endpoints += usize::from(endpoint);
        }
        debug!(endpoints, "texture endpoints");
        Ok(endpoints)
    }

    fn is_texture_endpoint(&self, id: NodeId) -> Result<bool> {
        let node = self.node(id)?;
        if node.degree() != 2 {
            return Ok(true);
        }
        let mut kinds = Vec::with_capacity(2);
        for info in node.edges() {
            let edge = self.edge(info.edge())?;
            if self.node(edge.other_node(id))?.degree() == 1 {
                return Ok(true);
            }
            kinds.push(edge.kind());
        }
        Ok(kinds[0] != kinds[1])
    }

    /// True if the edge was made a dead-end cap by
    /// [`add_cap_edges`](Self::add_cap_edges).
    ///
    /// # Errors
    ///
    /// Returns an error if the edge is stale.
    pub fn is_cap_edge(&self, id: EdgeId) -> Result<bool> {
        Ok(self.edge(id)?.is_cap())
    }

    /// Textures every untextured chain leaving the endpoint `node`.
    ///
    /// Body chains get a stretch ratio so that a whole number of repeats
    /// spans the chain; caps get the atlas window once. Returns the number
    /// of edges textured.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena is inconsistent.
    pub fn texture_edges<F>(&mut self, node: NodeId, tex_info: &F) -> Result<usize>
    where
        F: Fn(u32, bool) -> Option<TexInfo>,
    {
        let coordinates = self.coordinates();
        let infos = self.node(node)?.edges().to_vec();
        let mut textured = 0;
        for info in infos {
            if self.edge(info.edge())?.flags() & FLAGS_TEXTURED != 0 {
                continue;
            }
            let chain = self.chain_from(node, info.edge())?;
            let mut is_cap = false;
            let mut lengths = Vec::with_capacity(chain.len());
            for link in &chain {
                is_cap |= self.is_cap_edge(link.edge)?;
                let e = self.edge(link.edge)?;
                lengths.push(coordinates.distance(e.start_point().to_point2(), e.end_point().to_point2()));
            }
            let kind = self.edge(info.edge())?.kind();
            let Some(tex) = tex_info(kind, is_cap) else {
                warn!(kind, is_cap, "no texture for road category");
                continue;
            };

            let (method, ratio) = if is_cap {
                (TextureMethod::Cap, 1.0)
            } else {
                let total: f64 = lengths.iter().sum();
                if !(tex.v_distance.is_finite() && tex.v_distance > 0.0) {
                    warn!(kind, v_distance = tex.v_distance, "invalid texture repeat length");
                    continue;
                }
                (TextureMethod::Tiled, repeat_ratio(total, tex.v_distance))
            };

            let mut v = 0.0;
            self.node_mut(node)?.set_start_v(v);
            for link in &chain {
                let edge = self.edge_mut(link.edge)?;
                let originating = edge.start() == link.from;
                let far = edge.other_node(link.from);
                v = edge.apply_texture(originating, v, ratio, &tex, method, coordinates);
                self.node_mut(far)?.set_start_v(v);
                textured += 1;
            }
        }
        Ok(textured)
    }

    /// Textures chains that close on themselves without an endpoint by
    /// promoting one of their nodes. Returns the number of promoted nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the arena is inconsistent.
    pub fn texture_loops<F>(&mut self, tex_info: &F) -> Result<usize>
    where
        F: Fn(u32, bool) -> Option<TexInfo>,
    {
        let mut promoted = 0;
        for id in self.edge_ids() {
            let edge = self.edge(id)?;
            if edge.flags() & FLAGS_TEXTURED != 0 {
                continue;
            }
            let start = edge.start();
            if self.node(start)?.is_endpoint() {
                continue;
            }
            self.node_mut(start)?.set_endpoint(true);
            promoted += 1;
            self.texture_edges(start, tex_info)?;
        }
        if promoted > 0 {
            debug!(promoted, "texture loops promoted");
        }
        Ok(promoted)
    }

    /// Edges from `start` along `first` through plain degree-2 nodes to the
    /// next endpoint, or back to `start`.
    fn chain_from(&self, start: NodeId, first: EdgeId) -> Result<Vec<Link>> {
        let mut chain = Vec::new();
        let (mut node, mut edge) = (start, first);
        loop {
            chain.push(Link { edge, from: node });
            let far = self.edge(edge)?.other_node(node);
            let far_node = self.node(far)?;
            if far == start || far_node.is_endpoint() || chain.len() >= self.edge_count() {
                break;
            }
            let Some(next) = far_node.edges().iter().find(|e| e.edge() != edge) else {
                break;
            };
            edge = next.edge();
            node = far;
        }
        Ok(chain)
    }
}
