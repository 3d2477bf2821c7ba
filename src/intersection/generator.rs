use std::collections::BTreeSet;
use std::fmt;

use tracing::span::EnteredSpan;
use tracing::{debug, debug_span, info, warn};

use crate::error::{IntersectionError, Result};
use crate::math::{ExactPoint, Point2};
use crate::network::{positive, CleanReport, NetworkConfig, SegmentNetwork};
use crate::tessellation::{TessellatePolygon, TriangleMesh};

use super::edge::{FLAGS_INTERSECT_CONSTRAINTS_COMPLETE, FLAGS_TEXTURED};
use super::texture::{TexInfo, TextureMethod, TexturePlacement};
use super::{EdgeId, IntersectionGraph};

/// Parameters of one generator run. Lengths are in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    pub network: NetworkConfig,
    /// Length of the cap edge split off every dead end.
    pub cap_length_m: f64,
    /// Distance from the start node of the marker that picks an edge's face.
    pub marker_offset_m: f64,
    /// Attach a textured triangle mesh to every output polygon.
    pub tessellate: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            cap_length_m: 1.0,
            marker_offset_m: 0.05,
            tessellate: true,
        }
    }
}

impl GeneratorConfig {
    /// Default parameters over planar metre coordinates.
    #[must_use]
    pub fn projected() -> Self {
        Self {
            network: NetworkConfig::projected(),
            ..Self::default()
        }
    }

    /// Checks every tolerance of the run.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::InvalidConfig` naming the first bad parameter.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        positive("cap_length_m", self.cap_length_m)?;
        positive("marker_offset_m", self.marker_offset_m)
    }
}

/// Passes of a generator run, in the order they execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorState {
    Insert,
    Clean,
    BuildNodesEdges,
    AddCapEdges,
    ConstrainEdges,
    GenerateEdges,
    VerifyBottomTop,
    CompleteSpecialIntersections,
    VerifyCompleted,
    Complete,
    CheckEndpoint,
    TextureEdges,
    VerifyTextured,
    Tessellate,
    Done,
}

impl GeneratorState {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            GeneratorState::Insert => "insert",
            GeneratorState::Clean => "clean",
            GeneratorState::BuildNodesEdges => "build nodes and edges",
            GeneratorState::AddCapEdges => "add cap edges",
            GeneratorState::ConstrainEdges => "constrain edges",
            GeneratorState::GenerateEdges => "generate edges",
            GeneratorState::VerifyBottomTop => "verify bottom and top",
            GeneratorState::CompleteSpecialIntersections => "complete special intersections",
            GeneratorState::VerifyCompleted => "verify completed intersections",
            GeneratorState::Complete => "complete",
            GeneratorState::CheckEndpoint => "check endpoints",
            GeneratorState::TextureEdges => "texture edges",
            GeneratorState::VerifyTextured => "verify textured",
            GeneratorState::Tessellate => "tessellate",
            GeneratorState::Done => "done",
        }
    }
}

impl fmt::Display for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counts collected over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    pub inserted_segments: usize,
    pub cleaned_edges: usize,
    pub nodes: usize,
    pub edges: usize,
    pub caps_added: usize,
    pub dropped_edges: usize,
    pub multi_segment_corners: usize,
    /// Polygons left without a mesh because triangulation failed.
    pub untessellated: usize,
    pub clean: CleanReport,
}

/// One finished road polygon.
#[derive(Debug, Clone)]
pub struct RoadPolygon {
    pub edge_label: u64,
    pub kind: u32,
    pub width: f64,
    pub zorder: u32,
    /// Dead-end cap rather than road body.
    pub is_cap: bool,
    /// Outline in input coordinates, counter-clockwise.
    pub points: Vec<Point2>,
    pub exact: Vec<ExactPoint>,
    pub texture: TexturePlacement,
    pub mesh: Option<TriangleMesh>,
}

/// Result of [`IntersectionGenerator::run`].
#[derive(Debug, Clone, Default)]
pub struct GeneratorOutput {
    pub polygons: Vec<RoadPolygon>,
    pub stats: GeneratorStats,
}

/// Turns road centrelines into textured road polygons.
///
/// Segments are collected with [`insert`](Self::insert); [`run`](Self::run)
/// then executes every pass once, in order. Edges whose junctions cannot be
/// resolved are dropped and counted rather than failing the run.
pub struct IntersectionGenerator<F> {
    config: GeneratorConfig,
    tex_info: F,
    network: SegmentNetwork,
    graph: IntersectionGraph,
    state: GeneratorState,
    stats: GeneratorStats,
}

impl<F> fmt::Debug for IntersectionGenerator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntersectionGenerator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<F> IntersectionGenerator<F>
where
    F: Fn(u32, bool) -> Option<TexInfo>,
{
    /// Creates a generator. `tex_info` maps a road category and whether the
    /// polygon is a dead-end cap to its texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: GeneratorConfig, tex_info: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tex_info,
            network: SegmentNetwork::new(config.network)?,
            graph: IntersectionGraph::new(config.network.coordinates),
            state: GeneratorState::Insert,
            stats: GeneratorStats::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    #[must_use]
    pub fn graph(&self) -> &IntersectionGraph {
        &self.graph
    }

    /// Adds one road centreline segment of `width` metres.
    ///
    /// # Errors
    ///
    /// Returns an error once the run has started, or for an invalid segment.
    pub fn insert(&mut self, source: Point2, target: Point2, width: f64, kind: u32) -> Result<()> {
        self.expect_state(GeneratorState::Insert)?;
        self.network.add(source, target, width, kind)?;
        self.stats.inserted_segments += 1;
        Ok(())
    }

    /// Runs every pass and returns the surviving polygons.
    ///
    /// # Errors
    ///
    /// Returns an error if called twice or if the arena becomes inconsistent.
    /// Geometric failures only drop the affected edges.
    #[allow(clippy::too_many_lines)]
    pub fn run(&mut self) -> Result<GeneratorOutput> {
        self.expect_state(GeneratorState::Insert)?;
        let marker_units = self.config.network.coordinates.metres_to_units(self.config.marker_offset_m);

        let span = self.advance(GeneratorState::Clean);
        let (cleaned, report) = self.network.clean();
        self.stats.cleaned_edges = cleaned.len();
        self.stats.clean = report;
        drop(span);

        let span = self.advance(GeneratorState::BuildNodesEdges);
        for e in &cleaned {
            if let Err(err) = self.graph.add_edge(&e.source, &e.target, e.width, e.kind) {
                warn!(%err, source = %e.source, target = %e.target, "network edge skipped");
            }
        }
        debug!(nodes = self.graph.node_count(), edges = self.graph.edge_count(), "graph built");
        drop(span);

        let span = self.advance(GeneratorState::AddCapEdges);
        self.stats.caps_added = self.graph.add_cap_edges(self.config.cap_length_m)?;
        self.stats.nodes = self.graph.node_count();
        self.stats.edges = self.graph.edge_count();
        drop(span);

        let span = self.advance(GeneratorState::ConstrainEdges);
        let mut constrained = 0;
        for node in self.graph.node_ids() {
            constrained += self.graph.constrain_edges(node)?;
        }
        debug!(corners = constrained, "corners constrained");
        drop(span);

        let span = self.advance(GeneratorState::GenerateEdges);
        let mut generated = 0;
        for node in self.graph.node_ids() {
            generated += self.graph.generate_edges(node, marker_units)?;
        }
        debug!(generated, "edges generated");
        drop(span);

        let span = self.advance(GeneratorState::VerifyBottomTop);
        self.drop_failed(FLAGS_INTERSECT_CONSTRAINTS_COMPLETE)?;
        drop(span);

        let span = self.advance(GeneratorState::CompleteSpecialIntersections);
        let mut dirty = BTreeSet::new();
        for node in self.graph.node_ids() {
            for walk in self.graph.complete_special_intersections(node)? {
                self.stats.multi_segment_corners += 1;
                dirty.extend(walk.edges);
            }
        }
        self.regenerate(&dirty, marker_units)?;
        drop(span);

        let span = self.advance(GeneratorState::VerifyCompleted);
        self.drop_failed(FLAGS_INTERSECT_CONSTRAINTS_COMPLETE)?;
        drop(span);

        let span = self.advance(GeneratorState::Complete);
        for id in self.graph.edge_ids() {
            self.graph.edge_mut(id)?.complete();
        }
        drop(span);

        let span = self.advance(GeneratorState::CheckEndpoint);
        self.graph.check_endpoints()?;
        drop(span);

        let span = self.advance(GeneratorState::TextureEdges);
        let mut textured = 0;
        for node in self.graph.node_ids() {
            if self.graph.node(node)?.is_endpoint() {
                textured += self.graph.texture_edges(node, &self.tex_info)?;
            }
        }
        self.graph.texture_loops(&self.tex_info)?;
        debug!(textured, "edges textured");
        drop(span);

        let span = self.advance(GeneratorState::VerifyTextured);
        self.drop_failed(FLAGS_INTERSECT_CONSTRAINTS_COMPLETE | FLAGS_TEXTURED)?;
        let mut polygons = self.collect();
        drop(span);

        if self.config.tessellate {
            let span = self.advance(GeneratorState::Tessellate);
            let coordinates = self.config.network.coordinates;
            for polygon in &mut polygons {
                let meshed = TessellatePolygon::new(polygon).execute(coordinates);
                match meshed {
                    Ok(mesh) => polygon.mesh = Some(mesh),
                    Err(err) => {
                        warn!(edge = polygon.edge_label, %err, "polygon left untessellated");
                        self.stats.untessellated += 1;
                    }
                }
            }
            drop(span);
        }

        self.state = GeneratorState::Done;
        info!(
            polygons = polygons.len(),
            dropped = self.stats.dropped_edges,
            multi_segment = self.stats.multi_segment_corners,
            "road polygons generated"
        );
        Ok(GeneratorOutput {
            polygons,
            stats: self.stats,
        })
    }

    fn expect_state(&self, expected: GeneratorState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(IntersectionError::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            }
            .into())
        }
    }

    fn advance(&mut self, next: GeneratorState) -> EnteredSpan {
        debug!(from = %self.state, to = %next, "generator state");
        self.state = next;
        debug_span!("pass", state = next.name()).entered()
    }

    /// Detaches every edge missing a bit of `mask`.
    fn drop_failed(&mut self, mask: u32) -> Result<usize> {
        let mut dropped = 0;
        for id in self.graph.edge_ids() {
            let edge = self.graph.edge(id)?;
            if edge.verify(mask) {
                continue;
            }
            warn!(edge = edge.label(), state = %self.state, "dropping unresolved edge");
            self.graph.detach_edge(id)?;
            dropped += 1;
        }
        self.stats.dropped_edges += dropped;
        Ok(dropped)
    }

    /// Rebuilds the polygons of edges whose corners were replaced.
    fn regenerate(&mut self, dirty: &BTreeSet<EdgeId>, marker_units: f64) -> Result<()> {
        for &id in dirty {
            let edge = self.graph.edge_mut(id)?;
            edge.clear_generated();
            edge.generate(marker_units);
        }
        if !dirty.is_empty() {
            debug!(edges = dirty.len(), "edges regenerated after multi-segment walks");
        }
        Ok(())
    }

    fn collect(&self) -> Vec<RoadPolygon> {
        let mut polygons = Vec::with_capacity(self.graph.edge_count());
        for (_, edge) in self.graph.edges() {
            let Some(texture) = edge.texture() else {
                continue;
            };
            polygons.push(RoadPolygon {
                edge_label: edge.label(),
                kind: edge.kind(),
                width: edge.width(),
                zorder: edge.zorder(),
                is_cap: texture.method == TextureMethod::Cap,
                points: edge.polygon().iter().map(ExactPoint::to_point2).collect(),
                exact: edge.polygon().to_vec(),
                texture: texture.clone(),
                mesh: None,
            });
        }
        polygons.sort_by_key(|p| (p.zorder, p.edge_label));
        polygons
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn tex(_kind: u32, is_cap: bool) -> Option<TexInfo> {
        Some(TexInfo {
            material: if is_cap { "cap".into() } else { "asphalt".into() },
            atlas_u: (0.0, 1.0),
            atlas_v: (0.0, 1.0),
            v_distance: 6.0,
        })
    }

    #[test]
    fn config_is_validated() {
        assert!(GeneratorConfig::default().validate().is_ok());
        let bad = GeneratorConfig {
            cap_length_m: 0.0,
            ..GeneratorConfig::projected()
        };
        assert!(IntersectionGenerator::new(bad, tex).is_err());
    }

    #[test]
    fn isolated_road_is_capped_at_both_ends() {
        let mut g = IntersectionGenerator::new(GeneratorConfig::projected(), tex).unwrap();
        g.insert(Point2::new(0.0, 0.0), Point2::new(20.0, 0.0), 8.0, 1).unwrap();
        let out = g.run().unwrap();
        assert_eq!(g.state(), GeneratorState::Done);
        assert_eq!(out.stats.caps_added, 2);
        assert_eq!(out.stats.dropped_edges, 0);
        assert_eq!(out.polygons.len(), 3);
        assert_eq!(out.polygons.iter().filter(|p| p.is_cap).count(), 2);

        let body = out.polygons.iter().find(|p| !p.is_cap).unwrap();
        assert_eq!(body.texture.method, TextureMethod::Tiled);
        assert_eq!(body.points.len(), 4);
        for p in &body.points {
            assert!((p.x - 1.0).abs() < 1e-9 || (p.x - 19.0).abs() < 1e-9, "{p:?}");
            assert_abs_diff_eq!(p.y.abs(), 4.0, epsilon = 1e-9);
        }
        // 18 m over 6 m tiles: three whole repeats.
        assert_abs_diff_eq!(body.texture.v_end - body.texture.v_start, 3.0, epsilon = 1e-9);

        let mesh = body.mesh.as_ref().unwrap();
        assert_eq!(mesh.indices.len(), 2);
        assert_eq!(out.stats.untessellated, 0);
        let (lo, hi) = mesh.uvs.iter().fold((f64::MAX, f64::MIN), |(lo, hi), uv| (lo.min(uv.y), hi.max(uv.y)));
        assert_abs_diff_eq!(hi - lo, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn meshes_are_optional() {
        let config = GeneratorConfig {
            tessellate: false,
            ..GeneratorConfig::projected()
        };
        let mut g = IntersectionGenerator::new(config, tex).unwrap();
        g.insert(Point2::new(0.0, 0.0), Point2::new(20.0, 0.0), 8.0, 1).unwrap();
        let out = g.run().unwrap();
        assert_eq!(out.polygons.len(), 3);
        assert!(out.polygons.iter().all(|p| p.mesh.is_none()));
    }

    #[test]
    fn insert_after_run_is_rejected() {
        let mut g = IntersectionGenerator::new(GeneratorConfig::projected(), tex).unwrap();
        g.insert(Point2::new(0.0, 0.0), Point2::new(20.0, 0.0), 8.0, 1).unwrap();
        g.run().unwrap();
        assert!(g.insert(Point2::new(0.0, 5.0), Point2::new(20.0, 5.0), 8.0, 1).is_err());
        assert!(g.run().is_err());
    }

    #[test]
    fn missing_texture_drops_the_edge() {
        let only_caps = |_kind: u32, is_cap: bool| if is_cap { tex(1, true) } else { None };
        let mut g = IntersectionGenerator::new(GeneratorConfig::projected(), only_caps).unwrap();
        g.insert(Point2::new(0.0, 0.0), Point2::new(20.0, 0.0), 8.0, 1).unwrap();
        let out = g.run().unwrap();
        assert_eq!(out.stats.dropped_edges, 1);
        assert!(out.polygons.iter().all(|p| p.is_cap));
    }
}
