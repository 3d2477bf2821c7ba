#![allow(clippy::unwrap_used)]

mod common;

use approx::assert_abs_diff_eq;
use geo::{Area, BooleanOps, LineString, Polygon};
use roadskel::constraint::ConstraintShape;
use roadskel::geometry::{Line, Linear};
use roadskel::intersection::{
    CornerPosition, IntersectionGraph, FLAGS_INTERSECT_CONSTRAINTS_COMPLETE, FLAGS_TEXTURED,
};
use roadskel::math::exact::to_f64;
use roadskel::math::{CoordinateSystem, ExactPoint, Point2};
use roadskel::network::CleanReport;
use roadskel::{GeneratorConfig, IntersectionGenerator, NetworkConfig, RoadPolygon, SegmentNetwork};

use common::{init_tracing, tex};

fn p(x: f64, y: f64) -> ExactPoint {
    ExactPoint::from_f64(x, y).unwrap()
}

fn outline(polygon: &RoadPolygon) -> Polygon<f64> {
    let ring: Vec<(f64, f64)> = polygon.points.iter().map(|q| (q.x, q.y)).collect();
    Polygon::new(LineString::from(ring), vec![])
}

fn side_line(shape: &ConstraintShape) -> &Line {
    match shape {
        ConstraintShape::Line(line) => line,
        other => panic!("side is not a line: {other:?}"),
    }
}

#[test]
fn sides_are_parallel_and_one_width_apart() {
    let mut g = IntersectionGraph::new(CoordinateSystem::Projected);
    let ids = [
        g.add_edge(&p(0.0, 0.0), &p(30.0, 40.0), 8.0, 1).unwrap(),
        g.add_edge(&p(30.0, 40.0), &p(-12.5, 71.25), 5.5, 2).unwrap(),
    ];
    for id in ids {
        let e = g.edge(id).unwrap();
        let centre = Line::through(e.start_point(), e.end_point()).unwrap();
        let left = side_line(e.side_left().shape());
        let right = side_line(e.side_right().shape());
        assert!(left.is_parallel(&centre) && right.is_parallel(&centre));
        let gap = to_f64(&right.squared_distance(left.point())).sqrt();
        assert_abs_diff_eq!(gap, e.width(), epsilon = 1e-9);
        let half = to_f64(&centre.squared_distance(left.point())).sqrt();
        assert_abs_diff_eq!(half, e.width() / 2.0, epsilon = 1e-9);
        assert!(left.direction().is_parallel(&e.direction()));
    }
}

#[test]
fn clean_is_stable_once_applied() {
    let mut n = SegmentNetwork::new(NetworkConfig::projected()).unwrap();
    n.add(Point2::new(0.0, 0.0), Point2::new(30.0, 0.0), 6.0, 1).unwrap();
    n.add(Point2::new(30.1, 0.1), Point2::new(30.0, 40.0), 6.0, 1).unwrap();
    n.add(Point2::new(29.9, -0.1), Point2::new(60.0, 0.0), 6.0, 2).unwrap();
    n.add(Point2::new(60.0, 0.0), Point2::new(60.04, 0.03), 6.0, 2).unwrap();
    n.clean();
    let mut first: Vec<_> = n.generate_output().into_iter().map(|e| (e.source, e.target)).collect();
    first.sort();

    assert_eq!(n.cluster(), 0);
    let (edges, report) = n.clean();
    assert_eq!(report, CleanReport::default());
    let mut second: Vec<_> = edges.into_iter().map(|e| (e.source, e.target)).collect();
    second.sort();
    assert_eq!(first, second);
}

#[test]
fn cleaning_leaves_no_short_dangling_edges() {
    let config = NetworkConfig {
        cluster_tolerance_m: 0.01,
        ..NetworkConfig::projected()
    };
    let mut n = SegmentNetwork::new(config).unwrap();
    n.add(Point2::new(-50.0, 0.0), Point2::new(50.0, 0.0), 8.0, 1).unwrap();
    n.add(Point2::new(0.0, 0.0), Point2::new(0.03, -0.04), 8.0, 1).unwrap();
    n.add(Point2::new(0.0, 40.0), Point2::new(0.0, 2.0), 8.0, 2).unwrap();
    n.add(Point2::new(50.0, 0.0), Point2::new(50.06, 0.0), 8.0, 1).unwrap();
    n.clean();

    let arr = n.arrangement();
    for (_, v) in arr.vertices().filter(|(_, v)| v.degree() == 1) {
        let c = arr.curve(v.curves()[0]).unwrap();
        let a = arr.point(c.source).unwrap().to_point2();
        let b = arr.point(c.target).unwrap().to_point2();
        assert!((b - a).norm() >= config.finger_length_m, "short finger at {}", v.point);
    }
}

#[test]
fn dispatch_and_ordering_hold_after_capping() {
    let mut g = IntersectionGraph::new(CoordinateSystem::Projected);
    for &(x, y) in &[(40.0, 3.0), (-5.0, 30.0), (-25.0, -25.0), (10.0, -35.0), (-40.0, 1.0)] {
        g.add_edge(&p(0.0, 0.0), &p(x, y), 6.0, 1).unwrap();
    }
    g.add_cap_edges(1.0).unwrap();
    for id in g.node_ids() {
        g.constrain_edges(id).unwrap();
    }

    for (_, node) in g.nodes() {
        let headings: Vec<f64> = node.edges().iter().map(|e| e.heading()).collect();
        assert!(headings.windows(2).all(|w| w[0] < w[1]), "{headings:?}");
        if node.degree() > 1 {
            for info in node.edges() {
                let prev = node.prev_edge_info(info.edge()).unwrap().edge();
                assert_eq!(node.next_edge_info(prev).unwrap().edge(), info.edge());
            }
        }

        let mut descriptions = Vec::new();
        for info in node.edges() {
            let e = g.edge(info.edge()).unwrap();
            for right in [false, true] {
                let corner = e.corner(CornerPosition::at_node(info.originating(), right));
                descriptions.extend(corner.constraints().iter().map(|c| c.description().to_string()));
            }
        }
        assert_eq!(descriptions.len(), 2 * node.degree());
        let prefix = if node.degree() == 1 { "cap" } else { "bisect" };
        assert!(descriptions.iter().all(|d| d.starts_with(prefix)), "{descriptions:?}");
    }
}

#[test]
fn every_surviving_edge_is_complete_and_textured() {
    init_tracing();
    let mut gen = IntersectionGenerator::new(GeneratorConfig::projected(), tex).unwrap();
    let grid = [
        ((0.0, 0.0), (60.0, 0.0)),
        ((60.0, 0.0), (120.0, 2.0)),
        ((60.0, 0.0), (60.0, 50.0)),
        ((0.0, 0.0), (0.0, 50.0)),
        ((0.0, 50.0), (60.0, 50.0)),
        ((60.0, 50.0), (95.0, 85.0)),
        ((0.0, 0.0), (-40.0, -30.0)),
    ];
    for ((ax, ay), (bx, by)) in grid {
        gen.insert(Point2::new(ax, ay), Point2::new(bx, by), 7.0, 1).unwrap();
    }
    let out = gen.run().unwrap();
    let graph = gen.graph();
    assert_eq!(out.polygons.len(), graph.edge_count());
    for (_, e) in graph.edges() {
        assert!(e.verify(FLAGS_INTERSECT_CONSTRAINTS_COMPLETE | FLAGS_TEXTURED));
        assert!(e.polygon().len() >= 3);
    }
    for polygon in &out.polygons {
        assert!(polygon.points.len() >= 3);
    }
}

#[test]
fn output_polygons_do_not_overlap() {
    init_tracing();
    let s = 40.0 * 120f64.to_radians().sin();
    let mut gen = IntersectionGenerator::new(GeneratorConfig::projected(), tex).unwrap();
    for end in [Point2::new(0.0, 40.0), Point2::new(s, -20.0), Point2::new(-s, -20.0)] {
        gen.insert(Point2::origin(), end, 8.0, 1).unwrap();
    }
    gen.insert(Point2::new(0.0, 40.0), Point2::new(50.0, 60.0), 8.0, 2).unwrap();
    gen.insert(Point2::new(0.0, 40.0), Point2::new(-45.0, 70.0), 8.0, 1).unwrap();
    let out = gen.run().unwrap();
    assert_eq!(out.stats.dropped_edges, 0);

    let shapes: Vec<Polygon<f64>> = out.polygons.iter().map(outline).collect();
    for (i, a) in shapes.iter().enumerate() {
        assert!(a.unsigned_area() > 0.0);
        for (j, b) in shapes.iter().enumerate().skip(i + 1) {
            let shared = a.intersection(b).unsigned_area();
            assert!(
                shared < 1e-6,
                "polygons {} and {} overlap by {shared} m2",
                out.polygons[i].edge_label,
                out.polygons[j].edge_label
            );
        }
    }
}

#[test]
fn geodetic_clean_leaves_no_short_fingers() {
    let config = NetworkConfig::default();
    let mut n = SegmentNetwork::new(config).unwrap();
    // Ends about 8 cm east of the meridian at 60 degrees north.
    n.add(Point2::new(-0.01, 60.0), Point2::new(0.000_001_4, 60.0), 8.0, 1).unwrap();
    n.add(Point2::new(0.0, 60.0005), Point2::new(0.0, 60.000_018), 8.0, 2).unwrap();
    let (edges, report) = n.clean();
    assert_eq!(edges.len(), 2);
    assert_eq!(report.extended_fingers, 1);

    let arr = n.arrangement();
    for (_, v) in arr.vertices().filter(|(_, v)| v.degree() == 1) {
        let c = arr.curve(v.curves()[0]).unwrap();
        let a = arr.point(c.source).unwrap().to_point2();
        let b = arr.point(c.target).unwrap().to_point2();
        let length = config.coordinates.distance(a, b);
        assert!(length >= config.finger_length_m, "short finger of {length:.3} m at {}", v.point);
    }
}

#[test]
fn geodetic_roads_are_measured_in_metres() {
    init_tracing();
    let config = GeneratorConfig::default();
    assert_eq!(config.network.coordinates, CoordinateSystem::Geodetic);
    let mut gen = IntersectionGenerator::new(config, tex).unwrap();
    // Roughly 220 m east along the 47th parallel.
    gen.insert(Point2::new(8.0, 47.0), Point2::new(8.003, 47.0), 8.0, 1).unwrap();
    let out = gen.run().unwrap();
    assert_eq!(out.stats.caps_added, 2);
    let body = out.polygons.iter().find(|p| !p.is_cap).unwrap();
    assert_abs_diff_eq!(body.texture.width, 8.0);
    let total = CoordinateSystem::Geodetic.distance(Point2::new(8.0, 47.0), Point2::new(8.003, 47.0));
    assert_abs_diff_eq!(body.texture.length, total - 2.0, epsilon = 0.05);
}
