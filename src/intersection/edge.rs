use num_traits::Zero;
use tracing::{error, trace, warn};

use crate::arrangement::{Arrangement, Location};
use crate::constraint::Constraint;
use crate::error::GeometryError;
use crate::geometry::{BoundingBox, Line, Ray};
use crate::math::exact::{orientation, scalar};
use crate::math::{CoordinateSystem, ExactPoint, ExactVector, Orientation, Scalar};

use super::texture::TexturePlacement;
use super::{EdgeId, NodeId};

/// Both bottom corners bound the generated polygon.
pub const FLAGS_BOTTOM_INTERSECTED: u32 = 0x1;
/// Both top corners bound the generated polygon.
pub const FLAGS_TOP_INTERSECTED: u32 = 0x2;
/// Bottom and top together.
pub const FLAGS_INTERSECT_CONSTRAINTS_COMPLETE: u32 = 0x3;
/// A texture placement has been assigned.
pub const FLAGS_TEXTURED: u32 = 0x4;

// Curve tags in the scratch arrangement built by `generate`.
const TAG_BOT_LEFT: u32 = 0x01;
const TAG_BOT_RIGHT: u32 = 0x02;
const TAG_TOP_LEFT: u32 = 0x04;
const TAG_TOP_RIGHT: u32 = 0x08;
const TAG_LEFT_SIDE: u32 = 0x10;
const TAG_RIGHT_SIDE: u32 = 0x20;
const TAG_BOUNDARY: u32 = 0x40;

/// One of the four corners of a road polygon.
///
/// Bottom corners sit at the start node, top corners at the end node; left
/// and right are relative to the direction of travel from start to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CornerPosition {
    BotLeft,
    BotRight,
    TopLeft,
    TopRight,
}

impl CornerPosition {
    pub const ALL: [CornerPosition; 4] = [
        CornerPosition::BotLeft,
        CornerPosition::BotRight,
        CornerPosition::TopLeft,
        CornerPosition::TopRight,
    ];

    /// The corner at the node an edge is seen from.
    ///
    /// `originating` is true when that node is the edge's start; `right`
    /// selects the right-hand side when looking outward from the node.
    #[must_use]
    pub fn at_node(originating: bool, right: bool) -> Self {
        match (originating, right) {
            (true, true) => CornerPosition::BotRight,
            (true, false) => CornerPosition::BotLeft,
            (false, true) => CornerPosition::TopLeft,
            (false, false) => CornerPosition::TopRight,
        }
    }

    /// The corner at the other end of the edge, on the same physical side.
    #[must_use]
    pub fn far(originating: bool, right: bool) -> Self {
        match (originating, right) {
            (true, true) => CornerPosition::TopRight,
            (true, false) => CornerPosition::TopLeft,
            (false, true) => CornerPosition::BotLeft,
            (false, false) => CornerPosition::BotRight,
        }
    }

    #[must_use]
    pub fn is_bottom(self) -> bool {
        matches!(self, CornerPosition::BotLeft | CornerPosition::BotRight)
    }

    fn index(self) -> usize {
        match self {
            CornerPosition::BotLeft => 0,
            CornerPosition::BotRight => 1,
            CornerPosition::TopLeft => 2,
            CornerPosition::TopRight => 3,
        }
    }

    fn tag(self) -> u32 {
        match self {
            CornerPosition::BotLeft => TAG_BOT_LEFT,
            CornerPosition::BotRight => TAG_BOT_RIGHT,
            CornerPosition::TopLeft => TAG_TOP_LEFT,
            CornerPosition::TopRight => TAG_TOP_RIGHT,
        }
    }
}

/// Where a constraint is stored on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintPosition {
    Corner(CornerPosition),
    LeftSide,
    RightSide,
}

impl From<CornerPosition> for ConstraintPosition {
    fn from(c: CornerPosition) -> Self {
        ConstraintPosition::Corner(c)
    }
}

/// Resolution state of one polygon corner.
#[derive(Debug, Clone, Default)]
pub enum Corner {
    #[default]
    Unconstrained,
    /// A single ray from the node.
    Single(Constraint),
    /// A chain of segments ending in a ray, spanning several edges.
    MultiSegment {
        points: Vec<ExactPoint>,
        constraints: Vec<Constraint>,
    },
    /// Constraint generation failed; the reason is kept for logging.
    Failed(String),
}

impl Corner {
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        match self {
            Corner::Single(c) => std::slice::from_ref(c),
            Corner::MultiSegment { constraints, .. } => constraints,
            Corner::Unconstrained | Corner::Failed(_) => &[],
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Corner::Single(_) | Corner::MultiSegment { .. })
    }

    /// True if any constraint of this corner passes through `p`.
    #[must_use]
    pub fn contains(&self, p: &ExactPoint) -> bool {
        self.constraints().iter().any(|c| c.contains(p))
    }
}

/// Closest hits of a bisector on an edge's far end constraint and on its side.
///
/// Each hit carries the squared distance from the bisector's source.
#[derive(Debug, Clone, Default)]
pub struct BisectorHit {
    pub end: Option<(ExactPoint, Scalar)>,
    pub side: Option<(ExactPoint, Scalar)>,
}

/// The two side lines of an edge.
#[derive(Debug, Clone)]
pub(crate) struct Sides {
    left: Line,
    right: Line,
}

/// Side lines parallel to `start -> end` at half the width on either side.
///
/// The offset is measured on the ground, so geodetic edges get metric
/// widths. The lines are exactly parallel to the centreline.
pub(crate) fn side_lines(
    start: &ExactPoint,
    end: &ExactPoint,
    width: f64,
    coordinates: CoordinateSystem,
) -> Result<Sides, GeometryError> {
    let dir = end - start;
    let offset = coordinates
        .left_offset(start.to_point2(), dir.to_vector2(), width / 2.0)
        .ok_or(GeometryError::ZeroVector)?;
    let offset = ExactVector::new(scalar(offset.x)?, scalar(offset.y)?);
    Ok(Sides {
        left: Line::new(start.translate(&offset), dir.clone())?,
        right: Line::new(start.translate(&-&offset), dir)?,
    })
}

/// One road segment between two junction nodes.
#[derive(Debug, Clone)]
pub struct IntersectionEdge {
    id: EdgeId,
    label: u64,
    start: NodeId,
    end: NodeId,
    start_point: ExactPoint,
    end_point: ExactPoint,
    width: f64,
    kind: u32,
    zorder: u32,
    is_cap: bool,
    side_l: Constraint,
    side_r: Constraint,
    corners: [Corner; 4],
    polygon: Vec<ExactPoint>,
    pub(super) texture: Option<TexturePlacement>,
    pub(super) flags: u32,
}

impl IntersectionEdge {
    pub(crate) fn new(
        id: EdgeId,
        label: u64,
        start: (NodeId, ExactPoint),
        end: (NodeId, ExactPoint),
        width: f64,
        kind: u32,
        sides: Sides,
    ) -> Self {
        Self {
            id,
            label,
            start: start.0,
            end: end.0,
            start_point: start.1,
            end_point: end.1,
            width,
            kind,
            zorder: kind,
            is_cap: false,
            side_l: Constraint::line(sides.left, Some(id), "left side"),
            side_r: Constraint::line(sides.right, Some(id), "right side"),
            corners: Default::default(),
            polygon: Vec::new(),
            texture: None,
            flags: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> EdgeId {
        self.id
    }

    #[must_use]
    pub fn label(&self) -> u64 {
        self.label
    }

    #[must_use]
    pub fn start(&self) -> NodeId {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NodeId {
        self.end
    }

    #[must_use]
    pub fn start_point(&self) -> &ExactPoint {
        &self.start_point
    }

    #[must_use]
    pub fn end_point(&self) -> &ExactPoint {
        &self.end_point
    }

    /// Exact vector from start to end.
    #[must_use]
    pub fn direction(&self) -> ExactVector {
        &self.end_point - &self.start_point
    }

    /// The end opposite `node`.
    #[must_use]
    pub fn other_node(&self, node: NodeId) -> NodeId {
        if node == self.start {
            self.end
        } else {
            self.start
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[must_use]
    pub fn kind(&self) -> u32 {
        self.kind
    }

    #[must_use]
    pub fn zorder(&self) -> u32 {
        self.zorder
    }

    /// True for the short tip split off a dead end.
    #[must_use]
    pub fn is_cap(&self) -> bool {
        self.is_cap
    }

    pub(crate) fn mark_cap(&mut self) {
        self.is_cap = true;
    }

    #[must_use]
    pub fn flags(&self) -> u32 {
        self.flags
    }

    #[must_use]
    pub fn polygon(&self) -> &[ExactPoint] {
        &self.polygon
    }

    #[must_use]
    pub fn texture(&self) -> Option<&TexturePlacement> {
        self.texture.as_ref()
    }

    #[must_use]
    pub fn side_left(&self) -> &Constraint {
        &self.side_l
    }

    #[must_use]
    pub fn side_right(&self) -> &Constraint {
        &self.side_r
    }

    pub(crate) fn move_start(&mut self, node: NodeId, point: ExactPoint) {
        self.start = node;
        self.start_point = point;
    }

    pub(crate) fn move_end(&mut self, node: NodeId, point: ExactPoint) {
        self.end = node;
        self.end_point = point;
    }

    pub(crate) fn set_sides(&mut self, sides: Sides) {
        self.side_l = Constraint::line(sides.left, Some(self.id), "left side");
        self.side_r = Constraint::line(sides.right, Some(self.id), "right side");
    }

    // --- Constraints ---

    /// Stores a constraint. A corner that already holds one is overwritten.
    pub fn add_constraint(&mut self, position: ConstraintPosition, constraint: Constraint) {
        match position {
            ConstraintPosition::LeftSide => self.side_l = constraint,
            ConstraintPosition::RightSide => self.side_r = constraint,
            ConstraintPosition::Corner(pos) => {
                let slot = &mut self.corners[pos.index()];
                if slot.is_resolved() {
                    warn!(edge = self.label, ?pos, "replacing corner constraint");
                }
                *slot = Corner::Single(constraint);
            }
        }
    }

    #[must_use]
    pub fn corner(&self, position: CornerPosition) -> &Corner {
        &self.corners[position.index()]
    }

    pub fn set_corner(&mut self, position: CornerPosition, corner: Corner) {
        self.corners[position.index()] = corner;
    }

    /// The side line on the outward `right` (or left) of this edge as seen
    /// from its start (`originating`) or end node.
    #[must_use]
    pub fn side(&self, originating: bool, right: bool) -> &Constraint {
        if originating == right {
            &self.side_r
        } else {
            &self.side_l
        }
    }

    /// Where `bisector` first meets the far end constraint and the outward
    /// side on the `right` (or left) of this edge, seen from its start
    /// (`originating`) or end node.
    #[must_use]
    pub fn intersect_with_bisector(&self, originating: bool, right: bool, bisector: &Ray) -> BisectorHit {
        let far = self.corner(CornerPosition::far(originating, right));
        let end = far
            .constraints()
            .iter()
            .filter_map(|c| c.intersect_ray(bisector))
            .min_by(|a, b| a.1.cmp(&b.1));
        let side = self.side(originating, right).intersect_ray(bisector);
        BisectorHit { end, side }
    }

    // --- Generation ---

    /// Builds the polygon bounded by the four corners and both sides.
    ///
    /// Every constraint is clipped to a box around the edge and inserted into
    /// a scratch arrangement. A marker just past the start node locates the
    /// face of this edge, whose outer boundary becomes the polygon. Returns
    /// false, leaving the polygon empty, when the face is open.
    pub fn generate(&mut self, marker_units: f64) -> bool {
        for pos in CornerPosition::ALL {
            if let Corner::Failed(reason) = self.corner(pos) {
                error!(edge = self.label, ?pos, %reason, "cannot generate: corner failed");
                return false;
            }
            if !self.corner(pos).is_resolved() {
                error!(edge = self.label, ?pos, "cannot generate: corner unconstrained");
                return false;
            }
        }

        let mut tagged: Vec<(&Constraint, u32)> = Vec::new();
        for pos in CornerPosition::ALL {
            for c in self.corner(pos).constraints() {
                tagged.push((c, pos.tag()));
            }
        }
        tagged.push((&self.side_l, TAG_LEFT_SIDE));
        tagged.push((&self.side_r, TAG_RIGHT_SIDE));

        let mut points = vec![self.start_point.clone(), self.end_point.clone()];
        for (i, (a, _)) in tagged.iter().enumerate() {
            points.extend(a.defining_points());
            for (b, _) in &tagged[i + 1..] {
                if let Some(p) = a.intersect(b).point() {
                    points.push(p);
                }
            }
        }
        let Some(tight) = BoundingBox::from_points(&points) else {
            return false;
        };
        let bbox = tight.expanded(&tight.extent());

        let mut scratch: Arrangement<u32> = Arrangement::new();
        for (c, tag) in &tagged {
            let Some(piece) = c.clip(&bbox) else {
                trace!(edge = self.label, constraint = %c, "constraint outside generation box");
                continue;
            };
            if let Err(err) = scratch.insert_segment(piece.source(), piece.target(), *tag) {
                error!(edge = self.label, %err, "inserting constraint failed");
                return false;
            }
        }
        let box_corners = bbox.corners();
        for i in 0..4 {
            let (a, b) = (&box_corners[i], &box_corners[(i + 1) % 4]);
            if let Err(err) = scratch.insert_segment(a, b, TAG_BOUNDARY) {
                error!(edge = self.label, %err, "inserting generation box failed");
                return false;
            }
        }

        let dir = self.direction();
        let length = dir.approx_length();
        let Ok(t) = scalar((marker_units / length).min(0.25)) else {
            return false;
        };
        let marker = self.start_point.offset(&dir, &t);

        let faces = scratch.faces();
        let face = match scratch.locate(&marker, &faces) {
            Location::Face(f) if !f.is_unbounded() => f,
            other => {
                error!(edge = self.label, at = %marker, ?other, "marker is not inside a bounded face");
                return false;
            }
        };
        let Some(boundary) = faces.outer_boundary(face) else {
            error!(edge = self.label, "face has no outer boundary");
            return false;
        };
        let mut tags = 0;
        for h in &boundary {
            match scratch.curve(h.curve) {
                Some(c) => tags |= c.data,
                None => {
                    error!(edge = self.label, "face boundary references a missing curve");
                    return false;
                }
            }
        }
        if tags & TAG_BOUNDARY != 0 {
            error!(edge = self.label, "face reaches the generation box");
            return false;
        }
        let Some(outline) = scratch.face_outline(face, &faces) else {
            return false;
        };

        self.polygon = outline;
        if tags & (TAG_BOT_LEFT | TAG_BOT_RIGHT) == TAG_BOT_LEFT | TAG_BOT_RIGHT {
            self.flags |= FLAGS_BOTTOM_INTERSECTED;
        }
        if tags & (TAG_TOP_LEFT | TAG_TOP_RIGHT) == TAG_TOP_LEFT | TAG_TOP_RIGHT {
            self.flags |= FLAGS_TOP_INTERSECTED;
        }
        trace!(edge = self.label, vertices = self.polygon.len(), tags, "edge generated");
        true
    }

    /// Forgets the generated polygon and the intersection flags.
    pub fn clear_generated(&mut self) {
        self.polygon.clear();
        self.flags &= !FLAGS_INTERSECT_CONSTRAINTS_COMPLETE;
    }

    /// Checks that every bit of `mask` is set, logging each missing one.
    #[must_use]
    pub fn verify(&self, mask: u32) -> bool {
        let missing = mask & !self.flags;
        if missing & FLAGS_BOTTOM_INTERSECTED != 0 {
            warn!(edge = self.label, "bottom constraints not intersected");
        }
        if missing & FLAGS_TOP_INTERSECTED != 0 {
            warn!(edge = self.label, "top constraints not intersected");
        }
        if missing & FLAGS_TEXTURED != 0 {
            warn!(edge = self.label, "edge not textured");
        }
        missing == 0
    }

    /// Drops repeated and exactly collinear vertices from the polygon.
    pub fn complete(&mut self) {
        let mut pts = std::mem::take(&mut self.polygon);
        pts.dedup();
        if pts.len() > 1 && pts.first() == pts.last() {
            pts.pop();
        }
        loop {
            let n = pts.len();
            if n < 4 {
                break;
            }
            let Some(i) = (0..n).find(|&i| {
                orientation(&pts[(i + n - 1) % n], &pts[i], &pts[(i + 1) % n]) == Orientation::Collinear
            }) else {
                break;
            };
            pts.remove(i);
        }
        self.polygon = pts;
    }

    /// True if `p` lies strictly between the two side lines.
    #[must_use]
    pub fn between_sides(&self, p: &ExactPoint) -> bool {
        let dir = self.direction();
        let Some(l) = self.side_l.defining_points().into_iter().next() else {
            return false;
        };
        let Some(r) = self.side_r.defining_points().into_iter().next() else {
            return false;
        };
        let lc = dir.cross(&(p - &l));
        let rc = dir.cross(&(p - &r));
        lc < Scalar::zero() && rc > Scalar::zero()
    }
}
