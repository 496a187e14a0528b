//! Motion Queue
//!
//! Bounded ring of resolved moves with a one-move lookahead cell in front of
//! it. While cutter radius compensation is active, every move waits in the
//! cell until the next one arrives so the corner between them can be
//! trimmed or filleted. A whole enqueue is planned before anything is pushed:
//! when the plan does not fit, the queue is left exactly as it was.

pub mod compensation;

use ringbuf::ring_buffer::RbBase;
use ringbuf::{HeapRb, Rb};
use serde::Serialize;
use thiserror::Error;

use crate::core::{Compensation, Plane, Point3, RadiusCompMode};
use self::compensation::{
    Corner, GEOMETRY_EPSILON, Segment, Vec2, classify_corner, intersect_circles,
    intersect_line_circle, intersect_lines, offset_arc_radius, offset_normal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Motion queue full")]
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MoveKind {
    Line,
    Arc,
}

/// Feed for one move, in mm/min or blocks per minute
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Feed {
    Rapid,
    PerMinute(f64),
    InverseTime(f64),
}

/// How a compensated corner after this move is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CornerMode {
    /// Trim inside corners, fillet outside ones
    #[default]
    Trim,
    /// Always fillet
    Fillet,
}

/// One queued move, in machine space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoveRecord {
    pub kind: MoveKind,
    pub target: Point3,
    /// Only meaningful for arcs
    pub center: Point3,
    pub ccw: bool,
    pub plane: Plane,
    pub feed: Feed,
    pub radius_comp: Compensation<RadiusCompMode>,
    pub corner: CornerMode,
    /// Axes the program actually moves
    pub moving: [bool; 3],
}

impl MoveRecord {
    pub fn line(target: Point3, feed: Feed) -> Self {
        Self {
            kind: MoveKind::Line,
            target,
            center: Point3::ORIGIN,
            ccw: false,
            plane: Plane::XY,
            feed,
            radius_comp: Compensation::default(),
            corner: CornerMode::Trim,
            moving: [true; 3],
        }
    }

    pub fn arc(target: Point3, center: Point3, ccw: bool, plane: Plane, feed: Feed) -> Self {
        Self {
            kind: MoveKind::Arc,
            center,
            ccw,
            plane,
            ..Self::line(target, feed)
        }
    }

    pub fn with_compensation(mut self, radius_comp: Compensation<RadiusCompMode>) -> Self {
        self.radius_comp = radius_comp;
        self
    }

    pub fn with_corner(mut self, corner: CornerMode) -> Self {
        self.corner = corner;
        self
    }

    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.plane = plane;
        self
    }

    pub fn with_moving(mut self, moving: [bool; 3]) -> Self {
        self.moving = moving;
        self
    }

    pub fn is_arc(&self) -> bool {
        self.kind == MoveKind::Arc
    }

    /// In-plane segment of this move starting at `start`
    fn segment(&self, start: Vec2) -> Segment {
        let end = Vec2::in_plane(self.target, self.plane);
        match self.kind {
            MoveKind::Line => Segment::Line { start, end },
            MoveKind::Arc => Segment::Arc {
                start,
                end,
                center: Vec2::in_plane(self.center, self.plane),
                ccw: self.ccw,
            },
        }
    }
}

/// Everything one enqueue would change, computed up front
struct Plan {
    moves: Vec<MoveRecord>,
    pending: Option<MoveRecord>,
    pending_start: Point3,
    last_compensated: Point3,
}

impl Plan {
    /// Add a move unless it goes nowhere
    fn emit(&mut self, record: MoveRecord) {
        if !record.is_arc() && record.target == self.last_compensated {
            log::debug!("Dropping no-op move to {:?}", record.target);
            return;
        }
        self.last_compensated = record.target;
        self.moves.push(record);
    }
}

pub struct MotionQueue {
    ring: HeapRb<MoveRecord>,
    pending: Option<MoveRecord>,
    pending_start: Point3,
    last_raw_target: Point3,
    last_compensated_target: Point3,
}

impl std::fmt::Debug for MotionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionQueue")
            .field("len", &self.ring.len())
            .field("capacity", &self.ring.capacity())
            .field("pending", &self.pending)
            .field("last_raw_target", &self.last_raw_target)
            .field("last_compensated_target", &self.last_compensated_target)
            .finish()
    }
}

impl MotionQueue {
    /// A queue holding up to `capacity` moves (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        log::debug!("Motion queue up, {} moves deep", capacity);
        Self {
            ring: HeapRb::new(capacity),
            pending: None,
            pending_start: Point3::ORIGIN,
            last_raw_target: Point3::ORIGIN,
            last_compensated_target: Point3::ORIGIN,
        }
    }

    pub fn enqueue(&mut self, record: MoveRecord) -> Result<(), QueueError> {
        let plan = self.plan(&record);

        if self.ring.capacity() - self.ring.len() < plan.moves.len() {
            log::debug!(
                "Queue full ({} of {}), {} moves refused",
                self.ring.len(),
                self.ring.capacity(),
                plan.moves.len()
            );
            return Err(QueueError::Full);
        }

        for record in plan.moves {
            if self.ring.push(record).is_err() {
                return Err(QueueError::Full);
            }
        }
        self.pending = plan.pending;
        self.pending_start = plan.pending_start;
        self.last_compensated_target = plan.last_compensated;
        self.last_raw_target = record.target;
        Ok(())
    }

    /// Emit the move waiting in the lookahead cell, offset but without a
    /// corner. Used at end of program.
    pub fn flush(&mut self) -> Result<(), QueueError> {
        let Some(pending) = self.pending else {
            return Ok(());
        };

        let mut plan = self.empty_plan();
        plan.pending = None;
        self.emit_without_corner(&mut plan, &pending);

        if self.ring.capacity() - self.ring.len() < plan.moves.len() {
            return Err(QueueError::Full);
        }
        for record in plan.moves {
            if self.ring.push(record).is_err() {
                return Err(QueueError::Full);
            }
        }
        self.pending = None;
        self.last_compensated_target = plan.last_compensated;
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<MoveRecord> {
        self.ring.pop()
    }

    pub fn peek(&self) -> Option<&MoveRecord> {
        self.ring.iter().next()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Move held back by compensation lookahead
    pub fn pending(&self) -> Option<&MoveRecord> {
        self.pending.as_ref()
    }

    pub fn last_raw_target(&self) -> Point3 {
        self.last_raw_target
    }

    pub fn last_compensated_target(&self) -> Point3 {
        self.last_compensated_target
    }

    /// The machine was moved outside the queue, by homing or probing.
    /// Flush the lookahead first.
    pub fn set_position(&mut self, position: Point3) {
        self.last_raw_target = position;
        self.last_compensated_target = position;
    }

    fn empty_plan(&self) -> Plan {
        Plan {
            moves: Vec::with_capacity(2),
            pending: self.pending,
            pending_start: self.pending_start,
            last_compensated: self.last_compensated_target,
        }
    }

    fn plan(&self, record: &MoveRecord) -> Plan {
        let mut plan = self.empty_plan();

        if record.radius_comp.mode == RadiusCompMode::Off {
            if let Some(pending) = self.pending {
                plan.emit(pending);
            }
            plan.pending = None;
            plan.emit(*record);
            return plan;
        }

        if !record.is_arc() && record.target == self.last_raw_target {
            return plan;
        }

        if let Some(pending) = self.pending {
            self.resolve_corner(&mut plan, &pending, record);
        }
        plan.pending = Some(*record);
        plan.pending_start = self.last_raw_target;
        plan
    }

    fn resolve_corner(&self, plan: &mut Plan, pending: &MoveRecord, next: &MoveRecord) {
        let plane = pending.plane;
        let side = pending.radius_comp.mode;
        let offset = pending.radius_comp.offset;
        let corner_raw = Vec2::in_plane(pending.target, plane);
        let previous = pending.segment(Vec2::in_plane(self.pending_start, plane));
        let following = next.segment(corner_raw);

        let (Some(arriving), Some(leaving)) = (previous.end_tangent(), following.start_tangent())
        else {
            self.emit_without_corner(plan, pending);
            return;
        };

        let end_offset = corner_raw + offset_normal(arriving, side) * offset;
        let start_offset = corner_raw + offset_normal(leaving, side) * offset;

        let corner = match classify_corner(arriving, leaving, side) {
            Corner::Inside if pending.corner == CornerMode::Fillet => Corner::Outside,
            corner => corner,
        };

        match corner {
            Corner::Straight => {
                let record = offset_record(pending, end_offset, plan.last_compensated);
                plan.emit(record);
            }
            Corner::Outside => {
                let record = offset_record(pending, end_offset, plan.last_compensated);
                plan.emit(record);
                let fillet = MoveRecord {
                    kind: MoveKind::Arc,
                    target: start_offset.place(pending.target, plane),
                    center: pending.target,
                    ccw: side == RadiusCompMode::Right,
                    ..*pending
                };
                plan.emit(fillet);
            }
            Corner::Inside => {
                let trimmed = inside_intersection(
                    &previous,
                    &following,
                    end_offset,
                    start_offset,
                    arriving,
                    leaving,
                    side,
                    offset,
                );
                let record = match trimmed {
                    Some(point) => offset_record(pending, point, plan.last_compensated),
                    None => {
                        log::debug!("No offset intersection, using programmed corner");
                        *pending
                    }
                };
                plan.emit(record);
            }
        }
    }

    fn emit_without_corner(&self, plan: &mut Plan, pending: &MoveRecord) {
        let plane = pending.plane;
        let previous = pending.segment(Vec2::in_plane(self.pending_start, plane));
        let end = match previous.end_tangent() {
            Some(tangent) => {
                previous.end()
                    + offset_normal(tangent, pending.radius_comp.mode) * pending.radius_comp.offset
            }
            None => Vec2::in_plane(plan.last_compensated, plane),
        };
        let record = offset_record(pending, end, plan.last_compensated);
        plan.emit(record);
    }
}

/// Offset version of `pending` ending at `end`. Axes the move does not
/// drive are held at the last compensated position. A degenerate offset arc
/// falls back to the programmed move.
fn offset_record(pending: &MoveRecord, end: Vec2, last_compensated: Point3) -> MoveRecord {
    let plane = pending.plane;
    let (a, b, _) = plane.axes();

    if pending.is_arc() {
        let center = Vec2::in_plane(pending.center, plane);
        let radius = Vec2::in_plane(pending.target, plane).distance(center);
        let shifted = offset_arc_radius(
            radius,
            pending.ccw,
            pending.radius_comp.mode,
            pending.radius_comp.offset,
        );
        if shifted <= GEOMETRY_EPSILON {
            return *pending;
        }
    }

    let start = Vec2::in_plane(last_compensated, plane);
    let planar_motion = start.distance(Vec2::in_plane(pending.target, plane)) > GEOMETRY_EPSILON
        || pending.is_arc();

    let mut target = end.place(pending.target, plane);
    for axis in 0..3 {
        let in_plane = axis == a || axis == b;
        if !pending.moving[axis] && !(in_plane && planar_motion) {
            target[axis] = last_compensated[axis];
        }
    }

    MoveRecord { target, ..*pending }
}

#[allow(clippy::too_many_arguments)]
fn inside_intersection(
    previous: &Segment,
    following: &Segment,
    end_offset: Vec2,
    start_offset: Vec2,
    arriving: Vec2,
    leaving: Vec2,
    side: RadiusCompMode,
    offset: f64,
) -> Option<Vec2> {
    let corner = previous.end();
    let shifted_circle = |segment: &Segment| match *segment {
        Segment::Arc { center, ccw, .. } => Some((
            center,
            offset_arc_radius(corner.distance(center), ccw, side, offset),
        )),
        Segment::Line { .. } => None,
    };

    match (shifted_circle(previous), shifted_circle(following)) {
        (None, None) => intersect_lines(end_offset, arriving, start_offset, leaving),
        (None, Some((center, radius))) => {
            intersect_line_circle(end_offset, arriving, center, radius, corner)
        }
        (Some((center, radius)), None) => {
            intersect_line_circle(start_offset, leaving, center, radius, corner)
        }
        (Some((c1, r1)), Some((c2, r2))) => intersect_circles(c1, r1, c2, r2, corner),
    }
}
