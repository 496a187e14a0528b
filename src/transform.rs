//! Coordinate Transform Pipeline
//!
//! Maps a block's axis words onto machine space. Stages run in a fixed
//! order: presence, polar, units, length compensation, coordinate system,
//! rotation, scaling, mirror. The logical position is captured before
//! rotation so incremental and polar moves compose in program space.
//!
//! Cutter radius compensation is not part of this pipeline; it runs inside
//! the motion queue on machine-space targets.

use crate::core::{CartesianMode, CoordinateFrame, CycleTarget, DistanceMode, Point3};
use crate::parameters::{G28_REFERENCE, G30_REFERENCE, ParameterStore};
use crate::parser::Block;

const EPSILON: f64 = 1e-9;

/// Axis words of one block, `None` when absent
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisWords {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl AxisWords {
    pub fn new(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        Self { x, y, z }
    }

    pub fn from_block(block: &Block) -> Self {
        Self::new(block.axis('X'), block.axis('Y'), block.axis('Z'))
    }

    pub fn get(&self, axis: usize) -> Option<f64> {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    /// Which axes were programmed
    pub fn mask(&self) -> [bool; 3] {
        [self.x.is_some(), self.y.is_some(), self.z.is_some()]
    }
}

/// Work offset plus G92 offset for the active coordinate system
fn origin_of(frame: &CoordinateFrame, params: &ParameterStore) -> Point3 {
    let work = frame
        .current_system
        .parameter_base()
        .map(|base| params.point(base))
        .filter(Point3::is_finite)
        .unwrap_or(Point3::ORIGIN);
    work + frame.offset
}

/// Run the pipeline for one block and update the frame. Returns the new
/// machine position. A block without axis words leaves the frame untouched.
pub fn transform(frame: &mut CoordinateFrame, params: &ParameterStore, words: AxisWords) -> Point3 {
    if words.is_empty() {
        return frame.machine;
    }

    if frame.machine_select {
        let mut target = frame.machine;
        for axis in 0..3 {
            if let Some(value) = words.get(axis) {
                target[axis] = frame.units.to_mm(value);
            }
        }
        place_machine(frame, target);
        return frame.machine;
    }

    let previous = frame.logical;
    let mut logical = previous;
    let mut resolved = [false; 3];
    let (first, second, _) = frame.plane.axes();

    if frame.cartesian == CartesianMode::Polar
        && (words.get(first).is_some() || words.get(second).is_some())
    {
        let radius = words.get(first).unwrap_or(frame.polar_radius);
        let angle = words.get(second).unwrap_or(frame.polar_angle);
        frame.polar_radius = radius;
        frame.polar_angle = angle;

        let radius_mm = frame.units.to_mm(radius);
        let theta = angle.to_radians();
        logical[first] = previous[first] + radius_mm * theta.cos();
        logical[second] = previous[second] + radius_mm * theta.sin();
        resolved[first] = true;
        resolved[second] = true;
    }

    let origin = origin_of(frame, params);
    let signed_length = frame.length_comp.signed_offset();
    let mut z_moved = resolved[2];

    for axis in 0..3 {
        if resolved[axis] {
            continue;
        }
        let Some(value) = words.get(axis) else {
            continue;
        };
        let value = frame.units.to_mm(value);
        logical[axis] = match frame.distance {
            DistanceMode::Absolute => origin[axis] + value,
            DistanceMode::Incremental => previous[axis] + value,
        };
        if axis == 2 {
            z_moved = true;
        }
    }

    if z_moved {
        let absolute_z = !resolved[2] && frame.distance == DistanceMode::Absolute;
        logical.z += if absolute_z {
            signed_length
        } else {
            signed_length - frame.length_applied
        };
        frame.length_applied = signed_length;
    }

    frame.logical = logical;
    frame.machine = project(frame, logical);
    frame.machine
}

/// Resolve words as an absolute program point without touching the frame.
/// Absent axes take the current logical position.
pub fn resolve_point(frame: &CoordinateFrame, params: &ParameterStore, words: AxisWords) -> Point3 {
    let origin = origin_of(frame, params);
    let mut point = frame.logical;
    for axis in 0..3 {
        if let Some(value) = words.get(axis) {
            point[axis] = origin[axis] + frame.units.to_mm(value);
        }
    }
    point
}

/// Logical to machine: rotation, scaling, then mirror.
pub fn project(frame: &CoordinateFrame, logical: Point3) -> Point3 {
    let mut p = logical;

    if frame.rotation.enabled {
        let (a, b, _) = frame.plane.axes();
        let o = frame.rotation.origin;
        let (sin, cos) = frame.rotation.angle_deg.to_radians().sin_cos();
        let da = p[a] - o[a];
        let db = p[b] - o[b];
        p[a] = o[a] + da * cos - db * sin;
        p[b] = o[b] + da * sin + db * cos;
    }

    if frame.scaling.enabled {
        let s = &frame.scaling;
        for axis in 0..3 {
            p[axis] = s.origin[axis] + (p[axis] - s.origin[axis]) * s.factor[axis];
        }
    }

    if frame.mirror.enabled {
        for (axis, about) in frame.mirror.about.iter().enumerate() {
            if let Some(c) = about {
                p[axis] = 2.0 * c - p[axis];
            }
        }
    }

    p
}

/// Machine to logical, the inverse of [`project`]. Axes with a zero scale
/// factor cannot be inverted and keep the current logical value.
pub fn unproject(frame: &CoordinateFrame, machine: Point3) -> Point3 {
    let mut p = machine;

    if frame.mirror.enabled {
        for (axis, about) in frame.mirror.about.iter().enumerate() {
            if let Some(c) = about {
                p[axis] = 2.0 * c - p[axis];
            }
        }
    }

    if frame.scaling.enabled {
        let s = &frame.scaling;
        for axis in 0..3 {
            p[axis] = if s.factor[axis].abs() > EPSILON {
                s.origin[axis] + (p[axis] - s.origin[axis]) / s.factor[axis]
            } else {
                frame.logical[axis]
            };
        }
    }

    if frame.rotation.enabled {
        let (a, b, _) = frame.plane.axes();
        let o = frame.rotation.origin;
        let (sin, cos) = (-frame.rotation.angle_deg).to_radians().sin_cos();
        let da = p[a] - o[a];
        let db = p[b] - o[b];
        p[a] = o[a] + da * cos - db * sin;
        p[b] = o[b] + da * sin + db * cos;
    }

    p
}

/// Set the machine position directly and derive the logical position.
pub(crate) fn place_machine(frame: &mut CoordinateFrame, machine: Point3) {
    frame.logical = unproject(frame, machine);
    frame.machine = machine;
}

/// True when mirroring or negative scaling reverses arc direction in the
/// active plane.
pub fn reverses_arcs(frame: &CoordinateFrame) -> bool {
    let (a, b, _) = frame.plane.axes();
    let mut flips = 0;
    for axis in [a, b] {
        if frame.mirror.enabled && frame.mirror.about[axis].is_some() {
            flips += 1;
        }
        if frame.scaling.enabled && frame.scaling.factor[axis] < 0.0 {
            flips += 1;
        }
    }
    flips % 2 == 1
}

/// Arc centre for a move from `start` to `end` (both logical), returned in
/// machine space. `offsets` are I/J/K in program units relative to `start`;
/// a radius replaces them when given. A negative radius selects the arc
/// longer than 180 degrees. `None` when the geometry has no solution.
pub fn arc_center(
    frame: &CoordinateFrame,
    start: Point3,
    end: Point3,
    offsets: [Option<f64>; 3],
    radius: Option<f64>,
    ccw: bool,
) -> Option<Point3> {
    let (a, b, _) = frame.plane.axes();
    let mut center = start;

    match radius {
        Some(r) => {
            let r_mm = frame.units.to_mm(r.abs());
            let long_way = r < 0.0;
            let (da, db) = (end[a] - start[a], end[b] - start[b]);
            let chord = da.hypot(db);
            if chord < EPSILON || r_mm < EPSILON {
                return None;
            }
            let half = chord / 2.0;
            if r_mm + EPSILON < half {
                return None;
            }
            let h = (r_mm * r_mm - half * half).max(0.0).sqrt();
            let (ua, ub) = (da / chord, db / chord);
            let side = if ccw != long_way { 1.0 } else { -1.0 };
            center[a] = start[a] + da / 2.0 - side * h * ub;
            center[b] = start[b] + db / 2.0 + side * h * ua;
        }
        None => {
            if offsets[a].is_none() && offsets[b].is_none() {
                return None;
            }
            center[a] = start[a] + frame.units.to_mm(offsets[a].unwrap_or(0.0));
            center[b] = start[b] + frame.units.to_mm(offsets[b].unwrap_or(0.0));
        }
    }

    Some(project(frame, center))
}

/// Cycle entry: position over the hole and work out the R plane and hole
/// bottom. `depth` and `retract` are the modal Z and R words. In absolute
/// mode they are levels in the active coordinate system. In incremental mode
/// R is relative to the starting level and Z relative to R.
pub fn transform_cycle(
    frame: &mut CoordinateFrame,
    params: &ParameterStore,
    words: AxisWords,
    depth: Option<f64>,
    retract: Option<f64>,
) -> CycleTarget {
    let initial = frame.machine;
    let start_z = frame.logical.z;

    transform(frame, params, AxisWords::new(words.x, words.y, None));

    let origin = origin_of(frame, params);
    let signed_length = frame.length_comp.signed_offset();
    let units = frame.units;
    let to_mm = |v: Option<f64>| v.map(|v| units.to_mm(v));

    let (r_level, bottom) = match frame.distance {
        DistanceMode::Absolute => {
            let r_level = to_mm(retract)
                .map(|r| origin.z + r + signed_length)
                .unwrap_or(start_z);
            let bottom = to_mm(depth)
                .map(|z| origin.z + z + signed_length)
                .unwrap_or(r_level);
            (r_level, bottom)
        }
        DistanceMode::Incremental => {
            let r_level = start_z + to_mm(retract).unwrap_or(0.0);
            (r_level, r_level + to_mm(depth).unwrap_or(0.0))
        }
    };

    let hole_logical = Point3::new(frame.logical.x, frame.logical.y, bottom);
    let r_logical = Point3::new(frame.logical.x, frame.logical.y, r_level);
    let hole = project(frame, hole_logical);

    let step = match frame.distance {
        DistanceMode::Absolute => Point3::ORIGIN,
        DistanceMode::Incremental => {
            Point3::new(frame.machine.x - initial.x, frame.machine.y - initial.y, 0.0)
        }
    };

    frame.cycle = CycleTarget {
        initial,
        hole,
        retract_plane: project(frame, r_logical).z,
        step,
    };
    frame.cycle
}

/// G28/G30 reference point, in machine coordinates
pub fn reference_point(params: &ParameterStore, secondary: bool) -> Point3 {
    let base = if secondary { G30_REFERENCE } else { G28_REFERENCE };
    let point = params.point(base);
    if point.is_finite() { point } else { Point3::ORIGIN }
}

/// Where a home move ends: programmed axes (or all, when none are given) go
/// to `reference`, the others stay put.
pub fn home_target(frame: &CoordinateFrame, words: AxisWords, reference: Point3) -> Point3 {
    let mask = words.mask();
    let all = !mask.iter().any(|m| *m);
    let mut target = frame.machine;
    for axis in 0..3 {
        if all || mask[axis] {
            target[axis] = reference[axis];
        }
    }
    target
}

/// Offset that makes the current position read as `words` (G92).
/// Absent axes keep their previous offset.
pub fn local_offset_for(frame: &CoordinateFrame, params: &ParameterStore, words: AxisWords) -> Point3 {
    let work = origin_of(frame, params) - frame.offset;
    let mut offset = frame.offset;
    for axis in 0..3 {
        if let Some(value) = words.get(axis) {
            let applied = if axis == 2 { frame.length_applied } else { 0.0 };
            offset[axis] = frame.logical[axis] - work[axis] - applied - frame.units.to_mm(value);
        }
    }
    offset
}
