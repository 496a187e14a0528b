//! Coordinate Frame
//!
//! The transformation context the coordinate pipeline reads and updates once
//! per block. Machine and logical positions are only written by
//! [`crate::transform`].

use std::ops::{Add, Index, IndexMut, Mul, Sub};

use serde::Serialize;

use crate::parameters::{FIRST_WCS, WCS_STRIDE};

/// Millimetres per inch.
pub const INCH_TO_MM: f64 = 25.4;

/// Number of work coordinate systems (G54..G59).
pub const WORK_SYSTEMS: u8 = 6;

/// A point or vector in three-axis space, always metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`
    pub fn distance(&self, other: &Point3) -> f64 {
        let d = *other - *self;
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Index<usize> for Point3 {
    type Output = f64;

    fn index(&self, axis: usize) -> &f64 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            _ => &self.z,
        }
    }
}

impl IndexMut<usize> for Point3 {
    fn index_mut(&mut self, axis: usize) -> &mut f64 {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => &mut self.z,
        }
    }
}

impl Add for Point3 {
    type Output = Point3;

    fn add(self, rhs: Point3) -> Point3 {
        Point3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Point3;

    fn sub(self, rhs: Point3) -> Point3 {
        Point3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point3 {
    type Output = Point3;

    fn mul(self, rhs: f64) -> Point3 {
        Point3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Active plane (G17/G18/G19)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Plane {
    #[default]
    XY,
    ZX,
    YZ,
}

impl Plane {
    /// Axis indices `(first, second, normal)` with `first x second = normal`.
    pub fn axes(self) -> (usize, usize, usize) {
        match self {
            Plane::XY => (0, 1, 2),
            Plane::ZX => (2, 0, 1),
            Plane::YZ => (1, 2, 0),
        }
    }
}

/// Programmed units (G20/G21)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Units {
    Inch,
    #[default]
    Metric,
}

impl Units {
    pub fn to_mm(self, value: f64) -> f64 {
        match self {
            Units::Inch => value * INCH_TO_MM,
            Units::Metric => value,
        }
    }

    pub fn from_mm(self, value: f64) -> f64 {
        match self {
            Units::Inch => value / INCH_TO_MM,
            Units::Metric => value,
        }
    }
}

/// G15/G16
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CartesianMode {
    #[default]
    Cartesian,
    Polar,
}

/// G90/G91
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DistanceMode {
    #[default]
    Absolute,
    Incremental,
}

/// Cutter radius compensation side (G40/G41/G42)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RadiusCompMode {
    #[default]
    Off,
    Left,
    Right,
}

/// Tool length compensation polarity (G49/G43/G44)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LengthCompMode {
    #[default]
    Off,
    Positive,
    Negative,
}

impl LengthCompMode {
    pub fn sign(self) -> f64 {
        match self {
            LengthCompMode::Off => 0.0,
            LengthCompMode::Positive => 1.0,
            LengthCompMode::Negative => -1.0,
        }
    }
}

/// A compensation mode paired with its offset in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Compensation<M> {
    pub mode: M,
    pub offset: f64,
}

impl Compensation<LengthCompMode> {
    /// Offset to add to the spindle axis, sign included.
    pub fn signed_offset(&self) -> f64 {
        self.mode.sign() * self.offset
    }
}

/// Machine coordinates or one of the work coordinate systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinateSystem {
    Machine,
    /// 1-based work system number, G54 is 1
    Work(u8),
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        CoordinateSystem::Work(1)
    }
}

impl CoordinateSystem {
    /// Parameter index of the X offset for this system.
    pub fn parameter_base(self) -> Option<usize> {
        match self {
            CoordinateSystem::Machine => None,
            CoordinateSystem::Work(n) => {
                Some(FIRST_WCS + (usize::from(n.clamp(1, WORK_SYSTEMS)) - 1) * WCS_STRIDE)
            }
        }
    }

    pub fn number(self) -> u8 {
        match self {
            CoordinateSystem::Machine => 0,
            CoordinateSystem::Work(n) => n,
        }
    }
}

/// Programmable mirroring (G22/G23): each `Some` axis is reflected about the
/// stored coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Mirror {
    pub enabled: bool,
    pub about: [Option<f64>; 3],
}

/// Coordinate system rotation (G68/G69)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rotation {
    pub enabled: bool,
    pub origin: Point3,
    pub angle_deg: f64,
}

/// Scaling (G51/G50), per axis around `origin`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scaling {
    pub enabled: bool,
    pub origin: Point3,
    pub factor: Point3,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            enabled: false,
            origin: Point3::ORIGIN,
            factor: Point3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Machine-space description of the hole a canned cycle should drill.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CycleTarget {
    /// Position before the cycle started
    pub initial: Point3,
    /// First hole, `z` is the bottom of the hole
    pub hole: Point3,
    /// Z level of the R plane
    pub retract_plane: f64,
    /// In-plane step between repeated holes (zero in absolute mode)
    pub step: Point3,
}

/// The live transformation state.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CoordinateFrame {
    pub plane: Plane,
    pub units: Units,
    pub cartesian: CartesianMode,
    pub distance: DistanceMode,
    pub radius_comp: Compensation<RadiusCompMode>,
    pub length_comp: Compensation<LengthCompMode>,
    pub current_system: CoordinateSystem,
    pub mirror: Mirror,
    pub rotation: Rotation,
    pub scaling: Scaling,
    /// G92 offset
    pub offset: Point3,
    /// Non-modal G53 for the current block
    pub machine_select: bool,
    pub(crate) machine: Point3,
    pub(crate) logical: Point3,
    pub(crate) polar_radius: f64,
    pub(crate) polar_angle: f64,
    /// Signed length offset already folded into `logical.z`
    pub(crate) length_applied: f64,
    pub(crate) cycle: CycleTarget,
}

impl CoordinateFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Final machine position: metric, Cartesian, absolute.
    pub fn machine(&self) -> Point3 {
        self.machine
    }

    /// Position as the program sees it, before rotation and scaling.
    pub fn logical(&self) -> Point3 {
        self.logical
    }

    /// Cached polar `(radius, angle)`
    pub fn polar(&self) -> (f64, f64) {
        (self.polar_radius, self.polar_angle)
    }

    pub fn cycle_target(&self) -> &CycleTarget {
        &self.cycle
    }

    /// Switch between Cartesian and polar input; entering polar mode resets
    /// the cached radius and angle.
    pub fn set_cartesian(&mut self, mode: CartesianMode) {
        if mode == CartesianMode::Polar && self.cartesian != CartesianMode::Polar {
            self.polar_radius = 0.0;
            self.polar_angle = 0.0;
        }
        self.cartesian = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_axes_are_right_handed() {
        for plane in [Plane::XY, Plane::ZX, Plane::YZ] {
            let (a, b, n) = plane.axes();
            assert_eq!((a + 1) % 3, b);
            assert_eq!((b + 1) % 3, n);
        }
    }

    #[test]
    fn test_work_system_parameter_base() {
        assert_eq!(CoordinateSystem::Work(1).parameter_base(), Some(5221));
        assert_eq!(CoordinateSystem::Work(6).parameter_base(), Some(5321));
        assert_eq!(CoordinateSystem::Machine.parameter_base(), None);
    }

    #[test]
    fn test_entering_polar_resets_cache() {
        let mut frame = CoordinateFrame::new();
        frame.polar_radius = 5.0;
        frame.polar_angle = 30.0;
        frame.set_cartesian(CartesianMode::Polar);
        assert_eq!(frame.polar(), (0.0, 0.0));

        frame.polar_radius = 5.0;
        frame.set_cartesian(CartesianMode::Polar);
        assert_eq!(frame.polar().0, 5.0);
    }

    #[test]
    fn test_length_signed_offset() {
        let comp = Compensation {
            mode: LengthCompMode::Negative,
            offset: 3.0,
        };
        assert_eq!(comp.signed_offset(), -3.0);
    }
}
