//! Cutter Compensation Geometry
//!
//! Pure in-plane helpers for the compensation lookahead: tangents, offset
//! normals, corner classification and the three intersection cases.
//! Every routine that would divide by a near-zero quantity returns `None`.

use std::ops::{Add, Mul, Sub};

use crate::core::{Plane, Point3, RadiusCompMode};

/// Below this, lengths and cross products are treated as zero.
pub const GEOMETRY_EPSILON: f64 = 1e-9;

/// A point or direction in the active plane
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Project a machine point onto `plane`
    pub fn in_plane(point: Point3, plane: Plane) -> Self {
        let (a, b, _) = plane.axes();
        Self::new(point[a], point[b])
    }

    /// Write this in-plane position back into `point`
    pub fn place(self, mut point: Point3, plane: Plane) -> Point3 {
        let (a, b, _) = plane.axes();
        point[a] = self.x;
        point[b] = self.y;
        point
    }

    pub fn cross(self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (other - self).length()
    }

    pub fn normalized(self) -> Option<Vec2> {
        let length = self.length();
        (length > GEOMETRY_EPSILON).then(|| self * (1.0 / length))
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// A programmed segment projected onto the active plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line {
        start: Vec2,
        end: Vec2,
    },
    Arc {
        start: Vec2,
        end: Vec2,
        center: Vec2,
        ccw: bool,
    },
}

impl Segment {
    pub fn start(&self) -> Vec2 {
        match *self {
            Segment::Line { start, .. } | Segment::Arc { start, .. } => start,
        }
    }

    pub fn end(&self) -> Vec2 {
        match *self {
            Segment::Line { end, .. } | Segment::Arc { end, .. } => end,
        }
    }

    /// Direction of travel leaving the start point
    pub fn start_tangent(&self) -> Option<Vec2> {
        match *self {
            Segment::Line { start, end } => (end - start).normalized(),
            Segment::Arc {
                start, center, ccw, ..
            } => arc_tangent(start, center, ccw),
        }
    }

    /// Direction of travel arriving at the end point
    pub fn end_tangent(&self) -> Option<Vec2> {
        match *self {
            Segment::Line { start, end } => (end - start).normalized(),
            Segment::Arc {
                end, center, ccw, ..
            } => arc_tangent(end, center, ccw),
        }
    }
}

fn arc_tangent(at: Vec2, center: Vec2, ccw: bool) -> Option<Vec2> {
    let radial = (at - center).normalized()?;
    Some(if ccw {
        Vec2::new(-radial.y, radial.x)
    } else {
        Vec2::new(radial.y, -radial.x)
    })
}

/// Unit vector pointing from the path to the tool centre
pub fn offset_normal(tangent: Vec2, side: RadiusCompMode) -> Vec2 {
    match side {
        RadiusCompMode::Off => Vec2::default(),
        RadiusCompMode::Left => Vec2::new(-tangent.y, tangent.x),
        RadiusCompMode::Right => Vec2::new(tangent.y, -tangent.x),
    }
}

/// Radius of an arc after offsetting. An arc curving towards the tool side
/// shrinks, one curving away grows.
pub fn offset_arc_radius(radius: f64, ccw: bool, side: RadiusCompMode, offset: f64) -> f64 {
    match (side, ccw) {
        (RadiusCompMode::Off, _) => radius,
        (RadiusCompMode::Left, true) | (RadiusCompMode::Right, false) => radius - offset,
        _ => radius + offset,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    /// Tangent continuation, the offset paths already meet
    Straight,
    /// Offset paths overlap and must be trimmed
    Inside,
    /// Offset paths leave a gap that needs a corner arc
    Outside,
}

/// Classify the corner between an arriving and a leaving direction with
/// respect to the compensation side. A reversal is an outside corner.
pub fn classify_corner(arriving: Vec2, leaving: Vec2, side: RadiusCompMode) -> Corner {
    let turn = arriving.cross(leaving);
    if turn.abs() <= GEOMETRY_EPSILON {
        return if arriving.dot(leaving) > 0.0 {
            Corner::Straight
        } else {
            Corner::Outside
        };
    }

    let turns_left = turn > 0.0;
    match side {
        RadiusCompMode::Off => Corner::Straight,
        RadiusCompMode::Left if turns_left => Corner::Inside,
        RadiusCompMode::Right if !turns_left => Corner::Inside,
        _ => Corner::Outside,
    }
}

/// Intersection of the lines `p1 + s*d1` and `p2 + u*d2`
pub fn intersect_lines(p1: Vec2, d1: Vec2, p2: Vec2, d2: Vec2) -> Option<Vec2> {
    let cross = d1.cross(d2);
    if cross.abs() <= GEOMETRY_EPSILON {
        return None;
    }
    let s = (p2 - p1).cross(d2) / cross;
    Some(p1 + d1 * s)
}

/// Intersection of the line `p + s*d` with a circle, the one closest to `near`
pub fn intersect_line_circle(
    p: Vec2,
    d: Vec2,
    center: Vec2,
    radius: f64,
    near: Vec2,
) -> Option<Vec2> {
    let a = d.dot(d);
    if a <= GEOMETRY_EPSILON || radius <= GEOMETRY_EPSILON {
        return None;
    }
    let f = p - center;
    let b = 2.0 * f.dot(d);
    let c = f.dot(f) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < -GEOMETRY_EPSILON {
        return None;
    }
    let root = discriminant.max(0.0).sqrt();
    let first = p + d * ((-b - root) / (2.0 * a));
    let second = p + d * ((-b + root) / (2.0 * a));
    Some(closest(first, second, near))
}

/// Intersection of two circles, the one closest to `near`
pub fn intersect_circles(c1: Vec2, r1: f64, c2: Vec2, r2: f64, near: Vec2) -> Option<Vec2> {
    if r1 <= GEOMETRY_EPSILON || r2 <= GEOMETRY_EPSILON {
        return None;
    }
    let between = c2 - c1;
    let d = between.length();
    if d <= GEOMETRY_EPSILON || d > r1 + r2 + GEOMETRY_EPSILON || d < (r1 - r2).abs() - GEOMETRY_EPSILON
    {
        return None;
    }
    let along = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let h = (r1 * r1 - along * along).max(0.0).sqrt();
    let unit = between * (1.0 / d);
    let base = c1 + unit * along;
    let perpendicular = Vec2::new(-unit.y, unit.x) * h;
    Some(closest(base + perpendicular, base - perpendicular, near))
}

fn closest(first: Vec2, second: Vec2, near: Vec2) -> Vec2 {
    if first.distance(near) <= second.distance(near) {
        first
    } else {
        second
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(v: Vec2, x: f64, y: f64) {
        assert!(
            (v.x - x).abs() <= 1e-6 && (v.y - y).abs() <= 1e-6,
            "expected ({}, {}), got ({}, {})",
            x,
            y,
            v.x,
            v.y
        );
    }

    #[test]
    fn test_offset_normal_sides() {
        let east = Vec2::new(1.0, 0.0);
        approx(offset_normal(east, RadiusCompMode::Left), 0.0, 1.0);
        approx(offset_normal(east, RadiusCompMode::Right), 0.0, -1.0);
        approx(offset_normal(east, RadiusCompMode::Off), 0.0, 0.0);
    }

    #[test]
    fn test_arc_tangents() {
        let arc = Segment::Arc {
            start: Vec2::new(10.0, 0.0),
            end: Vec2::new(0.0, 10.0),
            center: Vec2::new(0.0, 0.0),
            ccw: true,
        };
        approx(arc.start_tangent().unwrap(), 0.0, 1.0);
        approx(arc.end_tangent().unwrap(), -1.0, 0.0);
    }

    #[test]
    fn test_classify_corner() {
        let east = Vec2::new(1.0, 0.0);
        let south = Vec2::new(0.0, -1.0);
        let north = Vec2::new(0.0, 1.0);
        let west = Vec2::new(-1.0, 0.0);

        assert_eq!(classify_corner(east, south, RadiusCompMode::Left), Corner::Outside);
        assert_eq!(classify_corner(east, north, RadiusCompMode::Left), Corner::Inside);
        assert_eq!(classify_corner(east, south, RadiusCompMode::Right), Corner::Inside);
        assert_eq!(classify_corner(east, east, RadiusCompMode::Left), Corner::Straight);
        assert_eq!(classify_corner(east, west, RadiusCompMode::Right), Corner::Outside);
    }

    #[test]
    fn test_offset_arc_radius() {
        assert_eq!(offset_arc_radius(10.0, true, RadiusCompMode::Left, 2.0), 8.0);
        assert_eq!(offset_arc_radius(10.0, false, RadiusCompMode::Right, 2.0), 8.0);
        assert_eq!(offset_arc_radius(10.0, true, RadiusCompMode::Right, 2.0), 12.0);
    }

    #[test]
    fn test_intersect_lines() {
        let p = intersect_lines(
            Vec2::new(0.0, 2.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(8.0, 0.0),
            Vec2::new(0.0, 1.0),
        )
        .unwrap();
        approx(p, 8.0, 2.0);

        assert!(
            intersect_lines(
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(2.0, 0.0)
            )
            .is_none()
        );
    }

    #[test]
    fn test_intersect_line_circle_picks_nearest() {
        let p = intersect_line_circle(
            Vec2::new(-10.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
            5.0,
            Vec2::new(4.0, 1.0),
        )
        .unwrap();
        approx(p, 5.0, 0.0);

        assert!(
            intersect_line_circle(
                Vec2::new(0.0, 10.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
                5.0,
                Vec2::default()
            )
            .is_none()
        );
    }

    #[test]
    fn test_intersect_circles() {
        let p = intersect_circles(
            Vec2::new(0.0, 0.0),
            5.0,
            Vec2::new(8.0, 0.0),
            5.0,
            Vec2::new(4.0, 10.0),
        )
        .unwrap();
        approx(p, 4.0, 3.0);

        assert!(intersect_circles(Vec2::default(), 5.0, Vec2::default(), 5.0, Vec2::default()).is_none());
        assert!(
            intersect_circles(Vec2::default(), 1.0, Vec2::new(10.0, 0.0), 1.0, Vec2::default())
                .is_none()
        );
    }
}
