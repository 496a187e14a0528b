//! Canned Cycle Expansion
//!
//! Rewrites a canned cycle as primitive blocks to be spliced back into the
//! input stream. Positions come from the cycle target, which is already in
//! machine space, so every generated move is a `G53` move in program units.
//! The last line re-asserts the cycle code without axis words, restoring the
//! modal cycle without triggering it again.

use crate::core::{CycleKind, CycleTarget, Point3, Registers, RetractMode, Units};

/// Distance a peck backs off before feeding on, in millimetres
pub const PECK_CLEARANCE_MM: f64 = 0.5;

/// Upper bound on pecks per hole
pub const MAX_PECKS: usize = 1000;

struct CycleText<'a> {
    text: String,
    units: Units,
    registers: &'a Registers,
}

impl CycleText<'_> {
    fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn value(&self, mm: f64) -> f64 {
        self.units.from_mm(mm)
    }

    // f64 Display is the shortest text that parses back to the same value
    fn rapid_xy(&mut self, at: Point3) {
        let (x, y) = (self.value(at.x), self.value(at.y));
        self.line(&format!("G53G0X{}Y{}", x, y));
    }

    fn rapid_z(&mut self, z: f64) {
        let z = self.value(z);
        self.line(&format!("G53G0Z{}", z));
    }

    fn feed_z(&mut self, z: f64) {
        let z = self.value(z);
        self.line(&format!("G53G1Z{}", z));
    }

    fn dwell(&mut self) {
        if let Some(p) = self.registers.p.filter(|p| *p > 0.0) {
            self.line(&format!("G4P{}", p));
        }
    }
}

/// Expand `kind` at `target`. `None` for cycles that are only announced to
/// the machine.
pub fn generate(
    kind: CycleKind,
    registers: &Registers,
    retract: RetractMode,
    target: &CycleTarget,
    units: Units,
) -> Option<String> {
    if matches!(
        kind,
        CycleKind::ProbeIn | CycleKind::ProbeOut | CycleKind::BoreBack | CycleKind::BoreManual
    ) {
        return None;
    }

    let mut out = CycleText {
        text: String::new(),
        units,
        registers,
    };
    let r_plane = target.retract_plane;
    let bottom = target.hole.z;
    let clear = match retract {
        RetractMode::InitialLevel => target.initial.z.max(r_plane),
        RetractMode::RPlane => r_plane,
    };
    let repeats = registers.l.unwrap_or(1).max(1);

    for n in 0..repeats {
        let hole = target.hole + target.step * f64::from(n);
        out.rapid_xy(hole);
        out.rapid_z(r_plane);

        match kind {
            CycleKind::Drill => out.feed_z(bottom),
            CycleKind::DrillDwell => {
                out.feed_z(bottom);
                out.dwell();
            }
            CycleKind::Peck | CycleKind::PeckHighSpeed => {
                let step = registers.q.map(|q| units.to_mm(q.abs())).unwrap_or(0.0);
                let full_retract = kind == CycleKind::Peck;
                peck(&mut out, r_plane, bottom, step, full_retract);
            }
            CycleKind::TapRight | CycleKind::TapLeft => {
                let (reverse, forward) = if kind == CycleKind::TapRight {
                    ("M4", "M3")
                } else {
                    ("M3", "M4")
                };
                out.feed_z(bottom);
                out.dwell();
                out.line("M5");
                out.line(reverse);
                out.feed_z(r_plane);
                out.line("M5");
                out.line(forward);
            }
            CycleKind::Bore => {
                out.feed_z(bottom);
                out.feed_z(r_plane);
            }
            CycleKind::BoreDwell => {
                out.feed_z(bottom);
                out.dwell();
                out.feed_z(r_plane);
            }
            CycleKind::BoreSpindleStop => {
                out.feed_z(bottom);
                out.line("M5");
                out.rapid_z(r_plane);
                out.line("M3");
            }
            CycleKind::ProbeIn
            | CycleKind::ProbeOut
            | CycleKind::BoreBack
            | CycleKind::BoreManual => {}
        }

        out.rapid_z(clear);
    }

    out.line(&format!("G{}", kind.code()));
    Some(out.text)
}

fn peck(out: &mut CycleText<'_>, r_plane: f64, bottom: f64, step: f64, full_retract: bool) {
    let travel = (bottom - r_plane).abs();
    if step <= f64::EPSILON || travel <= f64::EPSILON {
        out.feed_z(bottom);
        return;
    }

    let direction = (bottom - r_plane).signum();
    let pecks = ((travel / step).ceil() as usize).clamp(1, MAX_PECKS);
    let mut reached = r_plane;

    for n in 1..=pecks {
        if n > 1 {
            if full_retract {
                out.rapid_z(r_plane);
            }
            out.rapid_z(reached - direction * PECK_CLEARANCE_MM);
        }
        let depth = if n == pecks {
            bottom
        } else {
            r_plane + direction * step * n as f64
        };
        out.feed_z(depth);
        reached = depth;
    }
}
