//! Modal State
//!
//! Interpreter state that persists between blocks, apart from the coordinate
//! frame.

use serde::Serialize;

/// Motion mode driving the per-block sequence point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MotionMode {
    #[default]
    Off,
    Rapid,
    Linear,
    Arc,
    Cycle,
    /// G10 data entry
    Store,
    /// G65 macro call
    Macro,
}

/// G93/G94
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FeedMode {
    InverseTime,
    #[default]
    PerMinute,
}

/// G98/G99
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RetractMode {
    /// Back to the level the cycle started from
    #[default]
    InitialLevel,
    /// Back to the R plane
    RPlane,
}

/// G61/G64
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PathMode {
    ExactStop,
    #[default]
    Continuous,
}

/// Canned cycles and probing moves sharing the G73..G89 group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleKind {
    ProbeIn,
    ProbeOut,
    PeckHighSpeed,
    TapLeft,
    Drill,
    DrillDwell,
    Peck,
    TapRight,
    Bore,
    BoreSpindleStop,
    BoreBack,
    BoreManual,
    BoreDwell,
}

impl CycleKind {
    pub fn from_code(code: u32) -> Option<Self> {
        let kind = match code {
            31 => CycleKind::ProbeIn,
            38 => CycleKind::ProbeOut,
            73 => CycleKind::PeckHighSpeed,
            74 => CycleKind::TapLeft,
            81 => CycleKind::Drill,
            82 => CycleKind::DrillDwell,
            83 => CycleKind::Peck,
            84 => CycleKind::TapRight,
            85 => CycleKind::Bore,
            86 => CycleKind::BoreSpindleStop,
            87 => CycleKind::BoreBack,
            88 => CycleKind::BoreManual,
            89 => CycleKind::BoreDwell,
            _ => return None,
        };
        Some(kind)
    }

    pub fn code(self) -> u32 {
        match self {
            CycleKind::ProbeIn => 31,
            CycleKind::ProbeOut => 38,
            CycleKind::PeckHighSpeed => 73,
            CycleKind::TapLeft => 74,
            CycleKind::Drill => 81,
            CycleKind::DrillDwell => 82,
            CycleKind::Peck => 83,
            CycleKind::TapRight => 84,
            CycleKind::Bore => 85,
            CycleKind::BoreSpindleStop => 86,
            CycleKind::BoreBack => 87,
            CycleKind::BoreManual => 88,
            CycleKind::BoreDwell => 89,
        }
    }

    /// Probing moves take no cycle words.
    pub fn is_probe(self) -> bool {
        matches!(self, CycleKind::ProbeIn | CycleKind::ProbeOut)
    }
}

/// Arc and cycle words kept between blocks. Absent words are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Registers {
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub k: Option<f64>,
    pub l: Option<u32>,
    pub p: Option<f64>,
    pub q: Option<f64>,
    pub r: Option<f64>,
    /// Cycle hole depth
    pub z: Option<f64>,
}

/// Per-interpreter modal record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModalState {
    pub feed_mode: FeedMode,
    pub motion: MotionMode,
    /// Motion mode to return to after G11 or a macro call
    pub saved_motion: MotionMode,
    pub retract: RetractMode,
    pub path_mode: PathMode,
    /// G9 is active for the next motion block only
    pub exact_stop_once: bool,
    pub cycle: Option<CycleKind>,
    pub registers: Registers,
    /// Programmed feed with the override applied, in program units per
    /// minute (or blocks per minute under G93)
    pub feed: f64,
    pub tool: u32,
    pub ccw: bool,
    /// G12/G13: the arc may end where it started
    pub full_circle: bool,
    pub macro_call: bool,
    pub axis_words_consumed: bool,
}

impl Default for ModalState {
    fn default() -> Self {
        Self::new()
    }
}

impl ModalState {
    pub fn new() -> Self {
        Self {
            feed_mode: FeedMode::PerMinute,
            motion: MotionMode::Off,
            saved_motion: MotionMode::Off,
            retract: RetractMode::InitialLevel,
            path_mode: PathMode::Continuous,
            exact_stop_once: false,
            cycle: None,
            registers: Registers::default(),
            feed: 0.0,
            tool: 0,
            ccw: false,
            full_circle: false,
            macro_call: false,
            axis_words_consumed: false,
        }
    }

    /// Exact stop applies to the current block, modal or not.
    pub fn exact_stop(&self) -> bool {
        self.path_mode == PathMode::ExactStop || self.exact_stop_once
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_codes_round_trip() {
        for code in [31, 38, 73, 74, 81, 82, 83, 84, 85, 86, 87, 88, 89] {
            let kind = CycleKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert!(CycleKind::from_code(80).is_none());
    }

    #[test]
    fn test_exact_stop_once() {
        let mut modal = ModalState::new();
        assert!(!modal.exact_stop());
        modal.exact_stop_once = true;
        assert!(modal.exact_stop());
    }
}
