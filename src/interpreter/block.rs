//! Modal word groups ahead of the sequence point.
//!
//! Groups are applied in a fixed order. A group that uses the block's axis
//! words for something other than motion sets `axis_words_consumed` so the
//! sequence point leaves them alone.

use super::Interpreter;
use crate::core::{
    CartesianMode, Compensation, CoordinateSystem, CycleKind, DistanceMode, FeedMode,
    LengthCompMode, Message, Mirror, MotionMode, PathMode, Plane, Point3, RadiusCompMode,
    RetractMode, Rotation, Scaling, Units,
};
use crate::machine::{
    AuxFunction, Coolant, HomeKind, Machine, MachineMirror, ProbeInput, ProbeMode,
    SpindleDirection,
};
use crate::parameters::{CURRENT_WCS, G92_OFFSET};
use crate::parser::{ABSENT_INTEGER, Block};
use crate::queue::{Feed, MoveRecord};
use crate::tools::ToolTable;
use crate::transform::{self, AxisWords};

const WORK_SYSTEM_CODES: [u32; 6] = [54, 55, 56, 57, 58, 59];
const CYCLE_CODES: [u32; 13] = [31, 38, 73, 74, 81, 82, 83, 84, 85, 86, 87, 88, 89];

impl<M: Machine> Interpreter<M> {
    /// Feed, speed, tool, spindle, coolant, overrides, probing and dwell
    pub(super) fn apply_machine_words(&mut self, block: &Block) {
        if let Some(code) = block.code_in('G', &[93, 94]) {
            self.modal.feed_mode = if code == 93 {
                FeedMode::InverseTime
            } else {
                FeedMode::PerMinute
            };
        }
        if let Some(feed) = block.axis('F') {
            self.modal.feed = self.machine.override_feed(feed);
        }
        if let Some(speed) = block.axis('S') {
            let rpm = self.machine.override_speed(speed);
            self.machine.set_spindle_speed(rpm);
        }
        if block.has('T') {
            match block.integer('T') {
                ABSENT_INTEGER => self.report(Message::error("Invalid tool number")),
                tool => {
                    self.modal.tool = tool;
                    self.machine.preselect_tool(tool);
                }
            }
        }
        if block.has_code('M', 6) {
            self.synchronize();
            let tool = self.modal.tool;
            if !self.machine.change_tool(tool) {
                self.report(Message::error(format!("Tool change to T{} refused", tool)));
            }
        }
        if block.has_code('M', 52) {
            self.synchronize();
            self.machine.change_tool(0);
        }

        if let Some(code) = block.code_in('M', &[26, 27]) {
            let input = if code == 26 {
                ProbeInput::ToolSensor
            } else {
                ProbeInput::Part
            };
            self.machine.select_probe_input(input);
        }
        if let Some(code) = block.code_in('M', &[41, 42]) {
            let mode = if code == 41 {
                ProbeMode::SingleTouch
            } else {
                ProbeMode::DoubleTouch
            };
            self.machine.select_probe_mode(mode);
        }

        if let Some(code) = block.code_in('M', &[3, 4, 5]) {
            let direction = match code {
                3 => SpindleDirection::Clockwise,
                4 => SpindleDirection::CounterClockwise,
                _ => SpindleDirection::Stopped,
            };
            self.start_spindle(direction);
        }
        if let Some(code) = block.code_in('M', &[7, 8, 9, 68, 69]) {
            let coolant = match code {
                7 => Coolant::Mist,
                8 => Coolant::Flood,
                9 => Coolant::Off,
                68 => Coolant::Shower,
                _ => Coolant::ShowerOff,
            };
            self.machine.coolant(coolant);
        }
        if let Some(code) = block.code_in('M', &[13, 14]) {
            self.machine.coolant(Coolant::Flood);
            self.start_spindle(if code == 13 {
                SpindleDirection::Clockwise
            } else {
                SpindleDirection::CounterClockwise
            });
        }
        if let Some(code) = block.code_in('M', &[48, 49]) {
            self.machine.enable_overrides(code == 48);
        }

        if block.has_code('G', 4) {
            let seconds = block.axis('P').unwrap_or(0.0);
            self.synchronize();
            self.machine.dwell(seconds);
        }
    }

    /// Plane, units, tool compensation, coordinate system, mirroring,
    /// rotation and path control
    pub(super) fn apply_frame_words(&mut self, block: &Block) {
        if let Some(code) = block.code_in('G', &[17, 18, 19]) {
            self.frame.plane = match code {
                17 => Plane::XY,
                18 => Plane::ZX,
                _ => Plane::YZ,
            };
        }
        if let Some(code) = block.code_in('G', &[20, 21]) {
            self.frame.units = if code == 20 {
                Units::Inch
            } else {
                Units::Metric
            };
        }

        if let Some(code) = block.code_in('G', &[40, 41, 42]) {
            let mode = match code {
                40 => RadiusCompMode::Off,
                41 => RadiusCompMode::Left,
                _ => RadiusCompMode::Right,
            };
            let offset = match mode {
                RadiusCompMode::Off => 0.0,
                _ => {
                    let index = self.tool_index(block.integer('D'));
                    ToolTable::new(&self.params).radius_of(index)
                }
            };
            self.frame.radius_comp = Compensation { mode, offset };
        }
        if let Some(code) = block.code_in('G', &[43, 44, 49]) {
            let mode = match code {
                43 => LengthCompMode::Positive,
                44 => LengthCompMode::Negative,
                _ => LengthCompMode::Off,
            };
            let offset = match mode {
                LengthCompMode::Off => 0.0,
                _ => {
                    let index = self.tool_index(block.integer('H'));
                    ToolTable::new(&self.params).length_of(index)
                }
            };
            self.frame.length_comp = Compensation { mode, offset };
        }

        if block.has_code('G', 53) {
            self.frame.machine_select = true;
        }
        if let Some(code) = block.code_in('G', &WORK_SYSTEM_CODES) {
            let system = (code - 53) as u8;
            self.frame.current_system = CoordinateSystem::Work(system);
            if let Err(e) = self.params.set_immediate(CURRENT_WCS, f64::from(system)) {
                self.report(Message::error(format!("Work system not saved: {}", e)));
            }
        }

        if let Some(code) = block.code_in('M', &[21, 22, 23]) {
            let mirror = match code {
                21 => MachineMirror::X,
                22 => MachineMirror::Y,
                _ => MachineMirror::Off,
            };
            self.machine.mirror(mirror);
        }
        if let Some(code) = block.code_in('G', &[22, 23]) {
            self.frame.mirror = if code == 22 {
                let words = AxisWords::from_block(block);
                let about = transform::resolve_point(&self.frame, &self.params, words);
                Mirror {
                    enabled: true,
                    about: [0usize, 1, 2].map(|axis| words.get(axis).map(|_| about[axis])),
                }
            } else {
                Mirror::default()
            };
            self.modal.axis_words_consumed = true;
        }
        if let Some(code) = block.code_in('G', &[68, 69]) {
            if code == 68 {
                let words = AxisWords::from_block(block);
                self.frame.rotation = Rotation {
                    enabled: true,
                    origin: transform::resolve_point(&self.frame, &self.params, words),
                    angle_deg: block.axis('R').unwrap_or(0.0),
                };
            } else {
                self.frame.rotation.enabled = false;
            }
            self.modal.axis_words_consumed = true;
        }

        if let Some(code) = block.code_in('G', &[61, 64]) {
            self.modal.path_mode = if code == 61 {
                PathMode::ExactStop
            } else {
                PathMode::Continuous
            };
            self.machine.select_path_mode(self.modal.path_mode);
        }
        if block.has_code('G', 9) {
            self.modal.exact_stop_once = true;
            self.machine.select_path_mode(PathMode::ExactStop);
        }
    }

    /// Distance mode, polar input and scaling
    pub(super) fn apply_distance_words(&mut self, block: &Block) {
        if let Some(code) = block.code_in('G', &[90, 91]) {
            self.frame.distance = if code == 90 {
                DistanceMode::Absolute
            } else {
                DistanceMode::Incremental
            };
        }
        if let Some(code) = block.code_in('G', &[15, 16]) {
            self.frame.set_cartesian(if code == 16 {
                CartesianMode::Polar
            } else {
                CartesianMode::Cartesian
            });
        }
        if let Some(code) = block.code_in('G', &[50, 51]) {
            let words = AxisWords::from_block(block);
            if code == 51 {
                let factor = match block.axis('P') {
                    Some(p) => Point3::new(p, p, p),
                    None => Point3::new(
                        block.axis('I').unwrap_or(1.0),
                        block.axis('J').unwrap_or(1.0),
                        block.axis('K').unwrap_or(1.0),
                    ),
                };
                self.frame.scaling = Scaling {
                    enabled: true,
                    origin: transform::resolve_point(&self.frame, &self.params, words),
                    factor,
                };
            } else {
                self.frame.scaling.enabled = false;
            }
            if !words.is_empty() {
                self.modal.axis_words_consumed = true;
            }
        }
    }

    /// Retract mode, home cycles, cycle cancel, data entry and G92
    pub(super) fn apply_positioning_words(&mut self, block: &Block) {
        if let Some(code) = block.code_in('G', &[98, 99]) {
            self.modal.retract = if code == 98 {
                RetractMode::InitialLevel
            } else {
                RetractMode::RPlane
            };
        }

        if let Some(code) = block.code_in('G', &[28, 29, 30, 80]) {
            self.modal.motion = MotionMode::Off;
            match code {
                80 => self.modal.cycle = None,
                29 => {
                    self.return_from_reference(block);
                    self.modal.axis_words_consumed = true;
                }
                _ => {
                    self.go_home(block, code == 30);
                    self.modal.axis_words_consumed = true;
                }
            }
        }

        if let Some(code) = block.code_in('G', &[10, 11]) {
            if code == 10 {
                if self.modal.motion != MotionMode::Store {
                    self.modal.saved_motion = self.modal.motion;
                }
                self.modal.motion = MotionMode::Store;
            } else if self.modal.motion == MotionMode::Store {
                self.modal.motion = self.modal.saved_motion;
            }
        }

        if block.has_code('G', 92) {
            let words = AxisWords::from_block(block);
            self.frame.offset = transform::local_offset_for(&self.frame, &self.params, words);
            for axis in 0..3 {
                if let Err(e) = self.params.set_immediate(G92_OFFSET + axis, self.frame.offset[axis]) {
                    self.report(Message::error(format!("Local offset not saved: {}", e)));
                }
            }
            self.modal.axis_words_consumed = true;
        }
    }

    /// Motion group, canned cycles, auxiliary functions and macro calls
    pub(super) fn apply_motion_words(&mut self, block: &Block) {
        if let Some(code) = block.code_in('G', &[0, 1, 2, 3, 12, 13]) {
            self.modal.motion = match code {
                0 => MotionMode::Rapid,
                1 => MotionMode::Linear,
                _ => MotionMode::Arc,
            };
            self.modal.ccw = matches!(code, 3 | 13);
            self.modal.full_circle = matches!(code, 12 | 13);
        }

        if let Some(kind) = block.code_in('G', &CYCLE_CODES).and_then(CycleKind::from_code) {
            self.modal.motion = MotionMode::Cycle;
            self.modal.cycle = Some(kind);
        }
        if self.modal.motion == MotionMode::Cycle
            && self.modal.cycle.is_some_and(|kind| !kind.is_probe())
        {
            self.merge_cycle_words(block);
        }

        if let Some(code) = block.code_in('M', &[19, 20, 25]) {
            let function = match code {
                19 => AuxFunction::OrientSpindle,
                20 => AuxFunction::IndexerStep,
                _ => AuxFunction::ParkZ,
            };
            if function == AuxFunction::ParkZ {
                self.park_z();
            }
            let argument = Some(block.integer('P')).filter(|p| *p != ABSENT_INTEGER);
            self.synchronize();
            if !self.machine.aux(function, argument) {
                self.report(Message::warning(format!("{:?} refused", function)));
            }
        }

        if block.has_code('G', 65) {
            if self.modal.motion != MotionMode::Macro {
                self.modal.saved_motion = self.modal.motion;
            }
            self.modal.motion = MotionMode::Macro;
            self.modal.macro_call = true;
        }
    }

    fn merge_cycle_words(&mut self, block: &Block) {
        let registers = &mut self.modal.registers;
        for (slot, letter) in [
            (&mut registers.i, 'I'),
            (&mut registers.j, 'J'),
            (&mut registers.k, 'K'),
            (&mut registers.p, 'P'),
            (&mut registers.q, 'Q'),
            (&mut registers.r, 'R'),
        ] {
            if let Some(value) = block.axis(letter) {
                *slot = Some(value);
            }
        }
        if block.has('L') && block.integer('L') != ABSENT_INTEGER {
            registers.l = Some(block.integer('L'));
        }
    }

    /// D or H word, falling back to the tool in the spindle
    fn tool_index(&self, word: u32) -> usize {
        let index = if word == ABSENT_INTEGER {
            self.modal.tool
        } else {
            word
        };
        index as usize
    }

    fn start_spindle(&mut self, direction: SpindleDirection) {
        self.synchronize();
        if !self.machine.start_spindle(direction) {
            self.report(Message::warning(format!("Spindle {:?} refused", direction)));
        }
    }

    /// G28/G30: through the programmed point, then to the stored reference
    /// on the named axes (all axes when none are named).
    fn go_home(&mut self, block: &Block, secondary: bool) {
        let words = AxisWords::from_block(block);
        self.intermediate = if words.is_empty() {
            self.frame.machine()
        } else {
            let via = transform::transform(&mut self.frame, &self.params, words);
            self.enqueue(
                MoveRecord::line(via, Feed::Rapid)
                    .with_plane(self.frame.plane)
                    .with_moving(words.mask()),
            );
            via
        };

        let reference = transform::reference_point(&self.params, secondary);
        let target = transform::home_target(&self.frame, words, reference);
        let kind = if secondary {
            HomeKind::Zero
        } else {
            HomeKind::Home
        };
        self.move_outside_queue(kind, target);
    }

    /// G29: back through the last intermediate point to the programmed point
    fn return_from_reference(&mut self, block: &Block) {
        let via = self.intermediate;
        self.enqueue(MoveRecord::line(via, Feed::Rapid).with_plane(self.frame.plane));
        transform::place_machine(&mut self.frame, via);

        let target = transform::transform(&mut self.frame, &self.params, AxisWords::from_block(block));
        self.move_outside_queue(HomeKind::Return, target);
    }

    /// Home moves run on the machine directly, after the queue has drained.
    fn move_outside_queue(&mut self, kind: HomeKind, target: Point3) {
        self.flush_lookahead();
        self.synchronize();
        if !self.machine.home(kind, target) {
            self.report(Message::error(format!("{:?} cycle refused", kind)));
            return;
        }
        transform::place_machine(&mut self.frame, target);
        self.queue.set_position(target);
    }

    /// M25: rapid to machine Z zero
    fn park_z(&mut self) {
        let mut target = self.frame.machine();
        target.z = 0.0;
        self.enqueue(
            MoveRecord::line(target, Feed::Rapid)
                .with_plane(self.frame.plane)
                .with_moving([false, false, true]),
        );
        transform::place_machine(&mut self.frame, target);
    }
}
