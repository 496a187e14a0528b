//! Machine Interface
//!
//! The actuator side of the interpreter. [`Machine`] is the contract the
//! interpreter drives; [`SimulatedMachine`] logs every request, tracks the
//! resulting machine state and records executed moves for inspection.

use serde::Serialize;

use crate::core::{CycleKind, CycleTarget, Message, PathMode, Point3};
use crate::profile::MachineSettings;
use crate::queue::{MoveKind, MoveRecord};
use crate::queue::compensation::Vec2;

/// Slowest spindle speed the simulator will run at
pub const LOWEST_RPM: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpindleDirection {
    Clockwise,
    CounterClockwise,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Coolant {
    Mist,
    Flood,
    /// Mist and flood off
    Off,
    Shower,
    ShowerOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeInput {
    Part,
    ToolSensor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeMode {
    SingleTouch,
    DoubleTouch,
}

/// M21/M22/M23
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MachineMirror {
    X,
    Y,
    Off,
}

/// M19/M20/M25 and the pallet changer M57/M58/M60
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuxFunction {
    OrientSpindle,
    IndexerStep,
    ParkZ,
    PalletOne,
    PalletTwo,
    PalletSwap,
}

/// G28/G29/G30
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HomeKind {
    Home,
    Return,
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopMode {
    Emergency,
    Compulsory,
    Optional,
}

/// Everything the interpreter asks of the hardware. Methods return `false`
/// when the machine refuses the request.
pub trait Machine {
    /// Run one move taken from the head of the motion queue
    fn execute(&mut self, record: &MoveRecord) -> bool;
    fn home(&mut self, kind: HomeKind, target: Point3) -> bool;
    /// Announce a cycle the interpreter does not expand itself
    fn cycle(&mut self, kind: CycleKind, target: &CycleTarget) -> bool;
    fn aux(&mut self, function: AuxFunction, argument: Option<u32>) -> bool;

    fn dwell(&mut self, seconds: f64) -> bool {
        log::debug!("Dwell for {:.3}s", seconds);
        true
    }

    fn start_spindle(&mut self, direction: SpindleDirection) -> bool;
    fn set_spindle_speed(&mut self, rpm: f64) -> bool;
    fn preselect_tool(&mut self, tool: u32) -> bool;
    fn change_tool(&mut self, tool: u32) -> bool;
    fn coolant(&mut self, mode: Coolant) -> bool;

    fn enable_overrides(&mut self, enabled: bool) -> bool;
    fn override_feed(&self, feed: f64) -> f64;
    fn override_speed(&self, speed: f64) -> f64;

    fn select_probe_input(&mut self, input: ProbeInput) -> bool {
        log::debug!("Probe signal source set to {:?}", input);
        true
    }

    fn select_probe_mode(&mut self, mode: ProbeMode) -> bool {
        log::debug!("Probing mode set to {:?}", mode);
        true
    }

    fn mirror(&mut self, mode: MachineMirror) -> bool;
    fn select_path_mode(&mut self, mode: PathMode) -> bool;
    fn servo_power(&mut self, on: bool) -> bool;

    fn display_message(&mut self, message: &Message);
    fn block_delete_enabled(&self) -> bool;
    fn optional_stop_enabled(&self) -> bool;
    fn is_running(&self) -> bool;
    fn stop(&mut self, mode: StopMode) -> bool;
}

/// A machine that only logs and keeps score
#[derive(Debug, Clone)]
pub struct SimulatedMachine {
    settings: MachineSettings,
    position: Point3,
    spindle: SpindleDirection,
    spindle_speed: f64,
    overrides_enabled: bool,
    servo: bool,
    running: bool,
    mirror: [bool; 2],
    exact_stop: bool,
    tool: u32,
    executed: Vec<MoveRecord>,
    messages: Vec<Message>,
    stops: Vec<StopMode>,
}

impl Default for SimulatedMachine {
    fn default() -> Self {
        Self::new(MachineSettings::default())
    }
}

impl SimulatedMachine {
    pub fn new(settings: MachineSettings) -> Self {
        let mut machine = Self {
            settings,
            position: Point3::ORIGIN,
            spindle: SpindleDirection::Stopped,
            spindle_speed: LOWEST_RPM,
            overrides_enabled: true,
            servo: false,
            running: true,
            mirror: [false; 2],
            exact_stop: false,
            tool: 0,
            executed: Vec::new(),
            messages: Vec::new(),
            stops: Vec::new(),
        };
        machine.servo_power(true);
        log::debug!("Machine is up");
        machine
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn spindle(&self) -> (SpindleDirection, f64) {
        (self.spindle, self.spindle_speed)
    }

    pub fn tool(&self) -> u32 {
        self.tool
    }

    pub fn servo(&self) -> bool {
        self.servo
    }

    pub fn exact_stop(&self) -> bool {
        self.exact_stop
    }

    pub fn mirrored(&self) -> [bool; 2] {
        self.mirror
    }

    pub fn executed(&self) -> &[MoveRecord] {
        &self.executed
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn stops(&self) -> &[StopMode] {
        &self.stops
    }

    pub fn drain_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    pub fn drain_executed(&mut self) -> Vec<MoveRecord> {
        std::mem::take(&mut self.executed)
    }

    /// Log an arc with its reconstructed centre offsets and radius.
    fn describe_arc(&self, record: &MoveRecord) {
        let start = Vec2::in_plane(self.position, record.plane);
        let center = Vec2::in_plane(record.center, record.plane);
        let offsets = record.center - self.position;
        log::debug!(
            "Circular move around C({:.2}, {:.2}, {:.2}) I{:.3} J{:.3} K{:.3} of radius {:.3}mm in plane {:?} {} ending at {:?} at {:?}",
            record.center.x,
            record.center.y,
            record.center.z,
            offsets.x,
            offsets.y,
            offsets.z,
            start.distance(center),
            record.plane,
            if record.ccw { "counter-clockwise" } else { "clockwise" },
            record.target,
            record.feed
        );
    }
}

impl Machine for SimulatedMachine {
    fn execute(&mut self, record: &MoveRecord) -> bool {
        if !self.servo {
            log::warn!("Servos off, move to {:?} refused", record.target);
            return false;
        }

        match record.kind {
            MoveKind::Line => {
                if record.target == self.position {
                    return false;
                }
                log::debug!("Linear move to {:?} at {:?}", record.target, record.feed);
            }
            MoveKind::Arc => self.describe_arc(record),
        }

        self.position = record.target;
        self.executed.push(*record);
        true
    }

    fn home(&mut self, kind: HomeKind, target: Point3) -> bool {
        if !self.servo {
            return false;
        }
        let axes: String = ['X', 'Y', 'Z']
            .iter()
            .enumerate()
            .filter(|(axis, _)| target[*axis] != self.position[*axis])
            .map(|(_, name)| *name)
            .collect();
        match kind {
            HomeKind::Home => log::debug!("Home and recalibrate cycle for axes: {}", axes),
            HomeKind::Return => log::debug!("Return from reference point cycle for axes: {}", axes),
            HomeKind::Zero => log::debug!("Go to zero cycle for axes: {}", axes),
        }
        self.position = target;
        true
    }

    fn cycle(&mut self, kind: CycleKind, target: &CycleTarget) -> bool {
        if !self.servo {
            return false;
        }
        log::debug!("Canned cycle G{} at {:?}", kind.code(), target.hole);
        if kind.is_probe() {
            self.position = target.hole;
        }
        true
    }

    fn aux(&mut self, function: AuxFunction, argument: Option<u32>) -> bool {
        if !self.servo {
            return false;
        }
        match function {
            AuxFunction::OrientSpindle => {
                if self.spindle != SpindleDirection::Stopped {
                    log::debug!("Spindle currently running, cannot orient!");
                } else {
                    log::debug!("Oriented spindle at {}deg", argument.unwrap_or(0));
                }
            }
            AuxFunction::IndexerStep => {
                log::debug!("Would advance indexer {} steps", argument.unwrap_or(1));
            }
            AuxFunction::ParkZ => log::debug!("Z-axis retracted/parked"),
            AuxFunction::PalletOne => log::debug!("Loading pallet 1"),
            AuxFunction::PalletTwo => log::debug!("Loading pallet 2"),
            AuxFunction::PalletSwap => log::debug!("Swapping pallets"),
        }
        true
    }

    fn start_spindle(&mut self, direction: SpindleDirection) -> bool {
        if !self.servo {
            return false;
        }
        if direction == self.spindle {
            return true;
        }
        match (self.spindle, direction) {
            (SpindleDirection::Stopped, _) => {
                log::debug!("Spindle started {:?} at {}rpm", direction, self.spindle_speed);
            }
            (_, SpindleDirection::Stopped) => log::debug!("Spindle stopped"),
            // Never reverse a running spindle
            _ => return false,
        }
        self.spindle = direction;
        true
    }

    fn set_spindle_speed(&mut self, rpm: f64) -> bool {
        self.spindle_speed = rpm.max(LOWEST_RPM);
        if self.spindle == SpindleDirection::Stopped {
            log::debug!("Spindle speed preset at {}rpm", self.spindle_speed);
        } else {
            log::debug!("Spindle now rotating at {}rpm", self.spindle_speed);
        }
        true
    }

    fn preselect_tool(&mut self, tool: u32) -> bool {
        if !self.servo {
            return false;
        }
        log::debug!("Moving tool carousel to tool {}", tool);
        true
    }

    fn change_tool(&mut self, tool: u32) -> bool {
        if !self.servo {
            return false;
        }
        if tool == 0 {
            log::debug!("Unloading spindle");
        } else {
            log::debug!("Performing ATC to tool {}", tool);
        }
        self.tool = tool;
        true
    }

    fn coolant(&mut self, mode: Coolant) -> bool {
        if !self.servo {
            return false;
        }
        log::debug!("Coolant {:?}", mode);
        true
    }

    fn enable_overrides(&mut self, enabled: bool) -> bool {
        self.overrides_enabled = enabled;
        log::debug!(
            "Feed and speed override switches {}",
            if enabled { "enabled" } else { "disabled" }
        );
        true
    }

    fn override_feed(&self, feed: f64) -> f64 {
        if self.overrides_enabled {
            feed * self.settings.feed_override
        } else {
            feed
        }
    }

    fn override_speed(&self, speed: f64) -> f64 {
        if self.overrides_enabled {
            speed * self.settings.speed_override
        } else {
            speed
        }
    }

    fn mirror(&mut self, mode: MachineMirror) -> bool {
        match mode {
            MachineMirror::X => self.mirror[0] = true,
            MachineMirror::Y => self.mirror[1] = true,
            MachineMirror::Off => self.mirror = [false; 2],
        }
        log::debug!("Machine mirroring {:?}", self.mirror);
        true
    }

    fn select_path_mode(&mut self, mode: PathMode) -> bool {
        self.exact_stop = mode == PathMode::ExactStop;
        log::debug!(
            "Exact stop check (path control) {}",
            if self.exact_stop { "on" } else { "off" }
        );
        true
    }

    fn servo_power(&mut self, on: bool) -> bool {
        self.servo = on;
        if on {
            self.display_message(&Message::warning("Machine servos activated!"));
        } else {
            self.display_message(&Message::status("Machine servos inactive"));
        }
        true
    }

    fn display_message(&mut self, message: &Message) {
        message.log();
        self.messages.push(message.clone());
    }

    fn block_delete_enabled(&self) -> bool {
        self.settings.block_delete
    }

    fn optional_stop_enabled(&self) -> bool {
        self.settings.optional_stop
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn stop(&mut self, mode: StopMode) -> bool {
        match mode {
            StopMode::Emergency => {
                self.display_message(&Message::status("Machine in E-Stop"));
                self.running = false;
            }
            StopMode::Compulsory => {
                self.display_message(&Message::status("Machine in compulsory stop"));
            }
            StopMode::Optional => {
                if !self.optional_stop_enabled() {
                    return false;
                }
                self.display_message(&Message::status("Machine in optional stop"));
            }
        }
        self.stops.push(mode);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use crate::queue::Feed;

    #[test]
    fn test_startup_activates_servos() {
        let machine = SimulatedMachine::default();
        assert!(machine.servo());
        assert_eq!(machine.messages()[0].to_string(), "WAR: Machine servos activated!");
    }

    #[test]
    fn test_moves_refused_without_servo_power() {
        let mut machine = SimulatedMachine::default();
        machine.servo_power(false);
        let record = MoveRecord::line(Point3::new(1.0, 0.0, 0.0), Feed::Rapid);
        assert!(!machine.execute(&record));
        assert!(machine.executed().is_empty());
        assert_eq!(machine.messages()[1].severity, Severity::Status);
    }

    #[test]
    fn test_spindle_will_not_reverse() {
        let mut machine = SimulatedMachine::default();
        assert!(machine.start_spindle(SpindleDirection::Clockwise));
        assert!(!machine.start_spindle(SpindleDirection::CounterClockwise));
        assert!(machine.start_spindle(SpindleDirection::Stopped));
        assert!(machine.start_spindle(SpindleDirection::CounterClockwise));
    }

    #[test]
    fn test_speed_floor_and_overrides() {
        let mut machine = SimulatedMachine::default();
        machine.set_spindle_speed(10.0);
        assert_eq!(machine.spindle().1, LOWEST_RPM);
        assert!((machine.override_feed(100.0) - 90.0).abs() < 1e-9);
        machine.enable_overrides(false);
        assert_eq!(machine.override_feed(100.0), 100.0);
    }

    #[test]
    fn test_stops() {
        let mut machine = SimulatedMachine::default();
        assert!(!machine.stop(StopMode::Optional));
        assert!(machine.stop(StopMode::Compulsory));
        assert!(machine.is_running());
        assert!(machine.stop(StopMode::Emergency));
        assert!(!machine.is_running());
        assert_eq!(machine.stops(), &[StopMode::Compulsory, StopMode::Emergency]);
    }
}
