//! Interpreter
//!
//! Runs a part program block by block. Every block runs to completion:
//! - modal word groups are applied in a fixed order (see `block.rs`)
//! - axis words pass through the coordinate pipeline exactly once, at the
//!   sequence point
//! - the resulting motion is queued, then stops, parameter assignments and
//!   program flow words run last (see `motion.rs`)
//!
//! The motion queue is drained in lock-step with the producer: at most one
//! move reaches the machine per block, plus whatever a synchronising word
//! (dwell, tool change, stop, homing) forces out.

mod block;
mod motion;

use crate::core::{CoordinateFrame, CoordinateSystem, Message, ModalState, Point3, WORK_SYSTEMS};
use crate::input::ProgramInput;
use crate::machine::Machine;
use crate::parameters::{CURRENT_WCS, G92_OFFSET, ParameterStore};
use crate::parser::{Block, parse_block};
use crate::queue::{MotionQueue, MoveRecord, QueueError};
use crate::stacks::CallStack;
use crate::tools::ToolTable;
use crate::transform::AxisWords;

/// Smallest queue that holds a compensated corner: offset leg plus fillet
pub const MIN_QUEUE_DEPTH: usize = 2;

pub struct Interpreter<M: Machine> {
    machine: M,
    input: ProgramInput,
    params: ParameterStore,
    stacks: CallStack,
    queue: MotionQueue,
    frame: CoordinateFrame,
    modal: ModalState,
    running: bool,
    /// Machine-space point the last G28/G30 passed through
    intermediate: Point3,
    blocks: usize,
}

impl<M: Machine> Interpreter<M> {
    /// Build an interpreter around its collaborators. The active work
    /// system and the G92 offset are restored from the parameter store.
    pub fn new(machine: M, input: ProgramInput, params: ParameterStore, queue_depth: usize) -> Self {
        let mut frame = CoordinateFrame::new();

        let system = params.get(CURRENT_WCS);
        if system >= 1.0 && system <= f64::from(WORK_SYSTEMS) {
            frame.current_system = CoordinateSystem::Work(system.trunc() as u8);
        }
        let offset = params.point(G92_OFFSET);
        if offset.is_finite() {
            frame.offset = offset;
        }

        log::debug!(
            "G-code state machine up, work system {}, local offset {:?}, {} tools installed",
            frame.current_system.number(),
            frame.offset,
            ToolTable::new(&params).installed_count()
        );

        Self {
            machine,
            input,
            params,
            stacks: CallStack::new(),
            queue: MotionQueue::new(queue_depth.max(MIN_QUEUE_DEPTH)),
            frame,
            modal: ModalState::new(),
            running: true,
            intermediate: Point3::ORIGIN,
            blocks: 0,
        }
    }

    /// Fetch and run one block, then hand at most one queued move to the
    /// machine. Returns false once the program has ended.
    pub fn step(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }

        let block_delete = self.machine.block_delete_enabled();
        let line = self.input.fetch_line(block_delete);
        self.forward_input_messages();

        let Some(line) = line else {
            log::info!("End of input after {} blocks", self.blocks);
            self.running = false;
            return false;
        };

        self.execute_block(&line);
        self.execute_next();
        self.is_running()
    }

    /// Run to the end of the program and drain the queue. Returns the
    /// number of blocks executed.
    pub fn run(&mut self) -> usize {
        while self.step() {}
        self.finish();
        self.blocks
    }

    /// Release the compensation lookahead and let the machine catch up.
    pub fn finish(&mut self) {
        self.flush_lookahead();
        self.synchronize();
        log::debug!("G-code state machine down after {} blocks", self.blocks);
    }

    /// Run one sanitized block.
    pub fn execute_block(&mut self, text: &str) {
        let parsed = parse_block(text);
        for token in parsed.unknown.iter().filter(|t| t.as_str() != "/") {
            self.report(Message::warning(format!("Unrecognised token '{}' ignored", token)));
        }

        let block = Block::resolve(&parsed, &self.params);
        if block.is_empty() {
            return;
        }
        self.blocks += 1;
        self.frame.machine_select = false;

        self.apply_machine_words(&block);
        self.apply_frame_words(&block);
        self.apply_distance_words(&block);
        self.apply_positioning_words(&block);
        self.apply_motion_words(&block);

        let start = self.frame.logical();
        let words = AxisWords::from_block(&block);
        let moved = self.sequence_point(&block, words);
        self.dispatch(&block, words, start, moved);

        self.restore_path_mode();
        self.apply_stop_words(&block);
        self.apply_assignments(&block);
        self.apply_flow_words(&block);
    }

    pub fn is_running(&self) -> bool {
        self.running && self.machine.is_running()
    }

    pub fn frame(&self) -> &CoordinateFrame {
        &self.frame
    }

    pub fn modal(&self) -> &ModalState {
        &self.modal
    }

    pub fn queue(&self) -> &MotionQueue {
        &self.queue
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Hand back the machine and the parameter store, e.g. for saving.
    pub fn into_parts(self) -> (M, ParameterStore) {
        (self.machine, self.params)
    }

    fn report(&mut self, message: Message) {
        self.machine.display_message(&message);
    }

    fn forward_input_messages(&mut self) {
        for message in self.input.drain_messages() {
            self.report(message);
        }
    }

    /// Queue a move, draining the queue into the machine while it is full.
    fn enqueue(&mut self, record: MoveRecord) {
        while let Err(QueueError::Full) = self.queue.enqueue(record) {
            self.report(Message::error("Motion queue full, waiting for the machine"));
            if !self.execute_next() {
                self.report(Message::error(format!(
                    "Move to {:?} does not fit the motion queue",
                    record.target
                )));
                return;
            }
        }
    }

    /// Hand the head of the queue to the machine. False when it was empty.
    fn execute_next(&mut self) -> bool {
        let Some(record) = self.queue.dequeue() else {
            return false;
        };
        if !self.machine.execute(&record) {
            log::debug!("Machine did not execute move to {:?}", record.target);
        }
        true
    }

    /// Run every queued move. The lookahead cell is left alone.
    fn synchronize(&mut self) {
        while self.execute_next() {}
    }

    fn flush_lookahead(&mut self) {
        while let Err(QueueError::Full) = self.queue.flush() {
            if !self.execute_next() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MotionMode, Severity, Units};
    use crate::machine::SimulatedMachine;
    use crate::parameters::{FIRST_WCS, G28_REFERENCE, TOOL_DIAMETER_BASE, WCS_STRIDE};
    use crate::profile::MachineSettings;
    use crate::queue::{Feed, MoveKind};

    fn approx_point(p: Point3, x: f64, y: f64, z: f64) {
        assert!(
            (p.x - x).abs() <= 1e-6 && (p.y - y).abs() <= 1e-6 && (p.z - z).abs() <= 1e-6,
            "expected ({}, {}, {}), got {:?}",
            x,
            y,
            z,
            p
        );
    }

    fn machine() -> SimulatedMachine {
        SimulatedMachine::new(MachineSettings {
            feed_override: 1.0,
            speed_override: 1.0,
            ..MachineSettings::default()
        })
    }

    fn interpreter_with(program: &str, params: ParameterStore) -> Interpreter<SimulatedMachine> {
        Interpreter::new(machine(), ProgramInput::new(program), params, 16)
    }

    fn run(program: &str) -> Interpreter<SimulatedMachine> {
        let mut interpreter = interpreter_with(program, ParameterStore::new());
        interpreter.run();
        interpreter
    }

    fn targets(interpreter: &Interpreter<SimulatedMachine>) -> Vec<Point3> {
        interpreter.machine().executed().iter().map(|m| m.target).collect()
    }

    #[test]
    fn test_square_pocket() {
        let interpreter = run("G21 G90 G1 F100 X10 Y0 Z0\nX10 Y10\nX0 Y10\nX0 Y0\n");
        assert_eq!(
            targets(&interpreter),
            vec![
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(10.0, 10.0, 0.0),
                Point3::new(0.0, 10.0, 0.0),
                Point3::ORIGIN,
            ]
        );
        assert!(
            interpreter
                .machine()
                .executed()
                .iter()
                .all(|m| m.kind == MoveKind::Line && m.feed == Feed::PerMinute(100.0))
        );
    }

    #[test]
    fn test_inch_feed_is_converted() {
        let interpreter = run("G20 G1 F10 X1\n");
        let executed = interpreter.machine().executed();
        assert_eq!(executed[0].feed, Feed::PerMinute(254.0));
        approx_point(executed[0].target, 25.4, 0.0, 0.0);
        assert_eq!(interpreter.frame().units, Units::Inch);
    }

    #[test]
    fn test_inch_radius_arc() {
        let interpreter = run("G20 G17 G90 G0 X0 Y0\nG2 X1 Y1 R1 F10\n");
        let arc = interpreter.machine().executed()[0];
        assert_eq!(arc.kind, MoveKind::Arc);
        assert!(!arc.ccw);
        let i = arc.center.x;
        let j = arc.center.y;
        assert!((i.hypot(j) - 25.4).abs() <= 1e-6);
        approx_point(arc.target, 25.4, 25.4, 0.0);
    }

    #[test]
    fn test_full_circle_returns_to_start() {
        let interpreter = run("G0 X10 Y0\nG13 I-10 J0 F100\n");
        let executed = interpreter.machine().executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[1].kind, MoveKind::Arc);
        assert!(executed[1].ccw);
        approx_point(executed[1].target, 10.0, 0.0, 0.0);
        approx_point(executed[1].center, 0.0, 0.0, 0.0);
    }

    #[test]
    fn test_no_motion_block_is_idempotent() {
        let mut interpreter = run("G0 X1 Y2 Z3\n");
        let before = interpreter.frame().clone();
        interpreter.execute_block("G90");
        interpreter.execute_block("F200");
        assert_eq!(interpreter.frame().machine(), before.machine());
        assert_eq!(interpreter.frame().logical(), before.logical());
    }

    #[test]
    fn test_g92_makes_position_read_as_programmed() {
        let interpreter = run("G0 X10 Y10\nG92 X0 Y0\nG0 X5\n");
        approx_point(interpreter.frame().machine(), 15.0, 10.0, 0.0);
        assert_eq!(interpreter.params().get(G92_OFFSET), 10.0);
    }

    #[test]
    fn test_work_offset_round_trip() {
        let interpreter = run("G0 X10 Y20 Z5\nG10 L2 P2\nG11\nG55 G0 X0 Y0 Z0\n");
        approx_point(interpreter.frame().machine(), 10.0, 20.0, 5.0);
        let base = FIRST_WCS + WCS_STRIDE;
        assert_eq!(interpreter.params().get(base), 10.0);
        assert_eq!(interpreter.params().get(CURRENT_WCS), 2.0);
        assert_eq!(interpreter.machine().executed().len(), 1);
    }

    #[test]
    fn test_work_system_restored_from_parameters() {
        let mut params = ParameterStore::new();
        params.set_immediate(CURRENT_WCS, 3.0).unwrap();
        params.set_immediate(FIRST_WCS + 2 * WCS_STRIDE, 100.0).unwrap();
        let mut interpreter = interpreter_with("G0 X1\n", params);
        interpreter.run();
        assert_eq!(interpreter.frame().current_system, CoordinateSystem::Work(3));
        approx_point(interpreter.frame().machine(), 101.0, 0.0, 0.0);
    }

    #[test]
    fn test_subprogram_repeats() {
        let program = "G0 X0\nM98 P100 L3\nG0 Y5\nM30\nO100\nG91 G0 X1\nG90\nM99\n";
        let interpreter = run(program);
        approx_point(interpreter.frame().machine(), 3.0, 5.0, 0.0);
        assert_eq!(interpreter.machine().executed().len(), 4);
        assert_eq!(interpreter.stacks.program_depth(), 0);
    }

    #[test]
    fn test_unknown_program_fails_the_jump() {
        let interpreter = run("M98 P999\nG0 X1\n");
        let messages = interpreter.machine().messages();
        assert!(
            messages
                .iter()
                .any(|m| m.severity == Severity::Error && m.text.contains("O999"))
        );
        approx_point(interpreter.frame().machine(), 1.0, 0.0, 0.0);
    }

    #[test]
    fn test_macro_call_copies_and_restores_arguments() {
        let program = "G1 F100\nG65 P200 A2 B3 X7\nM30\nO200\n#100=#1\n#101=#2\n#102=#24\nM99\n";
        let interpreter = run(program);
        let params = interpreter.params();
        assert_eq!(params.get(100), 2.0);
        assert_eq!(params.get(101), 3.0);
        assert_eq!(params.get(102), 7.0);
        assert_eq!(params.get(1), 0.0);
        assert_eq!(interpreter.modal().motion, MotionMode::Linear);
        assert!(interpreter.machine().executed().is_empty());
    }

    #[test]
    fn test_return_without_caller_warns() {
        let interpreter = run("M99\n");
        assert!(
            interpreter
                .machine()
                .messages()
                .iter()
                .any(|m| m.severity == Severity::Warning && m.text.contains("M99"))
        );
    }

    #[test]
    fn test_drill_cycle_expands_to_moves() {
        let interpreter = run("G0 X0 Y0 Z10\nG99 G81 X5 Y5 Z-3 R2 F50\nG80\n");
        assert_eq!(
            targets(&interpreter),
            vec![
                Point3::new(0.0, 0.0, 10.0),
                Point3::new(5.0, 5.0, 10.0),
                Point3::new(5.0, 5.0, 2.0),
                Point3::new(5.0, 5.0, -3.0),
                Point3::new(5.0, 5.0, 2.0),
            ]
        );
        assert_eq!(interpreter.modal().cycle, None);
        assert_eq!(interpreter.modal().registers.z, Some(-3.0));
    }

    #[test]
    fn test_cycle_words_are_modal() {
        let interpreter = run("G0 Z10\nG98 G81 X5 Y5 Z-3 R2 F50\nX15\nG80\n");
        let bottoms: Vec<Point3> = interpreter
            .machine()
            .executed()
            .iter()
            .filter(|m| m.feed == Feed::PerMinute(50.0))
            .map(|m| m.target)
            .collect();
        assert_eq!(
            bottoms,
            vec![Point3::new(5.0, 5.0, -3.0), Point3::new(15.0, 5.0, -3.0)]
        );
        approx_point(interpreter.frame().machine(), 15.0, 5.0, 10.0);
    }

    #[test]
    fn test_radius_compensation_outside_corner() {
        let mut params = ParameterStore::new();
        params.set_immediate(TOOL_DIAMETER_BASE + 1, 4.0).unwrap();
        let program = "T1 M6\nG17 G41 D1 G1 F100 X10 Y0\nX10 Y-10\n";
        let mut interpreter = interpreter_with(program, params);
        interpreter.run();

        let executed = interpreter.machine().executed();
        assert_eq!(executed.len(), 3);
        approx_point(executed[0].target, 10.0, 2.0, 0.0);
        assert_eq!(executed[1].kind, MoveKind::Arc);
        approx_point(executed[1].center, 10.0, 0.0, 0.0);
        approx_point(executed[1].target, 12.0, 0.0, 0.0);
        approx_point(executed[2].target, 12.0, -10.0, 0.0);
        assert_eq!(interpreter.machine().tool(), 1);
    }

    #[test]
    fn test_home_goes_through_intermediate_point() {
        let mut params = ParameterStore::new();
        params.set_immediate(G28_REFERENCE, 1.0).unwrap();
        params.set_immediate(G28_REFERENCE + 1, 2.0).unwrap();
        params.set_immediate(G28_REFERENCE + 2, 3.0).unwrap();
        let mut interpreter = interpreter_with("G0 X10 Y10 Z10\nG28 Z20\n", params);
        interpreter.run();

        approx_point(interpreter.frame().machine(), 10.0, 10.0, 3.0);
        approx_point(interpreter.machine().position(), 10.0, 10.0, 3.0);
        assert_eq!(interpreter.modal().motion, MotionMode::Off);
        assert_eq!(targets(&interpreter)[1], Point3::new(10.0, 10.0, 20.0));
    }

    #[test]
    fn test_parameter_assignment_is_visible_next_block() {
        let interpreter = run("#1=5 G0 X#1\nG0 X#1\n");
        // The first block still reads the old #1
        assert_eq!(targets(&interpreter), vec![Point3::new(5.0, 0.0, 0.0)]);
        assert_eq!(interpreter.params().get(1), 5.0);
    }

    #[test]
    fn test_emergency_stop_halts_intake() {
        let interpreter = run("G0 X1\nM36\nG0 X2\n");
        assert!(!interpreter.is_running());
        assert_eq!(targets(&interpreter), vec![Point3::new(1.0, 0.0, 0.0)]);
        assert!(!interpreter.machine().servo());
    }

    #[test]
    fn test_program_end_stops_reading() {
        let interpreter = run("G0 X1\nM2\nG0 X2\n");
        assert_eq!(targets(&interpreter), vec![Point3::new(1.0, 0.0, 0.0)]);
        assert_eq!(interpreter.blocks(), 2);
    }

    #[test]
    fn test_unknown_token_is_reported() {
        let mut interpreter = run("");
        interpreter.execute_block("G0X1$");
        assert!(
            interpreter
                .machine()
                .messages()
                .iter()
                .any(|m| m.severity == Severity::Warning && m.text.contains('$'))
        );
        approx_point(interpreter.frame().machine(), 1.0, 0.0, 0.0);
    }

    #[test]
    fn test_operator_messages_reach_the_machine() {
        let interpreter = run("(MSG,Load part)\nG0 X1\n");
        assert!(
            interpreter
                .machine()
                .messages()
                .iter()
                .any(|m| m.severity == Severity::Operator && m.text == "Load part")
        );
    }

    #[test]
    fn test_machine_coordinates_bypass_work_offset() {
        let mut params = ParameterStore::new();
        params.set_immediate(FIRST_WCS, 50.0).unwrap();
        let mut interpreter = interpreter_with("G0 X1\nG53 G0 X1\nG0 X2\n", params);
        interpreter.run();
        assert_eq!(
            targets(&interpreter),
            vec![
                Point3::new(51.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(52.0, 0.0, 0.0),
            ]
        );
    }
}
