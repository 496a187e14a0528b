//! Sequence point, motion dispatch and everything that runs after it:
//! stops, parameter assignments and program flow.

use super::Interpreter;
use crate::core::{
    CartesianMode, CycleKind, CycleTarget, FeedMode, Message, MotionMode, Point3, WORK_SYSTEMS,
};
use crate::cycles;
use crate::machine::{AuxFunction, Machine, StopMode};
use crate::parameters::{FIRST_WCS, WCS_STRIDE};
use crate::parser::{ABSENT_INTEGER, Block};
use crate::queue::{CornerMode, Feed, MoveRecord};
use crate::stacks::ProgramPointer;
use crate::tools::{TOOL_COUNT, ToolTable, update_tool};
use crate::transform::{self, AxisWords};

/// Macro argument words and the parameters they land in
const MACRO_ARGUMENTS: [(char, usize); 18] = [
    ('A', 1),
    ('B', 2),
    ('C', 3),
    ('I', 4),
    ('J', 5),
    ('K', 6),
    ('D', 7),
    ('H', 11),
    ('L', 12),
    ('P', 16),
    ('Q', 17),
    ('R', 18),
    ('U', 21),
    ('V', 22),
    ('W', 23),
    ('X', 24),
    ('Y', 25),
    ('Z', 26),
];

impl<M: Machine> Interpreter<M> {
    /// The one place axis words are read for motion. Returns true when the
    /// pipeline moved the frame for a line or arc.
    pub(super) fn sequence_point(&mut self, block: &Block, words: AxisWords) -> bool {
        if self.modal.axis_words_consumed {
            self.modal.axis_words_consumed = false;
            return false;
        }

        match self.modal.motion {
            MotionMode::Cycle => {
                self.enter_cycle(words);
                false
            }
            MotionMode::Store => {
                self.store_data(block, words);
                false
            }
            MotionMode::Macro => {
                self.load_macro_arguments(block);
                false
            }
            MotionMode::Off => false,
            MotionMode::Rapid | MotionMode::Linear | MotionMode::Arc => {
                if words.is_empty() {
                    return false;
                }
                transform::transform(&mut self.frame, &self.params, words);
                true
            }
        }
    }

    pub(super) fn dispatch(&mut self, block: &Block, words: AxisWords, start: Point3, moved: bool) {
        match self.modal.motion {
            MotionMode::Rapid if moved => self.queue_line(Feed::Rapid, words),
            MotionMode::Linear if moved => {
                let feed = self.feed();
                self.queue_line(feed, words);
            }
            MotionMode::Arc => {
                let centre_words = ['I', 'J', 'K', 'R'].iter().any(|l| block.has(*l));
                if moved || (self.modal.full_circle && centre_words && !self.frame.machine_select) {
                    self.queue_arc(block, words, start);
                }
            }
            _ => {}
        }
    }

    /// G9 only lasts for one motion block.
    pub(super) fn restore_path_mode(&mut self) {
        if self.modal.exact_stop_once && self.modal.motion != MotionMode::Off {
            self.machine.select_path_mode(self.modal.path_mode);
            self.modal.exact_stop_once = false;
        }
    }

    pub(super) fn apply_stop_words(&mut self, block: &Block) {
        let Some(code) = block.code_in('M', &[0, 1, 2, 17, 18, 30, 36, 57, 58, 60]) else {
            return;
        };

        match code {
            36 => {
                self.machine.servo_power(false);
                self.machine.stop(StopMode::Emergency);
            }
            0 => {
                self.synchronize();
                self.machine.stop(StopMode::Compulsory);
            }
            1 => {
                self.synchronize();
                self.machine.stop(StopMode::Optional);
            }
            30 => {
                self.input.rewind();
                self.end_program();
            }
            2 => self.end_program(),
            17 | 18 => {
                self.synchronize();
                self.machine.servo_power(code == 17);
            }
            _ => {
                let function = match code {
                    57 => AuxFunction::PalletOne,
                    58 => AuxFunction::PalletTwo,
                    _ => AuxFunction::PalletSwap,
                };
                self.synchronize();
                self.machine.aux(function, None);
                self.machine.stop(StopMode::Compulsory);
            }
        }
    }

    /// `#n=value` words, visible from the next block on
    pub(super) fn apply_assignments(&mut self, block: &Block) {
        if block.assignments().is_empty() {
            return;
        }
        for &(index, value) in block.assignments() {
            if !(index.is_finite() && index >= 0.0) {
                self.report(Message::error("Invalid parameter reference in assignment"));
                continue;
            }
            let index = index.trunc() as usize;
            if let Err(e) = self.params.queue_update(index, value) {
                self.report(Message::error(format!("#{} not set: {}", index, e)));
            }
        }
        self.params.commit();
    }

    pub(super) fn apply_flow_words(&mut self, block: &Block) {
        if block.has_code('M', 47) {
            self.input.rewind();
        }
        if self.modal.motion == MotionMode::Macro {
            self.modal.motion = self.modal.saved_motion;
        }
        if self.modal.macro_call {
            self.modal.macro_call = false;
            self.call_program(block, true);
        }
        if block.has_code('M', 98) {
            self.call_program(block, false);
        }
        if block.has_code('M', 99) {
            self.return_from_program();
        }
    }

    fn end_program(&mut self) {
        log::info!("Reached end of program flow after {} blocks", self.blocks);
        self.running = false;
    }

    fn feed(&self) -> Feed {
        match self.modal.feed_mode {
            FeedMode::PerMinute => Feed::PerMinute(self.frame.units.to_mm(self.modal.feed)),
            FeedMode::InverseTime => Feed::InverseTime(self.modal.feed),
        }
    }

    fn corner_mode(&self) -> CornerMode {
        if self.modal.exact_stop() {
            CornerMode::Fillet
        } else {
            CornerMode::Trim
        }
    }

    /// Axes the program drives. A polar word moves both in-plane axes.
    fn moving_axes(&self, words: AxisWords) -> [bool; 3] {
        let mut mask = words.mask();
        if self.frame.cartesian == CartesianMode::Polar && !self.frame.machine_select {
            let (a, b, _) = self.frame.plane.axes();
            if mask[a] || mask[b] {
                mask[a] = true;
                mask[b] = true;
            }
        }
        mask
    }

    fn queue_line(&mut self, feed: Feed, words: AxisWords) {
        if feed != Feed::Rapid && self.modal.feed <= 0.0 {
            self.report(Message::warning("Feed move without a feed rate"));
        }
        let record = MoveRecord::line(self.frame.machine(), feed)
            .with_plane(self.frame.plane)
            .with_compensation(self.frame.radius_comp)
            .with_corner(self.corner_mode())
            .with_moving(self.moving_axes(words));
        self.enqueue(record);
    }

    /// Arc from `start` (logical) to the current position. I/J/K and R are
    /// read from this block only.
    fn queue_arc(&mut self, block: &Block, words: AxisWords, start: Point3) {
        let feed = self.feed();
        let end = self.frame.logical();
        let offsets = [block.axis('I'), block.axis('J'), block.axis('K')];
        let radius = block.axis('R');
        let ccw = self.modal.ccw;

        let center = transform::arc_center(&self.frame, start, end, offsets, radius, ccw).or_else(
            || match radius {
                Some(r) if self.modal.full_circle => Some(self.circle_center(start, r)),
                _ => None,
            },
        );

        let Some(center) = center else {
            self.report(Message::error(format!(
                "No arc to {:?} with the given centre words, moving in a line",
                self.frame.machine()
            )));
            self.queue_line(feed, words);
            return;
        };

        let (a, b, _) = self.frame.plane.axes();
        let mut moving = words.mask();
        moving[a] = true;
        moving[b] = true;

        let ccw = ccw != transform::reverses_arcs(&self.frame);
        let record = MoveRecord::arc(self.frame.machine(), center, ccw, self.frame.plane, feed)
            .with_compensation(self.frame.radius_comp)
            .with_corner(self.corner_mode())
            .with_moving(moving);
        self.enqueue(record);
    }

    /// Full circle given by radius: the centre lies along the plane's first
    /// axis.
    fn circle_center(&self, start: Point3, radius: f64) -> Point3 {
        let (a, _, _) = self.frame.plane.axes();
        let mut center = start;
        center[a] += self.frame.units.to_mm(radius.abs());
        transform::project(&self.frame, center)
    }

    /// Position over the hole and splice the expanded cycle into the input.
    /// A cycle block without axis words only restores the modal cycle.
    fn enter_cycle(&mut self, words: AxisWords) {
        let Some(kind) = self.modal.cycle else {
            return;
        };
        if words.is_empty() {
            return;
        }
        if kind.is_probe() {
            self.probe(kind, words);
            return;
        }

        if let Some(z) = words.z {
            self.modal.registers.z = Some(z);
        }
        let registers = self.modal.registers;
        let target = transform::transform_cycle(
            &mut self.frame,
            &self.params,
            words,
            registers.z,
            registers.r,
        );

        match cycles::generate(kind, &registers, self.modal.retract, &target, self.frame.units) {
            Some(text) => {
                log::debug!("G{} expanded into {} blocks", kind.code(), text.lines().count());
                self.input.splice(&text);
            }
            None => {
                self.report(Message::warning(format!(
                    "Cycle G{} not expanded, passed to the machine",
                    kind.code()
                )));
                self.enqueue(
                    MoveRecord::line(self.frame.machine(), Feed::Rapid)
                        .with_plane(self.frame.plane)
                        .with_moving(words.mask()),
                );
                self.flush_lookahead();
                self.synchronize();
                if !self.machine.cycle(kind, &target) {
                    self.report(Message::error(format!("Cycle G{} refused", kind.code())));
                }
            }
        }
    }

    fn probe(&mut self, kind: CycleKind, words: AxisWords) {
        let initial = self.frame.machine();
        let target = transform::transform(&mut self.frame, &self.params, words);
        let cycle = CycleTarget {
            initial,
            hole: target,
            retract_plane: target.z,
            step: Point3::ORIGIN,
        };

        self.flush_lookahead();
        self.synchronize();
        if !self.machine.cycle(kind, &cycle) {
            self.report(Message::error(format!("Probe G{} refused", kind.code())));
        }
        self.queue.set_position(target);
    }

    /// G10 data entry. Values are in program units and bypass every other
    /// pipeline stage.
    fn store_data(&mut self, block: &Block, words: AxisWords) {
        match block.integer('L') {
            2 => self.store_work_offset(block, words),
            3 => self.store_tool(block),
            _ => self.report(Message::warning("G10 without L2 or L3 ignored")),
        }
    }

    /// G10 L2 P<system>: absent axes take the current machine position.
    fn store_work_offset(&mut self, block: &Block, words: AxisWords) {
        let system = block.integer('P');
        if system == 0 || system > u32::from(WORK_SYSTEMS) {
            self.report(Message::error("G10 L2 needs a work system P1 to P6"));
            return;
        }

        let base = FIRST_WCS + (system as usize - 1) * WCS_STRIDE;
        let current = self.frame.machine();
        for axis in 0..3 {
            let value = words
                .get(axis)
                .map(|v| self.frame.units.to_mm(v))
                .unwrap_or(current[axis]);
            if let Err(e) = self.params.queue_update(base + axis, value) {
                self.report(Message::error(format!("Work offset not stored: {}", e)));
            }
        }
        self.params.commit();
        log::debug!("Work system {} set to {:?}", system, self.params.point(base));
    }

    /// G10 L3 P<tool> H<length> D<diameter>
    fn store_tool(&mut self, block: &Block) {
        let index = block.integer('P');
        if index == 0 || index == ABSENT_INTEGER || index as usize > TOOL_COUNT {
            self.report(Message::error("G10 L3 needs a tool P1 to P99"));
            return;
        }

        let mut tool = ToolTable::new(&self.params).get(index as usize);
        if let Some(length) = block.axis('H') {
            tool.length = self.frame.units.to_mm(length);
        }
        if let Some(diameter) = block.axis('D') {
            tool.diameter = self.frame.units.to_mm(diameter);
        }
        if let Err(e) = update_tool(&mut self.params, &tool) {
            self.report(Message::error(format!("Tool T{} not stored: {}", index, e)));
        }
        self.params.commit();
    }

    /// G65: save `#1..#33` and copy the argument words in.
    fn load_macro_arguments(&mut self, block: &Block) {
        if let Err(e) = self.stacks.push_parameters(&self.params) {
            self.report(Message::error(format!("Macro call refused: {}", e)));
            self.modal.macro_call = false;
            return;
        }
        for (letter, index) in MACRO_ARGUMENTS {
            if let Err(e) = self.params.queue_update(index, block.real(letter)) {
                self.report(Message::error(format!("Macro argument {} lost: {}", letter, e)));
            }
        }
        self.params.commit();
    }

    /// M98 or G65: remember where to come back to, then jump. On failure the
    /// program carries on with the next block.
    fn call_program(&mut self, block: &Block, macro_call: bool) {
        let program = block.integer('P');
        let repeat = match block.integer('L') {
            ABSENT_INTEGER | 0 => 1,
            n => n,
        };

        let Some(start) = self.input.program_offset(program) else {
            self.report(Message::error(format!("Program O{} not found", program)));
            if macro_call {
                self.restore_macro_arguments();
            }
            return;
        };

        let caller = ProgramPointer {
            line: self.input.tell(),
            macro_call,
            repeat_count: 1,
        };
        let body = ProgramPointer {
            line: start,
            macro_call: false,
            repeat_count: repeat,
        };

        // Both frames go on or neither does
        let mut pushed = self.stacks.push_program(caller);
        if pushed.is_ok() {
            pushed = self.stacks.push_program(body);
            if pushed.is_err() {
                let _ = self.stacks.pop_program();
            }
        }
        if let Err(e) = pushed {
            self.report(Message::error(format!("Call to O{} refused: {}", program, e)));
            if macro_call {
                self.restore_macro_arguments();
            }
            return;
        }

        self.input.seek(start);
        log::debug!("Calling O{} {} times", program, repeat);
    }

    /// M99: loop the subprogram while repeats remain, else return to the
    /// caller.
    fn return_from_program(&mut self) {
        let Ok(mut body) = self.stacks.pop_program() else {
            self.report(Message::warning("M99 outside a subprogram ignored"));
            return;
        };

        body.repeat_count = body.repeat_count.saturating_sub(1);
        if body.repeat_count > 0 {
            self.input.seek(body.line);
            if let Err(e) = self.stacks.push_program(body) {
                self.report(Message::error(format!("Subprogram loop lost: {}", e)));
            }
            return;
        }

        match self.stacks.pop_program() {
            Ok(caller) => {
                if !self.input.seek(caller.line) {
                    self.report(Message::error("Return address past end of program"));
                }
                if caller.macro_call {
                    self.restore_macro_arguments();
                }
            }
            Err(e) => self.report(Message::error(format!("Return address lost: {}", e))),
        }
    }

    fn restore_macro_arguments(&mut self) {
        if let Err(e) = self.stacks.pop_parameters(&mut self.params) {
            self.report(Message::error(format!("Macro arguments not restored: {}", e)));
        }
    }
}
