//! End-to-end programs run against the simulated machine
use gcode_canon::core::{Point3, Severity};
use gcode_canon::machine::StopMode;
use gcode_canon::parameters::TOOL_DIAMETER_BASE;
use gcode_canon::queue::{Feed, MoveKind};
use gcode_canon::{Interpreter, MachineSettings, ParameterStore, ProgramInput, SimulatedMachine};

const TOLERANCE: f64 = 1e-6;

fn assert_point(actual: Point3, x: f64, y: f64, z: f64) {
    assert!(
        (actual.x - x).abs() <= TOLERANCE
            && (actual.y - y).abs() <= TOLERANCE
            && (actual.z - z).abs() <= TOLERANCE,
        "expected ({}, {}, {}), got {:?}",
        x,
        y,
        z,
        actual
    );
}

fn interpreter(program: &str, params: ParameterStore) -> Interpreter<SimulatedMachine> {
    let machine = SimulatedMachine::new(MachineSettings {
        feed_override: 1.0,
        speed_override: 1.0,
        ..MachineSettings::default()
    });
    Interpreter::new(machine, ProgramInput::new(program), params, 8)
}

fn run(program: &str) -> Interpreter<SimulatedMachine> {
    let mut interpreter = interpreter(program, ParameterStore::new());
    interpreter.run();
    interpreter
}

fn run_with_tool(program: &str, diameter: f64) -> Interpreter<SimulatedMachine> {
    let mut params = ParameterStore::new();
    params
        .set_immediate(TOOL_DIAMETER_BASE + 1, diameter)
        .expect("tool diameter");
    let mut interpreter = interpreter(program, params);
    interpreter.run();
    interpreter
}

fn targets(interpreter: &Interpreter<SimulatedMachine>) -> Vec<Point3> {
    interpreter
        .machine()
        .executed()
        .iter()
        .map(|m| m.target)
        .collect()
}

#[test]
fn test_units_do_not_change_the_path() {
    let metric = run("G21 G90 G1 F100 X25.4 Y50.8 Z-12.7\nG3 X0 Y76.2 I-25.4 J0\n");
    let inch = run("G20 G90 G1 F100 X1 Y2 Z-0.5\nG3 X0 Y3 I-1 J0\n");

    let metric_moves = metric.machine().executed();
    let inch_moves = inch.machine().executed();
    assert_eq!(metric_moves.len(), inch_moves.len());
    for (a, b) in metric_moves.iter().zip(inch_moves) {
        assert_eq!(a.kind, b.kind);
        assert_point(b.target, a.target.x, a.target.y, a.target.z);
        assert_point(b.center, a.center.x, a.center.y, a.center.z);
    }
}

#[test]
fn test_incremental_moves_compose_under_rotation() {
    let interpreter = run("G68 X0 Y0 R90\nG91 G1 F100 X10\nX10\n");
    assert_point(interpreter.frame().logical(), 20.0, 0.0, 0.0);
    assert_point(interpreter.frame().machine(), 0.0, 20.0, 0.0);

    let executed = targets(&interpreter);
    assert_eq!(executed.len(), 2);
    assert_point(executed[0], 0.0, 10.0, 0.0);
}

#[test]
fn test_scaling_about_origin() {
    let interpreter = run("G51 X0 Y0 P2\nG1 F100 X5 Y5\nG50\nX6\n");
    let executed = targets(&interpreter);
    assert_point(executed[0], 10.0, 10.0, 0.0);
    assert_point(executed[1], 6.0, 5.0, 0.0);
}

#[test]
fn test_mirror_reflects_and_reverses_arcs() {
    let interpreter = run("G22 X5\nG1 F100 X7 Y1\nG2 X9 Y3 R2\n");
    let executed = interpreter.machine().executed();
    assert_point(executed[0].target, 3.0, 1.0, 0.0);
    assert_eq!(executed[1].kind, MoveKind::Arc);
    assert_point(executed[1].target, 1.0, 3.0, 0.0);
    // G2 under a single-axis mirror runs counter-clockwise
    assert!(executed[1].ccw);
}

#[test]
fn test_polar_moves_are_relative() {
    let interpreter = run("G0 X5 Y5\nG16\nG1 F100 X10 Y90\nX10 Y0\n");
    let executed = targets(&interpreter);
    assert_point(executed[1], 5.0, 15.0, 0.0);
    assert_point(executed[2], 15.0, 15.0, 0.0);
}

#[test]
fn test_inside_corner_is_trimmed() {
    let interpreter = run_with_tool("G17 G41 D1 G1 F100 X10 Y0\nX10 Y10\n", 4.0);
    let executed = targets(&interpreter);
    assert_eq!(executed.len(), 2);
    assert_point(executed[0], 8.0, 2.0, 0.0);
    assert_point(executed[1], 8.0, 10.0, 0.0);
}

#[test]
fn test_compensation_holds_back_one_move() {
    let mut interpreter = interpreter("G41 D1 G1 F100 X10\nX20\n", {
        let mut params = ParameterStore::new();
        params
            .set_immediate(TOOL_DIAMETER_BASE + 1, 2.0)
            .expect("tool diameter");
        params
    });
    interpreter.step();
    assert!(interpreter.queue().pending().is_some());
    assert!(interpreter.machine().executed().is_empty());

    interpreter.run();
    assert!(interpreter.queue().pending().is_none());
    assert_point(targets(&interpreter)[1], 20.0, 1.0, 0.0);
}

#[test]
fn test_nested_subprograms() {
    let program = "\
M98 P1
G0 Z5
M30
O1
G91 G0 X1
M98 P2 L2
G90
M99
O2
G91 G0 Y1
M99
";
    let interpreter = run(program);
    assert_point(interpreter.frame().machine(), 1.0, 2.0, 5.0);
    assert!(
        interpreter
            .machine()
            .messages()
            .iter()
            .all(|m| m.severity != Severity::Error)
    );
}

#[test]
fn test_peck_cycle_backs_off_between_pecks() {
    let interpreter = run("G0 Z10\nG99 G83 X0 Y0 Z-6 R2 Q3 F60\nG80\n");
    let feeds: Vec<f64> = interpreter
        .machine()
        .executed()
        .iter()
        .filter(|m| m.feed == Feed::PerMinute(60.0))
        .map(|m| m.target.z)
        .collect();
    assert_eq!(feeds, vec![-1.0, -4.0, -6.0]);
    assert_point(interpreter.frame().machine(), 0.0, 0.0, 2.0);
}

#[test]
fn test_block_delete_skips_slashed_blocks() {
    let interpreter = run("G0 X1\n/G0 X2\nG0 Y1\n");
    assert_eq!(
        targets(&interpreter),
        vec![Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0)]
    );
}

#[test]
fn test_compulsory_stop_reaches_the_machine() {
    let interpreter = run("G0 X1\nM0\n");
    assert_eq!(interpreter.machine().stops(), &[StopMode::Compulsory]);
}

#[test]
fn test_tool_data_entry_feeds_compensation() {
    let interpreter = run("G10 L3 P1 D4\nG11\nG41 D1 G1 F100 X10\nX10 Y-10\n");
    let executed = targets(&interpreter);
    assert_point(executed[0], 10.0, 2.0, 0.0);
}

#[test]
fn test_parameter_assignments_land_on_their_slots() {
    let interpreter = run("#500=7\n#1=5\n##1=2\nG0 X#500 Y#5\n");
    assert_eq!(interpreter.params().get(500), 7.0);
    assert_eq!(interpreter.params().get(1), 5.0);
    assert_eq!(interpreter.params().get(5), 2.0);
    assert_point(interpreter.frame().machine(), 7.0, 2.0, 0.0);
    assert!(interpreter.machine().messages().is_empty());
}

#[test]
fn test_cycle_positions_are_not_rounded() {
    let metric = run("G0 Z10\nG99 G81 X0.123456789 Y1.987654321 Z-3 R2 F60\nG80\nG91 G0 X1\n");
    assert_point(metric.frame().machine(), 1.123456789, 1.987654321, 2.0);

    let inch = run("G20 G0 Z1\nG99 G81 X0.12345 Y0 Z-0.1 R0.1 F2\nG80\nG91 G0 X1\n");
    assert_point(inch.frame().machine(), 28.53563, 0.0, 2.54);
}
