//! Machine profiles and the parameter store on disk
use std::fs;

use gcode_canon::parameters::{CURRENT_WCS, FIRST_WCS, G92_OFFSET, TOOL_DIAMETER_BASE, WCS_STRIDE};
use gcode_canon::tools::{ToolKind, ToolTable};
use gcode_canon::{
    Interpreter, MachineProfile, ParameterStore, ProgramInput, SimulatedMachine,
};
use tempfile::TempDir;

const MILL_PROFILE: &str = r#"
[machine]
name = "bench-mill"
queue_depth = 4
feed_override = 1.0
speed_override = 1.0

[[tools]]
index = 7
kind = "ball_end_mill"
diameter = 3.0
length = 42.5

[[work_offsets]]
system = 2
x = 100.0
y = 50.0
z = -20.0
"#;

#[test]
fn test_profile_loads_and_seeds_parameters() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("mill.toml");
    fs::write(&path, MILL_PROFILE).expect("write profile");

    let profile = MachineProfile::resolve(Some(path.as_path())).expect("load profile");
    assert_eq!(profile.name, "bench-mill");
    assert_eq!(profile.settings.queue_depth, 4);
    assert!(profile.settings.block_delete);

    let mut params = ParameterStore::new();
    profile.seed(&mut params).expect("seed");
    let tool = ToolTable::new(&params).get(7);
    assert_eq!(tool.kind, ToolKind::BallEndMill);
    assert_eq!(tool.diameter, 3.0);
    assert_eq!(tool.length, 42.5);
    assert_eq!(params.get(FIRST_WCS + WCS_STRIDE), 100.0);
    assert_eq!(params.get(FIRST_WCS + WCS_STRIDE + 2), -20.0);
}

#[test]
fn test_explicit_profile_must_exist() {
    let dir = TempDir::new().expect("temp dir");
    let missing = dir.path().join("missing.toml");
    let err = MachineProfile::resolve(Some(missing.as_path())).unwrap_err();
    assert!(format!("{:#}", err).contains("missing.toml"));
}

#[test]
fn test_invalid_profile_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[machine]\nname = \"bad\"\nqueue_depth = 1\n").expect("write profile");
    assert!(MachineProfile::load_file(&path).is_err());
}

#[test]
fn test_work_offsets_survive_a_restart() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("parameters.csv");

    let program = "G0 X10 Y20 Z5\nG10 L2 P3\nG11\nG56\nG92 X-1\nM30\n";
    let mut first = Interpreter::new(
        SimulatedMachine::default(),
        ProgramInput::new(program),
        ParameterStore::new(),
        8,
    );
    first.run();
    let (_, params) = first.into_parts();
    params.save_file(&path).expect("save parameters");

    let mut restored = ParameterStore::new();
    restored.load_file(&path).expect("load parameters");
    assert_eq!(restored.get(CURRENT_WCS), 3.0);
    assert_eq!(restored.get(FIRST_WCS + 2 * WCS_STRIDE), 10.0);
    assert_eq!(restored.get(FIRST_WCS + 2 * WCS_STRIDE + 1), 20.0);

    // Work system 3 and the one millimetre G92 shift both come back
    let mut second = Interpreter::new(
        SimulatedMachine::default(),
        ProgramInput::new("G0 X0 Y0 Z0\nG0 X1\n"),
        restored,
        8,
    );
    second.run();
    let machine = second.frame().machine();
    assert!((machine.x - 12.0).abs() < 1e-6);
    assert!((machine.y - 20.0).abs() < 1e-6);
    assert!((machine.z - 5.0).abs() < 1e-6);
    assert_eq!(second.params().get(G92_OFFSET), 1.0);
    assert_eq!(restored_x_offset(&path), Some(1.0));
}

fn restored_x_offset(path: &std::path::Path) -> Option<f64> {
    let text = fs::read_to_string(path).ok()?;
    text.lines()
        .find_map(|line| line.strip_prefix(&format!("{},", G92_OFFSET)))
        .and_then(|value| value.parse().ok())
}

#[test]
fn test_tool_table_entries_are_persistent() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("tools.csv");

    let mut params = ParameterStore::new();
    params.set_immediate(TOOL_DIAMETER_BASE + 5, 12.0).expect("set");
    params.set_immediate(1, 3.0).expect("set");
    params.save_file(&path).expect("save");

    let text = fs::read_to_string(&path).expect("read back");
    assert!(text.contains("3305,12"));
    assert!(!text.lines().any(|line| line.starts_with("1,")));
}
