use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use gcode_canon::parameters::TOOL_DIAMETER_BASE;
use gcode_canon::{Interpreter, MachineSettings, ParameterStore, ProgramInput, SimulatedMachine};
use std::hint::black_box;

/// A contour of `segments` alternating lines and arcs
fn contour_program(segments: usize, compensated: bool) -> String {
    let mut program = String::from("G21 G17 G90 F600\nT1 M6\nM3 S8000\n");
    if compensated {
        program.push_str("G41 D1\n");
    }
    for i in 0..segments {
        let x = (i as f64) * 2.0;
        if i % 2 == 0 {
            program.push_str(&format!("G1 X{:.3} Y{:.3}\n", x, (i % 7) as f64));
        } else {
            program.push_str(&format!("G3 X{:.3} Y{:.3} R5\n", x, (i % 5) as f64));
        }
    }
    if compensated {
        program.push_str("G40\n");
    }
    program.push_str("M5\nM30\n");
    program
}

/// A grid of drilled holes through a subprogram
fn drilling_program(holes: usize) -> String {
    let mut program = String::from("G21 G90 G0 Z10\nG98 G83 Z-12 R2 Q1.5 F80 X0 Y0\n");
    for i in 1..holes {
        program.push_str(&format!("X{} Y{}\n", (i % 10) * 5, (i / 10) * 5));
    }
    program.push_str("G80\nM30\n");
    program
}

fn run(program: &str) -> usize {
    let mut params = ParameterStore::new();
    let _ = params.set_immediate(TOOL_DIAMETER_BASE + 1, 6.0);
    let machine = SimulatedMachine::new(MachineSettings::default());
    let mut interpreter = Interpreter::new(machine, ProgramInput::new(program), params, 16);
    interpreter.run()
}

/// Benchmark whole programs through the pipeline and queue
fn bench_contours(c: &mut Criterion) {
    let mut group = c.benchmark_group("contour");

    for &size in &[100usize, 1_000, 10_000] {
        for compensated in [false, true] {
            let program = contour_program(size, compensated);
            let name = if compensated { "compensated" } else { "plain" };
            group.throughput(Throughput::Elements(size as u64));
            group.bench_with_input(BenchmarkId::new(name, size), &program, |b, program| {
                b.iter(|| black_box(run(black_box(program))))
            });
        }
    }

    group.finish();
}

/// Benchmark canned cycle expansion
fn bench_drilling(c: &mut Criterion) {
    let mut group = c.benchmark_group("drilling");

    for &holes in &[10usize, 100, 1_000] {
        let program = drilling_program(holes);
        group.throughput(Throughput::Elements(holes as u64));
        group.bench_with_input(BenchmarkId::new("peck", holes), &program, |b, program| {
            b.iter(|| black_box(run(black_box(program))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_contours, bench_drilling);
criterion_main!(benches);
