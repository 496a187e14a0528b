use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};

use gcode_canon::config::Config;
use gcode_canon::{Interpreter, MachineProfile, ParameterStore, ProgramInput, SimulatedMachine};

fn main() -> Result<()> {
    // Parse configuration from command line and environment
    let config = Config::from_args_and_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let profile = MachineProfile::resolve(config.machine.as_deref())?;

    let mut params = ParameterStore::new();
    profile
        .seed(&mut params)
        .context("Failed to seed parameters from the machine profile")?;
    if config.parameters.exists() {
        params.load_file(&config.parameters)?;
    }

    let input = ProgramInput::from_file(&config.program)?;
    let mut settings = profile.settings;
    if let Some(depth) = config.queue_depth {
        settings.queue_depth = depth;
    }

    let queue_depth = settings.queue_depth;
    let machine = SimulatedMachine::new(settings);
    let mut interpreter = Interpreter::new(machine, input, params, queue_depth);
    let blocks = interpreter.run();
    log::info!("Ran {} blocks of {}", blocks, config.program.display());

    let (machine, params) = interpreter.into_parts();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for message in machine.messages() {
        writeln!(out, "{}: {}", message.severity.tag(), message.text)?;
    }
    if config.json {
        for record in machine.executed() {
            let line = serde_json::to_string(record).context("Failed to encode move as JSON")?;
            writeln!(out, "{}", line)?;
        }
    }
    out.flush()?;

    if config.save_parameters {
        let written = params.save_file(&config.parameters)?;
        log::debug!("Saved {} parameters to {}", written, config.parameters.display());
    }

    Ok(())
}
