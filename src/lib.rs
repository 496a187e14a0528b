//! GCode Canon
//!
//! A canonical G-code interpreter for milling machines.
//!
//! This library provides:
//! - Block parsing with `#` parameter references
//! - A modal state machine with one sequence point per block
//! - The coordinate transform pipeline (units, polar, mirror, work offsets,
//!   rotation, scaling)
//! - A motion queue with cutter radius compensation lookahead
//! - Canned cycles, subprograms and macro calls
//! - Machine profiles and a simulated machine

pub mod config;
pub mod core;
pub mod cycles;
pub mod input;
pub mod interpreter;
pub mod machine;
pub mod parameters;
pub mod parser;
pub mod profile;
pub mod queue;
pub mod stacks;
pub mod tools;
pub mod transform;

// Re-exports for the public API
pub use config::Config;
pub use core::{Message, Severity};
pub use input::ProgramInput;
pub use interpreter::Interpreter;
pub use machine::{Machine, SimulatedMachine};
pub use parameters::ParameterStore;
pub use parser::{Block, parse_block};
pub use profile::{MachineProfile, MachineSettings};
pub use queue::{MotionQueue, MoveRecord};
