//! Call Stacks
//!
//! Saved macro arguments and program return pointers for M98/M99 and G65.

use thiserror::Error;

use crate::parameters::{MACRO_ARGUMENTS, ParameterError, ParameterStore};

/// Nested macro calls
pub const MACRO_DEPTH: usize = 16;
/// Nested program frames
pub const PROGRAM_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("call stack overflow")]
    Overflow,
    #[error("call stack underflow")]
    Underflow,
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// Where to resume and how often to repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramPointer {
    pub line: usize,
    pub macro_call: bool,
    pub repeat_count: u32,
}

#[derive(Debug, Default)]
pub struct CallStack {
    parameters: Vec<[f64; MACRO_ARGUMENTS]>,
    programs: Vec<ProgramPointer>,
}

impl CallStack {
    pub fn new() -> Self {
        log::debug!(
            "Stacks initialized, {} nested calls ({} of which macro-capable) supported",
            PROGRAM_DEPTH,
            MACRO_DEPTH
        );
        Self {
            parameters: Vec::with_capacity(MACRO_DEPTH),
            programs: Vec::with_capacity(PROGRAM_DEPTH),
        }
    }

    /// Save `#1..#33`.
    pub fn push_parameters(&mut self, store: &ParameterStore) -> Result<(), StackError> {
        if self.parameters.len() >= MACRO_DEPTH {
            return Err(StackError::Overflow);
        }
        let mut saved = [0.0; MACRO_ARGUMENTS];
        for (i, slot) in saved.iter_mut().enumerate() {
            *slot = store.get(i + 1);
        }
        self.parameters.push(saved);
        Ok(())
    }

    /// Restore `#1..#33` and commit.
    pub fn pop_parameters(&mut self, store: &mut ParameterStore) -> Result<(), StackError> {
        let saved = self.parameters.pop().ok_or(StackError::Underflow)?;
        // The pending buffer may hold fewer slots than a full frame.
        for (chunk_index, values) in saved.chunks(16).enumerate() {
            for (offset, value) in values.iter().enumerate() {
                store.queue_update(chunk_index * 16 + offset + 1, *value)?;
            }
            store.commit();
        }
        Ok(())
    }

    pub fn push_program(&mut self, pointer: ProgramPointer) -> Result<(), StackError> {
        if self.programs.len() >= PROGRAM_DEPTH {
            return Err(StackError::Overflow);
        }
        self.programs.push(pointer);
        Ok(())
    }

    pub fn pop_program(&mut self) -> Result<ProgramPointer, StackError> {
        self.programs.pop().ok_or(StackError::Underflow)
    }

    pub fn peek_program(&self) -> Option<&ProgramPointer> {
        self.programs.last()
    }

    pub fn program_depth(&self) -> usize {
        self.programs.len()
    }

    pub fn parameter_depth(&self) -> usize {
        self.parameters.len()
    }
}
