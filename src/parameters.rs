//! Parameter Store
//!
//! Numbered parameters (`#n`) with a pending-update buffer that gives each
//! block a private view of its own writes until [`ParameterStore::commit`].
//! Persisted as `index,value` lines.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::Point3;

/// Size of the parameter space, `#0..#5399`
pub const PARAMETER_COUNT: usize = 5400;
/// Pending updates a single block may queue
pub const UPDATE_CAPACITY: usize = 53;
/// First index written back to storage
pub const PERSISTENT_FROM: usize = 499;
/// Macro call arguments live in `#1..#33`
pub const MACRO_ARGUMENTS: usize = 33;

pub const G28_REFERENCE: usize = 5161;
pub const G30_REFERENCE: usize = 5181;
pub const G92_OFFSET: usize = 5211;
pub const CURRENT_WCS: usize = 5220;
pub const FIRST_WCS: usize = 5221;
pub const WCS_STRIDE: usize = 20;

pub const TOOL_TYPE_BASE: usize = 3200;
pub const TOOL_DIAMETER_BASE: usize = 3300;
pub const TOOL_LENGTH_BASE: usize = 3400;

const SAVE_THRESHOLD: f64 = 1e-4;

/// Why a parameter write was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("parameter #0 is read-only")]
    ReadOnly,
    #[error("parameter #{0} is out of range")]
    OutOfRange(usize),
    #[error("parameter update buffer full")]
    UpdateBufferFull,
}

#[derive(Debug, Clone)]
pub struct ParameterStore {
    values: Vec<f64>,
    pending: Vec<(usize, f64)>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            values: vec![0.0; PARAMETER_COUNT],
            pending: Vec::with_capacity(UPDATE_CAPACITY),
        }
    }

    /// Committed value of `#index`, NaN when out of range
    pub fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(f64::NAN)
    }

    /// Three consecutive parameters starting at `base`
    pub fn point(&self, base: usize) -> Point3 {
        Point3::new(self.get(base), self.get(base + 1), self.get(base + 2))
    }

    fn check_writable(index: usize) -> Result<(), ParameterError> {
        if index == 0 {
            Err(ParameterError::ReadOnly)
        } else if index >= PARAMETER_COUNT {
            Err(ParameterError::OutOfRange(index))
        } else {
            Ok(())
        }
    }

    /// Queue a write that becomes visible on the next commit.
    pub fn queue_update(&mut self, index: usize, value: f64) -> Result<(), ParameterError> {
        Self::check_writable(index)?;
        if self.pending.len() >= UPDATE_CAPACITY {
            return Err(ParameterError::UpdateBufferFull);
        }
        self.pending.push((index, value));
        Ok(())
    }

    /// Write through, bypassing the pending buffer.
    pub fn set_immediate(&mut self, index: usize, value: f64) -> Result<(), ParameterError> {
        Self::check_writable(index)?;
        self.values[index] = value;
        Ok(())
    }

    /// Apply pending updates in the order they were queued. Returns how many
    /// were applied.
    pub fn commit(&mut self) -> usize {
        let count = self.pending.len();
        for (index, value) in self.pending.drain(..) {
            log::debug!("#{} = {:.4}", index, value);
            self.values[index] = value;
        }
        count
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Restore values from `index,value` lines. Malformed lines are skipped.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<usize> {
        let line_re = regex::Regex::new(r"^\s*(\d+)\s*,\s*([-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?\d+)?)\s*$")
            .context("Failed to compile parameter line pattern")?;
        let mut restored = 0;

        for (line_num, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.context("Failed to read parameter store")?;
            if line.trim().is_empty() {
                continue;
            }

            let parsed = line_re.captures(&line).and_then(|captures| {
                let index = captures.get(1)?.as_str().parse::<usize>().ok()?;
                let value = captures.get(2)?.as_str().parse::<f64>().ok()?;
                Some((index, value))
            });

            match parsed {
                Some((index, value)) if index > 0 && index < PARAMETER_COUNT => {
                    self.values[index] = value;
                    restored += 1;
                }
                _ => log::warn!(
                    "Skipping malformed parameter line {}: '{}'",
                    line_num + 1,
                    line
                ),
            }
        }

        Ok(restored)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open parameter store: {}", path.display()))?;
        let restored = self.load(file)?;
        log::info!(
            "Parameters up, {} restored from {}, {} available",
            restored,
            path.display(),
            PARAMETER_COUNT
        );
        Ok(restored)
    }

    /// Write every non-zero persistent parameter. Returns how many were written.
    pub fn save<W: Write>(&self, writer: W) -> Result<usize> {
        let mut writer = BufWriter::new(writer);
        let mut saved = 0;

        for (index, value) in self.values.iter().enumerate().skip(PERSISTENT_FROM) {
            if value.abs() >= SAVE_THRESHOLD {
                writeln!(writer, "{},{}", index, value).context("Failed to write parameter")?;
                saved += 1;
            }
        }
        writer.flush().context("Failed to flush parameter store")?;

        Ok(saved)
    }

    pub fn save_file(&self, path: &Path) -> Result<usize> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create parameter store: {}", path.display()))?;
        let saved = self.save(file)?;
        log::info!(
            "Saved {} non-null parameter values to {}",
            saved,
            path.display()
        );
        Ok(saved)
    }
}
