//! Resolved Block
//!
//! A parsed block with every value read against the committed parameter
//! store. Word queries return sentinels for absent or malformed words.

use crate::parameters::ParameterStore;
use crate::parser::ast::ParsedBlock;

/// Integer sentinel for an absent or malformed word
pub const ABSENT_INTEGER: u32 = u32::MAX;

/// A block ready for the interpreter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    words: Vec<(char, f64)>,
    assignments: Vec<(f64, f64)>,
}

impl Block {
    pub fn resolve(parsed: &ParsedBlock, params: &ParameterStore) -> Self {
        Self {
            words: parsed
                .words
                .iter()
                .map(|w| (w.letter, w.value.resolve(params)))
                .collect(),
            assignments: parsed
                .assignments
                .iter()
                .map(|a| (a.target.resolve(params), a.value.resolve(params)))
                .collect(),
        }
    }

    /// Values of every well-formed `letter` word in block order
    fn values(&self, letter: char) -> impl Iterator<Item = f64> + '_ {
        self.words
            .iter()
            .filter(move |(l, v)| *l == letter && v.is_finite())
            .map(|(_, v)| *v)
    }

    pub fn has(&self, letter: char) -> bool {
        self.values(letter).next().is_some()
    }

    /// First `letter` value, NaN when absent
    pub fn real(&self, letter: char) -> f64 {
        self.values(letter).next().unwrap_or(f64::NAN)
    }

    /// First `letter` value truncated to an integer, [`ABSENT_INTEGER`] when
    /// absent or negative
    pub fn integer(&self, letter: char) -> u32 {
        to_integer(self.real(letter))
    }

    /// First `letter` value, `None` when absent
    pub fn axis(&self, letter: char) -> Option<f64> {
        self.values(letter).next()
    }

    /// Every code given with `letter`, e.g. all G codes
    pub fn codes(&self, letter: char) -> impl Iterator<Item = u32> + '_ {
        self.values(letter)
            .map(to_integer)
            .filter(|c| *c != ABSENT_INTEGER)
    }

    pub fn has_code(&self, letter: char, code: u32) -> bool {
        self.codes(letter).any(|c| c == code)
    }

    /// The first code of `letter` that belongs to `group`
    pub fn code_in(&self, letter: char, group: &[u32]) -> Option<u32> {
        self.codes(letter).find(|c| group.contains(c))
    }

    pub fn has_any_axis(&self) -> bool {
        self.has('X') || self.has('Y') || self.has('Z')
    }

    /// `(index, value)` pairs of `#index=value`
    pub fn assignments(&self) -> &[(f64, f64)] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.assignments.is_empty()
    }
}

fn to_integer(value: f64) -> u32 {
    if value.is_finite() && value >= 0.0 && value < f64::from(u32::MAX) {
        value.trunc() as u32
    } else {
        ABSENT_INTEGER
    }
}
