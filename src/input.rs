//! Program Input
//!
//! Serves sanitized blocks from a part program: upper-cased, whitespace and
//! comments stripped, block-deleted lines skipped, N/O words removed.
//! Programs (`O` words) are indexed up front for subprogram calls.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::Message;

/// Entries in the program table
pub const PROGRAM_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct ProgramInput {
    lines: Vec<String>,
    position: usize,
    programs: Vec<(u32, usize)>,
    spliced: VecDeque<String>,
    messages: Vec<Message>,
}

impl ProgramInput {
    pub fn new(text: &str) -> Self {
        let mut input = Self {
            lines: text.lines().map(str::to_string).collect(),
            position: 0,
            programs: Vec::new(),
            spliced: VecDeque::new(),
            messages: Vec::new(),
        };
        input.scan_programs();
        log::debug!(
            "Input stream up, {} lines, {} of {} program table entries used",
            input.lines.len(),
            input.programs.len(),
            PROGRAM_CAPACITY
        );
        input
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read program: {}", path.display()))?;
        Ok(Self::new(&text))
    }

    fn scan_programs(&mut self) {
        let Ok(program_re) = regex::Regex::new(r"(?i)^\s*(?:N\d+\s*)?O\s*(\d+)") else {
            return;
        };

        for (index, line) in self.lines.iter().enumerate() {
            let Some(number) = program_re
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            else {
                continue;
            };

            if self.programs.len() < PROGRAM_CAPACITY {
                self.programs.push((number, index + 1));
            } else {
                self.messages.push(Message::error("Program table overflow!"));
            }
        }
    }

    /// Next sanitized block, spliced text first. `None` at end of program.
    pub fn fetch_line(&mut self, block_delete: bool) -> Option<String> {
        while let Some(line) = self.spliced.pop_front() {
            if let Some(block) = self.sanitize(&line, block_delete) {
                return Some(block);
            }
        }

        while self.position < self.lines.len() {
            let line = self.lines[self.position].clone();
            self.position += 1;
            if let Some(block) = self.sanitize(&line, block_delete) {
                return Some(block);
            }
        }

        None
    }

    fn sanitize(&mut self, line: &str, block_delete: bool) -> Option<String> {
        let mut block = String::with_capacity(line.len());
        let mut chars = line.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                ' ' | '\t' | '\r' | '\n' => {}
                '/' if block.is_empty() && block_delete => return None,
                ';' => break,
                '(' => {
                    let comment: String = chars.by_ref().take_while(|c| *c != ')').collect();
                    if let Some(text) = operator_message(&comment) {
                        self.messages.push(Message::operator(text));
                    }
                }
                'n' | 'N' | 'o' | 'O' => {
                    if !block.is_empty() {
                        self.messages
                            .push(Message::error("N or O word not at start of block!"));
                    }
                    while chars.next_if(|c| c.is_ascii_digit()).is_some() {}
                }
                c => block.push(c.to_ascii_uppercase()),
            }
        }

        (!block.is_empty()).then_some(block)
    }

    /// Inject text ahead of the normal stream.
    pub fn splice(&mut self, text: &str) {
        self.spliced.extend(text.lines().map(str::to_string));
    }

    pub fn rewind(&mut self) {
        self.position = 0;
        self.spliced.clear();
        log::debug!("Program reset");
    }

    /// Continue reading at `line`. Fails past the end of the program.
    pub fn seek(&mut self, line: usize) -> bool {
        if line > self.lines.len() {
            return false;
        }
        self.position = line;
        log::debug!("Seek to line {}", line);
        true
    }

    /// Index of the next line to be read
    pub fn tell(&self) -> usize {
        self.position
    }

    /// First line after the `O<program>` header
    pub fn program_offset(&self, program: u32) -> Option<usize> {
        self.programs
            .iter()
            .find(|(number, _)| *number == program)
            .map(|(_, offset)| *offset)
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn drain_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }
}

fn operator_message(comment: &str) -> Option<&str> {
    let trimmed = comment.trim_start();
    let head = trimmed.get(..4)?;
    head.eq_ignore_ascii_case("MSG,").then(|| trimmed[4..].trim())
}
