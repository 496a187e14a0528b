//! Operator Messages
//!
//! Severity-tagged messages shown to the operator.

use std::fmt;

use serde::Serialize;

/// Severity of an operator message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Machine status change
    Status,
    /// Likely-unintended construct
    Warning,
    /// Recoverable error
    Error,
    /// Program-supplied `(MSG,...)` text
    Operator,
}

impl Severity {
    pub fn tag(self) -> &'static str {
        match self {
            Severity::Status => "STA",
            Severity::Warning => "WAR",
            Severity::Error => "PER",
            Severity::Operator => "MSG",
        }
    }
}

/// A message for the operator display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::new(Severity::Status, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    pub fn operator(text: impl Into<String>) -> Self {
        Self::new(Severity::Operator, text)
    }

    /// Forward to the log at a level matching the severity.
    pub fn log(&self) {
        match self.severity {
            Severity::Warning | Severity::Error => log::warn!("{}", self),
            Severity::Status | Severity::Operator => log::info!("{}", self),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity.tag(), self.text)
    }
}
