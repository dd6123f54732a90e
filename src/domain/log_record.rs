//! What the log fetcher found for one attempt.

use serde::{Deserialize, Serialize};

/// Raw log text of one attempt, or the reason it is missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum LogRecord {
    Present { text: String },
    Absent { reason: LogAbsence },
}

/// Why a log could not be produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LogAbsence {
    /// Nothing at the expected location (e.g. the stage died before flushing)
    NotFound { location: String },

    /// The location exists but could not be read, or the read timed out
    ReadError { location: String, cause: String },
}

impl LogRecord {
    pub fn present(text: impl Into<String>) -> Self {
        Self::Present { text: text.into() }
    }

    pub fn absent(reason: LogAbsence) -> Self {
        Self::Absent { reason }
    }

    /// The log text, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Present { text } => Some(text),
            Self::Absent { .. } => None,
        }
    }

    pub fn absence(&self) -> Option<&LogAbsence> {
        match self {
            Self::Present { .. } => None,
            Self::Absent { reason } => Some(reason),
        }
    }
}

impl LogAbsence {
    /// Short failure kind for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::ReadError { .. } => "read_error",
        }
    }

    /// Text handed to the oracle in place of the missing log
    pub fn placeholder(&self) -> String {
        match self {
            Self::NotFound { location } => format!("Error: Log file not found at {}", location),
            Self::ReadError { .. } => "Error: Unable to read log file.".to_string(),
        }
    }
}
