//! Oracle responses, resolved decisions and the signal returned to the
//! pipeline engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::Action;

/// Why the oracle client fell back to `Escalate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FallbackCause {
    /// Connection refused, DNS failure, body read failure
    Transport(String),

    /// No reply within the oracle timeout
    Timeout(String),

    /// Non-success HTTP status or undecodable envelope
    BadResponse(String),

    /// Reply contained no word token at all
    NoToken,

    /// Last token was not one of the recognized actions
    OutOfVocabulary(String),
}

impl fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport failure: {}", e),
            Self::Timeout(e) => write!(f, "timeout: {}", e),
            Self::BadResponse(e) => write!(f, "bad response: {}", e),
            Self::NoToken => write!(f, "no action token in reply"),
            Self::OutOfVocabulary(token) => write!(f, "unrecognized token '{}'", token),
        }
    }
}

/// The oracle's answer as seen by the engine: always one recognized
/// action, plus what it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResponse {
    /// Raw completion text (None when no reply arrived)
    pub raw: Option<String>,

    /// Recognized action
    pub action: Action,

    /// Set when `action` is the fail-safe default rather than the oracle's word
    pub fallback: Option<FallbackCause>,
}

impl OracleResponse {
    /// Reply parsed to a recognized action
    pub fn parsed(raw: String, action: Action) -> Self {
        Self {
            raw: Some(raw),
            action,
            fallback: None,
        }
    }

    /// Fail-safe escalation
    pub fn escalate(raw: Option<String>, cause: FallbackCause) -> Self {
        Self {
            raw,
            action: Action::Escalate,
            fallback: Some(cause),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Final recovery decision for one failed attempt, with its inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Action the pipeline engine should take
    pub action: Action,

    /// What the oracle client returned
    pub oracle_action: Action,

    pub attempt: u32,

    pub ceiling: u32,

    /// True when the ceiling turned a restart into an escalation
    pub ceiling_override: bool,

    /// Why the oracle client fell back, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackCause>,

    /// Raw oracle reply, kept for audit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_reply: Option<String>,
}

impl Decision {
    /// Attach the oracle diagnostics this decision was derived from
    pub fn with_diagnostics(mut self, response: &OracleResponse) -> Self {
        self.fallback = response.fallback.clone();
        self.raw_reply = response.raw.clone();
        self
    }

    pub fn signal(&self) -> Signal {
        Signal::from(self.action)
    }
}

/// Machine-readable outcome returned to the pipeline engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Requeue the stage for another attempt
    Restart,

    /// Treat the attempt as a non-blocking success for downstream stages
    Ignore,

    /// Halt automatic progression and surface for human review
    Escalate,
}

impl Signal {
    pub fn action(&self) -> Action {
        match self {
            Signal::Restart => Action::Restart,
            Signal::Ignore => Action::Ignore,
            Signal::Escalate => Action::Escalate,
        }
    }

    /// What the pipeline engine is expected to do
    pub fn directive(&self) -> &'static str {
        match self {
            Signal::Restart => "requeue stage",
            Signal::Ignore => "mark attempt as non-blocking success",
            Signal::Escalate => "halt and hold for human review",
        }
    }
}

impl From<Action> for Signal {
    fn from(action: Action) -> Self {
        match action {
            Action::Restart => Signal::Restart,
            Action::Ignore => Signal::Ignore,
            Action::Escalate => Signal::Escalate,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action().as_str())
    }
}
