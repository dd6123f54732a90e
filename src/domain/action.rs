//! The recovery action vocabulary.
//!
//! Input is matched case-insensitively; the wire form is always the
//! canonical lower-case token.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A recovery action for a failed stage attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Temporary issue: run the stage again
    Restart,

    /// Non-critical failure: let downstream stages proceed
    Ignore,

    /// A human should investigate
    Escalate,
}

impl Action {
    /// Every recognized action, in prompt order
    pub const ALL: [Action; 3] = [Action::Restart, Action::Ignore, Action::Escalate];

    /// Canonical wire token
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Restart => "restart",
            Action::Ignore => "ignore",
            Action::Escalate => "escalate",
        }
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::Escalate
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token outside the recognized vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized action token: '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "restart" => Ok(Action::Restart),
            "ignore" => Ok(Action::Ignore),
            "escalate" => Ok(Action::Escalate),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("restart".parse::<Action>().unwrap(), Action::Restart);
        assert_eq!("IGNORE".parse::<Action>().unwrap(), Action::Ignore);
        assert_eq!("Escalate".parse::<Action>().unwrap(), Action::Escalate);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("retry".parse::<Action>().is_err());
        assert!("".parse::<Action>().is_err());
        assert!(" restart".parse::<Action>().is_err());
    }

    #[test]
    fn test_wire_form_is_lowercase() {
        for action in Action::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }

    #[test]
    fn test_default_is_escalate() {
        assert_eq!(Action::default(), Action::Escalate);
    }
}
