//! Oracle client: turns log text into exactly one recognized action.
//!
//! The prompt embeds the log (or a placeholder when it is missing) and asks
//! for a single word. Reply parsing is a pluggable, pure extraction step;
//! anything that does not resolve to `restart`, `ignore` or `escalate`
//! collapses to `Escalate`, as does every transport failure.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::adapters::{Oracle, OracleError};
use crate::domain::{Action, FallbackCause, LogRecord, OracleResponse};

use super::limits::TriageLimits;

/// Marker closing the reasoning block of reasoning models
pub const REASONING_END: &str = "</think>";

/// Pulls the candidate action token out of a raw reply.
///
/// Implementations must be pure: the same input always yields the same
/// output. Any `Fn(&str) -> Option<String>` works as an extractor.
pub trait ResponseExtractor: Send + Sync {
    fn extract(&self, raw: &str) -> Option<String>;
}

impl<F> ResponseExtractor for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn extract(&self, raw: &str) -> Option<String> {
        self(raw)
    }
}

/// Last word of the reply, after the final `</think>` if there is one.
///
/// A reply whose reasoning block is followed by nothing yields `None`
/// rather than a word from inside the reasoning.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasoningTailExtractor;

impl ResponseExtractor for ReasoningTailExtractor {
    fn extract(&self, raw: &str) -> Option<String> {
        let lowered = raw.to_lowercase();
        let tail = match lowered.rfind(REASONING_END) {
            Some(idx) => &lowered[idx + REASONING_END.len()..],
            None => lowered.as_str(),
        };
        last_word(tail)
    }
}

/// Last word of the reply, ignoring any reasoning markers
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWordExtractor;

impl ResponseExtractor for LastWordExtractor {
    fn extract(&self, raw: &str) -> Option<String> {
        last_word(&raw.to_lowercase())
    }
}

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\w+").expect("static word pattern"))
}

/// Last standalone `\w+` token of `text`, lower-cased
pub fn last_word(text: &str) -> Option<String> {
    word_pattern()
        .find_iter(text)
        .last()
        .map(|m| m.as_str().to_lowercase())
}

/// Interpret a raw reply with the given extractor
pub fn interpret(extractor: &dyn ResponseExtractor, raw: String) -> OracleResponse {
    let Some(token) = extractor.extract(&raw) else {
        warn!(raw_reply = %raw, "Oracle reply has no action token, escalating");
        return OracleResponse::escalate(Some(raw), FallbackCause::NoToken);
    };

    match token.parse::<Action>() {
        Ok(action) => OracleResponse::parsed(raw, action),
        Err(_) => {
            warn!(raw_reply = %raw, %token, "Oracle reply unclear, escalating");
            OracleResponse::escalate(Some(raw), FallbackCause::OutOfVocabulary(token))
        }
    }
}

/// Keep at most the last `max_chars` characters of `text`
pub fn log_tail(text: &str, max_chars: usize) -> (&str, usize) {
    if max_chars == 0 {
        return ("", text.chars().count());
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => (&text[idx..], text[..idx].chars().count()),
        None => (text, 0),
    }
}

/// Build the classification prompt around (already bounded) log text
pub fn build_prompt(log_text: &str) -> String {
    format!(
        r#"You are an AI assistant helping with ETL pipeline failures. A failure occurred, and here are the last logs:

```
{log_text}
```

What should be done? Choose one of the following actions:
- "restart" (if it's a temporary issue)
- "ignore" (if it's not a critical failure)
- "escalate" (if a human should investigate).

Reply with only one word."#
    )
}

/// Queries the oracle and normalizes its reply
pub struct OracleClient {
    oracle: Arc<dyn Oracle>,
    extractor: Box<dyn ResponseExtractor>,
    timeout: Duration,
    max_log_chars: usize,
}

impl OracleClient {
    /// Client with the default `ReasoningTailExtractor`
    pub fn new(oracle: Arc<dyn Oracle>, limits: &TriageLimits) -> Self {
        Self {
            oracle,
            extractor: Box::new(ReasoningTailExtractor),
            timeout: limits.oracle_timeout(),
            max_log_chars: limits.max_log_chars,
        }
    }

    /// Swap the reply extraction strategy
    pub fn with_extractor(mut self, extractor: impl ResponseExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Prompt for a fetched log record; missing logs become a placeholder
    pub fn prompt_for(&self, record: &LogRecord) -> String {
        let text: Cow<'_, str> = match record {
            LogRecord::Present { text } => {
                let (tail, dropped) = log_tail(text, self.max_log_chars);
                if dropped > 0 {
                    Cow::Owned(format!(
                        "[... {} earlier characters truncated ...]\n{}",
                        dropped, tail
                    ))
                } else {
                    Cow::Borrowed(tail)
                }
            }
            LogRecord::Absent { reason } => Cow::Owned(reason.placeholder()),
        };
        build_prompt(&text)
    }

    /// Parse a raw reply with this client's extractor
    pub fn parse_reply(&self, raw: String) -> OracleResponse {
        interpret(self.extractor.as_ref(), raw)
    }

    /// Ask the oracle what to do about a failed attempt.
    ///
    /// Always consults the oracle, even when the log is missing. Never
    /// fails: transport errors, timeouts and unusable replies all come back
    /// as `Escalate` with a `FallbackCause`.
    pub async fn classify(&self, record: &LogRecord) -> OracleResponse {
        let prompt = self.prompt_for(record);
        info!(
            oracle = self.oracle.name(),
            prompt_bytes = prompt.len(),
            "Sending logs to oracle"
        );

        // Bounded here even when the adapter ignores its timeout argument
        let reply = timeout(self.timeout, self.oracle.complete(&prompt, self.timeout))
            .await
            .unwrap_or(Err(OracleError::Timeout {
                after: self.timeout,
            }));

        let response = match reply {
            Ok(raw) => self.parse_reply(raw),
            Err(e) => {
                warn!(error = %e, "Failed to query oracle, escalating");
                let cause = match e {
                    OracleError::Timeout { .. } => FallbackCause::Timeout(e.to_string()),
                    OracleError::Transport(_) => FallbackCause::Transport(e.to_string()),
                    OracleError::Status { .. } | OracleError::Decode(_) => {
                        FallbackCause::BadResponse(e.to_string())
                    }
                };
                OracleResponse::escalate(None, cause)
            }
        };

        info!(action = %response.action, fallback = response.is_fallback(), "Oracle suggested");
        response
    }
}
