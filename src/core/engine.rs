//! Decision engine: combines the oracle's suggestion with the attempt
//! ceiling.
//!
//! One triage invocation moves through `Received` → `Classified` →
//! `Resolved`. Each state is its own type and transitions consume the
//! previous state, so a decision can only exist once the oracle has been
//! heard and the ceiling rule applied.
//!
//! | Oracle action | attempt <= ceiling | attempt > ceiling |
//! |---------------|--------------------|-------------------|
//! | Restart       | Restart            | Escalate          |
//! | Ignore        | Ignore             | Ignore            |
//! | Escalate      | Escalate           | Escalate          |

use tracing::warn;

use crate::domain::{Action, Decision, ExecutionContext, OracleResponse};

/// Resolve the final action. Pure and total.
///
/// Invariant: never returns `Restart` when `attempt > ceiling`.
pub fn resolve(oracle_action: Action, attempt: u32, ceiling: u32) -> Decision {
    let (action, ceiling_override) = match oracle_action {
        Action::Restart if attempt > ceiling => (Action::Escalate, true),
        other => (other, false),
    };

    Decision {
        action,
        oracle_action,
        attempt,
        ceiling,
        ceiling_override,
        fallback: None,
        raw_reply: None,
    }
}

/// A failure has been handed to the engine
#[derive(Debug)]
pub struct Received<'a> {
    context: &'a ExecutionContext,
}

/// The oracle client has produced a recognized action
#[derive(Debug)]
pub struct Classified<'a> {
    context: &'a ExecutionContext,
    response: OracleResponse,
}

/// Terminal state: a decision exists
#[derive(Debug)]
pub struct Resolved<'a> {
    context: &'a ExecutionContext,
    decision: Decision,
}

impl<'a> Received<'a> {
    pub fn new(context: &'a ExecutionContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &'a ExecutionContext {
        self.context
    }

    pub fn classify(self, response: OracleResponse) -> Classified<'a> {
        Classified {
            context: self.context,
            response,
        }
    }
}

impl<'a> Classified<'a> {
    pub fn response(&self) -> &OracleResponse {
        &self.response
    }

    /// Apply the ceiling rule
    pub fn resolve(self) -> Resolved<'a> {
        let ctx = self.context;
        let decision = resolve(self.response.action, ctx.attempt(), ctx.ceiling())
            .with_diagnostics(&self.response);

        if decision.ceiling_override {
            warn!(
                attempt_key = %ctx.key(),
                attempt = ctx.attempt(),
                ceiling = ctx.ceiling(),
                "Max retries reached, escalating instead of restart"
            );
        }

        Resolved {
            context: ctx,
            decision,
        }
    }
}

impl<'a> Resolved<'a> {
    pub fn context(&self) -> &'a ExecutionContext {
        self.context
    }

    pub fn decision(&self) -> &Decision {
        &self.decision
    }

    pub fn into_decision(self) -> Decision {
        self.decision
    }
}
