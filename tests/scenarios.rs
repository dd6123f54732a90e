//! Triage Scenario Integration Tests
//!
//! End-to-end triage runs against in-memory stores and a scripted oracle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use triage::adapters::{
    AnnotationStore, LogStore, MemoryAnnotationStore, MemoryLogStore, Oracle, OracleError,
};
use triage::core::{TriageLimits, DECISION_KEY, DIAGNOSTICS_KEY};
use triage::domain::{Action, Decision, ExecutionContext, FallbackCause, Signal};
use triage::{Triage, TriageError};

/// Oracle that replays a fixed answer and remembers the prompts it saw
struct ScriptedOracle {
    reply: Result<String, OracleError>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(error: OracleError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok("restart".to_string()),
            delay: Some(delay),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, _timeout: Duration) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Harness {
    logs: Arc<MemoryLogStore>,
    annotations: Arc<MemoryAnnotationStore>,
    triage: Triage,
}

fn harness(oracle: Arc<ScriptedOracle>) -> Harness {
    let logs = Arc::new(MemoryLogStore::new());
    let annotations = Arc::new(MemoryAnnotationStore::new());
    let triage = Triage::new(
        logs.clone(),
        oracle,
        annotations.clone(),
        &TriageLimits::default(),
    );
    Harness {
        logs,
        annotations,
        triage,
    }
}

fn context(attempt: u32, ceiling: u32) -> ExecutionContext {
    ExecutionContext::new("etl_pipeline", "load_data", "manual__2024-06-01", attempt, ceiling)
        .unwrap()
}

async fn recorded(h: &Harness, ctx: &ExecutionContext) -> (Option<String>, Option<Decision>) {
    let action = h.annotations.get(ctx.key(), DECISION_KEY).await.unwrap();
    let decision = h
        .annotations
        .get(ctx.key(), DIAGNOSTICS_KEY)
        .await
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap());
    (action, decision)
}

#[tokio::test]
async fn test_scenario_a_reasoning_reply_restarts() {
    let oracle =
        ScriptedOracle::replying("<think>The target dropped the connection.</think>\nrestart");
    let h = harness(oracle.clone());
    let ctx = context(1, 1);
    h.logs
        .append(ctx.key(), "ERROR - Temporary disconnection with the target!\n")
        .await
        .unwrap();

    let signal = h.triage.handle_failure(&ctx).await;

    assert_eq!(signal, Signal::Restart);
    let prompts = oracle.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Temporary disconnection with the target!"));

    let (action, decision) = recorded(&h, &ctx).await;
    assert_eq!(action.as_deref(), Some("restart"));
    assert!(!decision.unwrap().ceiling_override);
}

#[tokio::test]
async fn test_scenario_b_ceiling_override() {
    let h = harness(ScriptedOracle::replying("restart"));
    let ctx = context(2, 1);
    h.logs.append(ctx.key(), "still failing").await.unwrap();

    let signal = h.triage.handle_failure(&ctx).await;

    assert_eq!(signal, Signal::Escalate);
    let (action, decision) = recorded(&h, &ctx).await;
    assert_eq!(action.as_deref(), Some("escalate"));
    let decision = decision.unwrap();
    assert_eq!(decision.oracle_action, Action::Restart);
    assert!(decision.ceiling_override);
    assert_eq!(decision.fallback, None);
}

#[tokio::test]
async fn test_scenario_c_missing_log_still_consults_oracle() {
    let oracle = ScriptedOracle::replying("ignore");
    let h = harness(oracle.clone());
    let ctx = context(1, 3);

    let signal = h.triage.handle_failure(&ctx).await;

    assert_eq!(signal, Signal::Ignore);
    let prompts = oracle.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Error: Log file not found at memory://"));
}

#[tokio::test]
async fn test_scenario_d_oracle_timeout_escalates() {
    let h = harness(ScriptedOracle::failing(OracleError::Timeout {
        after: Duration::from_secs(60),
    }));
    let ctx = context(1, 3);
    h.logs.append(ctx.key(), "boom").await.unwrap();

    let signal = h.triage.handle_failure(&ctx).await;

    assert_eq!(signal, Signal::Escalate);
    let (_, decision) = recorded(&h, &ctx).await;
    match decision.unwrap().fallback {
        Some(FallbackCause::Timeout(detail)) => assert!(detail.contains("60s")),
        other => panic!("Expected timeout fallback, got {:?}", other),
    }
}

#[tokio::test]
async fn test_oracle_ignoring_its_timeout_is_cut_off() {
    let logs = Arc::new(MemoryLogStore::new());
    let annotations = Arc::new(MemoryAnnotationStore::new());
    let limits = TriageLimits {
        oracle_timeout_seconds: 1,
        ..Default::default()
    };
    let triage = Triage::new(
        logs,
        ScriptedOracle::slow(Duration::from_secs(30)),
        annotations.clone(),
        &limits,
    );
    let ctx = context(1, 3);

    let signal = tokio::time::timeout(Duration::from_secs(5), triage.handle_failure(&ctx))
        .await
        .expect("triage should finish within the oracle bound");

    assert_eq!(signal, Signal::Escalate);
    let diagnostics = annotations.get(ctx.key(), DIAGNOSTICS_KEY).await.unwrap().unwrap();
    let decision: Decision = serde_json::from_str(&diagnostics).unwrap();
    assert!(matches!(decision.fallback, Some(FallbackCause::Timeout(_))));
}

#[tokio::test]
async fn test_scenario_e_unrecognized_reply_escalates() {
    let h = harness(ScriptedOracle::replying("maybe later"));
    let ctx = context(1, 3);

    let signal = h.triage.handle_failure(&ctx).await;

    assert_eq!(signal, Signal::Escalate);
    let (_, decision) = recorded(&h, &ctx).await;
    let decision = decision.unwrap();
    assert_eq!(decision.raw_reply.as_deref(), Some("maybe later"));
    assert_eq!(
        decision.fallback,
        Some(FallbackCause::OutOfVocabulary("later".to_string()))
    );
}

#[tokio::test]
async fn test_transport_failure_never_restarts_or_ignores() {
    let errors = [
        OracleError::Transport("connection refused".to_string()),
        OracleError::Status {
            status: 500,
            body: "model not loaded".to_string(),
        },
        OracleError::Decode("expected value at line 1".to_string()),
    ];

    for error in errors {
        let h = harness(ScriptedOracle::failing(error));
        let signal = h.triage.handle_failure(&context(1, 5)).await;
        assert_eq!(signal, Signal::Escalate);
    }
}

#[tokio::test]
async fn test_recording_twice_is_idempotent() {
    let h = harness(ScriptedOracle::replying("ignore"));
    let ctx = context(1, 1);

    let decision = h.triage.decide(&ctx).await;
    h.triage.recorder().record(&ctx, &decision).await;
    let once = h.annotations.get_all(ctx.key()).await.unwrap();

    h.triage.recorder().record(&ctx, &decision).await;
    let twice = h.annotations.get_all(ctx.key()).await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(h.annotations.len().await, 1);
}

#[tokio::test]
async fn test_independent_keys_do_not_interfere() {
    let h = harness(ScriptedOracle::replying("restart"));
    let first = context(1, 1);
    let second = context(2, 1);

    let (a, b) = tokio::join!(
        h.triage.handle_failure(&first),
        h.triage.handle_failure(&second)
    );

    assert_eq!(a, Signal::Restart);
    assert_eq!(b, Signal::Escalate);
    assert_eq!(recorded(&h, &first).await.0.as_deref(), Some("restart"));
    assert_eq!(recorded(&h, &second).await.0.as_deref(), Some("escalate"));
}

#[tokio::test]
async fn test_cancellation_records_nothing() {
    let h = harness(ScriptedOracle::slow(Duration::from_secs(30)));
    let ctx = context(1, 3);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = h.triage.handle_failure_with_cancel(&ctx, &cancel).await;

    assert_eq!(result, Err(TriageError::Cancelled));
    assert!(h.annotations.is_empty().await);
}

#[tokio::test]
async fn test_uncancelled_token_records_decision() {
    let h = harness(ScriptedOracle::replying("escalate"));
    let ctx = context(1, 3);

    let result = h
        .triage
        .handle_failure_with_cancel(&ctx, &CancellationToken::new())
        .await;

    assert_eq!(result, Ok(Signal::Escalate));
    assert_eq!(recorded(&h, &ctx).await.0.as_deref(), Some("escalate"));
}

#[tokio::test]
async fn test_custom_extractor() {
    let oracle = ScriptedOracle::replying("IGNORE - the load is retried by the next run anyway");
    let logs = Arc::new(MemoryLogStore::new());
    let annotations = Arc::new(MemoryAnnotationStore::new());
    let first_word = |raw: &str| raw.split_whitespace().next().map(str::to_lowercase);
    let triage = Triage::new(logs, oracle, annotations, &TriageLimits::default())
        .with_extractor(first_word);

    assert_eq!(triage.handle_failure(&context(1, 1)).await, Signal::Ignore);
}

#[tokio::test]
async fn test_long_logs_keep_the_tail() {
    let oracle = ScriptedOracle::replying("restart");
    let logs = Arc::new(MemoryLogStore::new());
    let limits = TriageLimits {
        max_log_chars: 32,
        ..Default::default()
    };
    let triage = Triage::new(
        logs.clone(),
        oracle.clone(),
        Arc::new(MemoryAnnotationStore::new()),
        &limits,
    );
    let ctx = context(1, 1);
    let log = format!("{}FINAL: connection reset by peer", "x".repeat(10_000));
    logs.append(ctx.key(), &log).await.unwrap();

    triage.handle_failure(&ctx).await;

    let prompt = &oracle.prompts()[0];
    assert!(prompt.contains("FINAL: connection reset by peer"));
    assert!(prompt.contains("earlier characters truncated"));
    assert!(!prompt.contains(&"x".repeat(100)));
}

#[tokio::test]
async fn test_decide_with_cancel_stops_early() {
    let h = harness(ScriptedOracle::slow(Duration::from_secs(30)));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h.triage.decide_with_cancel(&context(1, 1), &cancel).await;

    assert_eq!(result, Err(TriageError::Cancelled));
    assert!(h.annotations.is_empty().await);
}
