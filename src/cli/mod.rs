//! Command-line interface for the triage engine.
//!
//! Provides commands for triaging a failed attempt, interpreting raw oracle
//! replies, inspecting recorded decisions, and running a demo pipeline
//! with the failure hook attached.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::adapters::{AnnotationStore, FileAnnotationStore, FileLogStore, OllamaAdapter, Oracle};
use crate::config::{config, ResolvedConfig};
use crate::core::{
    interpret, new_run_id, LastWordExtractor, Pipeline, PipelineRunner, ReasoningTailExtractor,
    ResponseExtractor, Triage, DECISION_KEY, DIAGNOSTICS_KEY,
};
use crate::domain::{Decision, ExecutionContext, RunState};

/// triage - failure triage for staged data pipelines
#[derive(Parser, Debug)]
#[command(name = "triage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Triage a failed stage attempt and record the decision
    Handle {
        #[command(flatten)]
        attempt: AttemptArgs,

        /// Maximum attempts allowed for the stage
        #[arg(long)]
        ceiling: u32,

        /// Reply extraction strategy
        #[arg(long, value_enum, default_value = "reasoning-tail")]
        extractor: ExtractorKind,

        /// Print the full decision as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interpret a raw oracle reply without contacting the oracle
    Parse {
        /// Raw reply (reads from stdin if not provided)
        #[arg(short, long)]
        reply: Option<String>,

        /// Reply extraction strategy
        #[arg(long, value_enum, default_value = "reasoning-tail")]
        extractor: ExtractorKind,
    },

    /// Show the annotations recorded for an attempt
    Show {
        #[command(flatten)]
        attempt: AttemptArgs,
    },

    /// Run a pipeline definition with triage hooks attached
    Run {
        /// Pipeline name (will look for pipelines/<name>.yaml) or path
        pipeline: String,

        /// Run ID (generated if not provided)
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,

    /// Check that the oracle is reachable
    Check,
}

/// Addressing tuple of one stage attempt
#[derive(Args, Debug)]
pub struct AttemptArgs {
    /// Pipeline ID
    #[arg(long)]
    pub pipeline: String,

    /// Stage ID
    #[arg(long)]
    pub stage: String,

    /// Run ID
    #[arg(long)]
    pub run: String,

    /// Attempt number (1-based)
    #[arg(long, default_value = "1")]
    pub attempt: u32,
}

impl AttemptArgs {
    fn context(&self, ceiling: u32) -> Result<ExecutionContext> {
        ExecutionContext::new(&self.pipeline, &self.stage, &self.run, self.attempt, ceiling)
            .context("Invalid attempt")
    }
}

/// Reply extraction strategy for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExtractorKind {
    /// Last word after the final </think> marker
    ReasoningTail,

    /// Last word of the whole reply
    LastWord,
}

impl ExtractorKind {
    fn extractor(self) -> Box<dyn ResponseExtractor> {
        match self {
            ExtractorKind::ReasoningTail => Box::new(ReasoningTailExtractor),
            ExtractorKind::LastWord => Box::new(LastWordExtractor),
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Handle {
                attempt,
                ceiling,
                extractor,
                json,
            } => handle_failure(&attempt, ceiling, extractor, json).await,
            Commands::Parse { reply, extractor } => parse_reply(reply, extractor),
            Commands::Show { attempt } => show_annotations(&attempt).await,
            Commands::Run { pipeline, run_id } => run_pipeline(&pipeline, run_id).await,
            Commands::Config => show_config(),
            Commands::Check => check_oracle().await,
        }
    }
}

/// Triage one attempt and print the resulting signal
async fn handle_failure(
    attempt: &AttemptArgs,
    ceiling: u32,
    extractor: ExtractorKind,
    json: bool,
) -> Result<()> {
    let context = attempt.context(ceiling)?;
    let triage = match extractor {
        ExtractorKind::ReasoningTail => Triage::from_config(config()?),
        ExtractorKind::LastWord => Triage::from_config(config()?).with_extractor(LastWordExtractor),
    };

    let cancel = cancel_on_interrupt();
    let decision = triage.decide_with_cancel(&context, &cancel).await?;
    let signal = triage.recorder().record(&context, &decision).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&decision).context("Failed to serialize decision")?
        );
    } else {
        println!("{}", signal);
        eprintln!("[{}: {}]", context.key(), signal.directive());
    }

    Ok(())
}

/// Token cancelled on Ctrl-C, so an interrupted triage records nothing
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling triage");
            token.cancel();
        }
    });
    cancel
}

/// Interpret a raw reply
fn parse_reply(reply: Option<String>, extractor: ExtractorKind) -> Result<()> {
    let raw = match reply {
        Some(reply) => reply,
        None if !io::stdin().is_terminal() => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            buffer
        }
        None => anyhow::bail!("No reply provided. Use --reply <text> or pipe to stdin"),
    };

    let response = interpret(extractor.extractor().as_ref(), raw);

    println!("{}", response.action);
    if let Some(cause) = &response.fallback {
        eprintln!("[fallback: {}]", cause);
    }

    Ok(())
}

/// Print recorded annotations for an attempt
async fn show_annotations(attempt: &AttemptArgs) -> Result<()> {
    // The ceiling is not part of the address
    let context = attempt.context(attempt.attempt)?;
    let store = FileAnnotationStore::new(&config()?.annotation_root);
    let annotations = store.get_all(context.key()).await?;

    if annotations.is_empty() {
        println!("No annotations recorded for {}", context.key());
        return Ok(());
    }

    println!("Attempt: {}", context.key());
    if let Some(action) = annotations.get(DECISION_KEY) {
        println!("Decision: {}", action);
    }
    if let Some(raw) = annotations.get(DIAGNOSTICS_KEY) {
        let decision: Decision =
            serde_json::from_str(raw).context("Failed to parse recorded diagnostics")?;
        println!("Oracle suggested: {}", decision.oracle_action);
        println!("Attempt {} of ceiling {}", decision.attempt, decision.ceiling);
        if decision.ceiling_override {
            println!("Ceiling override: restart escalated");
        }
        if let Some(cause) = &decision.fallback {
            println!("Fallback: {}", cause);
        }
        if let Some(reply) = &decision.raw_reply {
            println!("Raw reply:\n{}", reply.trim());
        }
    }
    for (name, value) in annotations
        .iter()
        .filter(|(name, _)| *name != DECISION_KEY && *name != DIAGNOSTICS_KEY)
    {
        println!("{}: {}", name, value);
    }

    Ok(())
}

/// Run a pipeline file
async fn run_pipeline(name: &str, run_id: Option<String>) -> Result<()> {
    let pipeline = load_pipeline(name)?;
    let config = config()?;

    let logs = Arc::new(FileLogStore::new(&config.log_root));
    let triage = Arc::new(Triage::from_config(config));
    let runner = PipelineRunner::new(triage, logs).with_cancellation(cancel_on_interrupt());

    let run_id = run_id.unwrap_or_else(new_run_id);
    let report = runner.run(&pipeline, &run_id).await?;

    for stage in &report.stages {
        println!(
            "{:<24} {:<10} attempts={}",
            stage.name,
            format!("{:?}", stage.outcome).to_lowercase(),
            stage.attempts
        );
    }

    match &report.state {
        RunState::Completed => {
            eprintln!("\n[Run {} completed successfully]", report.run_id);
        }
        RunState::Escalated { stage } => {
            eprintln!(
                "\n[Run {} halted: stage '{}' escalated for human review]",
                report.run_id, stage
            );
            std::process::exit(2);
        }
        RunState::Failed { stage, error } => {
            eprintln!(
                "\n[Run {} failed at stage '{}': {}]",
                report.run_id, stage, error
            );
            std::process::exit(1);
        }
        RunState::Running => {
            eprintln!("\n[Run {} in state: {:?}]", report.run_id, report.state);
        }
    }

    Ok(())
}

/// Load a pipeline by name or path
fn load_pipeline(name: &str) -> Result<Pipeline> {
    let candidates = [
        PathBuf::from(name),
        PathBuf::from("pipelines").join(format!("{}.yaml", name)),
        PathBuf::from(format!("{}.yaml", name)),
    ];

    let Some(path) = candidates.iter().find(|p| p.is_file()) else {
        anyhow::bail!(
            "Pipeline '{}' not found. Looked for:\n  - {}\n  - {}",
            name,
            candidates[1].display(),
            candidates[2].display()
        );
    };

    let pipeline = Pipeline::from_file(path)?;
    pipeline.validate()?;
    Ok(pipeline)
}

/// Print resolved configuration
fn show_config() -> Result<()> {
    let config: &ResolvedConfig = config()?;

    println!("Config file: {}", match &config.config_file {
        Some(path) => path.display().to_string(),
        None => "(none, using defaults)".to_string(),
    });
    println!("Log root: {}", config.log_root.display());
    println!("Annotation root: {}", config.annotation_root.display());
    println!("Oracle endpoint: {}", config.oracle.endpoint);
    println!("Oracle model: {}", config.oracle.model);
    println!(
        "Timeouts: log read {}s, oracle {}s",
        config.limits.log_read_timeout_seconds, config.limits.oracle_timeout_seconds
    );
    println!("Max log chars in prompt: {}", config.limits.max_log_chars);

    Ok(())
}

/// Oracle health check
async fn check_oracle() -> Result<()> {
    let config = config()?;
    let oracle = OllamaAdapter::new(&config.oracle.endpoint, &config.oracle.model);

    oracle.health_check().await?;
    println!("{} reachable at {}", oracle.name(), oracle.endpoint());

    Ok(())
}
