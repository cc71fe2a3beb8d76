mod config;
mod tweaks;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use storyloop_agent::{create_generator, RetryPolicy};
use storyloop_core::{
    LoopError, ModelIds, SessionConfig, StopReason, StoryLoop, StoryOutcome, TweakOutcome,
    DEFAULT_MAX_ROUNDS, DEFAULT_MODEL, DEFAULT_PASS_MARK,
};
use storyloop_logging::{init_tracing, LogFormat, Logger, SessionStartInfo, SessionWriter};

use crate::config::ProjectConfig;

/// Exit code for anything that prevented a session from producing a story
const ERROR_EXIT_CODE: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "storyloop",
    about = "Generate, judge and revise children's bedtime stories",
    version,
    author
)]
struct Cli {
    /// Story request, e.g. "a story about a boy who learns to share"
    #[arg(conflicts_with = "request")]
    request_text: Option<String>,

    /// Story request (alternative to the positional argument)
    #[arg(short, long)]
    request: Option<String>,

    /// Read the story request from a file
    #[arg(long)]
    request_file: Option<PathBuf>,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long)]
    working_dir: Option<PathBuf>,

    /// Weighted score a story must reach to pass (0-5)
    #[arg(long)]
    pass_mark: Option<f64>,

    /// Maximum revision rounds
    #[arg(short = 'n', long)]
    max_rounds: Option<usize>,

    /// Model to use for every step
    #[arg(short, long)]
    model: Option<String>,

    /// Model for the classifier step
    #[arg(long)]
    classify_model: Option<String>,

    /// Model for the generator step
    #[arg(long)]
    generate_model: Option<String>,

    /// Model for the judge step
    #[arg(long)]
    judge_model: Option<String>,

    /// Model for the reviser step
    #[arg(long)]
    revise_model: Option<String>,

    /// Change to apply after the loop finishes (repeatable, applied in order)
    #[arg(long = "tweak")]
    tweaks: Vec<String>,

    /// Prompt for tweaks after the loop finishes
    #[arg(short, long)]
    interactive: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Do not write a session transcript
    #[arg(long)]
    no_session_log: bool,

    /// Dry run: show the resolved settings without calling any model
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Everything resolved from CLI flags, `storyloop.toml` and defaults
#[derive(Debug)]
struct Settings {
    session: SessionConfig,
    retry: RetryPolicy,
}

/// Final JSON document printed with `--json-output`
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    outcome: &'a StoryOutcome,
    tweaks: &'a [TweakOutcome],
    final_story: &'a str,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            ERROR_EXIT_CODE
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    // Missing .env is fine; credentials may come from the real environment
    let _ = dotenvy::dotenv();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing("warn", log_format);

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let project = ProjectConfig::load(&working_dir)?.unwrap_or_default();
    let settings = resolve_settings(&cli, &project);
    settings.session.validate()?;

    let request = get_request(&cli, &working_dir)?;

    if cli.dry_run {
        print_dry_run(&request, &settings);
        return Ok(0);
    }

    let generator = create_generator(settings.retry.clone())
        .context("Failed to set up the text-generation client")?;

    let logger = Arc::new(Logger::new(log_format));
    let story_loop = StoryLoop::new(generator.as_ref(), logger);

    // Handle Ctrl+C gracefully
    let interrupt_handle = story_loop.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing the current step...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let outcome = match story_loop.run(&request, settings.session.clone()).await {
        Ok(outcome) => outcome,
        Err(LoopError::Interrupted) => {
            eprintln!();
            eprintln!("=== INTERRUPTED ===");
            eprintln!("Stopped before any story was judged.");
            return Ok(StopReason::Interrupted.exit_code());
        }
        Err(e) => return Err(e.into()),
    };

    let transcript = if cli.no_session_log {
        None
    } else {
        open_transcript(&request, &settings.session, &outcome)
    };

    let applied = run_tweaks(
        &story_loop,
        &outcome,
        &cli.tweaks,
        cli.interactive,
        &settings.session.models,
        transcript.as_ref(),
    )
    .await?;

    let final_story = applied
        .last()
        .map(|t| t.story.as_str())
        .unwrap_or(outcome.story.as_str());

    if cli.json_output {
        let report = JsonReport {
            outcome: &outcome,
            tweaks: &applied,
            final_story,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", final_story);
        print_outcome(&outcome, applied.len());
        if let Some(ref writer) = transcript {
            eprintln!("Transcript: {}", writer.path().display());
        }
    }

    Ok(outcome.exit_code())
}

/// Priority: per-step flag > --model > [step] table > global model > default
fn resolve_settings(cli: &Cli, project: &ProjectConfig) -> Settings {
    let pick = |step_flag: &Option<String>, step_config: Option<&str>| -> String {
        step_flag
            .as_deref()
            .or(cli.model.as_deref())
            .or(step_config)
            .unwrap_or(DEFAULT_MODEL)
            .to_string()
    };

    let models = ModelIds {
        classify: pick(&cli.classify_model, project.classify_model()),
        generate: pick(&cli.generate_model, project.generate_model()),
        judge: pick(&cli.judge_model, project.judge_model()),
        revise: pick(&cli.revise_model, project.revise_model()),
    };

    let session = SessionConfig::default()
        .with_pass_mark(
            cli.pass_mark
                .or(project.pass_mark)
                .unwrap_or(DEFAULT_PASS_MARK),
        )
        .with_max_rounds(
            cli.max_rounds
                .or(project.max_rounds)
                .unwrap_or(DEFAULT_MAX_ROUNDS),
        )
        .with_models(models);

    let mut retry = RetryPolicy::default();
    if let Some(attempts) = project.max_attempts {
        retry = retry.with_max_attempts(attempts);
    }
    if let Some(secs) = project.timeout_secs {
        retry = retry.with_call_timeout(Duration::from_secs(secs));
    }

    Settings { session, retry }
}

fn get_request(cli: &Cli, working_dir: &Path) -> Result<String> {
    // Prefer an inline request
    if let Some(request) = cli.request_text.as_ref().or(cli.request.as_ref()) {
        return Ok(request.trim().to_string());
    }

    if let Some(ref file) = cli.request_file {
        let path = if file.is_absolute() {
            file.clone()
        } else {
            working_dir.join(file)
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read request file {}", path.display()))?;
        return Ok(content.trim().to_string());
    }

    if cli.interactive {
        let request: String = dialoguer::Input::new()
            .with_prompt("What kind of story do you want to hear?")
            .interact_text()
            .context("Failed to read story request")?;
        return Ok(request.trim().to_string());
    }

    anyhow::bail!("No story request provided. Pass it as an argument, or use --request-file")
}

fn open_transcript(
    request: &str,
    config: &SessionConfig,
    outcome: &StoryOutcome,
) -> Option<SessionWriter> {
    let writer = match SessionWriter::new(request) {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!("{} could not create session transcript: {}", "warning:".yellow(), e);
            return None;
        }
    };

    writer.write_start(SessionStartInfo {
        session_id: &outcome.session_id,
        request,
        classify_model: &config.models.classify,
        generate_model: &config.models.generate,
        judge_model: &config.models.judge,
        revise_model: &config.models.revise,
        pass_mark: config.pass_mark,
        max_rounds: config.max_rounds,
    });

    for record in &outcome.history {
        let report = serde_json::to_value(&record.judge_report).unwrap_or_default();
        writer.write_round(
            record.round,
            &record.story,
            report,
            &record.decision,
            record.timestamp,
        );
    }

    Some(writer)
}

/// Apply post-loop tweaks, then close the transcript whether or not they
/// succeeded. Interrupted sessions skip tweaks.
async fn run_tweaks(
    story_loop: &StoryLoop<'_>,
    outcome: &StoryOutcome,
    scripted: &[String],
    interactive: bool,
    models: &ModelIds,
    transcript: Option<&SessionWriter>,
) -> Result<Vec<TweakOutcome>> {
    let result = if outcome.stop_reason == StopReason::Interrupted {
        Ok(Vec::new())
    } else {
        tweaks::apply_all(
            story_loop,
            &outcome.story,
            scripted,
            interactive,
            models,
            transcript,
        )
        .await
    };

    if let Some(writer) = transcript {
        finish_transcript(writer, outcome);
    }
    result
}

fn finish_transcript(writer: &SessionWriter, outcome: &StoryOutcome) {
    writer.write_end(
        outcome.stop_reason.as_str(),
        outcome.rounds,
        Some(outcome.category.label()),
        outcome.judge_report.weighted_score,
        outcome.total_duration_secs,
    );
}

fn print_dry_run(request: &str, settings: &Settings) {
    let config = &settings.session;
    println!("=== Dry Run ===");
    println!(
        "Request: {}",
        if request.chars().count() > 100 {
            format!("{}...", request.chars().take(100).collect::<String>())
        } else {
            request.to_string()
        }
    );
    println!("Pass mark: {}", config.pass_mark);
    println!("Max rounds: {}", config.max_rounds);
    println!("Classify model: {}", config.models.classify);
    println!("Generate model: {}", config.models.generate);
    println!("Judge model: {}", config.models.judge);
    println!("Revise model: {}", config.models.revise);
    println!("Attempts per call: {}", settings.retry.max_attempts);
    if let Some(timeout) = settings.retry.call_timeout {
        println!("Call timeout: {}s", timeout.as_secs());
    }
}

fn print_outcome(outcome: &StoryOutcome, tweaks: usize) {
    let report = &outcome.judge_report;
    eprintln!();
    match outcome.stop_reason {
        StopReason::Passed => {
            eprintln!("{}", "=== PASSED ===".bright_green().bold());
        }
        StopReason::ExhaustedRounds => {
            eprintln!("{}", "=== INCOMPLETE ===".bright_yellow().bold());
            eprintln!("Reached maximum rounds ({})", outcome.rounds);
            eprintln!("The story did not meet the pass mark.");
        }
        StopReason::CriticalFailure => {
            eprintln!("{}", "=== CRITICAL FAILURE ===".bright_red().bold());
            for failure in &report.critical_failures {
                eprintln!("  - {}", failure);
            }
        }
        StopReason::Interrupted => {
            eprintln!("{}", "=== INTERRUPTED ===".bright_yellow().bold());
            eprintln!("User stopped after {} round(s)", outcome.rounds);
        }
    }
    eprintln!("Category: {}", outcome.category);
    eprintln!("Rounds: {}", outcome.rounds);
    eprintln!("Score: {}", report.short_description());
    if tweaks > 0 {
        eprintln!("Tweaks applied: {}", tweaks);
    }
    eprintln!("Duration: {:.1}s", outcome.total_duration_secs);
}
