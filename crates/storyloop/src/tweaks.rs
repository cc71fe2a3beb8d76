//! Post-loop tweaks: one revise and one judge per requested change.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Input;

use storyloop_core::{LoopError, ModelIds, StoryLoop, TweakOutcome};
use storyloop_logging::SessionWriter;

/// Answers that end the interactive prompt
const DONE_WORDS: &[&str] = &["q", "quit", "exit", "n", "no"];

fn is_done(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    answer.is_empty() || DONE_WORDS.contains(&answer.as_str())
}

/// Apply the scripted tweaks in order, then prompt for more if `interactive`.
///
/// Each tweak starts from the story the previous one produced. A failed tweak
/// leaves the story unchanged; only fatal backend errors abort.
pub async fn apply_all(
    story_loop: &StoryLoop<'_>,
    story: &str,
    scripted: &[String],
    interactive: bool,
    models: &ModelIds,
    transcript: Option<&SessionWriter>,
) -> Result<Vec<TweakOutcome>> {
    let mut applied: Vec<TweakOutcome> = Vec::new();

    for change in scripted {
        let current = applied.last().map(|t| t.story.as_str()).unwrap_or(story);
        if let Some(outcome) = apply_one(story_loop, current, change, models, transcript).await? {
            applied.push(outcome);
        }
    }

    if !interactive {
        return Ok(applied);
    }

    loop {
        let answer: String = Input::new()
            .with_prompt("Any changes? (enter to finish)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read tweak")?;
        if is_done(&answer) {
            break;
        }

        let current = applied.last().map(|t| t.story.as_str()).unwrap_or(story);
        if let Some(outcome) = apply_one(story_loop, current, &answer, models, transcript).await? {
            eprintln!();
            eprintln!("{}", outcome.story);
            eprintln!();
            eprintln!(
                "{} {}",
                "Score:".dimmed(),
                outcome.judge_report.short_description()
            );
            applied.push(outcome);
        }
    }

    Ok(applied)
}

async fn apply_one(
    story_loop: &StoryLoop<'_>,
    story: &str,
    change: &str,
    models: &ModelIds,
    transcript: Option<&SessionWriter>,
) -> Result<Option<TweakOutcome>> {
    match story_loop.tweak(story, change, models).await {
        Ok(outcome) => {
            if let Some(writer) = transcript {
                let report = serde_json::to_value(&outcome.judge_report).unwrap_or_default();
                writer.write_tweak(change.trim(), &outcome.story, report);
            }
            Ok(Some(outcome))
        }
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(LoopError::EmptyTweak) => Ok(None),
        Err(e) => {
            eprintln!("{} tweak {:?} failed: {}", "warning:".yellow(), change, e);
            Ok(None)
        }
    }
}
