use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Step of the story pipeline producing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    Classifier,
    Generator,
    Judge,
    Reviser,
}

impl std::fmt::Display for StepRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepRole::Classifier => write!(f, "classifier"),
            StepRole::Generator => write!(f, "generator"),
            StepRole::Judge => write!(f, "judge"),
            StepRole::Reviser => write!(f, "reviser"),
        }
    }
}

/// Structured log events for the generate-judge-revise loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SessionStarted {
        request: String,
        pass_mark: f64,
        max_rounds: usize,
    },
    Classified {
        category: String,
        fell_back: bool,
    },
    DraftGenerated {
        chars: usize,
        duration_secs: f64,
    },
    JudgeStarted {
        round: usize,
    },
    JudgeCompleted {
        round: usize,
        weighted_score: f64,
        critical_failures: usize,
        fallback: bool,
    },
    DecisionMade {
        round: usize,
        decision: String,
    },
    RevisionStarted {
        round: usize,
        fixes: usize,
    },
    RevisionCompleted {
        round: usize,
        chars: usize,
        duration_secs: f64,
    },
    SessionCompleted {
        rounds: usize,
        stop_reason: String,
        weighted_score: f64,
        duration_secs: f64,
    },
    TweakApplied {
        change_request: String,
        weighted_score: f64,
    },
    StepFailed {
        round: usize,
        role: StepRole,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for storyloop events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    console: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            console: true,
            file_writer: None,
        }
    }

    /// A logger that discards everything (library callers, tests)
    pub fn silent() -> Self {
        Self {
            format: LogFormat::Compact,
            console: false,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            console: true,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if !self.console {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::SessionStarted {
                request,
                pass_mark,
                max_rounds,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "storyloop".bold().bright_white(),
                    " ".repeat(58) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Request:".dimmed(),
                    Self::truncate_with_padding(request, 58, 66).dimmed()
                );
                let limits = format!("pass mark {:.1}, max {} rounds", pass_mark, max_rounds);
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Limits:".dimmed(),
                    Self::truncate_with_padding(&limits, 59, 67).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::Classified {
                category,
                fell_back,
            } => {
                let suffix = if *fell_back { " (fallback)" } else { "" };
                let _ = writeln!(
                    stderr,
                    "  {} {} {}{}",
                    "▶".bright_cyan(),
                    "CLASSIFY".bright_cyan().bold(),
                    category.bold(),
                    suffix.dimmed()
                );
            }
            LogEvent::DraftGenerated {
                chars,
                duration_secs,
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_cyan(),
                    "GENERATE".bright_cyan().bold()
                );
                let _ = writeln!(
                    stderr,
                    "    {} Draft ready ({} chars, {:.1}s)",
                    "✓".bright_green(),
                    chars,
                    duration_secs
                );
                let _ = writeln!(stderr);
            }
            LogEvent::JudgeStarted { round } => {
                let round_text = format!("─ Round {} ", round);
                let padding = "─".repeat(67usize.saturating_sub(round_text.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    round_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "JUDGE".bright_magenta().bold()
                );
            }
            LogEvent::JudgeCompleted {
                weighted_score,
                critical_failures,
                fallback,
                ..
            } => {
                let line = if *fallback {
                    "✗ Unusable verdict, fallback report (0.0)"
                        .bright_red()
                        .to_string()
                } else if *critical_failures > 0 {
                    format!(
                        "✗ Score {:.1}, {} critical failure(s)",
                        weighted_score, critical_failures
                    )
                    .bright_red()
                    .to_string()
                } else {
                    format!("✓ Score {:.1}", weighted_score)
                        .bright_green()
                        .to_string()
                };
                let _ = writeln!(stderr, "    {}", line);
            }
            LogEvent::DecisionMade { decision, .. } => {
                let styled = if decision.starts_with("STOP") {
                    format!("■ Decision: {}", decision).bright_green().to_string()
                } else {
                    format!("→ Decision: {}", decision)
                        .bright_yellow()
                        .to_string()
                };
                let _ = writeln!(stderr, "    {}", styled);
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::RevisionStarted { fixes, .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_cyan(),
                    "REVISE".bright_cyan().bold(),
                    format!("({} fixes)", fixes).dimmed()
                );
            }
            LogEvent::RevisionCompleted {
                chars,
                duration_secs,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} Revised ({} chars, {:.1}s)",
                    "✓".bright_green(),
                    chars,
                    duration_secs
                );
                let _ = writeln!(stderr);
            }
            LogEvent::SessionCompleted { .. } => {
                // Printed by the binary together with the story
            }
            LogEvent::TweakApplied {
                change_request,
                weighted_score,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} Tweak applied: {} (score {:.1})",
                    "✎".bright_cyan(),
                    change_request.dimmed(),
                    weighted_score
                );
            }
            LogEvent::StepFailed { round, role, error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} failed in round {}: {}",
                    "✗".bright_red(),
                    role,
                    round,
                    error.bright_red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::SessionStarted { max_rounds, .. } => {
                format!("[{}] session:start max={}", timestamp, max_rounds)
            }
            LogEvent::Classified {
                category,
                fell_back,
            } => format!(
                "[{}] classify:{}{}",
                timestamp,
                category,
                if *fell_back { " (fallback)" } else { "" }
            ),
            LogEvent::DraftGenerated {
                chars,
                duration_secs,
            } => format!(
                "[{}] generate:done {}c {:.1}s",
                timestamp, chars, duration_secs
            ),
            LogEvent::JudgeStarted { round } => format!("[{}] judge:start:{}", timestamp, round),
            LogEvent::JudgeCompleted {
                round,
                weighted_score,
                critical_failures,
                fallback,
            } => format!(
                "[{}] judge:done:{} score={:.1} critical={}{}",
                timestamp,
                round,
                weighted_score,
                critical_failures,
                if *fallback { " fallback" } else { "" }
            ),
            LogEvent::DecisionMade { round, decision } => {
                format!("[{}] decide:{} {}", timestamp, round, decision)
            }
            LogEvent::RevisionStarted { round, fixes } => {
                format!("[{}] revise:start:{} fixes={}", timestamp, round, fixes)
            }
            LogEvent::RevisionCompleted {
                round,
                chars,
                duration_secs,
            } => format!(
                "[{}] revise:done:{} {}c {:.1}s",
                timestamp, round, chars, duration_secs
            ),
            LogEvent::SessionCompleted {
                rounds,
                stop_reason,
                weighted_score,
                duration_secs,
            } => format!(
                "[{}] session:done:{} {} score={:.1} {:.1}s",
                timestamp, rounds, stop_reason, weighted_score, duration_secs
            ),
            LogEvent::TweakApplied { weighted_score, .. } => {
                format!("[{}] tweak:done score={:.1}", timestamp, weighted_score)
            }
            LogEvent::StepFailed { round, role, error } => {
                format!("[{}] error:{}:{}:{}", timestamp, role, round, error)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let single_line = s.replace('\n', " ");
        let truncated = if single_line.chars().count() > max_len {
            let head: String = single_line.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            single_line
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LogEvent::JudgeCompleted {
            round: 2,
            weighted_score: 4.6,
            critical_failures: 0,
            fallback: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "judge_completed");
        assert_eq!(json["round"], 2);
    }

    #[test]
    fn test_file_logging_adds_timestamp() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let logger = Logger::with_file(LogFormat::Json, &path).unwrap();

        logger.log(&LogEvent::StepFailed {
            round: 1,
            role: StepRole::Reviser,
            error: "timeout".into(),
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(line["event"], "step_failed");
        assert_eq!(line["role"], "reviser");
        assert!(line["timestamp"].is_string());
    }

    #[test]
    fn test_truncate_with_padding_handles_multibyte() {
        let padded = Logger::truncate_with_padding("a dragon named Zoë who loves tea", 10, 20);
        assert!(padded.starts_with("a drago..."));
        assert_eq!(padded.chars().count(), 20);
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
