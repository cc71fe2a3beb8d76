use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Represents each line type in the session JSONL file.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionLine {
    SessionStart {
        timestamp: DateTime<Utc>,
        session_id: String,
        request: String,
        classify_model: String,
        generate_model: String,
        judge_model: String,
        revise_model: String,
        pass_mark: f64,
        max_rounds: usize,
    },
    Round {
        round: usize,
        story: String,
        judge_report: serde_json::Value,
        decision: String,
        timestamp: DateTime<Utc>,
    },
    Tweak {
        change_request: String,
        story: String,
        judge_report: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    SessionEnd {
        stop_reason: String,
        rounds: usize,
        category: Option<String>,
        weighted_score: f64,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Fields recorded when a session begins
#[derive(Debug, Clone, Copy)]
pub struct SessionStartInfo<'a> {
    pub session_id: &'a str,
    pub request: &'a str,
    pub classify_model: &'a str,
    pub generate_model: &'a str,
    pub judge_model: &'a str,
    pub revise_model: &'a str,
    pub pass_mark: f64,
    pub max_rounds: usize,
}

/// Writes session transcripts as JSONL to ~/.local/share/storyloop/sessions/.
pub struct SessionWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SessionWriter {
    /// Create a writer in the default sessions directory
    pub fn new(request: &str) -> io::Result<Self> {
        Self::in_dir(&Self::sessions_dir()?, request)
    }

    /// Create a writer in `dir`. The file name is the current UTC timestamp
    /// plus a short hash of the request.
    pub fn in_dir(dir: &Path, request: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let timestamp_str = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(request.as_bytes());
        let hash = hex::encode(hasher.finalize());
        let short_hash = &hash[..6];

        let filename = format!("{}_{}.jsonl", timestamp_str, short_hash);
        let path = dir.join(filename);

        let file = File::create(&path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Returns the path to the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(&self, info: SessionStartInfo<'_>) {
        let line = SessionLine::SessionStart {
            timestamp: Utc::now(),
            session_id: info.session_id.to_string(),
            request: info.request.to_string(),
            classify_model: info.classify_model.to_string(),
            generate_model: info.generate_model.to_string(),
            judge_model: info.judge_model.to_string(),
            revise_model: info.revise_model.to_string(),
            pass_mark: info.pass_mark,
            max_rounds: info.max_rounds,
        };
        self.write_line(&line);
    }

    /// Write one judged round. The report is taken as JSON to keep this crate
    /// independent of the judge crate.
    pub fn write_round(
        &self,
        round: usize,
        story: &str,
        judge_report: serde_json::Value,
        decision: &str,
        timestamp: DateTime<Utc>,
    ) {
        let line = SessionLine::Round {
            round,
            story: story.to_string(),
            judge_report,
            decision: decision.to_string(),
            timestamp,
        };
        self.write_line(&line);
    }

    pub fn write_tweak(&self, change_request: &str, story: &str, judge_report: serde_json::Value) {
        let line = SessionLine::Tweak {
            change_request: change_request.to_string(),
            story: story.to_string(),
            judge_report,
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    pub fn write_end(
        &self,
        stop_reason: &str,
        rounds: usize,
        category: Option<&str>,
        weighted_score: f64,
        duration_secs: f64,
    ) {
        let line = SessionLine::SessionEnd {
            stop_reason: stop_reason.to_string(),
            rounds,
            category: category.map(String::from),
            weighted_score,
            duration_secs,
            timestamp: Utc::now(),
        };
        self.write_line(&line);
    }

    fn write_line(&self, line: &SessionLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn sessions_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("storyloop").join("sessions"))
    }
}
