//! Append-only JSONL record of finished sessions.
//!
//! Lines land in `<dir>/<yyyy>/<mm>/session.jsonl`. Anything that looks like
//! a credential is replaced before writing, and each redacting write also
//! appends to `audit.jsonl` in the same month directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::workflow::SessionOutcome;

const LOG_DIR_ENV: &str = "PRDFLOW_LOG_DIR";
const RETENTION_ENV: &str = "PRDFLOW_LOG_RETENTION_DAYS";
const DEFAULT_LOG_DIR: &str = "data/logs";
const DEFAULT_RETENTION_DAYS: u64 = 90;
const REVIEW_EXCERPT_CHARS: usize = 500;

/// Pattern name, regex. A `prefix` group, when present, survives redaction.
static SECRET_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("api_key", r"(?i)(?P<prefix>api[_-]?key\s*[:=]\s*)[A-Za-z0-9\-_.+/]+"),
        ("secret", r"(?i)(?P<prefix>secret\s*[:=]\s*)[A-Za-z0-9\-_.+/]+"),
        ("bearer", r"(?i)(?P<prefix>bearer\s+)[A-Za-z0-9\-_.+=/]+"),
        ("google_api_key", r"AIza[0-9A-Za-z\-_]{35}"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("invalid redaction regex")))
    .collect()
});

/// Fields of a finished session worth keeping in the log.
#[derive(Debug, Clone)]
pub struct SessionLogInput {
    pub session_id: String,
    pub idea: String,
    pub approved: bool,
    pub rounds: u32,
    pub review_excerpt: String,
    pub note_titles: Vec<String>,
    pub trace_path: Option<String>,
}

impl SessionLogInput {
    pub fn from_outcome(outcome: &SessionOutcome) -> Self {
        Self {
            session_id: outcome.session_id.clone(),
            idea: outcome.idea.clone(),
            approved: outcome.approved,
            rounds: outcome.rounds,
            review_excerpt: outcome.review.chars().take(REVIEW_EXCERPT_CHARS).collect(),
            note_titles: outcome.notes.iter().map(|note| note.title.clone()).collect(),
            trace_path: outcome
                .trace_path
                .as_ref()
                .map(|path| path.display().to_string()),
        }
    }
}

#[derive(Serialize)]
struct SessionRecord<'a> {
    timestamp: String,
    session_id: &'a str,
    idea: String,
    approved: bool,
    rounds: u32,
    review_excerpt: String,
    note_titles: Vec<String>,
    trace_path: Option<&'a str>,
    redactions: &'a BTreeSet<&'static str>,
}

#[derive(Serialize)]
struct AuditRecord<'a> {
    timestamp: &'a str,
    session_id: &'a str,
    redactions: &'a BTreeSet<&'static str>,
}

/// Collects which secret patterns fired while scrubbing a record.
#[derive(Default)]
struct Redactor {
    fired: BTreeSet<&'static str>,
}

impl Redactor {
    fn scrub(&mut self, input: &str) -> String {
        let mut text = input.to_string();
        for (name, regex) in SECRET_PATTERNS.iter() {
            if !regex.is_match(&text) {
                continue;
            }
            self.fired.insert(*name);
            text = regex
                .replace_all(&text, |caps: &regex::Captures| {
                    let prefix = caps.name("prefix").map_or("", |m| m.as_str());
                    format!("{prefix}[REDACTED]")
                })
                .into_owned();
        }
        text
    }
}

/// Where session records go and how long they are kept.
#[derive(Debug, Clone)]
pub struct SessionLog {
    dir: PathBuf,
    /// Days to keep files; 0 keeps everything.
    retention_days: u64,
}

impl SessionLog {
    pub fn new(dir: impl Into<PathBuf>, retention_days: u64) -> Self {
        Self {
            dir: dir.into(),
            retention_days,
        }
    }

    /// `PRDFLOW_LOG_DIR` and `PRDFLOW_LOG_RETENTION_DAYS`, with defaults.
    pub fn from_env() -> Self {
        let dir = std::env::var(LOG_DIR_ENV).unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());
        let retention_days = std::env::var(RETENTION_ENV)
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(DEFAULT_RETENTION_DAYS);
        Self::new(dir, retention_days)
    }

    fn month_dir(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("{:04}", at.year()))
            .join(format!("{:02}", at.month()))
    }

    /// Append one redacted record, then prune expired files.
    pub fn append(&self, input: &SessionLogInput) -> Result<PathBuf> {
        let now = Utc::now();
        let timestamp = now.to_rfc3339();
        let mut redactor = Redactor::default();
        let idea = redactor.scrub(&input.idea);
        let review_excerpt = redactor.scrub(&input.review_excerpt);
        let note_titles = input
            .note_titles
            .iter()
            .map(|title| redactor.scrub(title))
            .collect();
        let redactions = redactor.fired;

        let record = SessionRecord {
            timestamp: timestamp.clone(),
            session_id: &input.session_id,
            idea,
            approved: input.approved,
            rounds: input.rounds,
            review_excerpt,
            note_titles,
            trace_path: input.trace_path.as_deref(),
            redactions: &redactions,
        };

        let month_dir = self.month_dir(now);
        let session_path = month_dir.join("session.jsonl");
        append_line(&session_path, &record)?;

        if !redactions.is_empty() {
            append_line(
                &month_dir.join("audit.jsonl"),
                &AuditRecord {
                    timestamp: &timestamp,
                    session_id: &input.session_id,
                    redactions: &redactions,
                },
            )?;
            warn!(
                session_id = %input.session_id,
                fields = ?redactions,
                "redacted potential secrets from session log"
            );
        }

        self.prune()?;
        Ok(session_path)
    }

    /// Delete log files older than the retention window and any directories
    /// left empty.
    pub fn prune(&self) -> Result<()> {
        if self.retention_days == 0 || !self.dir.exists() {
            return Ok(());
        }
        let window = Duration::from_secs(self.retention_days.saturating_mul(86_400));
        let cutoff = SystemTime::now()
            .checked_sub(window)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        prune_older_than(&self.dir, cutoff)
    }
}

fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.as_bytes()))
        .with_context(|| format!("failed to append to {}", path.display()))
}

fn prune_older_than(dir: &Path, cutoff: SystemTime) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            prune_older_than(&path, cutoff)?;
            if fs::read_dir(&path)?.next().is_none() {
                fs::remove_dir(&path).ok();
            }
            continue;
        }
        let expired = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .is_ok_and(|modified| modified < cutoff);
        if expired {
            debug!(path = %path.display(), "pruning expired session log");
            fs::remove_file(&path).ok();
        }
    }
    Ok(())
}

/// Append a finished session to the log configured by the environment.
pub fn log_session_completion(input: SessionLogInput) -> Result<()> {
    SessionLog::from_env().append(&input).map(|_| ())
}
