use std::fmt::Write as _;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub task_id: String,
    pub message: String,
    pub timestamp_ms: u128,
}

impl TraceEvent {
    pub fn new(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self {
            task_id: task_id.into(),
            message: message.into(),
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceCollector {
    events: Vec<TraceEvent>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn from_events(events: Vec<TraceEvent>) -> Self {
        Self { events }
    }

    pub fn record(&mut self, task_id: impl Into<String>, message: impl Into<String>) {
        self.events.push(TraceEvent::new(task_id, message));
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary::from_events(&self.events)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub index: usize,
    pub task_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSummary {
    pub steps: Vec<TraceStep>,
}

impl TraceSummary {
    pub fn from_events(events: &[TraceEvent]) -> Self {
        let steps = events
            .iter()
            .enumerate()
            .map(|(idx, event)| TraceStep {
                index: idx + 1,
                task_id: event.task_id.clone(),
                message: event.message.clone(),
            })
            .collect();
        Self { steps }
    }

    /// Number of steps recorded for one task id.
    pub fn count_for(&self, task_id: &str) -> usize {
        self.steps
            .iter()
            .filter(|step| step.task_id == task_id)
            .count()
    }

    pub fn render_markdown(&self) -> String {
        if self.steps.is_empty() {
            return "No trace events recorded.".to_string();
        }
        let mut output = String::from("### Trace Summary\n");
        for step in &self.steps {
            let _ = writeln!(output, "{}. {} -> {}", step.index, step.task_id, step.message);
        }
        output
    }

    pub fn render_mermaid(&self) -> String {
        if self.steps.is_empty() {
            return "flowchart TD\n  %% no trace events captured".to_string();
        }

        let mut output = String::from("flowchart TD\n  %% auto-generated trace\n");
        for step in &self.steps {
            let node_id = format!("step{}", step.index);
            let label = sanitize_mermaid(&format!("{}: {}", step.task_id, step.message));
            let _ = writeln!(output, "  {node_id}[\"{label}\"]");
        }

        for idx in 0..self.steps.len().saturating_sub(1) {
            let from = format!("step{}", idx + 1);
            let to = format!("step{}", idx + 2);
            let _ = writeln!(output, "  {from} --> {to}");
        }

        output
    }
}

fn sanitize_mermaid(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('[', "(")
        .replace(']', ")")
        .replace('\n', "<br/>")
}

pub fn persist_trace<P: AsRef<Path>>(
    dir: P,
    session_id: &str,
    events: &[TraceEvent],
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    create_dir_all(dir)
        .with_context(|| format!("failed to create trace directory {}", dir.display()))?;
    let path = dir.join(format!("{session_id}.json"));
    let payload = serde_json::to_vec_pretty(events)?;
    let mut file = File::create(&path)
        .with_context(|| format!("failed to create trace file {}", path.display()))?;
    file.write_all(&payload)
        .with_context(|| format!("failed to write trace file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn markdown_renders_steps() {
        let mut collector = TraceCollector::new();
        collector.record("researcher", "recorded 3 notes");
        collector.record("writer", "round 1 draft (120 chars)");

        let markdown = collector.summary().render_markdown();

        insta::assert_snapshot!(markdown, @r"
        ### Trace Summary
        1. researcher -> recorded 3 notes
        2. writer -> round 1 draft (120 chars)
        ");
    }

    #[test]
    fn mermaid_escapes_labels_and_links_steps() {
        let events = vec![
            TraceEvent::new("reviewer", "verdict [needs revision]"),
            TraceEvent::new("writer", "round 2 \"draft\""),
        ];
        let mermaid = TraceSummary::from_events(&events).render_mermaid();

        assert!(mermaid.starts_with("flowchart TD"));
        assert!(mermaid.contains("step1[\"reviewer: verdict (needs revision)\"]"));
        assert!(mermaid.contains("round 2 \\\"draft\\\""));
        assert!(mermaid.contains("step1 --> step2"));
    }

    #[test]
    fn empty_summary_renders_placeholders() {
        let summary = TraceSummary::default();
        assert_eq!(summary.render_markdown(), "No trace events recorded.");
        assert!(summary.render_mermaid().contains("no trace events"));
    }

    #[test]
    fn persist_trace_writes_session_file() {
        let dir = tempdir().unwrap();
        let events = vec![TraceEvent::new("finalize", "approved after 1 round")];

        let path = persist_trace(dir.path().join("traces"), "session-1", &events).unwrap();

        assert_eq!(path.file_name().unwrap(), "session-1.json");
        let stored: Vec<TraceEvent> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored, events);
    }
}
