//! Agent roles and their execution context.
//!
//! Each role wraps a prompt template around the hosted model. Only the
//! Researcher is constructed with a [`WebSearch`](crate::search::WebSearch)
//! handle; the Writer and Reviewer have no way to reach the search tool.

mod prompts;
mod researcher;
mod reviewer;
mod writer;

pub use prompts::DEFAULT_IDEA;
pub use researcher::ResearchAgent;
pub use reviewer::{ReviewAgent, ReviewOutcome};
pub use writer::{Revision, WriteAgent};

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::PrdflowError;
use crate::events::EventCollector;
use crate::llm::{CompletionRequest, DynLanguageModel};
use crate::metrics::record_agent_call;

/// Agent role assignment for a pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    /// Searches the web and records notes
    Researcher,
    /// Turns notes into a markdown document
    Writer,
    /// Approves the document or asks for changes
    Reviewer,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Researcher => "ResearchAgent",
            AgentRole::Writer => "WriteAgent",
            AgentRole::Reviewer => "ReviewAgent",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context for agent execution
#[derive(Clone)]
pub struct AgentContext {
    pub session_id: String,
    pub events: EventCollector,
}

impl AgentContext {
    pub fn new(session_id: impl Into<String>, events: EventCollector) -> Self {
        Self {
            session_id: session_id.into(),
            events,
        }
    }
}

/// A titled block of research produced by the Researcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchNote {
    pub title: String,
    pub body: String,
}

impl ResearchNote {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Render notes the way the Writer receives them.
pub fn format_notes(notes: &[ResearchNote]) -> String {
    if notes.is_empty() {
        return "(no research notes recorded)".to_string();
    }
    notes
        .iter()
        .map(|note| format!("## {}\n{}", note.title, note.body.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Issue one model call on behalf of an agent, recording latency metrics.
async fn call_model(
    model: &DynLanguageModel,
    request: CompletionRequest,
) -> Result<String, PrdflowError> {
    let role = request.role;
    let started = Instant::now();
    let result = model.complete(request).await;
    let elapsed = started.elapsed().as_millis() as u64;

    match result {
        Ok(completion) => {
            record_agent_call(role, "success", elapsed);
            Ok(completion.text)
        }
        Err(err) => {
            record_agent_call(role, "failure", elapsed);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_use_agent_names() {
        assert_eq!(AgentRole::Researcher.to_string(), "ResearchAgent");
        assert_eq!(AgentRole::Writer.as_str(), "WriteAgent");
        assert_eq!(AgentRole::Reviewer.as_str(), "ReviewAgent");
    }

    #[test]
    fn notes_render_as_sections() {
        let notes = vec![
            ResearchNote::new("UI patterns", "  Large mic button.  "),
            ResearchNote::new("Summary", "Keep it simple."),
        ];

        assert_eq!(
            format_notes(&notes),
            "## UI patterns\nLarge mic button.\n\n## Summary\nKeep it simple."
        );
        assert_eq!(format_notes(&[]), "(no research notes recorded)");
    }
}
