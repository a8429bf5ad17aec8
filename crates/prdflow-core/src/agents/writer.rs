//! Writer agent: drafts and revises the markdown document.

use serde_json::json;
use tracing::{info, instrument};

use super::{AgentContext, AgentRole, ResearchNote, call_model, format_notes, prompts};
use crate::PrdflowError;
use crate::llm::{CompletionRequest, DynLanguageModel};

/// Previous round's draft plus the Reviewer's feedback on it.
#[derive(Debug, Clone, Copy)]
pub struct Revision<'a> {
    pub draft: &'a str,
    pub feedback: &'a str,
}

/// Writer agent. Holds a model handle only; it has no search capability.
pub struct WriteAgent {
    model: DynLanguageModel,
}

impl WriteAgent {
    pub fn new(model: DynLanguageModel) -> Self {
        Self { model }
    }

    #[instrument(
        name = "agent.write",
        skip(self, context, idea, notes, revision),
        fields(session = %context.session_id, revising = revision.is_some())
    )]
    pub async fn write(
        &self,
        context: &AgentContext,
        idea: &str,
        notes: &[ResearchNote],
        revision: Option<Revision<'_>>,
    ) -> Result<String, PrdflowError> {
        let notes = format_notes(notes);
        let (operation, prompt) = match revision {
            Some(revision) => (
                "write.revise",
                prompts::revise_draft(idea, &notes, revision.draft, revision.feedback),
            ),
            None => ("write.draft", prompts::write_draft(idea, &notes)),
        };

        let raw = call_model(
            &self.model,
            CompletionRequest::new(AgentRole::Writer, operation, prompt)
                .with_system(prompts::WRITER_SYSTEM),
        )
        .await?;
        let report = strip_markdown_fence(&raw);

        context.events.tool_call(
            AgentRole::Writer,
            "write_report",
            json!({ "chars": report.len() }),
        );
        context
            .events
            .tool_result(AgentRole::Writer, "write_report", "Report written.");
        info!(chars = report.len(), "writer produced draft");

        Ok(report)
    }
}

/// Remove a single fence wrapping the whole answer (```` ```markdown ... ``` ````).
pub(crate) fn strip_markdown_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some((info, body)) = rest.split_once('\n') else {
        return trimmed.to_string();
    };
    let info = info.trim();
    if !(info.is_empty() || info.eq_ignore_ascii_case("markdown") || info.eq_ignore_ascii_case("md"))
    {
        return trimmed.to_string();
    }
    let Some(inner) = body.trim_end().strip_suffix("```") else {
        return trimmed.to_string();
    };
    // The closing fence must sit on its own line and nothing in between may
    // open or close another block.
    let closes_on_own_line = inner.is_empty() || inner.ends_with('\n');
    if !closes_on_own_line || inner.lines().any(|line| line.trim_start().starts_with("```")) {
        return trimmed.to_string();
    }
    inner.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_is_stripped() {
        assert_eq!(
            strip_markdown_fence("```markdown\n# PRD\n\nBody\n```\n"),
            "# PRD\n\nBody"
        );
        assert_eq!(strip_markdown_fence("```\n# PRD\n```"), "# PRD");
    }

    #[test]
    fn unfenced_and_code_fenced_text_is_left_alone() {
        assert_eq!(strip_markdown_fence("  # PRD\n"), "# PRD");
        assert_eq!(
            strip_markdown_fence("```rust\nfn main() {}\n```"),
            "```rust\nfn main() {}\n```"
        );
        assert_eq!(strip_markdown_fence("```markdown\n# PRD"), "```markdown\n# PRD");
    }

    #[test]
    fn separate_leading_and_trailing_blocks_are_kept_intact() {
        let draft = "```\ncode\n```\n\ntext\n```\ncode2\n```";
        assert_eq!(strip_markdown_fence(draft), draft);

        let inline_close = "```markdown\n# PRD ```";
        assert_eq!(strip_markdown_fence(inline_close), inline_close);
    }
}
