//! Reviewer agent: approves the draft or asks for changes.

use serde_json::json;
use tracing::{info, instrument};

use super::{AgentContext, AgentRole, call_model, prompts};
use crate::PrdflowError;
use crate::llm::{CompletionRequest, DynLanguageModel};
use crate::verdict::Verdict;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub verdict: Verdict,
    pub review: String,
}

pub struct ReviewAgent {
    model: DynLanguageModel,
}

impl ReviewAgent {
    pub fn new(model: DynLanguageModel) -> Self {
        Self { model }
    }

    #[instrument(name = "agent.review", skip(self, context, idea, draft), fields(session = %context.session_id))]
    pub async fn review(
        &self,
        context: &AgentContext,
        idea: &str,
        draft: &str,
    ) -> Result<ReviewOutcome, PrdflowError> {
        let review = call_model(
            &self.model,
            CompletionRequest::new(
                AgentRole::Reviewer,
                "review",
                prompts::review_draft(idea, draft),
            )
            .with_system(prompts::REVIEWER_SYSTEM),
        )
        .await?;
        let review = review.trim().to_string();
        let verdict = Verdict::classify(&review);

        context.events.tool_call(
            AgentRole::Reviewer,
            "review_report",
            json!({ "verdict": verdict.as_str() }),
        );
        context
            .events
            .tool_result(AgentRole::Reviewer, "review_report", "Report reviewed.");
        info!(verdict = verdict.as_str(), "reviewer finished");

        Ok(ReviewOutcome { verdict, review })
    }
}
