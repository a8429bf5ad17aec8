//! Researcher agent: plans search queries, runs them, records notes.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use tracing::{debug, info, instrument};

use super::{AgentContext, AgentRole, ResearchNote, call_model, prompts};
use crate::PrdflowError;
use crate::llm::{CompletionRequest, DynLanguageModel};
use crate::search::DynWebSearch;

pub const SUMMARY_TITLE: &str = "Summary";

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s*").expect("invalid list marker regex"));

/// Researcher agent that performs information retrieval
pub struct ResearchAgent {
    model: DynLanguageModel,
    search: DynWebSearch,
    max_queries: usize,
}

impl ResearchAgent {
    pub fn new(model: DynLanguageModel, search: DynWebSearch, max_queries: usize) -> Self {
        Self {
            model,
            search,
            max_queries: max_queries.max(1),
        }
    }

    #[instrument(name = "agent.research", skip(self, context, idea), fields(session = %context.session_id))]
    pub async fn research(
        &self,
        context: &AgentContext,
        idea: &str,
    ) -> Result<Vec<ResearchNote>, PrdflowError> {
        let role = AgentRole::Researcher;

        let plan = call_model(
            &self.model,
            CompletionRequest::new(
                role,
                "research.plan",
                prompts::plan_queries(idea, self.max_queries),
            )
            .with_system(prompts::RESEARCHER_SYSTEM),
        )
        .await?;

        let queries = parse_queries(&plan, self.max_queries, idea);
        info!(count = queries.len(), "researcher planned queries");

        let mut notes = Vec::with_capacity(queries.len() + 1);
        for query in queries {
            context
                .events
                .tool_call(role, "search_web", json!({ "query": query }));
            let result = self.search.search(&query).await?;
            context.events.tool_result(role, "search_web", result.clone());

            record_note(context, &mut notes, ResearchNote::new(query, result));
        }

        let findings = super::format_notes(&notes);
        let summary = call_model(
            &self.model,
            CompletionRequest::new(
                role,
                "research.notes",
                prompts::condense_notes(idea, &findings),
            )
            .with_system(prompts::RESEARCHER_SYSTEM),
        )
        .await?;
        context.events.agent_output(role, summary.clone());
        record_note(context, &mut notes, ResearchNote::new(SUMMARY_TITLE, summary));

        debug!(notes = notes.len(), "research complete");
        Ok(notes)
    }
}

fn record_note(context: &AgentContext, notes: &mut Vec<ResearchNote>, note: ResearchNote) {
    context.events.tool_call(
        AgentRole::Researcher,
        "record_notes",
        json!({ "notes_title": note.title }),
    );
    notes.push(note);
    context
        .events
        .tool_result(AgentRole::Researcher, "record_notes", "Notes recorded.");
}

/// Extract search queries from the planning answer: one per line, list
/// markers stripped, duplicates dropped, capped at `max`. Falls back to the
/// idea itself when nothing usable remains.
pub(crate) fn parse_queries(plan: &str, max: usize, idea: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut queries = Vec::new();

    for line in plan.lines() {
        let unlisted = LIST_MARKER.replace(line, "");
        let cleaned = unlisted.trim().trim_matches('"').trim();

        if cleaned.is_empty() || cleaned.starts_with("```") {
            continue;
        }
        if seen.insert(cleaned.to_lowercase()) {
            queries.push(cleaned.to_string());
        }
        if queries.len() == max {
            break;
        }
    }

    if queries.is_empty() {
        queries.push(idea.trim().to_string());
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queries_are_cleaned_and_deduplicated() {
        let plan = "1. translation app UX best practices\n- \"offline translation models\"\n\n* Translation app UX best practices\n2) voice to text latency";

        let queries = parse_queries(plan, 5, "idea");

        assert_eq!(
            queries,
            vec![
                "translation app UX best practices",
                "offline translation models",
                "voice to text latency",
            ]
        );
    }

    #[test]
    fn leading_years_are_not_list_markers() {
        let queries = parse_queries("2024 translation app market\n3. 2025 outlook", 5, "idea");
        assert_eq!(queries, vec!["2024 translation app market", "2025 outlook"]);
    }

    #[test]
    fn queries_are_capped() {
        let queries = parse_queries("a\nb\nc\nd", 2, "idea");
        assert_eq!(queries, vec!["a", "b"]);
    }

    #[test]
    fn empty_plan_falls_back_to_idea() {
        let queries = parse_queries("```\n\n```", 3, "  Build a translator app ");
        assert_eq!(queries, vec!["Build a translator app"]);
    }
}
