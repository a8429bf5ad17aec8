//! Prompt templates for the three roles.

/// Product idea used when the caller does not supply one.
pub const DEFAULT_IDEA: &str = "Write a Product Requirement Document (PRD) for a mobile application for a real-time translation service.
The PRD should cover key features like voice-to-text, text-to-speech, and offline mode.
Start by researching best practices for a user-friendly interface in a translation app.";

pub(crate) const RESEARCHER_SYSTEM: &str = "Your ONLY job is to research topics and record detailed notes. \
You MUST NOT write the final report. You are forbidden from generating final content. \
Base your notes on the search results you are given and keep every concrete fact, figure and source.";

pub(crate) const WRITER_SYSTEM: &str = "You are the WriteAgent. Your job is to write a report in markdown format \
based *only* on the provided research notes. You have no search tool and must not claim to have searched. \
Return only the markdown document.";

pub(crate) const REVIEWER_SYSTEM: &str = "You are the ReviewAgent. Review the report against the original request and provide feedback. \
Start your answer with a single line that is exactly `APPROVED` or `NEEDS REVISION`, \
then explain your decision. When requesting changes, list them as concrete, actionable bullet points.";

pub(crate) fn plan_queries(idea: &str, max_queries: usize) -> String {
    format!(
        "Plan the web research for the request below. Reply with at most {max_queries} web search queries, \
one per line, with no numbering and no commentary.\n\n<request>\n{idea}\n</request>"
    )
}

pub(crate) fn condense_notes(idea: &str, findings: &str) -> String {
    format!(
        "Condense the search results below into research notes for a writer who cannot search. \
Organise them as markdown bullet points grouped by theme.\n\n<request>\n{idea}\n</request>\n\n<search_results>\n{findings}\n</search_results>"
    )
}

pub(crate) fn write_draft(idea: &str, notes: &str) -> String {
    format!(
        "Write the document requested below using only the research notes.\n\n<request>\n{idea}\n</request>\n\n<research_notes>\n{notes}\n</research_notes>"
    )
}

pub(crate) fn revise_draft(idea: &str, notes: &str, draft: &str, feedback: &str) -> String {
    format!(
        "Revise the document below so that it addresses every point of the reviewer feedback. \
Use only the research notes. Return the complete revised document.\n\n<request>\n{idea}\n</request>\n\n\
<research_notes>\n{notes}\n</research_notes>\n\n<previous_draft>\n{draft}\n</previous_draft>\n\n<review_feedback>\n{feedback}\n</review_feedback>"
    )
}

pub(crate) fn review_draft(idea: &str, draft: &str) -> String {
    format!(
        "Review the document below against the request.\n\n<request>\n{idea}\n</request>\n\n<document>\n{draft}\n</document>"
    )
}
