//! Classification of the Reviewer's free-text answer.
//!
//! The Reviewer is asked to open with `APPROVED` or `NEEDS REVISION`, but
//! models drift; anything that cannot be read as a clear approval counts as a
//! request for revision.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    NeedsRevision,
}

const REVISION_PHRASES: &str = r"((can['’]?t|cannot|can\s+not|won['’]?t|will\s+not|don['’]?t|do\s+not|doesn['’]?t|does\s+not|wouldn['’]?t|would\s+not|isn['’]?t|is\s+not|not)\s+(yet\s+)?(be\s+)?(yet\s+)?approved?|needs?\s+(a\s+)?revisions?|revisions?\s+(is\s+)?(required|needed)|changes\s+(are\s+)?(requested|required|needed)|request(ing)?\s+changes|rejected|revise)";
const APPROVAL_PHRASES: &str = r"(approved?|lgtm)";

static REVISION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b{REVISION_PHRASES}\b")).expect("invalid revision regex")
});

static APPROVAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b{APPROVAL_PHRASES}\b")).expect("invalid approval regex")
});

static LEADING_REVISION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^{REVISION_PHRASES}\b")).expect("invalid revision regex")
});

static LEADING_APPROVAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^{APPROVAL_PHRASES}\b")).expect("invalid approval regex")
});

static LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(final\s+)?(verdict|decision|status)\s*:\s*").expect("invalid label regex"));

impl Verdict {
    /// Classify review text. A verdict word opening the first line wins;
    /// otherwise the first line and then the whole text are scanned,
    /// revision phrases first.
    pub fn classify(text: &str) -> Self {
        let headline = text
            .lines()
            .map(strip_decoration)
            .find(|line| !line.is_empty())
            .unwrap_or_default();

        if LEADING_REVISION.is_match(&headline) {
            return Verdict::NeedsRevision;
        }
        if LEADING_APPROVAL.is_match(&headline) {
            return Verdict::Approved;
        }
        if let Some(verdict) = Self::match_phrases(&headline) {
            return verdict;
        }

        Self::match_phrases(text).unwrap_or(Verdict::NeedsRevision)
    }

    fn match_phrases(text: &str) -> Option<Self> {
        if REVISION.is_match(text) {
            Some(Verdict::NeedsRevision)
        } else if APPROVAL.is_match(text) {
            Some(Verdict::Approved)
        } else {
            None
        }
    }

    pub fn is_approved(self) -> bool {
        matches!(self, Verdict::Approved)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::NeedsRevision => "needs revision",
        }
    }
}

fn strip_decoration(line: &str) -> String {
    let trimmed = line
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '#' | '>' | '`') || c.is_whitespace());
    LABEL.replace(trimmed, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_headlines() {
        assert_eq!(Verdict::classify("APPROVED\nGreat work."), Verdict::Approved);
        assert_eq!(
            Verdict::classify("NEEDS REVISION\n- add offline mode"),
            Verdict::NeedsRevision
        );
    }

    #[test]
    fn leading_approval_survives_minor_suggestions() {
        assert_eq!(
            Verdict::classify("APPROVED - optionally revise the intro wording."),
            Verdict::Approved
        );
    }

    #[test]
    fn markdown_decoration_and_labels_are_ignored() {
        assert_eq!(Verdict::classify("\n\n**Verdict: Approved**"), Verdict::Approved);
        assert_eq!(
            Verdict::classify("## Decision: needs revision\nMissing metrics."),
            Verdict::NeedsRevision
        );
    }

    #[test]
    fn negations_beat_approval_words() {
        assert_eq!(Verdict::classify("Not approved yet."), Verdict::NeedsRevision);
        assert_eq!(
            Verdict::classify("I cannot approve this; please revise the scope section."),
            Verdict::NeedsRevision
        );
    }

    #[test]
    fn contracted_and_modal_refusals_request_revision() {
        for refusal in [
            "I can't approve this draft yet.",
            "I can’t approve this draft yet.",
            "This cannot be approved as written.",
            "This can not be approved without a metrics section.",
            "Unfortunately I won't approve this; the offline section is missing.",
            "I will not approve a document without success metrics.",
            "I don't approve of the current scope.",
            "I do not approve the pricing section.",
            "It isn't approved until the risks are listed.",
            "This would not be approved by stakeholders.",
        ] {
            assert_eq!(
                Verdict::classify(refusal),
                Verdict::NeedsRevision,
                "{refusal}"
            );
        }
    }

    #[test]
    fn body_is_scanned_when_headline_is_neutral() {
        assert_eq!(
            Verdict::classify("Thanks for the draft.\n\nOverall: approved, ship it."),
            Verdict::Approved
        );
        assert_eq!(
            Verdict::classify("Thanks for the draft.\n\nChanges requested below."),
            Verdict::NeedsRevision
        );
    }

    #[test]
    fn ambiguous_text_requests_revision() {
        assert_eq!(Verdict::classify(""), Verdict::NeedsRevision);
        assert_eq!(
            Verdict::classify("The document looks reasonable overall."),
            Verdict::NeedsRevision
        );
    }
}
