use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::PrdflowError;
use crate::agents::AgentRole;
use crate::llm::{CompletionRequest, DynLanguageModel};

/// Web search capability. Only the Researcher is handed one.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<String, PrdflowError>;
}

pub type DynWebSearch = Arc<dyn WebSearch>;

/// Search backed by a model call with the provider's search tool enabled.
pub struct GroundedSearch {
    model: DynLanguageModel,
}

impl GroundedSearch {
    pub fn new(model: DynLanguageModel) -> Self {
        Self { model }
    }
}

pub(crate) fn search_prompt(query: &str) -> String {
    format!(
        "Please research given this query or topic, and return the result\n<query_or_topic>{query}</query_or_topic>"
    )
}

#[async_trait]
impl WebSearch for GroundedSearch {
    #[instrument(name = "tool.search_web", skip(self))]
    async fn search(&self, query: &str) -> Result<String, PrdflowError> {
        let request =
            CompletionRequest::new(AgentRole::Researcher, "research.search", search_prompt(query))
                .grounded();
        let completion = self.model.complete(request).await?;

        debug!(
            sources = completion.grounding_sources.len(),
            "search returned"
        );

        let mut result = completion.text;
        if !completion.grounding_sources.is_empty() {
            result.push_str("\n\nSources:\n");
            for source in &completion.grounding_sources {
                let _ = writeln!(result, "- {source}");
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, LanguageModel};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LanguageModel for Recording {
        async fn complete(&self, request: CompletionRequest) -> Result<Completion, PrdflowError> {
            self.requests.lock().unwrap().push(request);
            Ok(Completion {
                text: "Offline mode matters.".to_string(),
                grounding_sources: vec!["https://ux.example/translation".to_string()],
            })
        }
    }

    #[tokio::test]
    async fn grounded_search_wraps_query_and_lists_sources() {
        let model = Arc::new(Recording::default());
        let search = GroundedSearch::new(model.clone());

        let result = search.search("translation app UX").await.unwrap();

        assert!(result.starts_with("Offline mode matters."));
        assert!(result.contains("- https://ux.example/translation"));

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].grounded);
        assert!(
            requests[0]
                .prompt
                .contains("<query_or_topic>translation app UX</query_or_topic>")
        );
    }
}
