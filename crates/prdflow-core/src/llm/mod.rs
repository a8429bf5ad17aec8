//! Hosted language model access.
//!
//! Agents talk to the model through [`LanguageModel`]; the production
//! implementation is [`GeminiClient`], wrapped in [`RetryingModel`] for
//! transient failures.

mod gemini;
mod retry;

pub use gemini::GeminiClient;
pub use retry::{RetryPolicy, RetryingModel};

use std::sync::Arc;

use async_trait::async_trait;

use crate::PrdflowError;
use crate::agents::AgentRole;

/// A single prompt sent to the hosted model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub role: AgentRole,
    /// Short label for logs and metrics, e.g. `research.plan`.
    pub operation: &'static str,
    pub system: Option<String>,
    pub prompt: String,
    /// Enable the backend's built-in web search tool for this call.
    pub grounded: bool,
}

impl CompletionRequest {
    pub fn new(role: AgentRole, operation: &'static str, prompt: impl Into<String>) -> Self {
        Self {
            role,
            operation,
            system: None,
            prompt: prompt.into(),
            grounded: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn grounded(mut self) -> Self {
        self.grounded = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// URIs the backend cited when grounding was enabled.
    pub grounding_sources: Vec<String>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grounding_sources: Vec::new(),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, PrdflowError>;
}

pub type DynLanguageModel = Arc<dyn LanguageModel>;
