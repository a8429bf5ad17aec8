//! prdflow core: a Researcher, a Writer and a Reviewer chained on top of
//! `graph_flow`.
//!
//! The Researcher gathers notes through a search-grounded model call, the
//! Writer turns them into a markdown document, and the Reviewer either
//! approves it or sends it back to the Writer with feedback, up to a
//! configurable number of rounds.

pub mod agents;
mod config;
mod error;
mod events;
pub mod llm;
mod logging;
mod metrics;
mod search;
mod security;
mod tasks;
mod telemetry;
mod trace;
mod verdict;
mod workflow;

pub use agents::{AgentRole, DEFAULT_IDEA, ResearchNote};
pub use config::{Config, ConfigLoader, LlmConfig, LoggingConfig, WorkflowConfig};
pub use error::PrdflowError;
pub use events::{EventCollector, EventRenderer, WorkflowEvent};
pub use logging::{SessionLog, SessionLogInput, log_session_completion};
pub use metrics::init_metrics_from_env;
pub use search::{DynWebSearch, GroundedSearch, WebSearch};
pub use security::{SecretValue, load_dotenv, require_env};
pub use tasks::{FinalizeTask, ResearchTask, ReviewTask, WriteTask};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use trace::{TraceCollector, TraceEvent, TraceStep, TraceSummary, persist_trace};
pub use verdict::Verdict;
pub use workflow::{
    Agents, DEFAULT_MAX_ROUNDS, SessionOptions, SessionOutcome, WorkflowTasks,
    run_document_session,
};
