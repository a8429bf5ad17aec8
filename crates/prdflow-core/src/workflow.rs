use crate::agents::{ResearchAgent, ResearchNote, ReviewAgent, WriteAgent};
use crate::config::Config;
use crate::events::EventCollector;
use crate::llm::{DynLanguageModel, GeminiClient, RetryPolicy, RetryingModel};
use crate::logging::{SessionLogInput, log_session_completion};
use crate::metrics::record_review_rounds;
use crate::search::{DynWebSearch, GroundedSearch};
use crate::tasks::{
    FinalizeTask, INITIAL_REPORT, INITIAL_REVIEW, ResearchTask, ReviewTask, WriteTask, keys,
};
use crate::trace::{TraceEvent, TraceSummary, persist_trace};
use anyhow::{Context as _, Result, anyhow};
use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
    Task,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The three agents a session needs.
#[derive(Clone)]
pub struct Agents {
    pub research: Arc<ResearchAgent>,
    pub write: Arc<WriteAgent>,
    pub review: Arc<ReviewAgent>,
}

impl Agents {
    /// Wire all roles to one model; only the Researcher gets `search`.
    pub fn new(model: DynLanguageModel, search: DynWebSearch, max_search_queries: usize) -> Self {
        Self {
            research: Arc::new(ResearchAgent::new(
                model.clone(),
                search,
                max_search_queries,
            )),
            write: Arc::new(WriteAgent::new(model.clone())),
            review: Arc::new(ReviewAgent::new(model)),
        }
    }

    /// Gemini-backed agents with retries and grounded search.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.llm_api_key()?;
        let client = GeminiClient::new(&config.llm, api_key)?;
        let model: DynLanguageModel = Arc::new(RetryingModel::new(
            client,
            RetryPolicy::from(&config.llm),
        ));
        let search: DynWebSearch = Arc::new(GroundedSearch::new(model.clone()));

        Ok(Self::new(model, search, config.workflow.max_search_queries))
    }
}

/// Exposes the tasks of the document graph.
#[derive(Clone)]
pub struct WorkflowTasks {
    pub research: Arc<ResearchTask>,
    pub write: Arc<WriteTask>,
    pub review: Arc<ReviewTask>,
    pub finalize: Arc<FinalizeTask>,
}

impl WorkflowTasks {
    fn new(agents: &Agents, events: &EventCollector, max_rounds: u32) -> Self {
        Self {
            research: Arc::new(ResearchTask::new(agents.research.clone(), events.clone())),
            write: Arc::new(WriteTask::new(agents.write.clone(), events.clone())),
            review: Arc::new(ReviewTask::new(
                agents.review.clone(),
                events.clone(),
                max_rounds,
            )),
            finalize: Arc::new(FinalizeTask),
        }
    }
}

fn build_graph(tasks: &WorkflowTasks) -> Arc<graph_flow::Graph> {
    let builder = GraphBuilder::new("prdflow_workflow")
        .add_task(tasks.research.clone())
        .add_task(tasks.write.clone())
        .add_task(tasks.review.clone())
        .add_task(tasks.finalize.clone())
        .add_edge(tasks.research.id(), tasks.write.id())
        .add_edge(tasks.write.id(), tasks.review.id())
        .add_conditional_edge(
            tasks.review.id(),
            |ctx| ctx.get_sync::<bool>(keys::REVISE).unwrap_or(false),
            tasks.write.id(),
            tasks.finalize.id(),
        )
        .set_start_task(tasks.research.id());

    Arc::new(builder.build())
}

fn new_session_id() -> String {
    format!("session-{}", Uuid::new_v4())
}

pub const DEFAULT_MAX_ROUNDS: u32 = 5;

/// Options for running a document session.
pub struct SessionOptions<'a> {
    pub idea: &'a str,
    pub session_id: Option<String>,
    pub max_rounds: u32,
    pub trace_dir: Option<PathBuf>,
    pub events: EventCollector,
    pub session_log: bool,
}

impl<'a> SessionOptions<'a> {
    pub fn new(idea: &'a str) -> Self {
        Self {
            idea,
            session_id: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            trace_dir: None,
            events: EventCollector::disabled(),
            session_log: false,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_trace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trace_dir = Some(dir.into());
        self
    }

    pub fn with_events(mut self, events: EventCollector) -> Self {
        self.events = events;
        self
    }

    /// Append a redacted completion record to the session log.
    pub fn with_session_log(mut self, enabled: bool) -> Self {
        self.session_log = enabled;
        self
    }
}

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub idea: String,
    /// The Writer's last draft.
    pub report: String,
    /// The Reviewer's last answer.
    pub review: String,
    pub approved: bool,
    pub rounds: u32,
    pub notes: Vec<ResearchNote>,
    pub trace_events: Vec<TraceEvent>,
    pub trace_summary: TraceSummary,
    pub trace_path: Option<PathBuf>,
}

/// Run research, then write/review rounds until approval or `max_rounds`.
pub async fn run_document_session(
    options: SessionOptions<'_>,
    agents: &Agents,
) -> Result<SessionOutcome> {
    let tasks = WorkflowTasks::new(agents, &options.events, options.max_rounds);
    let graph = build_graph(&tasks);

    let storage = Arc::new(InMemorySessionStorage::new());
    let runner = FlowRunner::new(graph, storage.clone());

    let session_id = options.session_id.clone().unwrap_or_else(new_session_id);
    let session = Session::new_from_task(session_id.clone(), tasks.research.id());

    session.context.set(keys::SESSION_ID, session_id.clone()).await;
    session.context.set(keys::IDEA, options.idea.to_string()).await;
    session
        .context
        .set(keys::NOTES, Vec::<ResearchNote>::new())
        .await;
    session.context.set(keys::REPORT, INITIAL_REPORT).await;
    session.context.set(keys::REVIEW, INITIAL_REVIEW).await;
    session.context.set(keys::ROUNDS, 0u32).await;

    storage
        .save(session)
        .await
        .map_err(|err| anyhow!("failed to persist session: {err}"))?;

    info!(session = %session_id, max_rounds = options.max_rounds, "starting document session");

    // research + finalize + one write and one review per round
    let max_steps = 2 + 2 * options.max_rounds as usize;
    let mut steps = 0usize;
    loop {
        let result = runner
            .run(&session_id)
            .await
            .map_err(|err| anyhow!("graph execution failure: {err}"))?;

        match result.status {
            ExecutionStatus::Completed => break,
            ExecutionStatus::WaitingForInput => {
                steps += 1;
                if steps > max_steps {
                    return Err(anyhow!(
                        "session {session_id} did not complete within {max_steps} steps"
                    ));
                }
                continue;
            }
            ExecutionStatus::Error(message) => return Err(anyhow!(message)),
        }
    }

    let session = storage
        .get(&session_id)
        .await
        .map_err(|err| anyhow!("failed to reload session: {err}"))?
        .ok_or_else(|| anyhow!("session missing after execution"))?;

    let context = &session.context;
    let report: String = context
        .get(keys::FINAL_REPORT)
        .await
        .ok_or_else(|| anyhow!("session finished without a final report"))?;
    let review: String = context
        .get(keys::FINAL_REVIEW)
        .await
        .unwrap_or_else(|| INITIAL_REVIEW.to_string());
    let approved: bool = context.get(keys::FINAL_APPROVED).await.unwrap_or(false);
    let rounds: u32 = context.get(keys::ROUNDS).await.unwrap_or(0);
    let notes: Vec<ResearchNote> = context.get(keys::NOTES).await.unwrap_or_default();
    let trace_events: Vec<TraceEvent> = context.get(keys::TRACE).await.unwrap_or_default();
    let trace_summary = TraceSummary::from_events(&trace_events);

    let trace_path = match &options.trace_dir {
        Some(dir) => Some(
            persist_trace(dir, &session_id, &trace_events)
                .context("failed to persist session trace")?,
        ),
        None => None,
    };

    record_review_rounds(rounds, approved);
    if approved {
        info!(session = %session_id, rounds, "document approved");
    } else {
        warn!(session = %session_id, rounds, "document finished without approval");
    }

    let outcome = SessionOutcome {
        session_id,
        idea: options.idea.to_string(),
        report,
        review,
        approved,
        rounds,
        notes,
        trace_events,
        trace_summary,
        trace_path,
    };

    if options.session_log {
        let input = SessionLogInput::from_outcome(&outcome);
        if let Err(err) = log_session_completion(input) {
            warn!(error = %err, "failed to append session log");
        }
    }

    Ok(outcome)
}
