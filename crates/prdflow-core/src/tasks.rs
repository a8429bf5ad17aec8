use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use tracing::{debug, info, instrument, warn};

use crate::agents::{
    AgentContext, AgentRole, DEFAULT_IDEA, ResearchAgent, ResearchNote, ReviewAgent, Revision,
    WriteAgent,
};
use crate::events::{EventCollector, WorkflowEvent};
use crate::trace::{TraceCollector, TraceEvent};

/// Context keys shared by the tasks and the session runner.
pub(crate) mod keys {
    pub const SESSION_ID: &str = "session.id";
    pub const IDEA: &str = "idea";
    pub const NOTES: &str = "research.notes";
    pub const REPORT: &str = "report.content";
    pub const REVIEW: &str = "review.text";
    pub const APPROVED: &str = "review.approved";
    pub const REVISE: &str = "review.revise";
    pub const ROUNDS: &str = "write.rounds";
    pub const TRACE: &str = "trace.events";
    pub const FINAL_REPORT: &str = "final.report";
    pub const FINAL_REVIEW: &str = "final.review";
    pub const FINAL_APPROVED: &str = "final.approved";
}

pub(crate) const INITIAL_REPORT: &str = "Not written yet.";
pub(crate) const INITIAL_REVIEW: &str = "Review required.";

fn task_failure(err: impl std::fmt::Display) -> GraphError {
    GraphError::TaskExecutionFailed(err.to_string())
}

async fn agent_context(context: &Context, events: &EventCollector) -> AgentContext {
    let session_id: String = context.get(keys::SESSION_ID).await.unwrap_or_default();
    AgentContext::new(session_id, events.clone())
}

async fn idea(context: &Context) -> String {
    context
        .get(keys::IDEA)
        .await
        .unwrap_or_else(|| DEFAULT_IDEA.to_string())
}

async fn append_trace(context: &Context, task_id: &str, message: String) {
    let events: Vec<TraceEvent> = context.get(keys::TRACE).await.unwrap_or_default();
    let mut collector = TraceCollector::from_events(events);
    collector.record(task_id, message);
    context.set(keys::TRACE, collector.events()).await;
}

pub struct ResearchTask {
    agent: Arc<ResearchAgent>,
    events: EventCollector,
}

impl ResearchTask {
    pub fn new(agent: Arc<ResearchAgent>, events: EventCollector) -> Self {
        Self { agent, events }
    }
}

#[async_trait]
impl Task for ResearchTask {
    fn id(&self) -> &str {
        "researcher"
    }

    #[instrument(name = "task.research", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let idea = idea(&context).await;
        let agent_ctx = agent_context(&context, &self.events).await;

        self.events.agent_started(AgentRole::Researcher);
        let notes = self
            .agent
            .research(&agent_ctx, &idea)
            .await
            .map_err(task_failure)?;

        context.set(keys::NOTES, &notes).await;
        append_trace(
            &context,
            self.id(),
            format!("recorded {} notes", notes.len()),
        )
        .await;

        info!(notes = notes.len(), "research task populated context");

        Ok(TaskResult::new(
            Some(format!("Research recorded {} notes", notes.len())),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct WriteTask {
    agent: Arc<WriteAgent>,
    events: EventCollector,
}

impl WriteTask {
    pub fn new(agent: Arc<WriteAgent>, events: EventCollector) -> Self {
        Self { agent, events }
    }
}

#[async_trait]
impl Task for WriteTask {
    fn id(&self) -> &str {
        "writer"
    }

    #[instrument(name = "task.write", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let idea = idea(&context).await;
        let agent_ctx = agent_context(&context, &self.events).await;
        let notes: Vec<ResearchNote> = context.get(keys::NOTES).await.unwrap_or_default();
        let rounds: u32 = context.get(keys::ROUNDS).await.unwrap_or(0);

        let previous_draft: String = context
            .get(keys::REPORT)
            .await
            .unwrap_or_else(|| INITIAL_REPORT.to_string());
        let feedback: String = context
            .get(keys::REVIEW)
            .await
            .unwrap_or_else(|| INITIAL_REVIEW.to_string());

        // Round 0 has no prior draft to revise.
        let revision = (rounds > 0).then(|| Revision {
            draft: &previous_draft,
            feedback: &feedback,
        });

        self.events.agent_started(AgentRole::Writer);
        let report = self
            .agent
            .write(&agent_ctx, &idea, &notes, revision)
            .await
            .map_err(task_failure)?;

        let round = rounds + 1;
        context.set(keys::REPORT, report.clone()).await;
        context.set(keys::ROUNDS, round).await;
        self.events.agent_output(AgentRole::Writer, report.clone());
        append_trace(
            &context,
            self.id(),
            format!("round {round} draft ({} chars)", report.len()),
        )
        .await;

        debug!(round, chars = report.len(), "write task stored draft");

        Ok(TaskResult::new(
            Some(format!("Draft {round} written")),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct ReviewTask {
    agent: Arc<ReviewAgent>,
    events: EventCollector,
    max_rounds: u32,
}

impl ReviewTask {
    pub fn new(agent: Arc<ReviewAgent>, events: EventCollector, max_rounds: u32) -> Self {
        Self {
            agent,
            events,
            max_rounds: max_rounds.max(1),
        }
    }
}

#[async_trait]
impl Task for ReviewTask {
    fn id(&self) -> &str {
        "reviewer"
    }

    #[instrument(name = "task.review", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let idea = idea(&context).await;
        let agent_ctx = agent_context(&context, &self.events).await;
        let draft: String = context
            .get(keys::REPORT)
            .await
            .unwrap_or_else(|| INITIAL_REPORT.to_string());
        let rounds: u32 = context.get(keys::ROUNDS).await.unwrap_or(0);

        self.events.agent_started(AgentRole::Reviewer);
        let outcome = self
            .agent
            .review(&agent_ctx, &idea, &draft)
            .await
            .map_err(task_failure)?;

        let approved = outcome.verdict.is_approved();
        let revise = !approved && rounds < self.max_rounds;

        context.set(keys::REVIEW, outcome.review.clone()).await;
        context.set(keys::APPROVED, approved).await;
        context.set_sync(keys::REVISE, revise);

        self.events.agent_output(AgentRole::Reviewer, outcome.review.clone());
        self.events.emit(WorkflowEvent::Verdict {
            approved,
            round: rounds,
        });
        append_trace(
            &context,
            self.id(),
            format!("round {rounds} verdict: {}", outcome.verdict.as_str()),
        )
        .await;

        if !approved && !revise {
            warn!(
                rounds,
                max_rounds = self.max_rounds,
                "revision limit reached without approval"
            );
        }
        info!(approved, revise, rounds, "reviewer evaluated draft");

        Ok(TaskResult::new(
            Some(format!("Review {}: {}", rounds, outcome.verdict.as_str())),
            NextAction::ContinueAndExecute,
        ))
    }
}

#[derive(Default)]
pub struct FinalizeTask;

#[async_trait]
impl Task for FinalizeTask {
    fn id(&self) -> &str {
        "finalize"
    }

    #[instrument(name = "task.finalize", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let report: String = context
            .get(keys::REPORT)
            .await
            .unwrap_or_else(|| INITIAL_REPORT.to_string());
        let review: String = context
            .get(keys::REVIEW)
            .await
            .unwrap_or_else(|| INITIAL_REVIEW.to_string());
        let approved: bool = context.get(keys::APPROVED).await.unwrap_or(false);
        let rounds: u32 = context.get(keys::ROUNDS).await.unwrap_or(0);

        context.set(keys::FINAL_REPORT, report).await;
        context.set(keys::FINAL_REVIEW, review).await;
        context.set(keys::FINAL_APPROVED, approved).await;

        let message = if approved {
            format!("approved after {rounds} round(s)")
        } else {
            format!("unapproved after {rounds} round(s)")
        };
        append_trace(&context, self.id(), message.clone()).await;

        info!(approved, rounds, "finalize task completed");

        Ok(TaskResult::new(Some(message), NextAction::End))
    }
}
