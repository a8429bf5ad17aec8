//! Progress events emitted while a session runs.
//!
//! Tasks and agents push events through an [`EventCollector`]; the CLI drains
//! the receiving end and renders them with [`EventRenderer`].

use crate::agents::AgentRole;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Orchestrator and agent lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// An agent took over control
    AgentStarted { role: AgentRole },
    /// An agent invoked one of its tools
    ToolCall {
        role: AgentRole,
        tool: String,
        arguments: serde_json::Value,
    },
    /// A tool returned
    ToolResult {
        role: AgentRole,
        tool: String,
        output: String,
    },
    /// Text produced by an agent
    AgentOutput { role: AgentRole, content: String },
    /// Reviewer verdict for a round
    Verdict { approved: bool, round: u32 },
}

impl WorkflowEvent {
    pub fn role(&self) -> AgentRole {
        match self {
            WorkflowEvent::AgentStarted { role }
            | WorkflowEvent::ToolCall { role, .. }
            | WorkflowEvent::ToolResult { role, .. }
            | WorkflowEvent::AgentOutput { role, .. } => *role,
            WorkflowEvent::Verdict { .. } => AgentRole::Reviewer,
        }
    }
}

/// Sending half of the event stream. Cloned into every task.
#[derive(Clone)]
pub struct EventCollector {
    sender: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl EventCollector {
    /// Create a new event collector
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A collector that drops every event.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: WorkflowEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        if let Err(e) = sender.send(event) {
            tracing::warn!(error = %e, "Failed to emit workflow event");
        }
    }

    pub fn agent_started(&self, role: AgentRole) {
        self.emit(WorkflowEvent::AgentStarted { role });
    }

    pub fn tool_call(&self, role: AgentRole, tool: &str, arguments: serde_json::Value) {
        self.emit(WorkflowEvent::ToolCall {
            role,
            tool: tool.to_string(),
            arguments,
        });
    }

    pub fn tool_result(&self, role: AgentRole, tool: &str, output: impl Into<String>) {
        self.emit(WorkflowEvent::ToolResult {
            role,
            tool: tool.to_string(),
            output: output.into(),
        });
    }

    pub fn agent_output(&self, role: AgentRole, content: impl Into<String>) {
        self.emit(WorkflowEvent::AgentOutput {
            role,
            content: content.into(),
        });
    }
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::disabled()
    }
}

const TOOL_OUTPUT_PREVIEW: usize = 300;

/// Turns events into terminal text, printing a banner whenever control moves
/// to a different agent.
#[derive(Debug, Default)]
pub struct EventRenderer {
    current: Option<AgentRole>,
}

impl EventRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &WorkflowEvent) -> String {
        let mut output = String::new();
        let role = event.role();
        if self.current != Some(role) {
            self.current = Some(role);
            let rule = "=".repeat(50);
            output.push_str(&format!("\n{rule}\n🤖 Agent: {role}\n{rule}\n\n"));
        }

        match event {
            WorkflowEvent::AgentStarted { .. } => {}
            WorkflowEvent::ToolCall {
                tool, arguments, ..
            } => {
                output.push_str(&format!(
                    "🔨 Calling Tool: {tool}\n    With arguments: {arguments}\n"
                ));
            }
            WorkflowEvent::ToolResult { tool, output: text, .. } => {
                output.push_str(&format!(
                    "🔧 Tool Result ({tool}):\n    Output: {}...\n",
                    preview(text, TOOL_OUTPUT_PREVIEW)
                ));
            }
            WorkflowEvent::AgentOutput { content, .. } => {
                output.push_str(&format!("📤 Output: {content}\n"));
            }
            WorkflowEvent::Verdict { approved, round } => {
                let label = if *approved {
                    "approved"
                } else {
                    "needs revision"
                };
                output.push_str(&format!("⚖️ Verdict for round {round}: {label}\n"));
            }
        }

        output
    }
}

fn preview(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
