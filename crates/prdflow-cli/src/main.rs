use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use prdflow_core::{
    Agents, ConfigLoader, DEFAULT_IDEA, EventCollector, EventRenderer, SessionOptions,
    TelemetryOptions, TraceSummary, init_metrics_from_env, init_telemetry, load_dotenv,
    run_document_session,
};
use std::io::Write;
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "prdflow",
    version,
    about = "Research, write and review a markdown document with three LLM agents"
)]
struct Cli {
    /// Product idea or document request. Defaults to the translation-app PRD brief.
    #[arg(long, conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the request from a file instead.
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Configuration file (defaults to `PRDFLOW_CONFIG`, then `prdflow.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum write/review rounds (overrides `workflow.max_rounds`).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_rounds: Option<u32>,

    /// Optional session ID.
    #[arg(long)]
    session: Option<String>,

    /// Directory to write the session trace JSON into.
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Print the trace summary after the final output.
    #[arg(long, default_value_t = false)]
    explain: bool,

    /// Trace summary format; implies `--explain`.
    #[arg(long, value_enum)]
    explain_format: Option<ExplainFormat>,

    /// Suppress the agent progress stream.
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Do not append this run to the session log.
    #[arg(long, default_value_t = false)]
    no_session_log: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ExplainFormat {
    #[default]
    Markdown,
    Mermaid,
}

impl ExplainFormat {
    fn render(self, summary: &TraceSummary) -> String {
        match self {
            ExplainFormat::Markdown => summary.render_markdown(),
            ExplainFormat::Mermaid => summary.render_mermaid(),
        }
    }
}

impl Cli {
    fn explain_format(&self) -> Option<ExplainFormat> {
        self.explain_format
            .or_else(|| self.explain.then_some(ExplainFormat::Markdown))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    load_dotenv();
    let config = ConfigLoader::load(cli.config.clone())?;

    init_telemetry(TelemetryOptions {
        env_filter: Some(format!("{},prdflow_core={}", config.logging.level, config.logging.level)),
        ..TelemetryOptions::default()
    })?;
    init_metrics_from_env("prdflow-cli");

    let idea = match (&cli.prompt, &cli.prompt_file) {
        (Some(prompt), _) => prompt.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file {}", path.display()))?,
        (None, None) => DEFAULT_IDEA.to_string(),
    };
    if idea.trim().is_empty() {
        anyhow::bail!("the document request is empty");
    }

    let agents = Agents::from_config(&config)?;
    let max_rounds = cli.max_rounds.unwrap_or(config.workflow.max_rounds);

    let rt = Runtime::new()?;
    rt.block_on(async move {
        info!(max_rounds, model = %config.llm.model, "starting prdflow session");

        let (events, mut receiver) = EventCollector::new();
        let quiet = cli.quiet;
        let explain = cli.explain_format();
        let printer = tokio::spawn(async move {
            let mut renderer = EventRenderer::new();
            while let Some(event) = receiver.recv().await {
                if !quiet {
                    print!("{}", renderer.render(&event));
                    let _ = std::io::stdout().flush();
                }
            }
        });

        let mut options = SessionOptions::new(&idea)
            .with_max_rounds(max_rounds)
            .with_events(events)
            .with_session_log(!cli.no_session_log);
        if let Some(session_id) = cli.session {
            options = options.with_session_id(session_id);
        }
        if let Some(dir) = cli.trace_dir {
            options = options.with_trace_dir(dir);
        }

        let outcome = run_document_session(options, &agents).await;
        // All senders are gone once the session returns; drain the stream.
        printer.await?;
        let outcome = outcome?;

        println!("\n--- ✅ Workflow Complete ---");
        if !outcome.approved {
            warn!(rounds = outcome.rounds, "reviewer did not approve the final draft");
            println!(
                "\n(stopped after {} round(s) without approval)",
                outcome.rounds
            );
        }
        println!("\n--- Final Report Content ---\n");
        println!("{}", outcome.report);
        println!("\n----------------------------\n");
        println!("\n--- Final Review ---\n");
        println!("{}", outcome.review);

        if let Some(format) = explain {
            println!("\n{}", format.render(&outcome.trace_summary));
        }
        if let Some(path) = &outcome.trace_path {
            info!(path = %path.display(), "trace written");
        }

        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use prdflow_core::TraceEvent;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_flags_is_a_valid_invocation() {
        let cli = Cli::try_parse_from(["prdflow"]).unwrap();
        assert!(cli.prompt.is_none());
        assert!(cli.max_rounds.is_none());
        assert!(!cli.quiet);
    }

    #[test]
    fn prompt_and_prompt_file_conflict() {
        let err = Cli::try_parse_from(["prdflow", "--prompt", "x", "--prompt-file", "y.txt"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn zero_rounds_is_rejected() {
        let err = Cli::try_parse_from(["prdflow", "--max-rounds", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = Cli::try_parse_from(["prdflow", "--max-rounds", "1"]).unwrap();
        assert_eq!(cli.max_rounds, Some(1));
    }

    #[test]
    fn explain_format_selection() {
        let cli = Cli::try_parse_from(["prdflow"]).unwrap();
        assert_eq!(cli.explain_format(), None);

        let cli = Cli::try_parse_from(["prdflow", "--explain"]).unwrap();
        assert_eq!(cli.explain_format(), Some(ExplainFormat::Markdown));

        let cli = Cli::try_parse_from(["prdflow", "--explain-format", "mermaid"]).unwrap();
        assert_eq!(cli.explain_format(), Some(ExplainFormat::Mermaid));
    }

    #[test]
    fn mermaid_format_renders_a_flowchart() {
        let summary = TraceSummary::from_events(&[
            TraceEvent::new("writer", "round 1 draft (42 chars)"),
            TraceEvent::new("reviewer", "round 1 verdict: approved"),
        ]);

        let rendered = ExplainFormat::Mermaid.render(&summary);

        assert!(rendered.starts_with("flowchart TD"));
        assert!(rendered.contains("step1 --> step2"));
        assert!(ExplainFormat::Markdown.render(&summary).contains("### Trace Summary"));
    }
}
