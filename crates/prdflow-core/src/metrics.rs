use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

use crate::agents::AgentRole;

struct AgentMetrics {
    calls: Counter<u64>,
    duration_ms: Histogram<f64>,
    review_rounds: Histogram<u64>,
}

static METRICS: OnceCell<AgentMetrics> = OnceCell::new();

fn handles() -> &'static AgentMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("prdflow.agents");
        AgentMetrics {
            calls: meter
                .u64_counter("agent_calls_total")
                .with_description("Model calls issued by each agent, by outcome")
                .init(),
            duration_ms: meter
                .f64_histogram("agent_call_duration_ms")
                .with_description("Model call latency in milliseconds")
                .init(),
            review_rounds: meter
                .u64_histogram("review_rounds")
                .with_description("Write/review rounds needed per session")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) {
    if std::env::var("PRDFLOW_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "PRDFLOW_OTEL_METRICS_ENDPOINT detected for {service_name}. Configure an OTLP meter provider in your deployment to export agent metrics."
        );
    }
}

/// Record a single model call (no-op if no provider installed).
pub fn record_agent_call(role: AgentRole, status: &str, duration_ms: u64) {
    let metrics = handles();
    let attrs = [
        KeyValue::new("role", role.as_str()),
        KeyValue::new("status", status.to_string()),
    ];

    metrics.calls.add(1, &attrs);
    metrics.duration_ms.record(duration_ms as f64, &attrs);
}

/// Record how many rounds a finished session took.
pub fn record_review_rounds(rounds: u32, approved: bool) {
    handles()
        .review_rounds
        .record(u64::from(rounds), &[KeyValue::new("approved", approved)]);
}
