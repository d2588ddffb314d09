// Centralized observability infrastructure: structured logging, metrics,
// and tracing context propagation (SPEC_FULL.md section B, "Logging").
// Kept close to the teacher's module of the same name - `OperationContext`,
// `with_trace_id`, `record_metric`, `log_operation` retargeted from
// document/query operations to entity/relation/search operations.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNTER: AtomicU64 = AtomicU64::new(0);
static SEARCH_COUNTER: AtomicU64 = AtomicU64::new(0);
static INDEX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initializes the logging and tracing infrastructure. Should be called
/// once at application startup.
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("kgraph_engine=debug,info")
    } else {
        EnvFilter::new("kgraph_engine=warn,error")
    };

    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init() {
        Ok(()) => {
            if !quiet {
                info!("observability initialized");
            }
            Ok(())
        }
        Err(_) => Ok(()), // already initialized - fine in tests
    }
}

/// Structured operation kinds for `log_operation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    EntityCreate { name: String },
    EntityUpdate { name: String },
    EntityDelete { name: String },
    RelationCreate { from: String, to: String, relation_type: String },
    RelationDelete { from: String, to: String, relation_type: String },
    IndexInsert { index: String, name: String },
    IndexRemove { index: String, name: String },
    SearchExecute { mode: String, result_count: usize },
    GraphSave { entity_count: usize, relation_count: usize },
    GraphLoad { entity_count: usize, relation_count: usize },
}

impl Operation {
    pub fn validate(&self) -> Result<()> {
        if let Operation::SearchExecute { mode, .. } = self {
            if mode.is_empty() {
                anyhow::bail!("search operation must name a mode");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter { name: &'static str, value: u64 },
    Gauge { name: &'static str, value: f64 },
    Histogram { name: &'static str, value: f64, unit: &'static str },
    Timer { name: &'static str, duration: Duration },
}

/// Trace context threaded through a call chain; children share `trace_id`.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    pub operation: String,
    pub start_time: Instant,
    pub attributes: Vec<(String, String)>,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            operation: operation.into(),
            start_time: Instant::now(),
            attributes: Vec::new(),
        }
    }

    pub fn child(&self, operation: impl Into<String>) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            operation: operation.into(),
            start_time: Instant::now(),
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((key.into(), value.into()));
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[instrument(skip(ctx))]
pub fn log_operation(ctx: &OperationContext, op: &Operation, result: &Result<()>) {
    let elapsed = ctx.elapsed();
    let attrs = ctx.attributes.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(", ");

    match result {
        Ok(()) => {
            info!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                parent_span_id = ?ctx.parent_span_id,
                operation = %ctx.operation,
                elapsed_ms = elapsed.as_millis(),
                attributes = %attrs,
                "operation completed: {:?}", op
            );
            OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            error!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                parent_span_id = ?ctx.parent_span_id,
                operation = %ctx.operation,
                elapsed_ms = elapsed.as_millis(),
                attributes = %attrs,
                error = %e,
                "operation failed: {:?}", op
            );
            ERROR_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
    }

    match op {
        Operation::SearchExecute { .. } => {
            SEARCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Operation::IndexInsert { .. } | Operation::IndexRemove { .. } => {
            INDEX_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        _ => {}
    }
}

pub fn record_metric(metric: MetricType) {
    match metric {
        MetricType::Counter { name, value } => debug!("metric.counter {} = {}", name, value),
        MetricType::Gauge { name, value } => debug!("metric.gauge {} = {}", name, value),
        MetricType::Histogram { name, value, unit } => debug!("metric.histogram {} = {} {}", name, value, unit),
        MetricType::Timer { name, duration } => debug!("metric.timer {} = {:?}", name, duration),
    }
}

/// Runs `f` under a fresh trace context, logging entry/exit and recording
/// duration/error-count metrics.
pub async fn with_trace_id<F, T>(operation: &str, f: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let ctx = OperationContext::new(operation);
    info!(trace_id = %ctx.trace_id, span_id = %ctx.span_id, "starting operation: {}", operation);

    let start = Instant::now();
    let result = f.await;
    let elapsed = start.elapsed();

    match &result {
        Ok(_) => {
            info!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                elapsed_ms = elapsed.as_millis(),
                "operation completed successfully: {}", operation
            );
            record_metric(MetricType::Timer { name: "operation.duration", duration: elapsed });
        }
        Err(e) => {
            error!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                elapsed_ms = elapsed.as_millis(),
                error = %e,
                "operation failed: {}", operation
            );
            record_metric(MetricType::Counter { name: "operation.errors", value: 1 });
        }
    }

    result
}

pub fn get_metrics() -> serde_json::Value {
    serde_json::json!({
        "operations": {
            "total": OPERATION_COUNTER.load(Ordering::Relaxed),
            "errors": ERROR_COUNTER.load(Ordering::Relaxed),
            "searches": SEARCH_COUNTER.load(Ordering::Relaxed),
            "index_ops": INDEX_COUNTER.load(Ordering::Relaxed),
        },
        "timestamp": Utc::now().to_rfc3339(),
    })
}

#[instrument]
pub fn log_error_with_context(error: &anyhow::Error, ctx: &OperationContext) {
    let error_chain = error.chain().map(|e| e.to_string()).collect::<Vec<_>>().join(" -> ");
    error!(
        trace_id = %ctx.trace_id,
        span_id = %ctx.span_id,
        operation = %ctx.operation,
        error_chain = %error_chain,
        "error occurred during operation"
    );
}

/// Logs start/elapsed on drop - scope-guard style perf measurement.
pub struct PerfTimer {
    name: String,
    start: Instant,
    ctx: OperationContext,
}

impl PerfTimer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let ctx = OperationContext::new(&name);
        info!(trace_id = %ctx.trace_id, span_id = %ctx.span_id, "timer started: {}", name);
        Self { name, start: Instant::now(), ctx }
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        info!(
            trace_id = %self.ctx.trace_id,
            span_id = %self.ctx.span_id,
            elapsed_ms = elapsed.as_millis(),
            "timer completed: {}", self.name
        );
        record_metric(MetricType::Timer { name: "perf.timer", duration: elapsed });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_context_child_shares_trace_id() {
        let ctx = OperationContext::new("test_operation");
        let child = ctx.child("child_operation");
        assert_eq!(child.trace_id, ctx.trace_id);
        assert_eq!(child.parent_span_id, Some(ctx.span_id));
    }

    #[test]
    fn metrics_recording_does_not_panic() {
        record_metric(MetricType::Counter { name: "test.counter", value: 42 });
        record_metric(MetricType::Gauge { name: "test.gauge", value: std::f64::consts::PI });
        record_metric(MetricType::Timer { name: "test.timer", duration: Duration::from_millis(123) });

        let metrics = get_metrics();
        assert!(metrics["timestamp"].is_string());
        assert!(metrics["operations"].is_object());
    }

    #[tokio::test]
    async fn with_trace_id_returns_the_inner_result() {
        let result = with_trace_id("test_async_op", async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, anyhow::Error>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn perf_timer_records_on_drop() {
        {
            let _timer = PerfTimer::new("test_timer");
        }
        let metrics = get_metrics();
        assert!(metrics["operations"]["total"].as_u64().is_some());
    }
}
