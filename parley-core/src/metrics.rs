// ABOUTME: Prometheus metrics for message outcomes, backend failures and generated files.
// ABOUTME: Thin wrappers over the metrics facade so call sites stay one line.

use anyhow::{anyhow, Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Mutex;

pub const MESSAGES_TOTAL: &str = "parley_messages_total";
pub const BACKEND_FAILURES_TOTAL: &str = "parley_backend_failures_total";
pub const GENERATED_FILES_TOTAL: &str = "parley_generated_files_total";
pub const CHATS: &str = "parley_chats";

static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Install the Prometheus recorder once per process and return its handle.
/// Later calls return the handle installed by the first one.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let mut slot = HANDLE
        .lock()
        .map_err(|e| anyhow!("Metrics handle lock poisoned: {}", e))?;
    if let Some(handle) = slot.as_ref() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    describe();
    *slot = Some(handle.clone());
    Ok(handle)
}

fn describe() {
    metrics::describe_counter!(MESSAGES_TOTAL, "Messages handled, by pipeline outcome");
    metrics::describe_counter!(
        BACKEND_FAILURES_TOTAL,
        "Backend calls that failed after all retries"
    );
    metrics::describe_counter!(GENERATED_FILES_TOTAL, "Documents and images written");
    metrics::describe_gauge!(CHATS, "Chats currently stored");
}

pub fn record_message(outcome: &'static str) {
    metrics::counter!(MESSAGES_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_backend_failure(operation: &'static str) {
    metrics::counter!(BACKEND_FAILURES_TOTAL, "operation" => operation).increment(1);
}

pub fn record_generated_file(format: &'static str) {
    metrics::counter!(GENERATED_FILES_TOTAL, "format" => format).increment(1);
}

pub fn set_chat_count(count: usize) {
    metrics::gauge!(CHATS).set(count as f64);
}
