// bcli-metrics/src/lib.rs

//! Thin wrapper around the `metrics` facade for the bitcoin-cli driver.
//!
//! Recording helpers are free functions over fixed metric names so the
//! driver doesn't need to carry a registry handle around; `install_prometheus`
//! wires up an actual exporter when the embedder wants one (tests and
//! one-shot CLI runs typically don't).

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

const REQUESTS_TOTAL: &str = "bcli_requests_total";
const REQUESTS_FAILED_TOTAL: &str = "bcli_requests_failed_total";
const CHILDREN_REAPED_TOTAL: &str = "bcli_children_reaped_total";
const ERROR_STREAK_SECONDS: &str = "bcli_error_streak_seconds";

/// Install a Prometheus exporter listening on `addr`. Installs the
/// global recorder process-wide; call at most once.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}

/// Record that a request for `command` was dispatched.
pub fn record_request(command: &str) {
    metrics::counter!(REQUESTS_TOTAL, "command" => command.to_string()).increment(1);
}

/// Record that `command` completed with a non-zero, uncaptured exit.
pub fn record_failure(command: &str) {
    metrics::counter!(REQUESTS_FAILED_TOTAL, "command" => command.to_string()).increment(1);
}

/// Record that a child process was reaped (regardless of exit status).
pub fn record_child_reaped() {
    metrics::counter!(CHILDREN_REAPED_TOTAL).increment(1);
}

/// Update the current length, in seconds, of the consecutive-error
/// streak. Set to 0 on every zero-exit completion.
pub fn set_error_streak_seconds(seconds: u64) {
    metrics::gauge!(ERROR_STREAK_SECONDS).set(seconds as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_an_installed_recorder_does_not_panic() {
        // metrics:: macros fall back to a no-op recorder when none has
        // been installed; this should never panic regardless.
        record_request("getblockcount");
        record_failure("getblockcount");
        record_child_reaped();
        set_error_streak_seconds(12);
    }
}
