//! Structured observability hooks for run and profile lifecycle events.
//!
//! Every event carries an `event` field (`run.started`, `test.finished`, ...)
//! so log pipelines can filter on it regardless of the message text.

use tracing::{debug, info, warn};

use crate::model::{TestResult, TestStatus};

/// Run-scoped span carrying `run_id`.
///
/// Attach it to the run future with [`tracing::Instrument`] so every event
/// emitted while the run is polled is tagged, across await points.
pub fn run_span(run_id: &str, profile_id: &str) -> tracing::Span {
    tracing::info_span!("diagrun.run", run_id = %run_id, profile_id = %profile_id)
}

/// Emit event: run started for a profile.
pub fn emit_run_started(run_id: &str, profile_id: &str, test_count: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        profile_id = %profile_id,
        test_count = test_count,
    );
}

/// Emit event: a test is about to execute.
pub fn emit_test_started(test_id: &str, test_type: &str) {
    debug!(event = "test.started", test_id = %test_id, test_type = %test_type);
}

/// Emit event: an attempt failed and another will follow after `delay_ms`.
pub fn emit_test_retrying(test_id: &str, attempt: u32, delay_ms: u64) {
    info!(
        event = "test.retrying",
        test_id = %test_id,
        attempt = attempt,
        delay_ms = delay_ms,
    );
}

/// Emit event: a test result was finalised.
pub fn emit_test_finished(result: &TestResult) {
    let category = result
        .error_category()
        .map(|c| format!("{c:?}"))
        .unwrap_or_default();
    if result.status == TestStatus::Fail {
        warn!(
            event = "test.finished",
            test_id = %result.test_id,
            status = %result.status,
            attempts = result.attempts,
            duration_ms = result.duration_ms,
            category = %category,
        );
    } else {
        info!(
            event = "test.finished",
            test_id = %result.test_id,
            status = %result.status,
            attempts = result.attempts,
            duration_ms = result.duration_ms,
            category = %category,
        );
    }
}

/// Emit event: run finished with counts and pass rate.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, passed: usize, failed: usize, pass_rate: f64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        passed = passed,
        failed = failed,
        pass_rate = pass_rate,
    );
}

/// Emit event: run aborted by cancellation (warn level).
pub fn emit_run_cancelled(run_id: &str, completed: usize) {
    warn!(event = "run.cancelled", run_id = %run_id, completed = completed);
}

/// Emit event: a profile advanced one schema version.
pub fn emit_profile_migrated(profile_id: &str, from: u32, to: u32) {
    info!(event = "profile.migrated", profile_id = %profile_id, from = from, to = to);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let span = run_span("test-run-id", "profile-1");
        let _entered = span.enter();
    }
}
