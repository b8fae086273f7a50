//! Bounded retry with backoff around a single Test Unit.
//!
//! A test gets `retryCount + 1` attempts. A `pass` or `skipped` result ends
//! the sequence immediately; a `fail` is retried after a backoff delay until
//! attempts run out, at which point the last failing result is returned.
//! The policy never looks at *why* a test failed.
//!
//! Every suspension point (the attempt itself and the backoff wait) races
//! the run's cancellation token, so cancellation is observed promptly
//! rather than at the next loop iteration.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineResult};
use crate::model::profile::DEFAULT_TIMEOUT_MS;
use crate::model::{
    BackoffStrategy, ErrorCategory, ExecutionContext, RunSettings, TestDefinition, TestError,
    TestResult, TestStatus,
};
use crate::obs::emit_test_retrying;
use crate::registry::TestUnit;

/// Sleep for `duration`, or return [`EngineError::Cancelled`] as soon as
/// `cancel` fires.
pub async fn wait_or_cancel(duration: Duration, cancel: &CancellationToken) -> EngineResult<()> {
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Retry parameters resolved for one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    backoff: BackoffStrategy,
    attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, backoff: BackoffStrategy) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff,
            attempt_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Resolve per-test overrides against the profile's run settings.
    pub fn for_test(definition: &TestDefinition, settings: &RunSettings) -> Self {
        Self::new(
            definition.effective_retry_count(settings),
            settings.retry_delay(),
            settings.backoff_strategy,
        )
        .with_attempt_timeout(definition.effective_timeout(settings))
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait after the zero-based attempt `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.delay(self.base_delay, attempt)
    }

    /// Run `unit` until it stops failing or attempts are exhausted.
    ///
    /// The returned result carries the attempt count and the window from
    /// the first attempt's start to the last attempt's end.
    pub async fn execute(
        &self,
        unit: &dyn TestUnit,
        definition: &TestDefinition,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> EngineResult<TestResult> {
        let started_at = Utc::now();
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let mut result = self.attempt(unit, definition, context, cancel).await?;
            let attempts_made = attempt + 1;

            if result.status != TestStatus::Fail || attempt >= self.max_retries {
                result.stamp(started_at, attempts_made);
                return Ok(result);
            }

            let delay = self.delay_for(attempt);
            emit_test_retrying(&definition.id, attempts_made, delay.as_millis() as u64);
            wait_or_cancel(delay, cancel).await?;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        unit: &dyn TestUnit,
        definition: &TestDefinition,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> EngineResult<TestResult> {
        let run = tokio::time::timeout(
            self.attempt_timeout,
            unit.execute(definition, context, cancel),
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            outcome = run => outcome,
        };

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) if cancel.is_cancelled() => Err(EngineError::Cancelled),
            Ok(Err(source)) => Err(EngineError::UnitFault {
                test_id: definition.id.clone(),
                source,
            }),
            Err(_elapsed) => {
                let ms = self.attempt_timeout.as_millis();
                Ok(TestResult::failed(
                    definition,
                    TestError::new(
                        ErrorCategory::Timeout,
                        format!("'{}' timed out after {ms} ms", definition.display_name),
                    ),
                )
                .with_technical_summary(format!("attempt exceeded timeoutMs={ms}")))
            }
        }
    }
}
