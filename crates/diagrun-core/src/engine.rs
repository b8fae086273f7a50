//! Sequential orchestration of a validated profile.
//!
//! Tests run strictly one at a time in declaration order. `dependsOn` is
//! checked for consistency at load time but does not reorder or gate
//! execution. For each test the engine:
//!
//! 1. looks up the Test Unit for its type tag (missing → `Configuration` failure),
//! 2. applies the privilege gate (`Permission` skip/fail per admin policy),
//! 3. hands off to the [`RetryPolicy`],
//! 4. reports the result to the progress sink and appends it,
//! 5. waits the inter-test delay, except after the last test.
//!
//! Cancellation at any suspension point aborts the run with
//! [`EngineError::Cancelled`]; no partial report is produced.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::loader::ValidatedProfile;
use crate::model::{
    AdminPolicy, EnvironmentSnapshot, ErrorCategory, ExecutionContext, RunReport, RunSettings,
    RunSummary, TestDefinition, TestError, TestResult,
};
use crate::obs::{
    emit_run_cancelled, emit_run_finished, emit_run_started, emit_test_finished,
    emit_test_started, run_span,
};
use crate::registry::TestUnitRegistry;
use crate::retry::{wait_or_cancel, RetryPolicy};

/// Receives each finalised result as soon as it lands.
///
/// Fire-and-forget: implementations must not block meaningfully or panic.
pub trait ProgressSink: Send + Sync {
    fn report(&self, result: &TestResult);
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _result: &TestResult) {}
}

impl ProgressSink for mpsc::UnboundedSender<TestResult> {
    fn report(&self, result: &TestResult) {
        // A dropped receiver just means nobody is watching.
        let _ = self.send(result.clone());
    }
}

/// Adapts a closure into a [`ProgressSink`].
pub struct FnProgress<F>(pub F);

impl<F> ProgressSink for FnProgress<F>
where
    F: Fn(&TestResult) + Send + Sync,
{
    fn report(&self, result: &TestResult) {
        (self.0)(result)
    }
}

/// Platform hook answering "is this process elevated?".
pub trait PrivilegeCheck: Send + Sync {
    fn is_elevated(&self) -> bool;

    /// Ask the platform to elevate for one test. Used by
    /// [`AdminPolicy::Prompt`]; the default declines.
    fn request_elevation(&self) -> bool {
        false
    }
}

/// A privilege answer fixed at construction.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedPrivilege {
    pub elevated: bool,
    pub grant_on_request: bool,
}

impl FixedPrivilege {
    pub fn elevated() -> Self {
        Self {
            elevated: true,
            grant_on_request: false,
        }
    }

    pub fn not_elevated() -> Self {
        Self::default()
    }
}

impl PrivilegeCheck for FixedPrivilege {
    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn request_elevation(&self) -> bool {
        self.grant_on_request
    }
}

/// Runs validated profiles against a shared, read-only Test Unit registry.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<TestUnitRegistry>,
    privilege: Arc<dyn PrivilegeCheck>,
}

impl Orchestrator {
    pub fn new(registry: Arc<TestUnitRegistry>, privilege: Arc<dyn PrivilegeCheck>) -> Self {
        Self {
            registry,
            privilege,
        }
    }

    pub fn registry(&self) -> &TestUnitRegistry {
        &self.registry
    }

    /// Execute every test in `profile` and assemble the run report.
    pub async fn run(
        &self,
        profile: &ValidatedProfile,
        context: &ExecutionContext,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<RunReport> {
        let run_id = Uuid::new_v4();
        let span = run_span(&run_id.to_string(), &profile.id);
        self.run_inner(run_id, profile, context, sink, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        profile: &ValidatedProfile,
        context: &ExecutionContext,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> EngineResult<RunReport> {
        let run_label = run_id.to_string();
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let elevated = self.privilege.is_elevated();
        let environment = EnvironmentSnapshot::capture(elevated);

        emit_run_started(&run_label, &profile.id, profile.tests.len());

        let mut results: Vec<TestResult> = Vec::with_capacity(profile.tests.len());
        if let Err(err) = self
            .execute_tests(profile, elevated, context, sink, cancel, &mut results)
            .await
        {
            if err.is_cancelled() {
                emit_run_cancelled(&run_label, results.len());
            }
            return Err(err);
        }

        let summary = RunSummary::from_results(&results);
        let duration_ms = clock.elapsed().as_millis() as u64;
        emit_run_finished(
            &run_label,
            duration_ms,
            summary.passed,
            summary.failed,
            summary.pass_rate,
        );

        Ok(RunReport {
            run_id,
            profile_id: profile.id.clone(),
            profile_name: profile.name.clone(),
            started_at,
            finished_at: Utc::now(),
            duration_ms,
            environment,
            results,
            summary,
        })
    }

    async fn execute_tests(
        &self,
        profile: &ValidatedProfile,
        elevated: bool,
        context: &ExecutionContext,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
        results: &mut Vec<TestResult>,
    ) -> EngineResult<()> {
        let settings = &profile.run_settings;
        let total = profile.tests.len();
        for (index, definition) in profile.tests.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let result = self
                .run_test(definition, settings, elevated, context, cancel)
                .await?;
            emit_test_finished(&result);
            sink.report(&result);
            results.push(result);

            if index + 1 < total {
                wait_or_cancel(settings.inter_test_delay(), cancel).await?;
            }
        }
        Ok(())
    }

    async fn run_test(
        &self,
        definition: &TestDefinition,
        settings: &RunSettings,
        elevated: bool,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> EngineResult<TestResult> {
        let Some(unit) = self.registry.get(&definition.test_type) else {
            return Ok(TestResult::failed(
                definition,
                TestError::new(
                    ErrorCategory::Configuration,
                    format!(
                        "no test unit registered for type '{}'",
                        definition.test_type
                    ),
                ),
            ));
        };

        if definition.requires_admin && !elevated {
            if let Some(result) = self.gate_privilege(definition, settings.admin_policy) {
                return Ok(result);
            }
        }

        emit_test_started(&definition.id, &definition.test_type);
        RetryPolicy::for_test(definition, settings)
            .execute(unit.as_ref(), definition, context, cancel)
            .await
    }

    /// Result to record instead of executing, or `None` when elevation was
    /// granted on request.
    fn gate_privilege(
        &self,
        definition: &TestDefinition,
        policy: AdminPolicy,
    ) -> Option<TestResult> {
        let error = |message: &str| {
            TestError::new(
                ErrorCategory::Permission,
                format!("'{}' {message}", definition.display_name),
            )
        };
        match policy {
            AdminPolicy::Skip => Some(TestResult::skipped(
                definition,
                error("requires elevated privileges and was skipped"),
            )),
            AdminPolicy::Fail => Some(TestResult::failed(
                definition,
                error("requires elevated privileges"),
            )),
            AdminPolicy::Prompt if self.privilege.request_elevation() => None,
            AdminPolicy::Prompt => Some(TestResult::skipped(
                definition,
                error("requires elevated privileges and elevation was declined"),
            )),
        }
    }
}
