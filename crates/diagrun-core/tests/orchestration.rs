//! Orchestration engine tests on a paused clock.

use async_trait::async_trait;
use diagrun_core::{
    AdminPolicy, CancellationToken, EngineError, ErrorCategory, ExecutionContext, FixedPrivilege,
    NoopProgress, Orchestrator, Profile, TestDefinition, TestError, TestResult, TestStatus,
    TestUnit, TestUnitRegistry, ValidatedProfile,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const PROFILE_ID: &str = "9d7c5b3a-1e2f-4a6b-8c0d-2e4f6a8b0c1d";

/// Records each call; outcome depends on the test's `outcome` parameter.
#[derive(Default)]
struct Scripted {
    calls: Mutex<Vec<String>>,
}

impl Scripted {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestUnit for Scripted {
    async fn execute(
        &self,
        definition: &TestDefinition,
        _context: &ExecutionContext,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<TestResult> {
        self.calls.lock().unwrap().push(definition.id.clone());
        match definition.parameters.get("outcome").and_then(|v| v.as_str()) {
            Some("fail") => Ok(TestResult::failed(
                definition,
                TestError::new(ErrorCategory::Network, "host unreachable"),
            )),
            Some("fault") => anyhow::bail!("unit invariant broken"),
            Some("slow") => {
                tokio::time::sleep(Duration::from_millis(1_000)).await;
                Ok(TestResult::passed(definition, "slow but fine"))
            }
            _ => Ok(TestResult::passed(definition, "ok")),
        }
    }
}

fn setup(privilege: FixedPrivilege) -> (Orchestrator, Arc<Scripted>) {
    let unit = Arc::new(Scripted::default());
    let registry = TestUnitRegistry::new()
        .with_unit("scripted", unit.clone())
        .unwrap();
    (Orchestrator::new(Arc::new(registry), Arc::new(privilege)), unit)
}

fn scripted(id: &str, outcome: &str) -> TestDefinition {
    TestDefinition::new(id, "scripted", format!("Scripted {id}"))
        .with_parameter("outcome", serde_json::json!(outcome))
}

fn validated(delay_ms: u64, tests: Vec<TestDefinition>) -> ValidatedProfile {
    let mut profile = Profile::new(PROFILE_ID, "Orchestration", 3);
    profile.run_settings.inter_test_delay_ms = Some(delay_ms);
    profile.run_settings.retry_delay_ms = 100;
    profile.tests = tests;
    ValidatedProfile::new(profile).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_inter_test_delay_skipped_after_last() {
    let (orch, _) = setup(FixedPrivilege::not_elevated());
    let profile = validated(
        100,
        vec![scripted("a", "pass"), scripted("b", "pass"), scripted("c", "pass")],
    );

    let start = Instant::now();
    let report = orch
        .run(&profile, &ExecutionContext::new(), &NoopProgress, &CancellationToken::new())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    assert!(report.duration_ms >= 200 && report.duration_ms < 300);
    assert_eq!(report.summary.passed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_pacing_aborts_promptly() {
    let (orch, unit) = setup(FixedPrivilege::not_elevated());
    let profile = validated(5_000, vec![scripted("a", "pass"), scripted("b", "pass")]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();
    let err = orch
        .run(&profile, &ExecutionContext::new(), &tx, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Cancelled));
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(unit.calls(), vec!["a"]);
    assert_eq!(rx.recv().await.unwrap().test_id, "a");
    drop(tx);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_pre_cancelled_run_starts_no_tests() {
    let (orch, unit) = setup(FixedPrivilege::not_elevated());
    let profile = validated(0, vec![scripted("a", "pass"), scripted("b", "pass")]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let err = orch
        .run(&profile, &ExecutionContext::new(), &tx, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Cancelled));
    assert!(unit.calls().is_empty());
    drop(tx);
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_slow_attempt() {
    let (orch, _) = setup(FixedPrivilege::not_elevated());
    let profile = validated(0, vec![scripted("slow", "slow")]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = orch
        .run(&profile, &ExecutionContext::new(), &NoopProgress, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(start.elapsed() < Duration::from_millis(1_000));
}

#[tokio::test]
async fn test_unknown_type_is_configuration_failure() {
    let (orch, unit) = setup(FixedPrivilege::not_elevated());
    let profile = validated(
        0,
        vec![
            TestDefinition::new("mystery", "does-not-exist", "Mystery"),
            scripted("next", "pass"),
        ],
    );

    let report = orch
        .run(&profile, &ExecutionContext::new(), &NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    let mystery = report.result("mystery").unwrap();
    assert_eq!(mystery.status, TestStatus::Fail);
    assert_eq!(mystery.error_category(), Some(ErrorCategory::Configuration));
    assert!(mystery.summary.contains("does-not-exist"));
    assert_eq!(mystery.attempts, 0);
    assert_eq!(unit.calls(), vec!["next"]);
    assert!(!report.succeeded());
}

#[tokio::test]
async fn test_admin_test_skipped_when_not_elevated() {
    let (orch, unit) = setup(FixedPrivilege::not_elevated());
    let mut profile = Profile::new(PROFILE_ID, "Admin", 3)
        .with_test(scripted("firewall", "pass").requiring_admin())
        .with_test(scripted("ping", "pass"));
    profile.run_settings.admin_policy = AdminPolicy::Skip;
    let profile = ValidatedProfile::new(profile).unwrap();

    let report = orch
        .run(&profile, &ExecutionContext::new(), &NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    let firewall = report.result("firewall").unwrap();
    assert_eq!(firewall.status, TestStatus::Skipped);
    assert_eq!(firewall.error_category(), Some(ErrorCategory::Permission));
    assert_eq!(unit.calls(), vec!["ping"]);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.pass_rate, 50.0);
    assert!(report.succeeded());
}

#[tokio::test]
async fn test_results_follow_declaration_order() {
    let (orch, _) = setup(FixedPrivilege::not_elevated());
    // "first" depends on "second" but still runs first.
    let profile = validated(
        0,
        vec![
            scripted("first", "fail").with_depends_on(["second"]),
            scripted("second", "pass"),
            scripted("third", "pass"),
        ],
    );

    let report = orch
        .run(&profile, &ExecutionContext::new(), &NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<&str> = report.results.iter().map(|r| r.test_id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
    assert_eq!(report.summary.failed, 1);
    assert!((report.summary.pass_rate - 66.666).abs() < 0.01);
}

#[tokio::test(start_paused = true)]
async fn test_failing_test_is_retried_with_backoff() {
    let (orch, unit) = setup(FixedPrivilege::not_elevated());
    let profile = validated(0, vec![scripted("flaky", "fail").with_retry_count(2)]);

    let start = Instant::now();
    let report = orch
        .run(&profile, &ExecutionContext::new(), &NoopProgress, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(unit.calls().len(), 3);
    assert_eq!(report.results[0].attempts, 3);
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_unit_fault_aborts_run() {
    let (orch, unit) = setup(FixedPrivilege::not_elevated());
    let profile = validated(
        0,
        vec![scripted("ok", "pass"), scripted("boom", "fault"), scripted("never", "pass")],
    );

    let err = orch
        .run(&profile, &ExecutionContext::new(), &NoopProgress, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        EngineError::UnitFault { test_id, source } => {
            assert_eq!(test_id, "boom");
            assert!(source.to_string().contains("invariant"));
        }
        other => panic!("expected unit fault, got {other:?}"),
    }
    assert_eq!(unit.calls(), vec!["ok", "boom"]);
}

#[tokio::test]
async fn test_each_run_gets_fresh_id() {
    let (orch, _) = setup(FixedPrivilege::not_elevated());
    let profile = validated(0, vec![scripted("a", "pass")]);
    let ctx = ExecutionContext::new();
    let token = CancellationToken::new();

    let first = orch.run(&profile, &ctx, &NoopProgress, &token).await.unwrap();
    let second = orch.run(&profile, &ctx, &NoopProgress, &token).await.unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.profile_id, PROFILE_ID);
}
