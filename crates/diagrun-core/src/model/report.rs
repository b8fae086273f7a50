//! Run report and aggregate summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::{TestResult, TestStatus};

/// Machine facts recorded alongside a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSnapshot {
    pub hostname: String,
    pub os: String,
    pub arch: String,
    pub elevated: bool,
    pub runner_version: String,
}

impl EnvironmentSnapshot {
    /// Capture the current process environment.
    pub fn capture(elevated: bool) -> Self {
        let hostname = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            hostname,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            elevated,
            runner_version: crate::VERSION.to_string(),
        }
    }
}

/// Counts by status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `passed / total * 100`, or `0` for an empty run.
    pub pass_rate: f64,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();
        let total = results.len();
        let passed = count(TestStatus::Pass);
        let pass_rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64 * 100.0
        };
        Self {
            total,
            passed,
            failed: count(TestStatus::Fail),
            skipped: count(TestStatus::Skipped),
            pass_rate,
        }
    }
}

/// Aggregate record of one profile execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub profile_id: String,
    pub profile_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub environment: EnvironmentSnapshot,
    /// In execution order.
    pub results: Vec<TestResult>,
    pub summary: RunSummary,
}

impl RunReport {
    /// True when no test failed. Skipped tests do not count as failures.
    pub fn succeeded(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn result(&self, test_id: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.test_id == test_id)
    }
}
