//! Per-test outcomes and the structured error taxonomy attached to them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::profile::TestDefinition;

/// Final status of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Skipped,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Coarse failure taxonomy shown to the user.
///
/// Informational only: retry decisions look at [`TestStatus`], never here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Network,
    Timeout,
    Permission,
    Validation,
    Configuration,
    Unknown,
}

/// Structured error with an optional nested cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestError {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<TestError>>,
}

impl TestError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: TestError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.category, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by {cause})")?;
        }
        Ok(())
    }
}

/// Outcome of one test's attempt sequence.
///
/// Test Units build these with the constructors below; the retry policy then
/// stamps attempts, timestamps and duration before the engine records it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_id: String,
    pub test_type: String,
    pub display_name: String,
    pub status: TestStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,

    /// Execution attempts made; zero for tests that never ran.
    pub attempts: u32,

    /// Captured evidence keyed by name.
    #[serde(default)]
    pub evidence: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,

    /// Human-readable one-liner.
    pub summary: String,

    /// Detail aimed at whoever debugs the failure.
    #[serde(default)]
    pub technical_summary: String,
}

impl TestResult {
    fn base(definition: &TestDefinition, status: TestStatus, summary: String) -> Self {
        let now = Utc::now();
        Self {
            test_id: definition.id.clone(),
            test_type: definition.test_type.clone(),
            display_name: definition.display_name.clone(),
            status,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            attempts: 0,
            evidence: BTreeMap::new(),
            error: None,
            summary,
            technical_summary: String::new(),
        }
    }

    /// A passing result.
    pub fn passed(definition: &TestDefinition, summary: impl Into<String>) -> Self {
        Self::base(definition, TestStatus::Pass, summary.into())
    }

    /// A failing result; the summary is taken from the error message.
    pub fn failed(definition: &TestDefinition, error: TestError) -> Self {
        let mut result = Self::base(definition, TestStatus::Fail, error.message.clone());
        result.error = Some(error);
        result
    }

    /// A skipped result; the summary is taken from the error message.
    pub fn skipped(definition: &TestDefinition, error: TestError) -> Self {
        let mut result = Self::base(definition, TestStatus::Skipped, error.message.clone());
        result.error = Some(error);
        result
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: Value) -> Self {
        self.evidence.insert(key.into(), value);
        self
    }

    pub fn with_technical_summary(mut self, detail: impl Into<String>) -> Self {
        self.technical_summary = detail.into();
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == TestStatus::Pass
    }

    /// Category of the attached error, if any.
    pub fn error_category(&self) -> Option<ErrorCategory> {
        self.error.as_ref().map(|e| e.category)
    }

    /// Overwrite the timing fields with a measured window.
    pub(crate) fn stamp(&mut self, started_at: DateTime<Utc>, attempts: u32) {
        let finished_at = Utc::now();
        self.started_at = started_at;
        self.finished_at = finished_at;
        self.duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        self.attempts = attempts;
    }
}
