//! Profile validation: field checks plus dependency-graph integrity.
//!
//! Validation is read-only and exhaustive. Every problem is collected into a
//! [`ValidationReport`] so callers can show the whole batch at once; a
//! non-empty report means the profile must be rejected.
//!
//! Checks, in order:
//! 1. Profile-level fields (GUID-shaped id, name, schema version, run settings).
//! 2. Per-test fields (non-empty id/type/display name, timeout and retry bounds).
//! 3. Every `dependsOn` entry resolves to a test in the same profile.
//! 4. The `dependsOn` relation is acyclic (self-reference is a 1-node cycle).
//! 5. Test IDs are unique across the profile.

use std::collections::HashMap;

use uuid::Uuid;

use crate::graph::DependencyGraph;
use crate::migration::CURRENT_SCHEMA_VERSION;
use crate::model::profile::{MAX_DELAY_MS, MAX_RETRY_COUNT, MAX_TIMEOUT_MS};
use crate::model::{Profile, RunSettings, TestDefinition};

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("profile id '{id}' is not a valid GUID")]
    InvalidProfileId { id: String },

    #[error("profile name must not be empty")]
    EmptyProfileName,

    #[error("schema version {found} is out of range (1..={current})")]
    SchemaVersionOutOfRange { found: u32, current: u32 },

    #[error("run setting {field} = {value} is out of range ({min}..={max})")]
    SettingOutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("test #{index} has an empty {field}")]
    EmptyTestField { index: usize, field: &'static str },

    #[error("test '{test_id}' {field} = {value} is out of range ({min}..={max})")]
    TestFieldOutOfRange {
        test_id: String,
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("test '{test_id}' has a missing dependency '{missing}'")]
    MissingDependency { test_id: String, missing: String },

    #[error("circular dependency detected: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("duplicate test id '{id}' appears {count} times")]
    DuplicateTestId { id: String, count: usize },
}

/// Outcome of validating a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Human-readable error strings, one per issue.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

/// Stateless profile validator.
pub struct ProfileValidator;

impl ProfileValidator {
    /// Validate a whole profile.
    pub fn validate(profile: &Profile) -> ValidationReport {
        let mut issues = Vec::new();

        if Uuid::parse_str(&profile.id).is_err() {
            issues.push(ValidationIssue::InvalidProfileId {
                id: profile.id.clone(),
            });
        }
        if profile.name.trim().is_empty() {
            issues.push(ValidationIssue::EmptyProfileName);
        }
        if profile.schema_version == 0 || profile.schema_version > CURRENT_SCHEMA_VERSION {
            issues.push(ValidationIssue::SchemaVersionOutOfRange {
                found: profile.schema_version,
                current: CURRENT_SCHEMA_VERSION,
            });
        }
        check_settings(&profile.run_settings, &mut issues);
        issues.extend(Self::validate_tests(&profile.tests));

        ValidationReport { issues }
    }

    /// Validate an ordered list of test definitions on its own.
    pub fn validate_tests(tests: &[TestDefinition]) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (index, test) in tests.iter().enumerate() {
            check_test_fields(index, test, &mut issues);
        }

        let graph = DependencyGraph::from_adjacency(
            tests
                .iter()
                .map(|t| (t.id.as_str(), t.depends_on().iter().map(String::as_str))),
        );

        for (test_id, missing) in graph.missing_references() {
            issues.push(ValidationIssue::MissingDependency {
                test_id: test_id.to_string(),
                missing: missing.to_string(),
            });
        }

        for cycle in graph.find_cycles() {
            issues.push(ValidationIssue::CircularDependency {
                path: cycle.into_iter().map(str::to_string).collect(),
            });
        }

        issues.extend(duplicate_ids(tests));
        issues
    }
}

fn check_range(
    value: u64,
    min: u64,
    max: u64,
    field: &'static str,
    issues: &mut Vec<ValidationIssue>,
) {
    if value < min || value > max {
        issues.push(ValidationIssue::SettingOutOfRange {
            field,
            value,
            min,
            max,
        });
    }
}

fn check_settings(settings: &RunSettings, issues: &mut Vec<ValidationIssue>) {
    check_range(
        settings.default_timeout_ms,
        1,
        MAX_TIMEOUT_MS,
        "defaultTimeoutMs",
        issues,
    );
    check_range(
        u64::from(settings.default_retry_count),
        0,
        u64::from(MAX_RETRY_COUNT),
        "defaultRetryCount",
        issues,
    );
    check_range(settings.retry_delay_ms, 0, MAX_DELAY_MS, "retryDelayMs", issues);
    if let Some(delay) = settings.inter_test_delay_ms {
        check_range(delay, 0, MAX_DELAY_MS, "interTestDelayMs", issues);
    }
}

fn check_test_fields(index: usize, test: &TestDefinition, issues: &mut Vec<ValidationIssue>) {
    for (field, value) in [
        ("id", &test.id),
        ("type", &test.test_type),
        ("displayName", &test.display_name),
    ] {
        if value.trim().is_empty() {
            issues.push(ValidationIssue::EmptyTestField { index, field });
        }
    }

    if let Some(timeout) = test.timeout_ms {
        if timeout == 0 || timeout > MAX_TIMEOUT_MS {
            issues.push(ValidationIssue::TestFieldOutOfRange {
                test_id: test.id.clone(),
                field: "timeoutMs",
                value: timeout,
                min: 1,
                max: MAX_TIMEOUT_MS,
            });
        }
    }
    if let Some(retries) = test.retry_count {
        if retries > MAX_RETRY_COUNT {
            issues.push(ValidationIssue::TestFieldOutOfRange {
                test_id: test.id.clone(),
                field: "retryCount",
                value: u64::from(retries),
                min: 0,
                max: u64::from(MAX_RETRY_COUNT),
            });
        }
    }
}

/// IDs occurring more than once, in first-appearance order.
fn duplicate_ids(tests: &[TestDefinition]) -> Vec<ValidationIssue> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for test in tests.iter().filter(|t| !t.id.trim().is_empty()) {
        let count = counts.entry(test.id.as_str()).or_insert(0);
        if *count == 0 {
            first_seen.push(test.id.as_str());
        }
        *count += 1;
    }

    first_seen
        .into_iter()
        .filter_map(|id| {
            let count = counts.get(id).copied().unwrap_or(0);
            (count > 1).then(|| ValidationIssue::DuplicateTestId {
                id: id.to_string(),
                count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_ID: &str = "6f1c1a52-52c4-4d8c-9a39-0a3d5b1e7f10";

    fn profile(tests: Vec<TestDefinition>) -> Profile {
        tests
            .into_iter()
            .fold(Profile::new(PROFILE_ID, "Network basics", 3), Profile::with_test)
    }

    fn test(id: &str, deps: &[&str]) -> TestDefinition {
        TestDefinition::new(id, "command", format!("Test {id}")).with_depends_on(deps.iter().copied())
    }

    #[test]
    fn test_valid_profile_has_no_issues() {
        let p = profile(vec![test("a", &[]), test("b", &["a"]), test("c", &["a", "b"])]);
        let report = ProfileValidator::validate(&p);
        assert!(report.is_valid(), "{:?}", report.messages());
    }

    #[test]
    fn test_missing_dependency_names_test_and_id() {
        let p = profile(vec![test("a", &["ghost"])]);
        let messages = ProfileValidator::validate(&p).messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("missing dependency"));
        assert!(messages[0].contains("'a'"));
        assert!(messages[0].contains("ghost"));
    }

    #[test]
    fn test_self_dependency_is_circular() {
        let p = profile(vec![test("a", &["a"])]);
        let issues = ProfileValidator::validate(&p).issues;
        assert_eq!(
            issues,
            vec![ValidationIssue::CircularDependency {
                path: vec!["a".to_string(), "a".to_string()]
            }]
        );
        assert!(issues[0].to_string().contains("circular"));
    }

    #[test]
    fn test_errors_accumulate_without_short_circuit() {
        let mut bad = test("a", &["ghost", "b"]);
        bad.retry_count = Some(99);
        let p = profile(vec![bad, test("b", &["a"]), test("b", &[])]);
        let issues = ProfileValidator::validate(&p).issues;

        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::TestFieldOutOfRange { field: "retryCount", .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::MissingDependency { missing, .. } if missing == "ghost")));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::CircularDependency { .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::DuplicateTestId { id, count: 2 } if id == "b")));
    }

    #[test]
    fn test_duplicates_reported_once_per_id() {
        let p = profile(vec![test("a", &[]), test("a", &[]), test("a", &[])]);
        let issues = ProfileValidator::validate(&p).issues;
        assert_eq!(
            issues,
            vec![ValidationIssue::DuplicateTestId {
                id: "a".to_string(),
                count: 3
            }]
        );
    }

    #[test]
    fn test_field_checks() {
        let mut p = profile(vec![TestDefinition::new("", " ", "").with_timeout_ms(0)]);
        p.id = "not-a-guid".to_string();
        p.run_settings.default_timeout_ms = 0;
        p.run_settings.inter_test_delay_ms = Some(MAX_DELAY_MS + 1);
        let issues = ProfileValidator::validate(&p).issues;

        assert!(issues.contains(&ValidationIssue::InvalidProfileId {
            id: "not-a-guid".to_string()
        }));
        for field in ["id", "type", "displayName"] {
            assert!(issues.contains(&ValidationIssue::EmptyTestField { index: 0, field }));
        }
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::SettingOutOfRange { field: "defaultTimeoutMs", .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::SettingOutOfRange { field: "interTestDelayMs", .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::TestFieldOutOfRange { field: "timeoutMs", .. })));
    }

    #[test]
    fn test_schema_version_zero_rejected() {
        let mut p = profile(vec![]);
        p.schema_version = 0;
        let issues = ProfileValidator::validate(&p).issues;
        assert_eq!(
            issues,
            vec![ValidationIssue::SchemaVersionOutOfRange {
                found: 0,
                current: CURRENT_SCHEMA_VERSION
            }]
        );
    }

    #[test]
    fn test_pre_dependency_tests_validate_as_empty_edges() {
        let mut legacy = TestDefinition::new("a", "command", "A");
        legacy.depends_on = None;
        assert!(ProfileValidator::validate_tests(&[legacy]).is_empty());
    }
}
