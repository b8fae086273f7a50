//! Profile, test definition and run-settings types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default per-attempt timeout when neither the test nor the profile sets one.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default delay between retry attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Upper bound accepted for any timeout field.
pub const MAX_TIMEOUT_MS: u64 = 3_600_000;

/// Upper bound accepted for any retry-count field.
pub const MAX_RETRY_COUNT: u32 = 10;

/// Upper bound accepted for retry and inter-test delays.
pub const MAX_DELAY_MS: u64 = 300_000;

/// Function mapping a retry attempt index to a wait duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Constant delay: `d`.
    #[default]
    None,

    /// Delay grows by one base step per attempt: `d * (i + 1)`.
    Linear,

    /// Delay doubles per attempt: `d * 2^i`.
    Exponential,
}

impl BackoffStrategy {
    /// Delay to wait after the zero-based attempt `attempt` failed.
    pub fn delay(&self, base: Duration, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::None => base,
            BackoffStrategy::Linear => base.saturating_mul(attempt.saturating_add(1)),
            BackoffStrategy::Exponential => base.saturating_mul(2u32.saturating_pow(attempt)),
        }
    }
}

/// What to do with a test that requires elevation on a non-elevated process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminPolicy {
    /// Record a skipped result with a permission error.
    #[default]
    Skip,

    /// Ask the platform to elevate; skip if it refuses.
    Prompt,

    /// Record a failing result with a permission error.
    Fail,
}

/// Global defaults applied to every test in a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunSettings {
    /// Per-attempt timeout when a test has no override.
    pub default_timeout_ms: u64,

    /// Retries after the first attempt when a test has no override.
    pub default_retry_count: u32,

    /// Base delay fed to the backoff strategy.
    pub retry_delay_ms: u64,

    pub backoff_strategy: BackoffStrategy,

    pub admin_policy: AdminPolicy,

    /// Pause between consecutive tests. Introduced in schema version 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inter_test_delay_ms: Option<u64>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            default_retry_count: 0,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            backoff_strategy: BackoffStrategy::None,
            admin_policy: AdminPolicy::Skip,
            inter_test_delay_ms: Some(0),
        }
    }
}

impl RunSettings {
    /// Base retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Inter-test pause; zero when the profile predates the field.
    pub fn inter_test_delay(&self) -> Duration {
        Duration::from_millis(self.inter_test_delay_ms.unwrap_or(0))
    }
}

/// One test to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    /// Unique within the owning profile.
    pub id: String,

    /// Selects the Test Unit implementation that handles this definition.
    #[serde(rename = "type")]
    pub test_type: String,

    pub display_name: String,

    /// Opaque, test-kind-specific payload.
    #[serde(default)]
    pub parameters: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,

    #[serde(default)]
    pub requires_admin: bool,

    /// Declared predecessors. Introduced in schema version 3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
}

impl TestDefinition {
    /// Create a definition with no overrides and an empty predecessor list.
    pub fn new(
        id: impl Into<String>,
        test_type: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            test_type: test_type.into(),
            display_name: display_name.into(),
            parameters: Map::new(),
            timeout_ms: None,
            retry_count: None,
            requires_admin: false,
            depends_on: Some(Vec::new()),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn requiring_admin(mut self) -> Self {
        self.requires_admin = true;
        self
    }

    pub fn with_depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Predecessor IDs; empty for definitions that predate dependency support.
    pub fn depends_on(&self) -> &[String] {
        self.depends_on.as_deref().unwrap_or(&[])
    }

    /// Retries after the first attempt, honouring the per-test override.
    pub fn effective_retry_count(&self, settings: &RunSettings) -> u32 {
        self.retry_count.unwrap_or(settings.default_retry_count)
    }

    /// Per-attempt timeout, honouring the per-test override.
    pub fn effective_timeout(&self, settings: &RunSettings) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(settings.default_timeout_ms))
    }
}

/// Root configuration: a named, versioned collection of test definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// GUID-shaped identifier.
    pub id: String,

    pub name: String,

    /// Structural generation; advanced only by migrators.
    pub schema_version: u32,

    /// Declaration order is execution order.
    #[serde(default)]
    pub tests: Vec<TestDefinition>,

    #[serde(default)]
    pub run_settings: RunSettings,

    /// Hex SHA-256 over the profile's canonical JSON with this field removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Profile {
    /// Create an empty profile at the given schema version.
    pub fn new(id: impl Into<String>, name: impl Into<String>, schema_version: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            schema_version,
            tests: Vec::new(),
            run_settings: RunSettings::default(),
            signature: None,
        }
    }

    pub fn with_test(mut self, test: TestDefinition) -> Self {
        self.tests.push(test);
        self
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.run_settings = settings;
        self
    }

    /// Look up a test definition by ID.
    pub fn find_test(&self, id: &str) -> Option<&TestDefinition> {
        self.tests.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delays() {
        let base = Duration::from_millis(100);
        assert_eq!(BackoffStrategy::None.delay(base, 3), base);
        assert_eq!(
            BackoffStrategy::Linear.delay(base, 2),
            Duration::from_millis(300)
        );
        assert_eq!(
            BackoffStrategy::Exponential.delay(base, 0),
            Duration::from_millis(100)
        );
        assert_eq!(
            BackoffStrategy::Exponential.delay(base, 3),
            Duration::from_millis(800)
        );
    }

    #[test]
    fn test_exponential_backoff_saturates() {
        let d = BackoffStrategy::Exponential.delay(Duration::from_secs(1), 200);
        assert!(d >= Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_effective_overrides() {
        let settings = RunSettings {
            default_retry_count: 2,
            default_timeout_ms: 5_000,
            ..RunSettings::default()
        };
        let plain = TestDefinition::new("a", "command", "A");
        assert_eq!(plain.effective_retry_count(&settings), 2);
        assert_eq!(plain.effective_timeout(&settings), Duration::from_secs(5));

        let overridden = plain.with_retry_count(0).with_timeout_ms(250);
        assert_eq!(overridden.effective_retry_count(&settings), 0);
        assert_eq!(
            overridden.effective_timeout(&settings),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_profile_wire_format_is_camel_case() {
        let profile = Profile::new("p", "Profile", 3)
            .with_test(TestDefinition::new("t1", "command", "First").with_retry_count(1));
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["schemaVersion"], 3);
        assert_eq!(json["tests"][0]["type"], "command");
        assert_eq!(json["tests"][0]["displayName"], "First");
        assert_eq!(json["tests"][0]["retryCount"], 1);
        assert_eq!(json["tests"][0]["dependsOn"], serde_json::json!([]));
        assert_eq!(json["runSettings"]["backoffStrategy"], "none");
        assert!(json.get("signature").is_none());
    }

    #[test]
    fn test_version_one_profile_has_no_introduced_fields() {
        let raw = serde_json::json!({
            "id": "p",
            "name": "Legacy",
            "schemaVersion": 1,
            "tests": [{ "id": "a", "type": "command", "displayName": "A" }],
            "runSettings": { "retryDelayMs": 50 }
        });
        let profile: Profile = serde_json::from_value(raw).unwrap();
        assert!(profile.tests[0].depends_on.is_none());
        assert!(profile.run_settings.inter_test_delay_ms.is_none());
        assert_eq!(profile.run_settings.retry_delay_ms, 50);
        assert_eq!(profile.run_settings.default_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(profile.tests[0].depends_on().is_empty());
    }
}
