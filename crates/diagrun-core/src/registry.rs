//! Test Unit contract and the type-tag registry.
//!
//! A [`TestUnit`] performs the check described by a [`TestDefinition`]. The
//! [`TestUnitRegistry`] maps a definition's type tag to its implementation;
//! it is built once at startup and shared read-only by every run.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::RegistryError;
use crate::model::{ExecutionContext, TestDefinition, TestResult};

/// The executable capability behind a test type tag.
///
/// Ordinary failures are `Ok` results with status `fail` and a populated
/// error. `Err` is reserved for faults (programming errors, broken
/// invariants) and aborts the whole run. Implementations must return
/// promptly once `cancel` fires.
#[async_trait]
pub trait TestUnit: Send + Sync {
    async fn execute(
        &self,
        definition: &TestDefinition,
        context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<TestResult>;
}

/// Registry mapping type tags to Test Unit implementations.
#[derive(Clone, Default)]
pub struct TestUnitRegistry {
    units: HashMap<String, Arc<dyn TestUnit>>,
}

impl TestUnitRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `unit` under `type_tag`. Each tag may be claimed once.
    pub fn register(
        &mut self,
        type_tag: impl Into<String>,
        unit: Arc<dyn TestUnit>,
    ) -> Result<(), RegistryError> {
        let type_tag = type_tag.into();
        if type_tag.trim().is_empty() {
            return Err(RegistryError::EmptyTypeTag);
        }
        if self.units.contains_key(&type_tag) {
            return Err(RegistryError::Duplicate(type_tag));
        }
        self.units.insert(type_tag, unit);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_unit(
        mut self,
        type_tag: impl Into<String>,
        unit: Arc<dyn TestUnit>,
    ) -> Result<Self, RegistryError> {
        self.register(type_tag, unit)?;
        Ok(self)
    }

    pub fn get(&self, type_tag: &str) -> Option<&Arc<dyn TestUnit>> {
        self.units.get(type_tag)
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.units.contains_key(type_tag)
    }

    /// Registered tags, sorted.
    pub fn type_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.units.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl std::fmt::Debug for TestUnitRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestUnitRegistry")
            .field("types", &self.type_tags())
            .finish()
    }
}
