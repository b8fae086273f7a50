//! Diagrun Core Library
//!
//! Profile lifecycle (load, verify, migrate, validate) and the sequential
//! orchestration engine that runs a profile's tests through pluggable
//! Test Units with bounded retry and cooperative cancellation.

pub mod engine;
pub mod error;
pub mod graph;
pub mod loader;
pub mod migration;
pub mod model;
pub mod obs;
pub mod registry;
pub mod retry;
pub mod signature;
pub mod telemetry;
pub mod units;
pub mod validation;

/// Runner version recorded in every environment snapshot.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use engine::{FixedPrivilege, FnProgress, NoopProgress, Orchestrator, PrivilegeCheck, ProgressSink};

pub use error::{
    EngineError, EngineResult, MigrationError, MigrationResult, ProfileError, ProfileResult,
    RegistryError,
};

pub use graph::DependencyGraph;

pub use loader::{ProfileLoader, ValidatedProfile};

pub use migration::{
    DependsOnMigrator, InterTestDelayMigrator, MigrationPipeline, Migrator, CURRENT_SCHEMA_VERSION,
};

pub use model::{
    AdminPolicy, BackoffStrategy, Credentials, EnvironmentSnapshot, ErrorCategory,
    ExecutionContext, Profile, RunReport, RunSettings, RunSummary, TestDefinition, TestError,
    TestResult, TestStatus,
};

pub use registry::{TestUnit, TestUnitRegistry};

pub use retry::{wait_or_cancel, RetryPolicy};

pub use signature::{compute_signature, sign, verify_signature};

pub use telemetry::{init_tracing, LogFormat};

pub use units::{default_registry, CommandUnit, COMMAND_TYPE};

pub use validation::{ProfileValidator, ValidationIssue, ValidationReport};

// Re-exported so units and embedders share the token type.
pub use tokio_util::sync::CancellationToken;
