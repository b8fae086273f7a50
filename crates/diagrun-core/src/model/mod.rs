//! Data model for diagnostic profiles and run output.
//!
//! Canonical definitions for the core entities:
//! - `Profile`: versioned collection of test definitions plus run defaults
//! - `TestDefinition`: one check to perform
//! - `TestResult`: outcome of one test's attempt sequence
//! - `RunReport`: aggregate record of one profile execution
//!
//! Everything serialises as camelCase JSON, which is the persisted profile format.

pub mod context;
pub mod profile;
pub mod report;
pub mod result;

pub use context::{Credentials, ExecutionContext};
pub use profile::{AdminPolicy, BackoffStrategy, Profile, RunSettings, TestDefinition};
pub use report::{EnvironmentSnapshot, RunReport, RunSummary};
pub use result::{ErrorCategory, TestError, TestResult, TestStatus};
