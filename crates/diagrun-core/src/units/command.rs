//! Runs an external program and passes when it exits with the expected code.
//!
//! Parameters:
//! - `program` (string, required)
//! - `args` (array of strings, optional)
//! - `expectedExitCode` (integer, optional, default `0`)

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::model::{ErrorCategory, ExecutionContext, TestDefinition, TestError, TestResult};
use crate::registry::TestUnit;

/// Type tag the command unit is registered under.
pub const COMMAND_TYPE: &str = "command";

/// Spawns `program` with `args`; the exit code decides pass/fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandUnit;

struct Invocation {
    program: String,
    args: Vec<String>,
    expected_exit_code: i64,
}

impl Invocation {
    fn from_definition(definition: &TestDefinition) -> Result<Self, String> {
        let params = &definition.parameters;
        let program = match params.get("program") {
            Some(Value::String(p)) if !p.trim().is_empty() => p.clone(),
            Some(_) => return Err("parameter 'program' must be a non-empty string".to_string()),
            None => return Err("missing required parameter 'program'".to_string()),
        };
        let args = match params.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| "parameter 'args' must contain only strings".to_string())
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err("parameter 'args' must be an array of strings".to_string()),
        };
        let expected_exit_code = match params.get("expectedExitCode") {
            None => 0,
            Some(v) => v
                .as_i64()
                .ok_or_else(|| "parameter 'expectedExitCode' must be an integer".to_string())?,
        };
        Ok(Self {
            program,
            args,
            expected_exit_code,
        })
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl TestUnit for CommandUnit {
    async fn execute(
        &self,
        definition: &TestDefinition,
        _context: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> anyhow::Result<TestResult> {
        let invocation = match Invocation::from_definition(definition) {
            Ok(inv) => inv,
            Err(message) => {
                return Ok(TestResult::failed(
                    definition,
                    TestError::new(ErrorCategory::Validation, message),
                ))
            }
        };

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                let error = TestError::new(
                    ErrorCategory::Configuration,
                    format!("could not start '{}'", invocation.program),
                )
                .with_cause(TestError::new(ErrorCategory::Unknown, e.to_string()));
                return Ok(TestResult::failed(definition, error)
                    .with_technical_summary(invocation.command_line()));
            }
        };

        // Dropping the wait future kills the child.
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => anyhow::bail!("'{}' cancelled", definition.id),
            output = child.wait_with_output() => output?,
        };

        let exit_code = output.status.code();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let passed = exit_code.map(i64::from) == Some(invocation.expected_exit_code);
        let result = if passed {
            TestResult::passed(
                definition,
                format!("'{}' exited with {}", invocation.program, invocation.expected_exit_code),
            )
        } else {
            let code = exit_code.map_or_else(|| "a signal".to_string(), |c| c.to_string());
            TestResult::failed(
                definition,
                TestError::new(
                    ErrorCategory::Unknown,
                    format!(
                        "'{}' exited with {code}, expected {}",
                        invocation.program, invocation.expected_exit_code
                    ),
                ),
            )
        };

        Ok(result
            .with_evidence("exitCode", json!(exit_code))
            .with_evidence("stdout", Value::String(stdout))
            .with_evidence("stderr", Value::String(stderr))
            .with_technical_summary(invocation.command_line()))
    }
}
