//! Diagrun - diagnostic profile runner CLI
//!
//! ## Commands
//!
//! - `validate`: Load a profile and report every validation issue
//! - `migrate`: Upgrade a profile to the current schema version
//! - `run`: Execute a profile and stream results as they finish

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use diagrun_core::{
    default_registry, init_tracing, sign, Credentials, ExecutionContext, LogFormat, Orchestrator,
    PrivilegeCheck, ProfileError, ProfileLoader, RunReport, TestResult, TestStatus,
};

#[derive(Parser)]
#[command(name = "diagrun")]
#[command(author = "Diagrun Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run versioned diagnostic test profiles", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a profile and report whether it can run
    Validate {
        /// Path to profile file (JSON)
        file: PathBuf,
    },

    /// Upgrade a profile to the current schema version
    Migrate {
        /// Path to profile file (JSON)
        file: PathBuf,

        /// Overwrite the file instead of printing to stdout
        #[arg(short, long)]
        write: bool,
    },

    /// Execute every test in a profile
    Run {
        /// Path to profile file (JSON)
        file: PathBuf,

        /// Treat the process as elevated even when it is not running as root
        #[arg(long, env = "DIAGRUN_ASSUME_ELEVATED")]
        assume_elevated: bool,

        /// Username handed to test units
        #[arg(long, env = "DIAGRUN_USER")]
        user: Option<String>,

        /// Password handed to test units
        #[arg(long, env = "DIAGRUN_PASSWORD", hide_env_values = true, requires = "user")]
        password: Option<String>,

        /// Write the full run report (JSON) to this path
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(LogFormat::from_json_flag(cli.json), level);

    match cli.command {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Migrate { file, write } => cmd_migrate(&file, write),
        Commands::Run {
            file,
            assume_elevated,
            user,
            password,
            report,
        } => {
            let context = build_context(user, password);
            cmd_run(&file, assume_elevated, context, report.as_deref()).await
        }
    }
}

fn cmd_validate(file: &Path) -> Result<()> {
    match ProfileLoader::new().load_path(file) {
        Ok(profile) => {
            println!(
                "✓ {} ({}) is valid: {} tests, schema v{}",
                profile.name,
                profile.id,
                profile.tests.len(),
                profile.schema_version
            );
            Ok(())
        }
        Err(ProfileError::Invalid { issues }) => {
            println!("✗ {} has {} issue(s):", file.display(), issues.len());
            for issue in &issues {
                println!("  - {}", issue);
            }
            bail!("profile validation failed")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", file.display())),
    }
}

fn cmd_migrate(file: &Path, write: bool) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let loader = ProfileLoader::new();
    let original_version = loader
        .parse(&json)
        .with_context(|| format!("Failed to parse {}", file.display()))?
        .schema_version;
    let mut profile = loader
        .migrate_str(&json)
        .with_context(|| format!("Failed to migrate {}", file.display()))?;

    if profile.signature.is_some() {
        sign(&mut profile)?;
    }
    let rendered = serde_json::to_string_pretty(&profile)?;

    if write {
        std::fs::write(file, format!("{rendered}\n"))
            .with_context(|| format!("Failed to write {}", file.display()))?;
        info!(
            path = %file.display(),
            from = original_version,
            to = profile.schema_version,
            "profile migrated"
        );
        println!(
            "✓ {} migrated v{} -> v{}",
            file.display(),
            original_version,
            profile.schema_version
        );
    } else {
        println!("{rendered}");
    }
    Ok(())
}

/// Elevation as reported by the OS; `--assume-elevated` can only force it on.
struct ProcessPrivilege {
    assume_elevated: bool,
}

impl ProcessPrivilege {
    fn resolve(assume_elevated: bool, process_elevated: bool) -> bool {
        assume_elevated || process_elevated
    }
}

impl PrivilegeCheck for ProcessPrivilege {
    fn is_elevated(&self) -> bool {
        Self::resolve(self.assume_elevated, process_is_elevated())
    }
}

#[cfg(unix)]
fn process_is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn process_is_elevated() -> bool {
    false
}

fn build_context(user: Option<String>, password: Option<String>) -> ExecutionContext {
    match user {
        Some(username) => ExecutionContext::with_credentials(Credentials::UsernamePassword {
            username,
            password: password.unwrap_or_default(),
        }),
        None => ExecutionContext::new(),
    }
}

async fn cmd_run(
    file: &Path,
    assume_elevated: bool,
    context: ExecutionContext,
    report_path: Option<&Path>,
) -> Result<()> {
    let profile = ProfileLoader::new()
        .load_path(file)
        .with_context(|| format!("Failed to load {}", file.display()))?;
    let registry = default_registry().context("Failed to build test unit registry")?;
    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        Arc::new(ProcessPrivilege { assume_elevated }),
    );

    println!("Running {} ({} tests)", profile.name, profile.tests.len());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<TestResult>();
    let printer = tokio::spawn(async move {
        while let Some(result) = rx.recv().await {
            println!("{}", format_result_line(&result));
        }
    });

    let outcome = orchestrator.run(&profile, &context, &tx, &cancel).await;
    drop(tx);
    printer.await.context("progress printer panicked")?;

    let report = outcome.context("Run aborted")?;
    print_summary(&report);

    if let Some(path) = report_path {
        let rendered = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if !report.succeeded() {
        bail!("{} of {} tests failed", report.summary.failed, report.summary.total);
    }
    Ok(())
}

fn format_result_line(result: &TestResult) -> String {
    let mark = match result.status {
        TestStatus::Pass => "✓",
        TestStatus::Fail => "✗",
        TestStatus::Skipped => "-",
    };
    let mut line = format!(
        "{} {} [{}] {} ({} ms",
        mark, result.display_name, result.test_id, result.summary, result.duration_ms
    );
    if result.attempts > 1 {
        line.push_str(&format!(", {} attempts", result.attempts));
    }
    line.push(')');
    line
}

fn print_summary(report: &RunReport) {
    let s = &report.summary;
    println!();
    println!("Run {}", report.run_id);
    println!(
        "  {} passed, {} failed, {} skipped of {} ({:.1}%) in {} ms",
        s.passed, s.failed, s.skipped, s.total, s.pass_rate, report.duration_ms
    );
}
