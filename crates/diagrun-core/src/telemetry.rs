//! Process-wide log subscriber for diagrun binaries.
//!
//! Output goes to stderr so stdout stays reserved for result lines and
//! migrated profiles. `RUST_LOG` overrides the computed filter entirely.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Crate targets that follow the requested verbosity. Everything else is
/// held at `warn`.
const OWN_TARGETS: [&str; 2] = ["diagrun_core", "diagrun"];

/// Shape of emitted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// Newline-delimited JSON, one object per event.
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Filter directive used when `RUST_LOG` is absent.
pub fn default_directive(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(OWN_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

/// Install the global subscriber. Only the first call in a process wins;
/// later calls are ignored.
pub fn init_tracing(format: LogFormat, level: Level) {
    let base = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let layer = match format {
        LogFormat::Pretty => base.boxed(),
        LogFormat::Json => base.json().with_current_span(true).boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(layer.with_filter(build_filter(level)))
        .try_init();
}
