//! Log subscriber setup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Result, RunnerError};

/// Filter directive for a verbosity level.
///
/// `0` honours `RUST_LOG` and falls back to `info`; each `-v` raises the
/// level for this program's crates and overrides `RUST_LOG`.
pub fn filter_directive(verbosity: u8) -> Option<String> {
    let level = match verbosity {
        0 => return None,
        1 => "debug",
        _ => "trace",
    };
    Some(format!(
        "homectl={level},homectl_runner={level},homectl_protocol={level}",
        level = level
    ))
}

/// Install the global subscriber, writing to stderr.
pub fn init_logging(verbosity: u8) -> Result<()> {
    let filter = match filter_directive(verbosity) {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 2)
                .with_file(verbosity >= 2)
                .with_line_number(verbosity >= 2),
        )
        .try_init()
        .map_err(|e| RunnerError::Logging(e.to_string()))
}
