//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Result, StepGraphError};

/// Filter used when neither `debug` nor `RUST_LOG` says otherwise.
pub const DEFAULT_FILTER: &str = "stepgraph=info";

/// Filter used with `debug`.
pub const DEBUG_FILTER: &str = "stepgraph=debug";

/// Initialize the global tracing subscriber.
///
/// Log level is controlled by:
/// 1. `debug` sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(debug: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter(debug))
        .try_init()
        .map_err(|e| {
            StepGraphError::Other(anyhow::anyhow!(
                "failed to install tracing subscriber: {}",
                e
            ))
        })
}

fn env_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}
