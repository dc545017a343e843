//! Tracing subscriber setup for the command-line front end.

use {
    anyhow::{Context, Result},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, prelude::*},
};

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "info";

/// Installs a global fmt subscriber writing to stderr.
///
/// Verbosity comes from `RUST_LOG`, falling back to `info`. Log lines go to
/// stderr so JSON output on stdout stays machine-readable.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    debug!("Logging initialized");
    Ok(())
}
