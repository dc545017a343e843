//! Operational error context propagation with `anyhow`.
//!
//! This module provides extension traits and utilities for enhancing
//! error context and centralized error reporting.

use std::{error::Error as StdError, fmt::Display};

use {
    anyhow::{Context, Error, Result as AnyhowResult},
    tracing::{debug, error, warn},
};

use crate::error::domain::ScanError;

/// Extension trait for enhanced error context.
///
/// This trait provides methods to add contextual information to errors,
/// making debugging and user feedback more informative.
pub trait ResultExt<T, E> {
    /// Adds context to an error with a static string.
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;

    /// Adds context to an error with a formatted string.
    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(context)
    }

    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(format.to_string())
    }
}

/// Centralized error reporting for the command-line front end.
pub struct ErrorReporter;

impl ErrorReporter {
    /// Logs a failure that aborted a scan.
    pub fn scan_failed(error: &Error, scan: &str) {
        error!(scan = scan, error = %error, "Scan failed");
    }

    /// Logs a recoverable problem, such as a watch that could not be set up.
    pub fn recoverable(error: &Error, context: &str) {
        warn!(context = context, error = %error, "Continuing after error");
    }

    /// Logs the full cause chain at debug level.
    pub fn chain(error: &Error) {
        for (depth, cause) in error.chain().enumerate() {
            debug!(depth = depth, cause = %cause, "Error cause");
        }
    }

    /// Converts an error to a user-friendly message.
    ///
    /// Known scan errors anywhere in the chain are mapped to short
    /// explanations; anything else falls back to the top-level message.
    pub fn to_user_message(error: &Error) -> String {
        for cause in error.chain() {
            if let Some(scan_error) = cause.downcast_ref::<ScanError>() {
                match scan_error {
                    ScanError::EmptyFileList => {
                        return "No files were given to scan.".to_string();
                    }
                    ScanError::Rejected { scan, reason } => {
                        return format!("{scan} could not finish: {reason}");
                    }
                    _ => {}
                }
            }
        }
        error.to_string()
    }
}
