//! Error handling using `thiserror` and `anyhow`.
//!
//! This module provides the domain error type for scans and operational
//! error context propagation for the command-line front end.

pub mod domain;
pub mod operational;

pub use {
    domain::ScanError,
    operational::{ErrorReporter, ResultExt},
};
