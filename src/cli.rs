//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::settings::{HashStrategy, ImportSettings};

#[derive(Debug, Parser)]
#[command(name = "mediaimport")]
#[command(about = "Find importable photos and videos, separating new files from duplicates", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub options: ScanOptions,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Recursively scan a directory
    Scan {
        /// Directory to scan
        directory: PathBuf,
    },
    /// Scan a fixed list of files
    Files {
        /// Files to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

/// Overrides applied on top of the stored settings.
#[derive(Debug, Clone, Default, Args)]
pub struct ScanOptions {
    /// Import destination checked for existing copies
    #[arg(long, global = true)]
    pub destination: Option<PathBuf>,

    /// Files classified concurrently per batch
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,

    /// How files are fingerprinted
    #[arg(long, global = true, value_enum)]
    pub hash: Option<HashArg>,

    /// Print the final statistics as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Cancel the scan when a scanned directory changes
    #[arg(long, global = true)]
    pub watch: bool,

    /// Settings file to use instead of the XDG location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HashArg {
    Content,
    Metadata,
}

impl From<HashArg> for HashStrategy {
    fn from(arg: HashArg) -> Self {
        match arg {
            HashArg::Content => HashStrategy::Content,
            HashArg::Metadata => HashStrategy::Metadata,
        }
    }
}

impl ScanOptions {
    /// Returns `settings` with command-line overrides applied.
    #[must_use]
    pub fn apply(&self, mut settings: ImportSettings) -> ImportSettings {
        if let Some(destination) = &self.destination {
            settings.destination_directory = Some(destination.clone());
        }
        if let Some(batch_size) = self.batch_size {
            settings.scan_batch_size = usize::try_from(batch_size).unwrap_or(usize::MAX);
        }
        if let Some(hash) = self.hash {
            settings.hash_strategy = hash.into();
        }
        settings
    }
}
