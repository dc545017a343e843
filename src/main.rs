//! Mediaimport - media import scanning
//!
//! This is the command-line entry point. It loads settings, builds a
//! filesystem-backed scanner and reports progress until the scan settles.

use std::{process::ExitCode, sync::Arc};

use {
    anyhow::{Error, Result},
    clap::Parser,
    serde_json::to_string_pretty,
    tokio::{spawn, sync::broadcast::error::RecvError},
    tracing::{info, warn},
};

use mediaimport::{
    cli::{Cli, Commands},
    config::SettingsManager,
    error::{ErrorReporter, ResultExt, ScanError},
    importer::{
        BroadcastObserver, ChangeNotifier, DefaultMediaScanner, Destination, FileEntry,
        InertChangeNotifier, MediaScanner, NotifyChangeNotifier, ScanDependencies, ScanEvent,
        ScannerConfig,
    },
    logging,
};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init() {
        eprintln!("{e:#}");
    }

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ErrorReporter::chain(&e);
            eprintln!("{}", ErrorReporter::to_user_message(&e));
            // Usage mistakes exit with 2, like argument errors.
            if is_usage_failure(&e) { ExitCode::from(2) } else { ExitCode::FAILURE }
        }
    }
}

fn is_usage_failure(error: &Error) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<ScanError>().is_some_and(ScanError::is_usage_error))
}

async fn run(cli: Cli) -> Result<()> {
    let manager = match &cli.options.config {
        Some(path) => SettingsManager::with_config_path(path.clone()),
        None => SettingsManager::new(),
    }
    .add_context("Failed to load settings")?;
    let settings = cli.options.apply(manager.get_settings().clone());
    settings.validate().add_context("Invalid scan options")?;

    let notifier: Arc<dyn ChangeNotifier> = if cli.options.watch {
        match NotifyChangeNotifier::new() {
            Ok(notifier) => Arc::new(notifier),
            Err(e) => {
                ErrorReporter::recoverable(&Error::new(e), "directory watching disabled");
                Arc::new(InertChangeNotifier::new())
            }
        }
    } else {
        Arc::new(InertChangeNotifier::new())
    };

    let destination = Destination::directory(settings.destination());
    info!("Checking for duplicates at {}", destination);
    let scanner = DefaultMediaScanner::new(
        ScanDependencies::from_settings(&settings, notifier),
        destination,
        Some(ScannerConfig::from(&settings)),
    );

    let observer = BroadcastObserver::new(256);
    let mut receiver = observer.subscribe();
    scanner.add_observer(Arc::new(observer));

    let scan = match cli.command {
        Commands::Scan { directory } => scanner.scan_directory(&directory),
        Commands::Files { paths } => scanner
            .scan_files(paths.into_iter().map(FileEntry::new).collect())
            .add_context("Failed to start scan")?,
    };

    let scan_id = scan.id();
    let progress = spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(notification) if notification.scan_id == scan_id => match notification.event {
                    ScanEvent::Updated => info!(
                        "{} new files, {} bytes",
                        notification.statistics.new_file_count, notification.statistics.size_bytes
                    ),
                    ScanEvent::Invalidated => warn!("A scanned directory changed; results are partial"),
                    ScanEvent::Finalized => break,
                },
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} progress events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let outcome = scan.when_final().await;
    progress.await.add_context("Progress reporter failed")?;
    if let Err(e) = outcome {
        let error = Error::new(e);
        ErrorReporter::scan_failed(&error, scan.name());
        return Err(error);
    }

    let statistics = scan.statistics();
    if cli.options.json {
        println!(
            "{}",
            to_string_pretty(&statistics).add_context("Failed to serialize statistics")?
        );
    } else {
        println!("New files:  {}", statistics.new_file_count);
        for (disposition, count) in &statistics.duplicates {
            println!("{disposition}: {count}");
        }
        println!("Total size: {} bytes", statistics.size_bytes);
        println!("Scan time:  {} ms", statistics.scan_duration.as_millis());
        for entry in scan.file_entries() {
            println!("  {}", entry.path().display());
        }
    }

    if scan.canceled() {
        warn!("{} was canceled before finishing", scan.name());
    }
    Ok(())
}
