//! Timeline Inspector - Main Entry Point
//!
//! Loads a recorded trace and prints range statistics, search matches or
//! frames without a UI.

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use timeline_inspector::{
    cli::{self, Cli},
    config::InspectorConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    // Dropping the guard flushes the log file
    let _log_guard = init_logging(&args)?;

    let config = match &args.config {
        Some(path) => InspectorConfig::load_from(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => InspectorConfig::load_or_default(),
    };

    let output = cli::run(&args.command, args.format, config)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn init_logging(args: &Cli) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let default_filter = if args.verbose {
        "info,timeline_inspector=debug"
    } else {
        "warn"
    };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
    };

    // Logs go to stderr, command output to stdout
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    match &args.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .context("Log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer)
                        .with_filter(filter()),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(stderr_layer).init();
            Ok(None)
        }
    }
}
