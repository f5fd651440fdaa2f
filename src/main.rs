//! `umbra` - unattended camera sequencer for total solar eclipses

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use umbra::cli::args::{Cli, OutputFormat};
use umbra::cli::commands;
use umbra::error::ExitCode;
use umbra::observability::{LogFormat, init_logging, metrics};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(ExitCode::USAGE_ERROR);
        }
        // --help and --version
        Err(e) => e.exit(),
    };

    if !cli.quiet {
        let format = match cli.log_format {
            OutputFormat::Human => LogFormat::Human,
            OutputFormat::Json => LogFormat::Json,
        };
        init_logging(format, cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();
    let signal_code = Arc::new(AtomicI32::new(ExitCode::SUCCESS));

    // First signal stops the loop cleanly, the second one exits at once
    tokio::spawn(watch_signals(cancel.clone(), Arc::clone(&signal_code)));

    let result = commands::dispatch(cli, cancel).await;

    match result {
        Ok(()) => std::process::exit(signal_code.load(Ordering::SeqCst)),
        Err(e) => {
            eprintln!("error: {e}");
            metrics::record_error(e.category());
            std::process::exit(e.exit_code());
        }
    }
}

async fn watch_signals(cancel: CancellationToken, signal_code: Arc<AtomicI32>) {
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(error = %e, "cannot register SIGTERM handler");
                None
            }
        };

    let code = tokio::select! {
        _ = tokio::signal::ctrl_c() => ExitCode::INTERRUPTED,
        Some(()) = recv(&mut sigterm) => ExitCode::TERMINATED,
    };
    signal_code.store(code, Ordering::SeqCst);
    cancel.cancel();

    eprintln!("\nStopping sequence... (press Ctrl+C again to force)");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
        Some(()) = recv(&mut sigterm) => std::process::exit(ExitCode::TERMINATED),
    }
}

async fn recv(signal: &mut Option<tokio::signal::unix::Signal>) -> Option<()> {
    match signal {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}
