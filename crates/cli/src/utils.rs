use std::future::Future;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Targets the harness logs under.
const TARGETS: &[&str] = &["ledger", "snapshot", "time", "slots", "runner"];

/// Returns the log directives for a `-v` count.
///
/// Without `-v` only warnings are shown, every extra `v` lowers the harness targets by one level.
pub fn directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => return "warn".to_string(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    std::iter::once("warn".to_string())
        .chain(TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initializes the global tracing subscriber. `RUST_LOG`, if set, wins over `verbosity`.
pub fn subscriber(verbosity: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(verbosity)));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Runs `future` to completion on a fresh multi-threaded runtime.
pub fn block_on<F: Future>(future: F) -> eyre::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}
