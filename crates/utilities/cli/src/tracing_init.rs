//! Tracing initialization utilities.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Maps a `-v` count to a log level.
///
/// - 0: WARN
/// - 1: INFO
/// - 2: DEBUG
/// - 3+: TRACE
pub const fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialize the tracing subscriber with the given verbosity level.
///
/// The `RUST_LOG` environment variable overrides the level picked by [`level_for`].
///
/// # Examples
///
/// ```no_run
/// use shuttle_cli::init_tracing;
///
/// init_tracing(1);
/// tracing::info!("snapshot started");
/// ```
///
/// # Panics
///
/// This function will panic if a global tracing subscriber has already been set.
/// It should only be called once at the start of the application.
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
