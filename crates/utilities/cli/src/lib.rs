#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/shuttle-migrate/shuttle/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

/// CLI argument parsing.
///
/// The [`Cli`] struct carries the global options and one [`Command`] per pipeline stage.
/// Subcommand arguments convert into the library configs they drive.
mod cli;
pub use cli::{Cli, Command, MigrateArgs, SnapshotArgs, ValidateArgs};

/// Tracing initialization utilities.
///
/// The [`init_tracing`] function configures the tracing subscriber with a verbosity-based
/// log level and respects the `RUST_LOG` environment variable.
mod tracing_init;
pub use crate::tracing_init::{init_tracing, level_for};

/// Ctrl+C handling.
///
/// The [`shutdown_token`] function returns a token that is cancelled on the first Ctrl+C.
mod ctrlc;
pub use crate::ctrlc::shutdown_token;
