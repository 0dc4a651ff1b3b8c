#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/shuttle-migrate/shuttle/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod config;
pub use config::{DEFAULT_IDEMPOTENCE_SIGNAL, ReplayConfig, ReplayConfigBuilder};

mod stream;
pub use stream::{
    EncodedBatch, MigrationStream, StreamKind, UnknownStream, stream_for, verify_destination_abi,
};

mod driver;
pub use driver::ReplayDriver;

mod report;
pub use report::ReplayReport;

mod error;
pub use error::ReplayError;
