#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/shuttle-migrate/shuttle/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod builder;
pub use builder::{SnapshotBuilder, verify_core_abi};

mod config;
pub use config::{SnapshotConfig, SnapshotConfigBuilder};

mod validator;
pub use validator::{Finding, Report, Severity, validate};

pub mod store;
pub use store::LoadedSnapshot;

mod error;
pub use error::SnapshotError;
