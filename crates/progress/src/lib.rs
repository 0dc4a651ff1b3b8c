#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/shuttle-migrate/shuttle/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod progress;
pub use progress::MigrationProgress;

mod store;
pub use store::{FileProgressStore, MemoryProgressStore, ProgressStore};

mod lock;
pub use lock::RunLock;

mod audit;
pub use audit::{AuditEvent, AuditLog, AuditRecord};

mod error;
pub use error::ProgressError;
