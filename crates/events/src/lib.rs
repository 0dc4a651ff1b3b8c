#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/shuttle-migrate/shuttle/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod aggregator;
pub use aggregator::{EventAggregator, fold_latest};

mod config;
pub use config::{EventAggregatorConfig, EventAggregatorConfigBuilder};

mod error;
pub use error::AggregateError;

mod replayed;
pub use replayed::{Replayed, distinct_keys, merge_latest};
