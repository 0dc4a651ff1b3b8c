#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/shuttle-migrate/shuttle/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod range;
pub use range::BatchRange;

mod planner;
pub use planner::{BatchPlanner, Batches, plan};

mod error;
pub use error::PlanError;
