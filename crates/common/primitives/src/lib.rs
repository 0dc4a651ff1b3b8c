#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/shuttle-migrate/shuttle/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod decimal;

mod key;
pub use key::{EntityKey, duplicate_keys, sort_dedup};

mod channel;
pub use channel::{ChannelRecord, ChannelState, ChannelType};

mod delegate;
pub use delegate::DelegateRecord;

mod staker;
pub use staker::StakerRecord;

mod snapshot;
pub use snapshot::{SNAPSHOT_FORMAT_VERSION, Snapshot};

mod error;
pub use error::PrimitiveError;

pub use alloy::primitives::{Address, B256, Bytes, U256};
