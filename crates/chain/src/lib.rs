#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/shuttle-migrate/shuttle/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod contracts;

mod abi;
pub use abi::{AbiError, AbiSchema};

mod error;
pub use error::{ChainError, Retryable};

mod types;
pub use types::{GasParams, LogQuery, RawLog, TxHandle, TxReceipt};

mod traits;
pub use traits::{ChainReader, ChainWriter, call_view};

mod retry;
pub use retry::{RetryPolicy, retry};

mod slots;
pub use slots::{StakingLayout, mapping_slot};

mod nonce;
pub use nonce::NonceTracker;

mod rpc;
pub use rpc::{DEFAULT_RECEIPT_POLL_INTERVAL, RpcChain};

#[cfg(any(test, feature = "test-utils"))]
mod mock;
#[cfg(any(test, feature = "test-utils"))]
pub use mock::{ConfirmOutcome, MockChain, SentTx, TxHandler};

pub use tokio_util::sync::CancellationToken;
