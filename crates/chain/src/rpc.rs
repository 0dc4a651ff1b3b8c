//! Provider backed chain access.

use std::{fmt, sync::Arc, time::Duration};

use alloy::{
    eips::BlockId,
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256},
    providers::Provider,
    rpc::types::{Filter, Log, TransactionRequest},
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    ChainError, ChainReader, ChainWriter, GasParams, LogQuery, NonceTracker, RawLog, Retryable,
    TxHandle, TxReceipt,
};

/// Default receipt polling interval.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// [`ChainReader`] and [`ChainWriter`] over an alloy [`Provider`].
///
/// Reads are always pinned to an explicit block. Writes require a sender, set with
/// [`with_sender`](Self::with_sender); the provider must carry the matching wallet. Nonces
/// are assigned explicitly from a [`NonceTracker`] so every retry goes out with a fresh one.
pub struct RpcChain<P> {
    provider: Arc<P>,
    nonces: Option<NonceTracker<P>>,
    receipt_poll_interval: Duration,
}

impl<P> RpcChain<P>
where
    P: Provider + Send + Sync,
{
    /// Creates a read-only chain handle.
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            nonces: None,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        }
    }

    /// Enables transaction submission from `sender`.
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.nonces = Some(NonceTracker::new(Arc::clone(&self.provider), sender));
        self
    }

    /// Sets the receipt polling interval.
    pub const fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    /// Returns the submitting address, if any.
    pub fn sender(&self) -> Option<Address> {
        self.nonces.as_ref().map(NonceTracker::address)
    }

    /// Checks `handle` once. Returns `Ok(None)` while it is unmined or short of
    /// `confirmations`.
    async fn poll_receipt(
        &self,
        handle: &TxHandle,
        confirmations: u64,
    ) -> Result<Option<TxReceipt>, ChainError> {
        let Some(receipt) =
            self.provider.get_transaction_receipt(handle.hash).await.map_err(rpc_error)?
        else {
            return Ok(None);
        };
        let block_number = receipt
            .block_number
            .ok_or_else(|| ChainError::Rpc("Receipt missing block number".to_string()))?;
        if !receipt.status() {
            return Err(self.revert_reason(handle, block_number).await);
        }
        // Inclusion counts as the first confirmation.
        let head = self.provider.get_block_number().await.map_err(rpc_error)?;
        if head.saturating_sub(block_number) + 1 < confirmations {
            return Ok(None);
        }
        Ok(Some(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number,
            gas_used: receipt.gas_used,
        }))
    }

    /// Re-runs a failed transaction as a call to recover its revert reason.
    async fn revert_reason(&self, handle: &TxHandle, block: u64) -> ChainError {
        let replay = self.call(handle.to, handle.calldata.clone(), block.saturating_sub(1)).await;
        match replay {
            Err(err @ ChainError::Reverted { .. }) => err,
            _ => ChainError::Reverted { reason: None },
        }
    }
}

impl<P> fmt::Debug for RpcChain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChain")
            .field("nonces", &self.nonces)
            .field("receipt_poll_interval", &self.receipt_poll_interval)
            .finish_non_exhaustive()
    }
}

fn rpc_error(e: impl fmt::Display) -> ChainError {
    ChainError::from_rpc_error(&e.to_string())
}

/// Converts a provider log, rejecting removed and pending logs.
fn convert_log(log: Log) -> Result<Option<RawLog>, ChainError> {
    if log.removed {
        return Ok(None);
    }
    let missing = |field: &str| ChainError::Decode(format!("log is missing {field}"));
    Ok(Some(RawLog {
        block_number: log.block_number.ok_or_else(|| missing("block number"))?,
        log_index: log.log_index.ok_or_else(|| missing("log index"))?,
        transaction_hash: log.transaction_hash.ok_or_else(|| missing("transaction hash"))?,
        address: log.inner.address,
        topics: log.inner.data.topics().to_vec(),
        data: log.inner.data.data,
    }))
}

#[async_trait]
impl<P> ChainReader for RpcChain<P>
where
    P: Provider + Send + Sync,
{
    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, ChainError> {
        let filter = Filter::new()
            .address(query.address)
            .event_signature(query.topic0)
            .from_block(query.from_block)
            .to_block(query.to_block);
        let logs = self.provider.get_logs(&filter).await.map_err(rpc_error)?;

        let mut out = Vec::with_capacity(logs.len());
        for log in logs {
            if let Some(raw) = convert_log(log)? {
                out.push(raw);
            }
        }
        out.sort_by_key(RawLog::position);
        Ok(out)
    }

    async fn call(&self, to: Address, calldata: Bytes, block: u64) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::default().with_to(to).with_input(calldata);
        self.provider.call(tx).block(BlockId::number(block)).await.map_err(rpc_error)
    }

    async fn get_storage_at(
        &self,
        address: Address,
        slot: U256,
        block: u64,
    ) -> Result<U256, ChainError> {
        self.provider
            .get_storage_at(address, slot)
            .block_id(BlockId::number(block))
            .await
            .map_err(rpc_error)
    }
}

#[async_trait]
impl<P> ChainWriter for RpcChain<P>
where
    P: Provider + Send + Sync,
{
    async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
        gas: &GasParams,
    ) -> Result<TxHandle, ChainError> {
        let nonces = self.nonces.as_ref().ok_or(ChainError::ReadOnly)?;
        let nonce = nonces.next_nonce().await?;

        let mut tx = TransactionRequest::default()
            .with_from(nonces.address())
            .with_to(to)
            .with_input(calldata.clone())
            .with_nonce(nonce);
        if let Some(limit) = gas.gas_limit {
            tx.set_gas_limit(limit);
        }
        if let Some(fee) = gas.max_fee_per_gas {
            tx.set_max_fee_per_gas(fee);
        }
        if let Some(tip) = gas.max_priority_fee_per_gas {
            tx.set_max_priority_fee_per_gas(tip);
        }

        match self.provider.send_transaction(tx).await {
            Ok(pending) => {
                let hash = *pending.tx_hash();
                debug!(%hash, nonce, %to, "Transaction broadcast");
                Ok(TxHandle { hash, nonce, to, calldata })
            }
            Err(e) => {
                nonces.invalidate().await;
                let err = rpc_error(e);
                warn!(nonce, error = %err, "Transaction submission failed");
                Err(err)
            }
        }
    }

    async fn wait_for_confirmation(
        &self,
        handle: &TxHandle,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError> {
        let poll = async {
            let mut failures = 0u32;
            loop {
                match self.poll_receipt(handle, confirmations).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => {}
                    Err(err) if err.is_retryable() => {
                        failures += 1;
                        warn!(
                            tx = %handle.hash,
                            failures,
                            error = %err,
                            "Receipt poll failed, polling again"
                        );
                    }
                    Err(err) => return Err(err),
                }
                tokio::time::sleep(self.receipt_poll_interval).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                // The transaction may have been dropped, leaving a gap at its nonce.
                if let Some(nonces) = &self.nonces {
                    nonces.invalidate().await;
                }
                warn!(
                    tx = %handle.hash,
                    nonce = handle.nonce,
                    ?timeout,
                    "Confirmation deadline passed"
                );
                Err(ChainError::ConfirmationTimeout(handle.hash))
            }
        }
    }
}
