//! Chain capability traits.

use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::SolCall,
};
use async_trait::async_trait;

use crate::{ChainError, GasParams, LogQuery, RawLog, TxHandle, TxReceipt};

/// Read access to a chain, pinned to explicit block heights.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Returns the current head block number.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Returns every log matching `query`, in chain order.
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, ChainError>;

    /// Executes a read-only call at `block` and returns the raw return data.
    async fn call(&self, to: Address, calldata: Bytes, block: u64) -> Result<Bytes, ChainError>;

    /// Reads a raw storage slot at `block`.
    async fn get_storage_at(
        &self,
        address: Address,
        slot: U256,
        block: u64,
    ) -> Result<U256, ChainError>;
}

/// Write access to a chain.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Signs and broadcasts a call to `to` with a fresh nonce.
    async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
        gas: &GasParams,
    ) -> Result<TxHandle, ChainError>;

    /// Waits until `handle` has `confirmations` confirmations or `timeout` elapses.
    ///
    /// A mined but failed transaction returns [`ChainError::Reverted`].
    async fn wait_for_confirmation(
        &self,
        handle: &TxHandle,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError>;
}

#[async_trait]
impl<T: ChainReader + ?Sized> ChainReader for Arc<T> {
    async fn block_number(&self) -> Result<u64, ChainError> {
        (**self).block_number().await
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, ChainError> {
        (**self).get_logs(query).await
    }

    async fn call(&self, to: Address, calldata: Bytes, block: u64) -> Result<Bytes, ChainError> {
        (**self).call(to, calldata, block).await
    }

    async fn get_storage_at(
        &self,
        address: Address,
        slot: U256,
        block: u64,
    ) -> Result<U256, ChainError> {
        (**self).get_storage_at(address, slot, block).await
    }
}

#[async_trait]
impl<'a, T: ChainReader + ?Sized + 'a> ChainReader for &'a T {
    async fn block_number(&self) -> Result<u64, ChainError> {
        (**self).block_number().await
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, ChainError> {
        (**self).get_logs(query).await
    }

    async fn call(&self, to: Address, calldata: Bytes, block: u64) -> Result<Bytes, ChainError> {
        (**self).call(to, calldata, block).await
    }

    async fn get_storage_at(
        &self,
        address: Address,
        slot: U256,
        block: u64,
    ) -> Result<U256, ChainError> {
        (**self).get_storage_at(address, slot, block).await
    }
}

#[async_trait]
impl<T: ChainWriter + ?Sized> ChainWriter for Arc<T> {
    async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
        gas: &GasParams,
    ) -> Result<TxHandle, ChainError> {
        (**self).send_transaction(to, calldata, gas).await
    }

    async fn wait_for_confirmation(
        &self,
        handle: &TxHandle,
        confirmations: u64,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError> {
        (**self).wait_for_confirmation(handle, confirmations, timeout).await
    }
}

/// Executes a typed view call at `block` and decodes its return value.
pub async fn call_view<R, C>(
    reader: &R,
    to: Address,
    call: &C,
    block: u64,
) -> Result<C::Return, ChainError>
where
    R: ChainReader + ?Sized,
    C: SolCall + Sync,
{
    let output = reader.call(to, Bytes::from(call.abi_encode()), block).await?;
    C::abi_decode_returns(&output)
        .map_err(|e| ChainError::Decode(format!("{} returned malformed data: {e}", C::SIGNATURE)))
}
