//! Nonce tracking for the migration signer.

use std::{fmt, sync::Arc};

use alloy::{primitives::Address, providers::Provider};
use tokio::sync::RwLock;

use crate::ChainError;

/// Thread-safe nonce tracker.
///
/// Caches the signer's next nonce and only consults the chain on first use or after a
/// [`reset`](Self::reset). Counts are taken against the pending block so transactions still
/// in the mempool are not reused.
pub struct NonceTracker<P> {
    provider: Arc<P>,
    address: Address,
    /// `None` means the nonce must be refetched.
    nonce: RwLock<Option<u64>>,
}

impl<P> NonceTracker<P>
where
    P: Provider + Send + Sync,
{
    /// Creates a tracker for `address`. The nonce is fetched lazily.
    pub fn new(provider: Arc<P>, address: Address) -> Self {
        Self { provider, address, nonce: RwLock::new(None) }
    }

    /// Returns the next nonce and increments the internal counter.
    pub async fn next_nonce(&self) -> Result<u64, ChainError> {
        let mut nonce = self.nonce.write().await;

        let current = match *nonce {
            Some(n) => n,
            None => self.fetch().await?,
        };
        *nonce = Some(current + 1);

        Ok(current)
    }

    /// Drops the cached value so the next call refetches from the chain.
    ///
    /// Called after a failed submission or a missed confirmation deadline, when the nonce
    /// handed out may not be pending anywhere.
    pub async fn invalidate(&self) {
        *self.nonce.write().await = None;
    }

    /// Resyncs the cached nonce with the chain immediately.
    pub async fn reset(&self) -> Result<(), ChainError> {
        let chain_nonce = self.fetch().await?;
        *self.nonce.write().await = Some(chain_nonce);
        Ok(())
    }

    /// Returns the current cached nonce without incrementing it.
    pub async fn current(&self) -> Option<u64> {
        *self.nonce.read().await
    }

    /// Returns the address being tracked.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    async fn fetch(&self) -> Result<u64, ChainError> {
        self.provider
            .get_transaction_count(self.address)
            .pending()
            .await
            .map_err(|e| ChainError::from_rpc_error(&format!("failed to fetch nonce: {e}")))
    }
}

impl<P> fmt::Debug for NonceTracker<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceTracker")
            .field("address", &self.address)
            .field("nonce", &"<locked>")
            .finish()
    }
}
