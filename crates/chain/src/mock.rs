//! In-memory chain for tests.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy::{
    primitives::{Address, B256, Bytes, U256, keccak256},
    sol_types::{SolCall, SolEvent},
};
use async_trait::async_trait;

use crate::{ChainError, ChainReader, ChainWriter, GasParams, LogQuery, RawLog, TxHandle, TxReceipt};

/// Contract-side handler run against every confirmed transaction.
///
/// Returning `Err(reason)` makes the transaction revert with `reason`.
pub type TxHandler = Arc<dyn Fn(Address, &Bytes) -> Result<(), String> + Send + Sync>;

/// Scripted result of a [`ChainWriter::wait_for_confirmation`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Run the handler and confirm (or revert) accordingly.
    Apply,
    /// Time out without applying the transaction.
    Timeout,
    /// Apply the transaction but report a timeout, as when a receipt arrives late.
    TimeoutButApplied,
    /// Never resolve.
    Hang,
}

/// A transaction seen by [`MockChain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
    /// Call target.
    pub to: Address,
    /// Calldata.
    pub calldata: Bytes,
    /// Assigned nonce.
    pub nonce: u64,
    /// Transaction hash.
    pub hash: B256,
}

#[derive(Default)]
struct MockState {
    head: u64,
    logs: Vec<RawLog>,
    calls: HashMap<(Address, Bytes), Result<Bytes, ChainError>>,
    storage: HashMap<(Address, U256), U256>,
    read_failures: VecDeque<ChainError>,
    log_queries: usize,
    truncate_log_query: Option<usize>,
    next_nonce: u64,
    sent: Vec<SentTx>,
    applied: Vec<SentTx>,
    send_failures: VecDeque<ChainError>,
    confirm_script: VecDeque<ConfirmOutcome>,
    handler: Option<TxHandler>,
}

/// A scriptable in-memory [`ChainReader`] and [`ChainWriter`].
///
/// Clones share state, so a test can keep a handle for inspection while the code under test
/// owns another.
#[derive(Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    read_delay: Option<Duration>,
}

impl fmt::Debug for MockChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockChain")
            .field("head", &state.head)
            .field("logs", &state.logs.len())
            .field("sent", &state.sent.len())
            .finish_non_exhaustive()
    }
}

impl MockChain {
    /// Creates an empty chain with head at block 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read sleep for `delay`, so concurrent reads overlap.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sets the head block.
    pub fn set_head(&self, head: u64) {
        self.lock().head = head;
    }

    /// Records `event` as emitted by `address` at `(block, log_index)`.
    pub fn emit<E: SolEvent>(&self, address: Address, event: &E, block: u64, log_index: u64) {
        let data = event.encode_log_data();
        let mut id = [0u8; 16];
        id[..8].copy_from_slice(&block.to_be_bytes());
        id[8..].copy_from_slice(&log_index.to_be_bytes());
        let mut state = self.lock();
        state.logs.push(RawLog {
            address,
            topics: data.topics().to_vec(),
            data: data.data,
            block_number: block,
            log_index,
            transaction_hash: keccak256(id),
        });
        state.head = state.head.max(block);
    }

    /// Answers view call `call` on `to` with `ret`.
    pub fn set_call<C: SolCall>(&self, to: Address, call: &C, ret: &C::Return) {
        let calldata = Bytes::from(call.abi_encode());
        let output = Bytes::from(C::abi_encode_returns(ret));
        self.lock().calls.insert((to, calldata), Ok(output));
    }

    /// Makes view call `call` on `to` fail with `err` every time.
    pub fn fail_call<C: SolCall>(&self, to: Address, call: &C, err: ChainError) {
        let calldata = Bytes::from(call.abi_encode());
        self.lock().calls.insert((to, calldata), Err(err));
    }

    /// Sets a storage slot.
    pub fn set_storage(&self, address: Address, slot: U256, value: U256) {
        self.lock().storage.insert((address, slot), value);
    }

    /// Fails the next reads, of any kind, with the queued errors.
    pub fn fail_next_reads(&self, errors: impl IntoIterator<Item = ChainError>) {
        self.lock().read_failures.extend(errors);
    }

    /// Drops the last log from the response to the `n`th (zero-based) log query.
    pub fn truncate_log_query(&self, n: usize) {
        self.lock().truncate_log_query = Some(n);
    }

    /// Installs the contract-side transaction handler.
    pub fn on_transaction(
        &self,
        handler: impl Fn(Address, &Bytes) -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.lock().handler = Some(Arc::new(handler));
    }

    /// Fails the next submissions with the queued errors.
    pub fn fail_next_sends(&self, errors: impl IntoIterator<Item = ChainError>) {
        self.lock().send_failures.extend(errors);
    }

    /// Queues outcomes for the next confirmation waits. Unscripted waits use
    /// [`ConfirmOutcome::Apply`].
    pub fn script_confirmations(&self, outcomes: impl IntoIterator<Item = ConfirmOutcome>) {
        self.lock().confirm_script.extend(outcomes);
    }

    /// Every submitted transaction, in order.
    pub fn sent(&self) -> Vec<SentTx> {
        self.lock().sent.clone()
    }

    /// Every transaction that took effect, in order.
    pub fn applied(&self) -> Vec<SentTx> {
        self.lock().applied.clone()
    }

    /// Number of log queries served.
    pub fn log_queries(&self) -> usize {
        self.lock().log_queries
    }

    /// Highest number of reads observed in flight at once.
    pub fn max_concurrent_reads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter_read(&self) -> Result<ReadGuard<'_>, ChainError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = ReadGuard(&self.in_flight);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        match self.lock().read_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(guard),
        }
    }

    fn apply(&self, tx: &SentTx) -> Result<(), String> {
        let handler = self.lock().handler.clone();
        if let Some(handler) = handler {
            handler(tx.to, &tx.calldata)?;
        }
        self.lock().applied.push(tx.clone());
        Ok(())
    }
}

struct ReadGuard<'a>(&'a AtomicUsize);

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        let _guard = self.enter_read().await?;
        Ok(self.lock().head)
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, ChainError> {
        let _guard = self.enter_read().await?;
        let mut state = self.lock();
        let n = state.log_queries;
        state.log_queries += 1;

        let mut logs: Vec<RawLog> = state
            .logs
            .iter()
            .filter(|log| {
                log.address == query.address
                    && log.topics.first() == Some(&query.topic0)
                    && (query.from_block..=query.to_block).contains(&log.block_number)
            })
            .cloned()
            .collect();
        logs.sort_by_key(RawLog::position);
        if state.truncate_log_query == Some(n) {
            logs.pop();
        }
        Ok(logs)
    }

    async fn call(&self, to: Address, calldata: Bytes, _block: u64) -> Result<Bytes, ChainError> {
        let _guard = self.enter_read().await?;
        self.lock()
            .calls
            .get(&(to, calldata))
            .cloned()
            .unwrap_or(Err(ChainError::Reverted { reason: None }))
    }

    async fn get_storage_at(
        &self,
        address: Address,
        slot: U256,
        _block: u64,
    ) -> Result<U256, ChainError> {
        let _guard = self.enter_read().await?;
        Ok(self.lock().storage.get(&(address, slot)).copied().unwrap_or_default())
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    async fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
        _gas: &GasParams,
    ) -> Result<TxHandle, ChainError> {
        let mut state = self.lock();
        if let Some(err) = state.send_failures.pop_front() {
            return Err(err);
        }
        let nonce = state.next_nonce;
        state.next_nonce += 1;
        let mut preimage = nonce.to_be_bytes().to_vec();
        preimage.extend_from_slice(&calldata);
        let hash = keccak256(preimage);
        state.sent.push(SentTx { to, calldata: calldata.clone(), nonce, hash });
        Ok(TxHandle { hash, nonce, to, calldata })
    }

    async fn wait_for_confirmation(
        &self,
        handle: &TxHandle,
        _confirmations: u64,
        _timeout: Duration,
    ) -> Result<TxReceipt, ChainError> {
        let outcome = self.lock().confirm_script.pop_front().unwrap_or(ConfirmOutcome::Apply);
        let tx = SentTx {
            to: handle.to,
            calldata: handle.calldata.clone(),
            nonce: handle.nonce,
            hash: handle.hash,
        };
        match outcome {
            ConfirmOutcome::Apply => {
                self.apply(&tx).map_err(|reason| ChainError::Reverted { reason: Some(reason) })?;
                let mut state = self.lock();
                state.head += 1;
                Ok(TxReceipt { tx_hash: handle.hash, block_number: state.head, gas_used: 21_000 })
            }
            ConfirmOutcome::Timeout => Err(ChainError::ConfirmationTimeout(handle.hash)),
            ConfirmOutcome::TimeoutButApplied => {
                // The handler's verdict is lost with the receipt.
                let _ = self.apply(&tx);
                Err(ChainError::ConfirmationTimeout(handle.hash))
            }
            ConfirmOutcome::Hang => std::future::pending::<Result<TxReceipt, ChainError>>().await,
        }
    }
}
