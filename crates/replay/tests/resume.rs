//! Kill-and-resume runs against an in-memory destination end in the same state as a run
//! that never stopped.

use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy::{
    primitives::{Address, B256, U256},
    sol_types::SolCall,
};
use rstest::rstest;
use shuttle_chain::{ConfirmOutcome, MockChain, RetryPolicy, contracts::IMigrationTarget};
use shuttle_primitives::{Snapshot, StakerRecord};
use shuttle_progress::{AuditEvent, AuditLog, FileProgressStore, ProgressStore, RunLock};
use shuttle_replay::{ReplayConfig, ReplayDriver, ReplayError, ReplayReport, StreamKind, stream_for};
use tokio_util::sync::CancellationToken;

const DESTINATION: Address = Address::repeat_byte(0xde);
const DIGEST: B256 = B256::repeat_byte(0x42);
const STAKERS: u8 = 11;
const BATCH_SIZE: usize = 2;

/// Staker rows held by the destination, appended strictly in order.
#[derive(Clone, Default)]
struct Destination(Arc<Mutex<Vec<(Address, U256)>>>);

impl Destination {
    fn install(chain: &MockChain) -> Self {
        let destination = Self::default();
        let rows = Arc::clone(&destination.0);
        chain.on_transaction(move |to, calldata| {
            assert_eq!(to, DESTINATION);
            let call = IMigrationTarget::migrateStakerDataCall::abi_decode(calldata)
                .map_err(|e| e.to_string())?;
            let mut rows = rows.lock().unwrap();
            let start = call.startIndex.to::<usize>();
            let end = call.endIndex.to::<usize>();
            if end <= rows.len() {
                return Err("StakerMigration: already migrated".to_string());
            }
            if start != rows.len() {
                return Err(format!("StakerMigration: expected start {}", rows.len()));
            }
            rows.extend(call.users.into_iter().zip(call.stakedAmounts));
            Ok(())
        });
        destination
    }

    fn rows(&self) -> Vec<(Address, U256)> {
        self.0.lock().unwrap().clone()
    }
}

fn snapshot() -> Snapshot {
    let mut snapshot = Snapshot::empty("resume", 1_000, 0);
    snapshot.stakers = (1..=STAKERS)
        .map(|b| StakerRecord {
            key: Address::with_last_byte(b),
            staked_amount: U256::from(b as u64 * 1_000),
            staked_weight: U256::from(b as u64),
            last_staked_block: U256::from(900u64),
            last_claimed_block: U256::ZERO,
            rewards_claimed: U256::ZERO,
        })
        .collect();
    snapshot
}

fn config(max_attempts: u32, resume: bool) -> ReplayConfig {
    ReplayConfig::builder()
        .batch_size(BATCH_SIZE)
        .resume(resume)
        .retry(
            RetryPolicy::default()
                .with_max_attempts(max_attempts)
                .with_initial_backoff(Duration::from_millis(1)),
        )
        .build()
}

async fn run(
    chain: &MockChain,
    progress: &Path,
    config: ReplayConfig,
) -> Result<ReplayReport, ReplayError> {
    let _lock = RunLock::acquire(progress).unwrap();
    assert!(RunLock::acquire(progress).is_err(), "a second driver must not start");

    let snapshot = snapshot();
    let driver = ReplayDriver::new(
        chain.clone(),
        DESTINATION,
        FileProgressStore::new(progress),
        AuditLog::open(&AuditLog::path_for(progress)).unwrap(),
        config,
        CancellationToken::new(),
    );
    driver.run(&*stream_for(StreamKind::Stakers, &snapshot), DIGEST).await
}

async fn uninterrupted() -> Vec<(Address, U256)> {
    let dir = tempfile::tempdir().unwrap();
    let chain = MockChain::new();
    let destination = Destination::install(&chain);
    let report = run(&chain, &dir.path().join("stakers.json"), config(3, false)).await.unwrap();
    assert_eq!(report.confirmed, 6);
    destination.rows()
}

#[rstest]
#[tokio::test]
async fn halted_run_resumes_to_the_uninterrupted_result(
    #[values(1, 3, 5)] k: usize,
    #[values(ConfirmOutcome::Timeout, ConfirmOutcome::TimeoutButApplied)] kill: ConfirmOutcome,
) {
    let expected = uninterrupted().await;
    assert_eq!(expected.len(), STAKERS as usize);

    let dir = tempfile::tempdir().unwrap();
    let progress = dir.path().join("stakers.json");
    let chain = MockChain::new();
    let destination = Destination::install(&chain);

    // Confirm k batches, then lose batch k with no attempts left.
    chain.script_confirmations(std::iter::repeat_n(ConfirmOutcome::Apply, k).chain([kill.clone()]));
    let err = run(&chain, &progress, config(1, false)).await.unwrap_err();
    assert!(matches!(err, ReplayError::Halted { attempts: 1, .. }), "{err}");

    let stored = FileProgressStore::new(&progress).load().unwrap().unwrap();
    assert_eq!(stored.batch_cursor, k * BATCH_SIZE);
    assert_eq!(stored.failure_count, 1);

    // Without --resume the stored progress is refused.
    let err = run(&chain, &progress, config(3, false)).await.unwrap_err();
    assert!(matches!(err, ReplayError::ResumeRequired { .. }));

    let report = run(&chain, &progress, config(3, true)).await.unwrap();
    assert_eq!(report.start_cursor, k * BATCH_SIZE);
    assert_eq!(report.cursor, STAKERS as usize);
    let idempotent = usize::from(kill == ConfirmOutcome::TimeoutButApplied);
    assert_eq!(report.idempotent, idempotent);

    assert_eq!(destination.rows(), expected);
    let stored = FileProgressStore::new(&progress).load().unwrap().unwrap();
    assert!(stored.is_complete());

    let trail: Vec<_> = AuditLog::read(&AuditLog::path_for(&progress))
        .unwrap()
        .into_iter()
        .map(|record| record.event)
        .collect();
    let halted = trail.iter().position(|e| matches!(e, AuditEvent::Halted { .. })).unwrap();
    let resumed = trail
        .iter()
        .position(|e| matches!(e, AuditEvent::RunStarted { resumed: true, .. }))
        .unwrap();
    assert!(halted < resumed);
    assert!(matches!(trail.last(), Some(AuditEvent::Completed { cursor }) if *cursor == STAKERS as usize));
}

#[tokio::test]
async fn resuming_a_finished_stream_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let progress = dir.path().join("stakers.json");
    let chain = MockChain::new();
    Destination::install(&chain);

    run(&chain, &progress, config(3, false)).await.unwrap();
    let sent = chain.sent().len();

    let report = run(&chain, &progress, config(3, true)).await.unwrap();
    assert_eq!(report.planned, 0);
    assert_eq!(chain.sent().len(), sent);
}
