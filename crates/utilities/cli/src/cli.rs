use std::{path::PathBuf, time::Duration};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use clap::{ArgAction, Args, Parser, Subcommand};
use shuttle_chain::{GasParams, RetryPolicy, StakingLayout};
use shuttle_events::EventAggregatorConfig;
use shuttle_replay::{DEFAULT_IDEMPOTENCE_SIGNAL, ReplayConfig, StreamKind};
use shuttle_snapshot::SnapshotConfig;

/// Shuttle CLI arguments.
///
/// A migration runs in three stages:
/// - **snapshot**: reconstruct the source contract's state at a pinned block
/// - **validate**: check a snapshot's invariants, optionally against a previous one
/// - **migrate**: replay one stream of a snapshot into the destination in batches
#[derive(Parser, Debug, Clone)]
#[command(name = "shuttle", about = "Chain state migration: snapshot, validate, replay")]
pub struct Cli {
    /// Verbosity (-v INFO, -vv DEBUG, -vvv TRACE)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON-RPC endpoint
    #[arg(long, env = "RPC_URL", global = true, default_value = "http://127.0.0.1:8545")]
    pub rpc_url: String,

    /// Stage to run
    #[command(subcommand)]
    pub command: Command,
}

/// Pipeline stages.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build a snapshot of the source core contract.
    Snapshot(SnapshotArgs),
    /// Validate a snapshot file.
    Validate(ValidateArgs),
    /// Replay one stream of a snapshot into the destination.
    Migrate(MigrateArgs),
}

/// Arguments of `shuttle snapshot`.
#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    /// Source core contract
    #[arg(long)]
    pub core: Address,

    /// First block to replay events from, usually the deployment block
    #[arg(long, default_value_t = 0)]
    pub from_block: u64,

    /// Number of staking epochs to capture
    #[arg(long)]
    pub epochs: u64,

    /// Declaration slot of the `userFeesInfo` mapping
    #[arg(long)]
    pub user_fees_info_slot: u64,

    /// Word offset of `epochToUserStakedWeight` inside the fees struct
    #[arg(long)]
    pub epoch_weight_offset: u64,

    /// Snapshot file to write; must not exist
    #[arg(long)]
    pub out: PathBuf,

    /// Label stored in the snapshot
    #[arg(long, default_value = "snapshot")]
    pub label: String,

    /// Blocks per log query
    #[arg(long, default_value_t = 2_000)]
    pub window_size: u64,

    /// Blocks shared by consecutive log queries
    #[arg(long, default_value_t = 10)]
    pub overlap: u64,

    /// Live reads in flight at once
    #[arg(long, default_value_t = 8)]
    pub fan_out: usize,

    /// Blocks behind head to pin the snapshot at
    #[arg(long, default_value_t = 0)]
    pub confirmation_lag: u64,

    /// Attempts per read before giving up
    #[arg(long, default_value_t = 5)]
    pub max_attempts: u32,

    /// Previous snapshot to diff against
    #[arg(long)]
    pub previous: Option<PathBuf>,

    /// JSON ABI of the core contract to check before reading
    #[arg(long)]
    pub core_abi: Option<PathBuf>,
}

impl SnapshotArgs {
    /// Snapshot builder configuration for these arguments.
    pub fn config(&self) -> SnapshotConfig {
        let retry = RetryPolicy::default().with_max_attempts(self.max_attempts);
        SnapshotConfig::builder()
            .core(self.core)
            .label(self.label.as_str())
            .epochs(self.epochs)
            .layout(StakingLayout::new(self.user_fees_info_slot, self.epoch_weight_offset))
            .fan_out(self.fan_out)
            .confirmation_lag(self.confirmation_lag)
            .retry(retry)
            .events(
                EventAggregatorConfig::builder()
                    .from_block(self.from_block)
                    .window_size(self.window_size)
                    .overlap(self.overlap)
                    .retry(retry)
                    .build(),
            )
            .build()
    }
}

/// Arguments of `shuttle validate`.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Snapshot file to check
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Previous snapshot to diff against
    #[arg(long)]
    pub previous: Option<PathBuf>,
}

/// Arguments of `shuttle migrate`.
#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Stream to replay (channels, delegates, stakers, epoch-weights, epochs)
    pub stream: StreamKind,

    /// Snapshot file to replay from
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Destination contract
    #[arg(long)]
    pub destination: Address,

    /// Progress file of this stream
    #[arg(long)]
    pub progress: PathBuf,

    /// Entities per destination call
    #[arg(long)]
    pub batch_size: usize,

    /// First entity index of a fresh run
    #[arg(long)]
    pub start: Option<usize>,

    /// Entity index to stop at, exclusive
    #[arg(long)]
    pub end: Option<usize>,

    /// Continue from the stored progress
    #[arg(long)]
    pub resume: bool,

    /// Encode and check every batch without sending
    #[arg(long)]
    pub dry_run: bool,

    /// Confirmations required per batch
    #[arg(long, default_value_t = 1)]
    pub confirmations: u64,

    /// Seconds to wait for a batch's confirmations
    #[arg(long, default_value_t = 300)]
    pub confirmation_timeout_secs: u64,

    /// Attempts per batch before halting
    #[arg(long, default_value_t = 5)]
    pub max_attempts: u32,

    /// Gas limit for every call
    #[arg(long)]
    pub gas_limit: Option<u64>,

    /// EIP-1559 max fee per gas, in wei
    #[arg(long)]
    pub max_fee_per_gas: Option<u128>,

    /// EIP-1559 priority fee per gas, in wei
    #[arg(long)]
    pub max_priority_fee_per_gas: Option<u128>,

    /// Revert reason fragment meaning a batch is already applied (repeatable)
    #[arg(long = "idempotence-signal", default_value = DEFAULT_IDEMPOTENCE_SIGNAL)]
    pub idempotence_signals: Vec<String>,

    /// Proceed even though validation reported warnings
    #[arg(long)]
    pub acknowledge_warnings: bool,

    /// Previous snapshot to diff against during validation
    #[arg(long)]
    pub previous: Option<PathBuf>,

    /// JSON ABI of the destination to check before sending
    #[arg(long)]
    pub destination_abi: Option<PathBuf>,

    /// Hex private key of the submitting account; required unless --dry-run
    #[arg(long, env = "SHUTTLE_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<PrivateKeySigner>,
}

impl MigrateArgs {
    /// Replay driver configuration for these arguments.
    pub fn config(&self) -> ReplayConfig {
        ReplayConfig::builder()
            .batch_size(self.batch_size)
            .start(self.start)
            .end(self.end)
            .resume(self.resume)
            .dry_run(self.dry_run)
            .confirmations(self.confirmations)
            .confirmation_timeout(Duration::from_secs(self.confirmation_timeout_secs))
            .retry(RetryPolicy::default().with_max_attempts(self.max_attempts))
            .idempotence_signals(self.idempotence_signals.clone())
            .gas(GasParams {
                gas_limit: self.gas_limit,
                max_fee_per_gas: self.max_fee_per_gas,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, error::ErrorKind};
    use rstest::rstest;

    use super::*;

    const CORE: &str = "0x00000000000000000000000000000000000000cc";
    const DESTINATION: &str = "0x00000000000000000000000000000000000000de";

    fn migrate(extra: &[&str]) -> Result<MigrateArgs, clap::Error> {
        let mut args = vec![
            "shuttle",
            "migrate",
            "stakers",
            "--snapshot",
            "snap.json",
            "--destination",
            DESTINATION,
            "--progress",
            "stakers.json",
            "--batch-size",
            "50",
        ];
        args.extend_from_slice(extra);
        match Cli::try_parse_from(args)?.command {
            Command::Migrate(args) => Ok(args),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn snapshot_args_build_the_config() {
        let cli = Cli::try_parse_from([
            "shuttle",
            "-vv",
            "snapshot",
            "--core",
            CORE,
            "--from-block",
            "1200",
            "--epochs",
            "12",
            "--user-fees-info-slot",
            "166",
            "--epoch-weight-offset",
            "4",
            "--out",
            "snap.json",
            "--fan-out",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Snapshot(args) = cli.command else { panic!("expected snapshot") };
        let config = args.config();
        assert_eq!(config.core, Address::with_last_byte(0xcc));
        assert_eq!(config.epochs, 12);
        assert_eq!(config.layout, StakingLayout::new(166, 4));
        assert_eq!(config.fan_out, 3);
        assert_eq!(config.label, "snapshot");
        assert_eq!(config.events.from_block, 1200);
        assert_eq!(config.events.window_size, 2_000);
    }

    #[test]
    fn migrate_defaults() {
        let args = migrate(&[]).unwrap();
        assert_eq!(args.stream, StreamKind::Stakers);
        let config = args.config();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.start, None);
        assert!(!config.resume);
        assert!(!config.dry_run);
        assert_eq!(config.confirmations, 1);
        assert_eq!(config.confirmation_timeout, Duration::from_secs(300));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.idempotence_signals, vec![DEFAULT_IDEMPOTENCE_SIGNAL.to_string()]);
        assert_eq!(config.gas, GasParams::default());
    }

    #[test]
    fn private_key_parses_into_a_signer() {
        let key = "0x0000000000000000000000000000000000000000000000000000000000000001";
        let args = migrate(&["--private-key", key]).unwrap();
        let signer = args.private_key.unwrap();
        // Address of the secp256k1 generator point.
        assert_eq!(
            signer.address(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn migrate_overrides() {
        let args = migrate(&[
            "--start",
            "100",
            "--end",
            "400",
            "--resume",
            "--max-attempts",
            "2",
            "--gas-limit",
            "3000000",
            "--idempotence-signal",
            "exists",
            "--idempotence-signal",
            "duplicate",
            "--acknowledge-warnings",
        ])
        .unwrap();
        assert!(args.acknowledge_warnings);
        let config = args.config();
        assert_eq!(config.start, Some(100));
        assert_eq!(config.end, Some(400));
        assert!(config.resume);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.gas.gas_limit, Some(3_000_000));
        assert_eq!(config.idempotence_signals, vec!["exists", "duplicate"]);
    }

    #[rstest]
    #[case("channels", StreamKind::Channels)]
    #[case("epoch-weights", StreamKind::EpochWeights)]
    #[case("EPOCHS", StreamKind::Epochs)]
    fn stream_argument(#[case] name: &str, #[case] expected: StreamKind) {
        let cli = Cli::try_parse_from([
            "shuttle",
            "migrate",
            name,
            "--snapshot",
            "s.json",
            "--destination",
            DESTINATION,
            "--progress",
            "p.json",
            "--batch-size",
            "1",
            "--dry-run",
        ])
        .unwrap();
        let Command::Migrate(args) = cli.command else { panic!("expected migrate") };
        assert_eq!(args.stream, expected);
        assert!(args.dry_run);
    }

    #[rstest]
    #[case(&["shuttle", "migrate", "rewards", "--snapshot", "s", "--destination", DESTINATION, "--progress", "p", "--batch-size", "1"], ErrorKind::ValueValidation)]
    #[case(&["shuttle", "migrate", "stakers", "--snapshot", "s", "--destination", "nope", "--progress", "p", "--batch-size", "1"], ErrorKind::ValueValidation)]
    #[case(&["shuttle", "migrate", "stakers", "--snapshot", "s", "--destination", DESTINATION, "--progress", "p"], ErrorKind::MissingRequiredArgument)]
    #[case(&["shuttle", "validate"], ErrorKind::MissingRequiredArgument)]
    fn rejected_arguments(#[case] args: &[&str], #[case] kind: ErrorKind) {
        let err = Cli::try_parse_from(args).unwrap_err();
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn validate_args() {
        let cli = Cli::try_parse_from([
            "shuttle",
            "validate",
            "--snapshot",
            "new.json",
            "--previous",
            "old.json",
            "--rpc-url",
            "http://node:8545",
        ])
        .unwrap();
        assert_eq!(cli.rpc_url, "http://node:8545");
        let Command::Validate(args) = cli.command else { panic!("expected validate") };
        assert_eq!(args.snapshot, PathBuf::from("new.json"));
        assert_eq!(args.previous, Some(PathBuf::from("old.json")));
    }
}
