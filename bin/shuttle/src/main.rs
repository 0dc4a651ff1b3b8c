//! Staking state migration.
//!
//! `shuttle` moves a staking core contract's state to a migration target in three stages:
//!
//! - **snapshot**: replay the core's events to find every channel, delegate and staker,
//!   read their live state at a pinned block and write an immutable snapshot file
//! - **validate**: check a snapshot's invariants and diff it against a previous one
//! - **migrate**: replay one stream of a snapshot into the target in confirmed batches,
//!   resumable from a progress file

mod exit;

use std::{path::Path, process::ExitCode};

use alloy::{network::EthereumWallet, providers::ProviderBuilder};
use clap::Parser;
use exit::Exit;
use eyre::{Result, WrapErr, eyre};
use shuttle_chain::{AbiSchema, ChainWriter, RpcChain};
use shuttle_cli::{
    Cli, Command, MigrateArgs, SnapshotArgs, ValidateArgs, init_tracing, shutdown_token,
};
use shuttle_progress::{AuditEvent, AuditLog, FileProgressStore, RunLock};
use shuttle_replay::{ReplayDriver, stream_for, verify_destination_abi};
use shuttle_snapshot::{
    LoadedSnapshot, Report, SnapshotBuilder, SnapshotError, store, validate, verify_core_abi,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let shutdown = shutdown_token();

    let result = match cli.command {
        Command::Snapshot(args) => snapshot(&cli.rpc_url, args, shutdown).await,
        Command::Validate(args) => check(args),
        Command::Migrate(args) => migrate(&cli.rpc_url, args, shutdown).await,
    };

    match result {
        Ok(()) => Exit::Success.into(),
        Err(err) => {
            eprintln!("Error: {err:?}");
            Exit::classify(&err).into()
        }
    }
}

/// `shuttle snapshot`: build, validate and write a new snapshot file.
async fn snapshot(rpc_url: &str, args: SnapshotArgs, shutdown: CancellationToken) -> Result<()> {
    if let Some(path) = &args.core_abi {
        let schema = AbiSchema::load(path)?;
        verify_core_abi(&schema).wrap_err_with(|| format!("core ABI {}", path.display()))?;
    }
    // Fail before a long build rather than after it.
    if args.out.exists() {
        return Err(SnapshotError::AlreadyExists { path: args.out }.into());
    }
    let previous = args.previous.as_deref().map(load).transpose()?;

    let provider = ProviderBuilder::new().connect(rpc_url).await.wrap_err("connecting to RPC")?;
    let builder = SnapshotBuilder::new(RpcChain::new(provider), args.config(), shutdown);
    let snapshot = builder.build().await?;

    let report = validate(&snapshot, previous.as_ref().map(|p| &p.snapshot));
    print_report(&report);
    report.gate(true)?;

    let digest = store::write_new(&args.out, &snapshot)?;
    info!(path = %args.out.display(), %digest, "Snapshot written");
    println!(
        "{}: block {}, {} channel(s), {} delegate(s), {} staker(s), {} epoch(s), digest {digest}",
        args.out.display(),
        snapshot.source_block,
        snapshot.channels.len(),
        snapshot.delegates.len(),
        snapshot.stakers.len(),
        snapshot.epoch_count,
    );
    Ok(())
}

/// `shuttle validate`: fails on findings of severity FAIL only.
fn check(args: ValidateArgs) -> Result<()> {
    let (_, report) = load_validated(&args.snapshot, args.previous.as_deref())?;
    report.gate(true)?;
    println!(
        "{}: {} warning(s), no failures",
        args.snapshot.display(),
        report.warnings().count()
    );
    Ok(())
}

/// `shuttle migrate`: replay one stream into the destination.
async fn migrate(rpc_url: &str, args: MigrateArgs, shutdown: CancellationToken) -> Result<()> {
    let (loaded, report) = load_validated(&args.snapshot, args.previous.as_deref())?;
    report.gate(args.acknowledge_warnings)?;

    if let Some(path) = &args.destination_abi {
        let schema = AbiSchema::load(path)?;
        verify_destination_abi(&schema, args.stream)
            .wrap_err_with(|| format!("destination ABI {}", path.display()))?;
    }

    if args.dry_run {
        let provider =
            ProviderBuilder::new().connect(rpc_url).await.wrap_err("connecting to RPC")?;
        return replay(RpcChain::new(provider), &args, &loaded, AuditLog::memory(), shutdown).await;
    }

    let signer = args
        .private_key
        .clone()
        .ok_or_else(|| eyre!("SHUTTLE_PRIVATE_KEY or --private-key is required unless --dry-run"))?;
    let _lock = RunLock::acquire(&args.progress)?;
    let audit = AuditLog::open(&AuditLog::path_for(&args.progress))?;
    let findings: Vec<String> = report.warnings().map(ToString::to_string).collect();
    if !findings.is_empty() {
        audit.record(AuditEvent::WarningsAcknowledged { findings })?;
    }

    let sender = signer.address();
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect(rpc_url)
        .await
        .wrap_err("connecting to RPC")?;
    info!(%sender, destination = %args.destination, stream = %args.stream, "Submitting as");
    replay(RpcChain::new(provider).with_sender(sender), &args, &loaded, audit, shutdown).await
}

async fn replay<W: ChainWriter>(
    writer: W,
    args: &MigrateArgs,
    loaded: &LoadedSnapshot,
    audit: AuditLog,
    shutdown: CancellationToken,
) -> Result<()> {
    let driver = ReplayDriver::new(
        writer,
        args.destination,
        FileProgressStore::new(args.progress.clone()),
        audit,
        args.config(),
        shutdown,
    );
    let stream = stream_for(args.stream, &loaded.snapshot);
    let report = driver.run(&*stream, loaded.digest).await?;
    println!("{report}");
    Ok(())
}

fn load(path: &Path) -> Result<LoadedSnapshot> {
    store::load(path).wrap_err_with(|| format!("loading snapshot {}", path.display()))
}

/// Loads and validates a snapshot, printing every finding.
fn load_validated(path: &Path, previous: Option<&Path>) -> Result<(LoadedSnapshot, Report)> {
    let loaded = load(path)?;
    let previous = previous.map(load).transpose()?;
    let report = validate(&loaded.snapshot, previous.as_ref().map(|p| &p.snapshot));
    print_report(&report);
    info!(digest = %loaded.digest, findings = report.findings().len(), "Snapshot validated");
    Ok((loaded, report))
}

fn print_report(report: &Report) {
    for finding in report.findings() {
        println!("{finding}");
    }
}
