//! Snapshot invariant checks.

use std::{collections::BTreeSet, fmt};

use shuttle_primitives::{EntityKey, SNAPSHOT_FORMAT_VERSION, Snapshot, duplicate_keys};
use tracing::{info, warn};

use crate::SnapshotError;

/// How bad a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Needs operator acknowledgement before replay.
    Warn,
    /// Blocks replay.
    Fail,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => f.write_str("WARN"),
            Self::Fail => f.write_str("FAIL"),
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Severity.
    pub severity: Severity,
    /// The entity or collection the finding is about.
    pub entity: String,
    /// Human readable description.
    pub message: String,
}

impl Finding {
    fn fail(entity: impl ToString, message: impl Into<String>) -> Self {
        Self { severity: Severity::Fail, entity: entity.to_string(), message: message.into() }
    }

    fn warn(entity: impl ToString, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warn, entity: entity.to_string(), message: message.into() }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.entity, self.message)
    }
}

/// Outcome of validating a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    findings: Vec<Finding>,
}

impl Report {
    /// Every finding, in the order they were raised.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Returns `true` if any finding is a failure.
    pub fn has_failures(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Fail)
    }

    /// Fail findings.
    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Fail)
    }

    /// Warn findings.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warn)
    }

    /// Returns `true` if there is nothing to report.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Decides whether replay may proceed.
    ///
    /// Failures always block. Warnings block unless `acknowledged`.
    pub fn gate(&self, acknowledged: bool) -> Result<(), SnapshotError> {
        let failures = self.failures().count();
        let warnings = self.warnings().count();
        if failures > 0 {
            return Err(SnapshotError::ValidationFailed { failures, warnings });
        }
        if warnings > 0 && !acknowledged {
            return Err(SnapshotError::UnacknowledgedWarnings { warnings });
        }
        if warnings > 0 {
            info!(warnings, "Proceeding with acknowledged warnings");
        }
        Ok(())
    }

    fn push(&mut self, finding: Finding) {
        match finding.severity {
            Severity::Fail => warn!(entity = %finding.entity, "{}", finding.message),
            Severity::Warn => info!(entity = %finding.entity, "{}", finding.message),
        }
        self.findings.push(finding);
    }
}

/// Checks the invariants of `snapshot`, optionally diffing it against `previous`.
pub fn validate(snapshot: &Snapshot, previous: Option<&Snapshot>) -> Report {
    let mut report = Report::default();

    if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
        report.push(Finding::fail(
            "snapshot",
            format!(
                "unsupported format version {} (expected {SNAPSHOT_FORMAT_VERSION})",
                snapshot.format_version
            ),
        ));
    }

    for key in duplicate_keys(snapshot.channels.iter().map(|c| c.key)) {
        report.push(Finding::fail(key, "duplicate channel"));
    }
    for key in duplicate_keys(snapshot.stakers.iter().map(|s| s.key)) {
        report.push(Finding::fail(key, "duplicate staker"));
    }
    let mut pairs: Vec<_> = snapshot.delegates.iter().map(|d| d.pair()).collect();
    pairs.sort_unstable();
    let mut duplicates: Vec<_> = pairs.windows(2).filter(|w| w[0] == w[1]).map(|w| w[0]).collect();
    duplicates.dedup();
    for pair in duplicates {
        report.push(Finding::fail(format!("{}/{}", pair.0, pair.1), "duplicate delegate"));
    }

    let stakers: BTreeSet<EntityKey> = snapshot.stakers.iter().map(|s| s.key).collect();
    let expected = snapshot.epoch_count as usize;
    for (key, weights) in &snapshot.per_epoch_staked_weight {
        if !stakers.contains(key) {
            report.push(Finding::fail(key, "per-epoch staked weight without a staker record"));
        }
        if weights.len() != expected {
            report.push(Finding::fail(
                key,
                format!("{} epoch weights, expected {expected}", weights.len()),
            ));
        }
    }
    if snapshot.epoch_rewards.len() != expected {
        report.push(Finding::fail(
            "epochRewards",
            format!("{} entries, expected {expected}", snapshot.epoch_rewards.len()),
        ));
    }
    if snapshot.epoch_to_total_staked_weight.len() != expected {
        report.push(Finding::fail(
            "epochToTotalStakedWeight",
            format!("{} entries, expected {expected}", snapshot.epoch_to_total_staked_weight.len()),
        ));
    }

    let channels: BTreeSet<EntityKey> = snapshot.channels.iter().map(|c| c.key).collect();
    for delegate in &snapshot.delegates {
        if !channels.contains(&delegate.channel) {
            report.push(Finding::warn(
                format!("{}/{}", delegate.channel, delegate.delegate),
                "delegate's channel is not in the snapshot",
            ));
        }
    }

    if let Some(previous) = previous {
        diff(&mut report, snapshot, previous, &channels, &stakers);
    }

    info!(
        findings = report.findings.len(),
        failures = report.failures().count(),
        warnings = report.warnings().count(),
        "Validated snapshot"
    );
    report
}

fn diff(
    report: &mut Report,
    snapshot: &Snapshot,
    previous: &Snapshot,
    channels: &BTreeSet<EntityKey>,
    stakers: &BTreeSet<EntityKey>,
) {
    for channel in previous.channels.iter().filter(|c| !channels.contains(&c.key)) {
        report.push(Finding::warn(channel.key, "channel present in the previous snapshot is gone"));
    }
    let delegates: BTreeSet<_> = snapshot.delegates.iter().map(|d| d.pair()).collect();
    for delegate in previous.delegates.iter().filter(|d| !delegates.contains(&d.pair())) {
        report.push(Finding::warn(
            format!("{}/{}", delegate.channel, delegate.delegate),
            "delegate present in the previous snapshot is gone",
        ));
    }
    for staker in previous.stakers.iter().filter(|s| !stakers.contains(&s.key)) {
        report.push(Finding::warn(staker.key, "staker present in the previous snapshot is gone"));
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, Bytes, U256};
    use rstest::rstest;
    use shuttle_primitives::{ChannelRecord, ChannelType, DelegateRecord, StakerRecord};

    use super::*;

    fn channel(b: u8) -> ChannelRecord {
        ChannelRecord {
            key: Address::repeat_byte(b),
            channel_type: ChannelType::InterestBearingOpen,
            identity: Bytes::from_static(b"id"),
            pool_contribution: U256::from(50u64),
            expiry_time: U256::ZERO,
            update_counter: 0,
        }
    }

    fn staker(b: u8) -> StakerRecord {
        StakerRecord {
            key: Address::repeat_byte(b),
            staked_amount: U256::from(1u64),
            staked_weight: U256::from(1u64),
            last_staked_block: U256::from(1u64),
            last_claimed_block: U256::ZERO,
            rewards_claimed: U256::ZERO,
        }
    }

    fn delegate(c: u8, d: u8) -> DelegateRecord {
        DelegateRecord {
            channel: Address::repeat_byte(c),
            delegate: Address::repeat_byte(d),
            active: true,
        }
    }

    fn valid() -> Snapshot {
        let mut snapshot = Snapshot::empty("test", 100, 2);
        snapshot.channels = vec![channel(1), channel(2)];
        snapshot.delegates = vec![delegate(1, 0xd1)];
        snapshot.stakers = vec![staker(0x51)];
        snapshot
            .per_epoch_staked_weight
            .insert(Address::repeat_byte(0x51), vec![U256::from(1u64), U256::from(2u64)]);
        snapshot.epoch_rewards = vec![U256::from(10u64), U256::from(20u64)];
        snapshot.epoch_to_total_staked_weight = vec![U256::from(1u64), U256::from(2u64)];
        snapshot
    }

    #[test]
    fn valid_snapshot_is_clean() {
        let report = validate(&valid(), None);
        assert!(report.is_clean(), "{:?}", report.findings());
        assert!(report.gate(false).is_ok());
    }

    #[test]
    fn orphan_epoch_weights_fail() {
        let mut snapshot = valid();
        snapshot
            .per_epoch_staked_weight
            .insert(Address::repeat_byte(0x99), vec![U256::ZERO, U256::from(3u64)]);
        let report = validate(&snapshot, None);
        assert!(report.has_failures());
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.entity, Address::repeat_byte(0x99).to_string());
        assert!(failure.message.contains("without a staker record"));
        assert!(matches!(report.gate(true), Err(SnapshotError::ValidationFailed { failures: 1, .. })));
    }

    #[rstest]
    #[case::duplicate_channel(|s: &mut Snapshot| s.channels.push(channel(1)))]
    #[case::duplicate_staker(|s: &mut Snapshot| {
        s.stakers.push(staker(0x51));
    })]
    #[case::duplicate_delegate(|s: &mut Snapshot| s.delegates.push(delegate(1, 0xd1)))]
    #[case::short_weights(|s: &mut Snapshot| {
        s.per_epoch_staked_weight.insert(Address::repeat_byte(0x51), vec![U256::ZERO]);
    })]
    #[case::long_rewards(|s: &mut Snapshot| s.epoch_rewards.push(U256::ZERO))]
    #[case::short_totals(|s: &mut Snapshot| {
        s.epoch_to_total_staked_weight.pop();
    })]
    #[case::format_version(|s: &mut Snapshot| s.format_version = 99)]
    fn invariant_violations_fail(#[case] corrupt: fn(&mut Snapshot)) {
        let mut snapshot = valid();
        corrupt(&mut snapshot);
        let report = validate(&snapshot, None);
        assert_eq!(report.failures().count(), 1, "{:?}", report.findings());
    }

    #[test]
    fn delegate_of_missing_channel_warns() {
        let mut snapshot = valid();
        snapshot.delegates.push(delegate(9, 0xd2));
        let report = validate(&snapshot, None);
        assert!(!report.has_failures());
        assert_eq!(report.warnings().count(), 1);
        assert!(matches!(report.gate(false), Err(SnapshotError::UnacknowledgedWarnings { warnings: 1 })));
        assert!(report.gate(true).is_ok());
    }

    #[test]
    fn entities_missing_since_previous_snapshot_warn() {
        let previous = valid();
        let mut current = valid();
        current.channels.retain(|c| c.key != Address::repeat_byte(2));
        current.delegates.clear();
        current.stakers.clear();
        current.per_epoch_staked_weight.clear();

        let report = validate(&current, Some(&previous));
        assert!(!report.has_failures());
        let entities: Vec<_> = report.warnings().map(|f| f.entity.clone()).collect();
        assert_eq!(entities.len(), 3);
        assert!(entities.contains(&Address::repeat_byte(2).to_string()));
        assert!(entities.contains(&Address::repeat_byte(0x51).to_string()));
    }

    #[test]
    fn finding_display() {
        let finding = Finding::warn("epochRewards", "short");
        assert_eq!(finding.to_string(), "[WARN] epochRewards: short");
    }
}
