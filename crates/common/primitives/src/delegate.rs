//! Delegate records.

use serde::{Deserialize, Serialize};

use crate::EntityKey;

/// A delegated notification sender of a channel.
///
/// `active` is the live `delegatedNotificationSenders(channel, delegate)` value; the event
/// history only nominates candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateRecord {
    /// Channel that granted the delegation.
    pub channel: EntityKey,
    /// Delegate address.
    pub delegate: EntityKey,
    /// Whether the delegation is currently in force.
    pub active: bool,
}

impl DelegateRecord {
    /// The `(channel, delegate)` pair identifying this record.
    pub const fn pair(&self) -> (EntityKey, EntityKey) {
        (self.channel, self.delegate)
    }
}
