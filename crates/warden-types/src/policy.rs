//! Cached policy shape, as persisted to disk for offline enforcement.

use serde::{Deserialize, Serialize};

use crate::command::ActionType;

/// The last-known-good policy snapshot consulted by the autonomous enforcer
/// when the controller is unreachable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedPolicy {
    pub version: u64,
    #[serde(default)]
    pub prohibited_actions: Vec<ActionType>,
    #[serde(default)]
    pub allowed_actions: Vec<ActionType>,
    pub integrity_hash: String,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl CachedPolicy {
    /// The canonical bytes over which `integrity_hash` is computed: the
    /// policy with the hash field itself removed.
    pub fn hashable_bytes(&self) -> Result<Vec<u8>, crate::canonical::CanonicalError> {
        #[derive(Serialize)]
        struct Unhashed<'a> {
            version: u64,
            prohibited_actions: &'a [ActionType],
            allowed_actions: &'a [ActionType],
            last_updated: chrono::DateTime<chrono::Utc>,
        }
        crate::canonical::canonical_bytes(&Unhashed {
            version: self.version,
            prohibited_actions: &self.prohibited_actions,
            allowed_actions: &self.allowed_actions,
            last_updated: self.last_updated,
        })
    }
}
