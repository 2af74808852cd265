//! Network Entity Identifiers
//!
//! Identifiers handed to this core by the replication layer.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Network entity identifier.
///
/// Implements Ord for deterministic BTreeMap/BTreeSet ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetEntityId(pub u64);

impl NetEntityId {
    /// Sentinel for "no entity" (empty coin slots, unowned shots).
    pub const INVALID: Self = Self(u64::MAX);

    /// Create from a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Whether this id refers to an entity.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX
    }
}

impl Default for NetEntityId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for NetEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "net#{}", self.0)
        } else {
            f.write_str("net#invalid")
        }
    }
}

/// Host simulation frame, used to pin lag-compensated queries to history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct HostFrameId(pub u32);

impl HostFrameId {
    /// Next frame (wrapping).
    #[inline]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}
