//! Identity types for records, zones and change-tracking partitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner name used when a zone belongs to the current user.
pub const CURRENT_USER_OWNER: &str = "__defaultOwner__";

/// Name of the zone every database scope provides implicitly.
pub const DEFAULT_ZONE_NAME: &str = "_defaultZone";

/// Identifies a zone: a named group of records owned by one user.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneId {
    name: String,
    owner: String,
}

impl ZoneId {
    /// Create a zone owned by the current user.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: CURRENT_USER_OWNER.to_string(),
        }
    }

    /// Create a zone owned by a specific user (shared zones).
    pub fn with_owner(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }

    /// The implicit default zone of the current user.
    pub fn default_zone() -> Self {
        Self::new(DEFAULT_ZONE_NAME)
    }

    /// Zone name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owner name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Whether this is the implicit default zone.
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_ZONE_NAME
    }
}

impl Default for ZoneId {
    fn default() -> Self {
        Self::default_zone()
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.name)
    }
}

impl fmt::Debug for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZoneId({})", self)
    }
}

/// Identifies a record within a zone.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    name: String,
    zone: ZoneId,
}

impl RecordId {
    /// Create a record identifier with a random UUID v4 name.
    pub fn new(zone: ZoneId) -> Self {
        Self {
            name: uuid::Uuid::new_v4().to_string(),
            zone,
        }
    }

    /// Create a record identifier with an explicit name.
    pub fn with_name(name: impl Into<String>, zone: ZoneId) -> Self {
        Self {
            name: name.into(),
            zone,
        }
    }

    /// Record name, unique within its zone.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The zone holding this record.
    pub fn zone(&self) -> &ZoneId {
        &self.zone
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zone, self.name)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self)
    }
}

/// A database scope of the remote store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseScope {
    /// The current user's private database.
    Private,
    /// Zones other users shared with the current user.
    Shared,
    /// The world-readable database.
    Public,
}

impl fmt::Display for DatabaseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatabaseScope::Private => "private",
            DatabaseScope::Shared => "shared",
            DatabaseScope::Public => "public",
        };
        f.write_str(name)
    }
}

/// A unit of change tracking. Each key owns exactly one change-token lineage.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug)]
pub enum PartitionKey {
    /// A whole database scope (zone-level changes: created/deleted zones).
    Database(DatabaseScope),
    /// One zone (record-level changes).
    Zone(ZoneId),
}

impl PartitionKey {
    /// The zone this key refers to, if it is zone-level.
    pub fn zone(&self) -> Option<&ZoneId> {
        match self {
            PartitionKey::Zone(zone) => Some(zone),
            PartitionKey::Database(_) => None,
        }
    }
}

impl From<DatabaseScope> for PartitionKey {
    fn from(scope: DatabaseScope) -> Self {
        PartitionKey::Database(scope)
    }
}

impl From<ZoneId> for PartitionKey {
    fn from(zone: ZoneId) -> Self {
        PartitionKey::Zone(zone)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Database(scope) => write!(f, "database:{}", scope),
            PartitionKey::Zone(zone) => write!(f, "zone:{}", zone),
        }
    }
}
