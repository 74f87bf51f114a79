//! Records, queries and change sets.

use crate::ids::{PartitionKey, RecordId, ZoneId};
use crate::token::ChangeToken;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A typed field value stored on a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// UTF-8 string.
    String(String),
    /// Signed 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Reference to another record.
    Reference(RecordId),
    /// Homogeneous list of values.
    List(Vec<FieldValue>),
}

/// A record as stored in (or returned by) the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identity.
    pub id: RecordId,
    /// Application-defined record type.
    pub record_type: String,
    /// Field values keyed by field name.
    pub fields: BTreeMap<String, FieldValue>,
    /// Server-assigned version tag; `None` until first saved.
    pub change_tag: Option<String>,
}

impl Record {
    /// Create an unsaved record with no fields.
    pub fn new(record_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            id,
            record_type: record_type.into(),
            fields: BTreeMap::new(),
            change_tag: None,
        }
    }

    /// Set a field value (builder style).
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Get a field value by name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Stub for a deleted record: identity and type only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeletedRecord {
    /// Identity of the deleted record.
    pub id: RecordId,
    /// Record type it had.
    pub record_type: String,
}

/// A zone removed from a database scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneDeletion {
    /// The zone that is gone.
    pub zone: ZoneId,
    /// True when the user purged the zone (data removed, not just the zone).
    pub purged: bool,
}

/// Comparison applied by a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Field equals value.
    Equals,
    /// Field differs from value.
    NotEquals,
    /// Field is less than value.
    LessThan,
    /// Field is greater than value.
    GreaterThan,
    /// List field contains value.
    Contains,
}

/// One filter clause of a query. Clauses are combined with AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field name.
    pub field: String,
    /// Comparison.
    pub comparison: Comparison,
    /// Operand.
    pub value: FieldValue,
}

/// Sort order on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Field name.
    pub field: String,
    /// Ascending when true.
    pub ascending: bool,
}

/// A query over records of one type. Evaluated by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Record type to match.
    pub record_type: String,
    /// AND-combined filter clauses. Empty matches every record of the type.
    pub filters: Vec<Filter>,
    /// Sort keys, most significant first.
    pub sort: Vec<SortKey>,
}

impl Query {
    /// Match every record of a type.
    pub fn all(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            filters: Vec::new(),
            sort: Vec::new(),
        }
    }

    /// Add a filter clause.
    pub fn filter(
        mut self,
        field: impl Into<String>,
        comparison: Comparison,
        value: FieldValue,
    ) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            comparison,
            value,
        });
        self
    }

    /// Add a sort key.
    pub fn sort_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            ascending,
        });
        self
    }
}

/// Which fields a change fetch asks the remote store for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMethod {
    /// Every field of every changed record.
    #[default]
    AllData,
    /// Only the named fields.
    Fields(Vec<String>),
    /// No record data; only advance the stored token.
    TokenOnly,
}

impl FetchMethod {
    /// Fields to request over the wire. `None` means all fields; an empty
    /// list means none.
    pub fn desired_fields(&self) -> Option<Vec<String>> {
        match self {
            FetchMethod::AllData => None,
            FetchMethod::Fields(fields) => Some(fields.clone()),
            FetchMethod::TokenOnly => Some(Vec::new()),
        }
    }

    /// Whether the caller only wants the token refreshed.
    pub fn is_token_only(&self) -> bool {
        matches!(self, FetchMethod::TokenOnly)
    }
}

/// Incremental changes for one or more partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<C, D> {
    /// Items created or modified since the previous token.
    pub changed: Vec<C>,
    /// Items removed since the previous token.
    pub deleted: Vec<D>,
    /// New token per partition, already persisted when this set is returned.
    pub tokens: HashMap<PartitionKey, ChangeToken>,
}

impl<C, D> ChangeSet<C, D> {
    /// A change set carrying no items.
    pub fn empty(tokens: HashMap<PartitionKey, ChangeToken>) -> Self {
        Self {
            changed: Vec::new(),
            deleted: Vec::new(),
            tokens,
        }
    }

    /// True when there are neither changed nor deleted items.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Database-level changes: zones that changed or disappeared.
pub type DatabaseChangeSet = ChangeSet<ZoneId, ZoneDeletion>;

/// Zone-level changes: records that changed or were deleted.
pub type ZoneChangeSet = ChangeSet<Record, DeletedRecord>;
