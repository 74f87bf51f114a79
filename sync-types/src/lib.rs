//! # sync-types
//!
//! Shared data model for the zonesync client layer.
//!
//! This crate provides the foundational types used across all zonesync crates:
//! - [`RecordId`], [`ZoneId`], [`DatabaseScope`], [`PartitionKey`] - Identity types
//! - [`ChangeToken`], [`QueryCursor`] - Opaque server-issued markers
//! - [`Record`], [`Query`], [`ChangeSet`] - Payloads
//! - [`ClassifiedError`], [`RawError`], [`ErrorCode`] - Error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod record;
mod token;

pub use error::{
    ClassifiedError, ErrorCategory, ErrorCode, RawError, RecordError, TransportFailure, ZoneError,
};
pub use ids::{
    DatabaseScope, PartitionKey, RecordId, ZoneId, CURRENT_USER_OWNER, DEFAULT_ZONE_NAME,
};
pub use record::{
    ChangeSet, Comparison, DatabaseChangeSet, DeletedRecord, FetchMethod, FieldValue, Filter,
    Query, Record, SortKey, ZoneChangeSet, ZoneDeletion,
};
pub use token::{ChangeToken, QueryCursor};
