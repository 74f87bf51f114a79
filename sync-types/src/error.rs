//! Error taxonomy shared by every zonesync crate.
//!
//! Two shapes live here:
//! - [`RawError`] is what a remote store implementation reports: a numeric
//!   store code, a transport failure, or a timeout.
//! - [`ClassifiedError`] is the normalized value every public operation
//!   returns. `zonesync-core` turns the former into the latter.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;
use thiserror::Error;

/// Normalized error codes, with the remote store's numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Engine-side logic error (also: invalid call such as an empty mutation).
    InternalError,
    /// Some items in a batch failed; see the per-item errors.
    PartialFailure,
    /// No network route.
    NetworkUnavailable,
    /// Network dropped mid-request.
    NetworkFailure,
    /// Unknown or misconfigured container.
    BadContainer,
    /// Store temporarily unavailable.
    ServiceUnavailable,
    /// Client is sending too many requests.
    RequestRateLimited,
    /// Application lacks the entitlement to use the store.
    MissingEntitlement,
    /// No authenticated account.
    NotAuthenticated,
    /// Account lacks permission for the operation.
    PermissionFailure,
    /// Item does not exist.
    UnknownItem,
    /// Malformed request.
    InvalidArguments,
    /// Result set was truncated by the server.
    ResultsTruncated,
    /// Record changed on the server since it was fetched.
    ServerRecordChanged,
    /// Server refused the request.
    ServerRejectedRequest,
    /// Asset file missing on the client.
    AssetFileNotFound,
    /// Asset file modified during upload.
    AssetFileModified,
    /// Client version too old.
    IncompatibleVersion,
    /// Unique constraint violated.
    ConstraintViolation,
    /// Operation cancelled before completion.
    OperationCancelled,
    /// Stored change token is no longer valid; a full resync is required.
    ChangeTokenExpired,
    /// Item failed because another item in the same atomic batch failed.
    BatchRequestFailed,
    /// Zone is busy; retry later.
    ZoneBusy,
    /// Operation not supported by this database scope.
    BadDatabase,
    /// Account storage quota exceeded.
    QuotaExceeded,
    /// Zone does not exist.
    ZoneNotFound,
    /// Request payload too large for one batch.
    LimitExceeded,
    /// The user deleted the zone.
    UserDeletedZone,
    /// Share has too many participants.
    TooManyParticipants,
    /// Record is already shared.
    AlreadyShared,
    /// Target of a reference does not exist.
    ReferenceViolation,
    /// Managed account restrictions prevent the operation.
    ManagedAccountRestricted,
    /// Share participant needs to verify their identity.
    ParticipantMayNeedVerification,
    /// Server processed the request but the response never arrived.
    ServerResponseLost,
    /// Asset is not available on the server.
    AssetNotAvailable,
    /// Account temporarily unavailable.
    AccountTemporarilyUnavailable,
    /// A code this client does not know.
    Unknown(i64),
}

impl ErrorCode {
    /// Map a numeric store code.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::InternalError,
            2 => Self::PartialFailure,
            3 => Self::NetworkUnavailable,
            4 => Self::NetworkFailure,
            5 => Self::BadContainer,
            6 => Self::ServiceUnavailable,
            7 => Self::RequestRateLimited,
            8 => Self::MissingEntitlement,
            9 => Self::NotAuthenticated,
            10 => Self::PermissionFailure,
            11 => Self::UnknownItem,
            12 => Self::InvalidArguments,
            13 => Self::ResultsTruncated,
            14 => Self::ServerRecordChanged,
            15 => Self::ServerRejectedRequest,
            16 => Self::AssetFileNotFound,
            17 => Self::AssetFileModified,
            18 => Self::IncompatibleVersion,
            19 => Self::ConstraintViolation,
            20 => Self::OperationCancelled,
            21 => Self::ChangeTokenExpired,
            22 => Self::BatchRequestFailed,
            23 => Self::ZoneBusy,
            24 => Self::BadDatabase,
            25 => Self::QuotaExceeded,
            26 => Self::ZoneNotFound,
            27 => Self::LimitExceeded,
            28 => Self::UserDeletedZone,
            29 => Self::TooManyParticipants,
            30 => Self::AlreadyShared,
            31 => Self::ReferenceViolation,
            32 => Self::ManagedAccountRestricted,
            33 => Self::ParticipantMayNeedVerification,
            34 => Self::ServerResponseLost,
            35 => Self::AssetNotAvailable,
            36 => Self::AccountTemporarilyUnavailable,
            other => Self::Unknown(other),
        }
    }

    /// Numeric store code.
    pub fn code(&self) -> i64 {
        match self {
            Self::InternalError => 1,
            Self::PartialFailure => 2,
            Self::NetworkUnavailable => 3,
            Self::NetworkFailure => 4,
            Self::BadContainer => 5,
            Self::ServiceUnavailable => 6,
            Self::RequestRateLimited => 7,
            Self::MissingEntitlement => 8,
            Self::NotAuthenticated => 9,
            Self::PermissionFailure => 10,
            Self::UnknownItem => 11,
            Self::InvalidArguments => 12,
            Self::ResultsTruncated => 13,
            Self::ServerRecordChanged => 14,
            Self::ServerRejectedRequest => 15,
            Self::AssetFileNotFound => 16,
            Self::AssetFileModified => 17,
            Self::IncompatibleVersion => 18,
            Self::ConstraintViolation => 19,
            Self::OperationCancelled => 20,
            Self::ChangeTokenExpired => 21,
            Self::BatchRequestFailed => 22,
            Self::ZoneBusy => 23,
            Self::BadDatabase => 24,
            Self::QuotaExceeded => 25,
            Self::ZoneNotFound => 26,
            Self::LimitExceeded => 27,
            Self::UserDeletedZone => 28,
            Self::TooManyParticipants => 29,
            Self::AlreadyShared => 30,
            Self::ReferenceViolation => 31,
            Self::ManagedAccountRestricted => 32,
            Self::ParticipantMayNeedVerification => 33,
            Self::ServerResponseLost => 34,
            Self::AssetNotAvailable => 35,
            Self::AccountTemporarilyUnavailable => 36,
            Self::Unknown(code) => *code,
        }
    }

    /// Taxonomy bucket this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NetworkUnavailable
            | Self::NetworkFailure
            | Self::ServiceUnavailable
            | Self::ServerResponseLost
            | Self::RequestRateLimited
            | Self::ZoneBusy => ErrorCategory::Network,

            Self::LimitExceeded | Self::PartialFailure | Self::BatchRequestFailed => {
                ErrorCategory::Batch
            }

            Self::InvalidArguments
            | Self::ChangeTokenExpired
            | Self::ServerRejectedRequest
            | Self::ConstraintViolation
            | Self::ResultsTruncated
            | Self::ReferenceViolation
            | Self::AssetFileNotFound
            | Self::AssetFileModified
            | Self::AssetNotAvailable => ErrorCategory::Request,

            Self::ServerRecordChanged => ErrorCategory::Conflict,

            Self::UnknownItem | Self::ZoneNotFound | Self::UserDeletedZone => {
                ErrorCategory::NotFound
            }

            Self::NotAuthenticated
            | Self::AccountTemporarilyUnavailable
            | Self::ManagedAccountRestricted
            | Self::QuotaExceeded => ErrorCategory::Account,

            Self::PermissionFailure | Self::MissingEntitlement => ErrorCategory::Permission,

            Self::TooManyParticipants
            | Self::AlreadyShared
            | Self::ParticipantMayNeedVerification => ErrorCategory::Share,

            Self::OperationCancelled => ErrorCategory::Cancelled,
            Self::InternalError => ErrorCategory::Internal,

            Self::BadContainer
            | Self::BadDatabase
            | Self::IncompatibleVersion
            | Self::Unknown(_) => ErrorCategory::NonRecoverable,
        }
    }

    /// Whether the engine may retry an operation that failed with this code.
    ///
    /// Exactly the network and batch buckets.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Batch
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown error {}", code),
            other => write!(f, "{:?} ({})", other, other.code()),
        }
    }
}

/// Coarse taxonomy used to decide how a failure is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transient connectivity or throttling. Retriable.
    Network,
    /// Batch sizing or atomic-batch fallout. Retriable.
    Batch,
    /// Caller or request problem. Not retried.
    Request,
    /// Concurrent modification; surfaced for caller-side merge.
    Conflict,
    /// Missing item or zone.
    NotFound,
    /// Account state.
    Account,
    /// Permission or entitlement.
    Permission,
    /// Sharing.
    Share,
    /// Never retried; escalate.
    NonRecoverable,
    /// Cooperative cancellation was observed.
    Cancelled,
    /// Engine logic error.
    Internal,
}

/// Failure below the store protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailure {
    /// No route to the store.
    Unreachable,
    /// Connection dropped before a response.
    ConnectionLost,
    /// Request was delivered but its response was lost.
    ResponseLost,
    /// Store answered with a retry-later status.
    Unavailable,
    /// Store throttled the client.
    Throttled,
}

/// Error as reported by a remote store implementation, before classification.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RawError<K: Eq + Hash> {
    /// The store reported a coded error.
    #[error("store error {code}: {message}")]
    Store {
        /// Numeric store code.
        code: i64,
        /// Human-readable message.
        message: String,
        /// Server-suggested delay before retrying, in seconds.
        retry_after_secs: Option<f64>,
        /// Per-item errors keyed by item identity.
        item_errors: HashMap<K, RawError<K>>,
    },

    /// The request never completed at the transport level.
    #[error("transport failure ({failure:?}): {message}")]
    Transport {
        /// What went wrong.
        failure: TransportFailure,
        /// Detail from the transport.
        message: String,
        /// Delay suggested by the transport (e.g. a Retry-After header).
        retry_after_secs: Option<f64>,
    },

    /// The request exceeded the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl<K: Eq + Hash> RawError<K> {
    /// A coded store error without retry hint or item errors.
    pub fn store(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Store {
            code: code.code(),
            message: message.into(),
            retry_after_secs: None,
            item_errors: HashMap::new(),
        }
    }

    /// A transport failure.
    pub fn transport(failure: TransportFailure, message: impl Into<String>) -> Self {
        Self::Transport {
            failure,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    /// Attach a server-suggested retry delay.
    pub fn with_retry_after(mut self, secs: f64) -> Self {
        match &mut self {
            Self::Store {
                retry_after_secs, ..
            }
            | Self::Transport {
                retry_after_secs, ..
            } => *retry_after_secs = Some(secs),
            Self::Timeout(_) => {}
        }
        self
    }

    /// Attach a per-item error. No-op on non-store errors.
    pub fn with_item_error(mut self, key: K, error: RawError<K>) -> Self {
        if let Self::Store { item_errors, .. } = &mut self {
            item_errors.insert(key, error);
        }
        self
    }
}

/// A normalized error with retry hint and per-item sub-errors.
///
/// Generic over the item identity used to key sub-errors, so one type serves
/// record batches ([`RecordError`]) and zone fetches ([`ZoneError`]).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {description}")]
pub struct ClassifiedError<K: Eq + Hash> {
    /// Normalized code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub description: String,
    /// Server-suggested delay before retrying; zero when none was given.
    pub retry_after: Duration,
    /// Per-item errors keyed by item identity.
    pub batch_errors: HashMap<K, ClassifiedError<K>>,
}

/// Classified error keyed by record.
pub type RecordError = ClassifiedError<crate::RecordId>;

/// Classified error keyed by zone.
pub type ZoneError = ClassifiedError<crate::ZoneId>;

impl<K: Eq + Hash> ClassifiedError<K> {
    /// Create an error with no retry hint and no sub-errors.
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            retry_after: Duration::ZERO,
            batch_errors: HashMap::new(),
        }
    }

    /// Engine-side logic error.
    pub fn internal(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, description)
    }

    /// Cooperative cancellation was observed.
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::OperationCancelled, "operation cancelled")
    }

    /// Set the retry delay.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = delay;
        self
    }

    /// Add one per-item error.
    pub fn with_batch_error(mut self, key: K, error: ClassifiedError<K>) -> Self {
        self.batch_errors.insert(key, error);
        self
    }

    /// Whether the code is in the retriable set.
    pub fn is_retriable(&self) -> bool {
        self.code.is_retriable()
    }

    /// Whether per-item sub-errors are present.
    pub fn has_multiple_errors(&self) -> bool {
        !self.batch_errors.is_empty()
    }

    /// Taxonomy bucket.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// The stored change token must be discarded.
    pub fn is_token_expired(&self) -> bool {
        self.code == ErrorCode::ChangeTokenExpired
    }

    /// The batch was too large.
    pub fn is_overflow(&self) -> bool {
        self.code == ErrorCode::LimitExceeded
    }

    /// Cancellation was observed.
    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::OperationCancelled
    }

    /// Sub-error for one item.
    pub fn sub_error(&self, key: &K) -> Option<&ClassifiedError<K>> {
        self.batch_errors.get(key)
    }

    /// Re-key the sub-errors. When two keys collapse onto one, the first
    /// one visited wins.
    pub fn map_keys<K2, F>(self, f: F) -> ClassifiedError<K2>
    where
        K2: Eq + Hash,
        F: Fn(K) -> K2 + Copy,
    {
        let mut batch_errors = HashMap::with_capacity(self.batch_errors.len());
        for (key, error) in self.batch_errors {
            batch_errors
                .entry(f(key))
                .or_insert_with(|| error.map_keys(f));
        }
        ClassifiedError {
            code: self.code,
            description: self.description,
            retry_after: self.retry_after,
            batch_errors,
        }
    }
}
