//! Cache layer
//!
//! The cache is the single shared resource between one pipeline execution
//! and its concurrent readers: the driver writes status and outputs, the
//! serving layer polls them, and a client-set cancel flag travels back the
//! other way. Keys are pipeline UUIDs; each key owns a small set of typed
//! slots selected by a [`SubKey`].
//!
//! The trait is async and object-safe so backends can be swapped without
//! touching the engine; [`LocalCache`] is the in-memory default.

mod local;

pub use local::LocalCache;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use playpen_core::domain::Status;

/// Slot selector under one pipeline key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubKey {
    /// Current lifecycle status of the pipeline
    Status,
    /// Output produced by the run stage, appended incrementally
    RunOutput,
    /// Captured stderr of a failed run stage
    RunError,
    /// Output of the compile stage (or its failure payload)
    CompileOutput,
    /// Client-set flag requesting cancellation
    Canceled,
    /// Index of the last run-output chunk written, for incremental readers
    RunOutputIndex,
}

/// Value stored in one cache slot.
///
/// Each sub-key stores exactly one of these shapes; readers use the
/// accessors and treat a mismatch as an internal error.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Status(Status),
    Text(String),
    Flag(bool),
    Index(usize),
}

impl Value {
    pub fn as_status(&self) -> Option<Status> {
        match self {
            Value::Status(status) => Some(*status),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Index(index) => Some(*index),
            _ => None,
        }
    }
}

/// Error returned by cache operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("no entry for pipeline {0}")]
    KeyNotFound(Uuid),

    #[error("no value for pipeline {key} under {sub_key:?}")]
    SubKeyNotFound { key: Uuid, sub_key: SubKey },

    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Keyed store shared between the pipeline driver and its readers.
///
/// Implementations must be safe for concurrent access across different
/// keys; per-key write serialization is the driver's responsibility.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Reads the value stored for a pipeline under a sub-key.
    ///
    /// Absence of the key or the sub-key is an error.
    async fn get_value(&self, key: Uuid, sub_key: SubKey) -> Result<Value, CacheError>;

    /// Stores a value for a pipeline under a sub-key, overwriting any
    /// previous value in that slot.
    async fn set_value(&self, key: Uuid, sub_key: SubKey, value: Value) -> Result<(), CacheError>;
}
