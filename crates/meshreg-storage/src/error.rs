//! Error types for the storage facade.

use meshreg_kv_types::KeyValueStoreError;
use snafu::Snafu;

/// Errors from the storage facade and the instance record store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Underlying store operation failed.
    #[snafu(display("storage error: {source}"))]
    Kv {
        /// The underlying error.
        source: KeyValueStoreError,
    },

    /// The named distributed mutex could not be created.
    #[snafu(display("create mutex for {name} failed: {source}"))]
    MutexCreate {
        /// Mutex name.
        name: String,
        /// The underlying error.
        source: KeyValueStoreError,
    },

    /// The backend could not provide a session lease.
    #[snafu(display("session lease unavailable: {source}"))]
    Lease {
        /// The underlying error.
        source: KeyValueStoreError,
    },

    /// A paged prefix read stopped making progress before the prefix was exhausted.
    #[snafu(display("prefix read of '{prefix}' stopped before the last page"))]
    IncompleteScan {
        /// The prefix being read.
        prefix: String,
    },

    /// A stored record could not be parsed.
    #[snafu(display("corrupted record in key '{key}': {source}"))]
    CorruptedRecord {
        /// The key with corrupted data.
        key: String,
        /// The parse error.
        source: serde_json::Error,
    },

    /// A record could not be encoded.
    #[snafu(display("serialization error: {source}"))]
    Serialization {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Whether this is a lost compare-and-swap race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Kv {
            source: KeyValueStoreError::CompareAndSwapFailed { .. }
        })
    }

    /// Whether the same call may succeed if tried again later.
    ///
    /// Corrupt records and encoding failures never heal on their own.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Kv { source } | StorageError::MutexCreate { source, .. } | StorageError::Lease { source } => {
                source.is_retryable()
            }
            StorageError::IncompleteScan { .. } => true,
            StorageError::CorruptedRecord { .. } | StorageError::Serialization { .. } => false,
        }
    }
}

impl From<KeyValueStoreError> for StorageError {
    fn from(source: KeyValueStoreError) -> Self {
        StorageError::Kv { source }
    }
}
