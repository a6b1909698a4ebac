//! Key-value types shared by the registry store and its backends.
//!
//! These types describe the narrow contract the registration reconciler
//! consumes: point reads, prefix scans, plain and lease-bound writes, atomic
//! put-and-delete batches, deletes and compare-and-swap.

mod batch;
mod read;
mod write;

pub use batch::BatchOperation;
pub use read::DeleteRequest;
pub use read::DeleteResult;
pub use read::ReadRequest;
pub use read::ReadResult;
pub use read::ScanRequest;
pub use read::ScanResult;
use serde::Deserialize;
use serde::Serialize;
pub use write::WriteCommand;
pub use write::WriteRequest;
pub use write::WriteResult;

/// Hard upper bound on entries returned by a single scan.
pub const MAX_SCAN_RESULTS: u32 = 10_000;

/// A stored value together with its revision metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValueWithRevision {
    pub key: String,
    pub value: String,
    /// Revision at which the key was created.
    pub create_revision: u64,
    /// Revision of the last modification.
    pub mod_revision: u64,
    /// Number of modifications since creation.
    pub version: u64,
}

/// Errors returned by a registry store backend.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum KeyValueStoreError {
    #[error("compare-and-swap failed for key '{key}': expected {expected:?}, actual {actual:?}")]
    CompareAndSwapFailed {
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },
    #[error("lease {lease_id} not found")]
    LeaseNotFound { lease_id: u64 },
    #[error("lock '{name}' is not held")]
    LockNotHeld { name: String },
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl KeyValueStoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeyValueStoreError::Timeout { .. }
                | KeyValueStoreError::Unavailable { .. }
                | KeyValueStoreError::CompareAndSwapFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_error_timeout_display() {
        let err = KeyValueStoreError::Timeout { duration_ms: 30000 };
        assert_eq!(err.to_string(), "operation timed out after 30000ms");
    }

    #[test]
    fn kv_error_lock_not_held_display() {
        let err = KeyValueStoreError::LockNotHeld {
            name: "mesh".to_string(),
        };
        assert_eq!(err.to_string(), "lock 'mesh' is not held");
    }

    #[test]
    fn retryable_classification() {
        assert!(KeyValueStoreError::Timeout { duration_ms: 1 }.is_retryable());
        assert!(
            KeyValueStoreError::Unavailable {
                reason: "partition".into()
            }
            .is_retryable()
        );
        assert!(!KeyValueStoreError::LeaseNotFound { lease_id: 7 }.is_retryable());
        assert!(!KeyValueStoreError::LockNotHeld { name: "mesh".into() }.is_retryable());
    }
}
