//! Read, scan and delete types for querying key-value state.

use serde::Deserialize;
use serde::Serialize;

use crate::KeyValueWithRevision;

/// Request to read a single key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadRequest {
    pub key: String,
}

impl ReadRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Response from a read operation.
///
/// An absent key is `kv: None`, never an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReadResult {
    pub kv: Option<KeyValueWithRevision>,
}

/// Request to scan keys under a prefix, one page at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRequest {
    pub prefix: String,
    /// Maximum entries in this page, capped at [`crate::MAX_SCAN_RESULTS`].
    pub limit: u32,
    /// Only return keys strictly after this one. `None` starts at the prefix.
    pub continuation_token: Option<String>,
}

impl ScanRequest {
    /// First page of `prefix`.
    pub fn new(prefix: impl Into<String>, limit: u32) -> Self {
        Self {
            prefix: prefix.into(),
            limit,
            continuation_token: None,
        }
    }

    /// The page following the one that ended at `last_key`.
    pub fn after(mut self, last_key: impl Into<String>) -> Self {
        self.continuation_token = Some(last_key.into());
        self
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.min(crate::MAX_SCAN_RESULTS)
    }
}

/// Response from a scan, entries ordered by key.
///
/// `is_truncated` means more keys follow; continue with
/// [`ScanRequest::after`] and the last returned key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ScanResult {
    pub entries: Vec<KeyValueWithRevision>,
    pub is_truncated: bool,
}

/// Request to delete a key from the distributed store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: String,
}

impl DeleteRequest {
    /// Create a delete request for the specified key.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Result of a delete operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResult {
    pub key: String,
    /// Whether the key existed and was deleted.
    pub is_deleted: bool,
}
