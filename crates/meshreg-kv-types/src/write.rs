//! Write operation types for modifying key-value state.

use serde::Deserialize;
use serde::Serialize;

use crate::batch::BatchOperation;

/// Commands for modifying key-value state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WriteCommand {
    /// Set a single key-value pair.
    Set { key: String, value: String },
    /// Set a key attached to a lease; it disappears when the lease expires.
    SetWithLease { key: String, value: String, lease_id: u64 },
    /// Delete a single key.
    Delete { key: String },
    /// Delete every key under a prefix.
    DeletePrefix { prefix: String },
    /// Compare-and-swap: update only if the current value matches `expected`
    /// (`None` = key must be absent).
    CompareAndSwap {
        key: String,
        expected: Option<String>,
        new_value: String,
    },
    /// Atomically apply multiple Set/Delete operations.
    Batch { operations: Vec<BatchOperation> },
    /// Atomically apply a batch whose Set operations are attached to a lease.
    BatchWithLease {
        operations: Vec<BatchOperation>,
        lease_id: u64,
    },
}

/// Request to perform a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteRequest {
    pub command: WriteCommand,
}

impl WriteRequest {
    /// Create a Set command to store a key-value pair.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Set {
                key: key.into(),
                value: value.into(),
            },
        }
    }

    /// Create a lease-bound Set command.
    pub fn set_with_lease(key: impl Into<String>, value: impl Into<String>, lease_id: u64) -> Self {
        Self {
            command: WriteCommand::SetWithLease {
                key: key.into(),
                value: value.into(),
                lease_id,
            },
        }
    }

    /// Create a Delete command.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Delete { key: key.into() },
        }
    }

    /// Create a DeletePrefix command.
    pub fn delete_prefix(prefix: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::DeletePrefix { prefix: prefix.into() },
        }
    }

    /// Create a CompareAndSwap command.
    pub fn compare_and_swap(key: impl Into<String>, expected: Option<String>, new_value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::CompareAndSwap {
                key: key.into(),
                expected,
                new_value: new_value.into(),
            },
        }
    }

    /// Create an atomic batch.
    pub fn batch(operations: Vec<BatchOperation>) -> Self {
        Self {
            command: WriteCommand::Batch { operations },
        }
    }

    /// Create an atomic batch attached to a lease.
    pub fn batch_with_lease(operations: Vec<BatchOperation>, lease_id: u64) -> Self {
        Self {
            command: WriteCommand::BatchWithLease { operations, lease_id },
        }
    }
}

/// Result of a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WriteResult {
    /// Store revision after the write was applied.
    pub header_revision: Option<u64>,
    /// Keys removed by Delete/DeletePrefix/batch deletes.
    pub keys_deleted: Option<u32>,
}
