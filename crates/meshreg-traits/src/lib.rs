//! Core traits for the replicated registry store.
//!
//! The registration reconciler never talks to a storage engine directly. It
//! consumes these traits, which any replicated key-value store with leases and
//! a named mutex can implement.

use std::sync::Arc;

use async_trait::async_trait;
use meshreg_kv_types::DeleteRequest;
use meshreg_kv_types::DeleteResult;
use meshreg_kv_types::KeyValueStoreError;
use meshreg_kv_types::ReadRequest;
use meshreg_kv_types::ReadResult;
use meshreg_kv_types::ScanRequest;
use meshreg_kv_types::ScanResult;
use meshreg_kv_types::WriteRequest;
use meshreg_kv_types::WriteResult;

/// Distributed key-value store interface.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Apply a write command.
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError>;

    /// Read a value by key. An absent key is `Ok` with `kv: None`.
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError>;

    /// Delete a key from the store.
    async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult, KeyValueStoreError>;

    /// Scan keys matching a prefix, ordered by key.
    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError>;
}

// Blanket implementation for Arc<T>
#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        (**self).write(request).await
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        (**self).read(request).await
    }

    async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult, KeyValueStoreError> {
        (**self).delete(request).await
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        (**self).scan(request).await
    }
}

/// A named mutual-exclusion primitive spanning process boundaries.
///
/// `lock` blocks until the mutex is acquired. `unlock` releases it and fails
/// with [`KeyValueStoreError::LockNotHeld`] when the caller does not hold it.
#[async_trait]
pub trait DistributedMutex: Send + Sync {
    /// Name the mutex was created with.
    fn name(&self) -> &str;

    async fn lock(&self) -> Result<(), KeyValueStoreError>;

    async fn unlock(&self) -> Result<(), KeyValueStoreError>;
}

/// A replicated store that also hands out session leases and named mutexes.
#[async_trait]
pub trait ClusterBackend: KeyValueStore {
    /// Lease tied to this member's session.
    ///
    /// Keys written under it disappear once the member stops renewing it.
    async fn session_lease(&self) -> Result<u64, KeyValueStoreError>;

    /// Create a handle to the named distributed mutex.
    async fn mutex(&self, name: &str) -> Result<Arc<dyn DistributedMutex>, KeyValueStoreError>;
}

#[async_trait]
impl<T: ClusterBackend + ?Sized> ClusterBackend for Arc<T> {
    async fn session_lease(&self) -> Result<u64, KeyValueStoreError> {
        (**self).session_lease().await
    }

    async fn mutex(&self, name: &str) -> Result<Arc<dyn DistributedMutex>, KeyValueStoreError> {
        (**self).mutex(name).await
    }
}
