//! Pass-through storage facade over a cluster backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use meshreg_kv_types::BatchOperation;
use meshreg_kv_types::DeleteRequest;
use meshreg_kv_types::KeyValueWithRevision;
use meshreg_kv_types::MAX_SCAN_RESULTS;
use meshreg_kv_types::ReadRequest;
use meshreg_kv_types::ScanRequest;
use meshreg_kv_types::WriteRequest;
use meshreg_traits::ClusterBackend;
use meshreg_traits::DistributedMutex;
use snafu::ResultExt;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use crate::error::IncompleteScanSnafu;
use crate::error::KvSnafu;
use crate::error::LeaseSnafu;
use crate::error::MutexCreateSnafu;
use crate::error::StorageError;

/// Storage APIs the mesh registry is built on.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Acquire the named distributed mutex, blocking until it is held.
    async fn lock(&self) -> Result<(), StorageError>;
    /// Release the named distributed mutex.
    async fn unlock(&self) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn get_raw(&self, key: &str) -> Result<Option<KeyValueWithRevision>, StorageError>;
    async fn get_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>, StorageError>;
    async fn get_raw_prefix(&self, prefix: &str) -> Result<BTreeMap<String, KeyValueWithRevision>, StorageError>;

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Put a value that disappears when the session lease expires.
    async fn put_under_lease(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Atomically apply puts (`Some`) and deletes (`None`).
    async fn put_and_delete(&self, kvs: BTreeMap<String, Option<String>>) -> Result<(), StorageError>;
    /// Like [`Storage::put_and_delete`] with the puts bound to the session lease.
    async fn put_and_delete_under_lease(&self, kvs: BTreeMap<String, Option<String>>) -> Result<(), StorageError>;
    /// Put `value` only if the current value equals `expected` (`None` = absent).
    async fn compare_and_put(&self, key: &str, expected: Option<&str>, value: &str) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError>;
}

/// [`Storage`] implementation delegating to a [`ClusterBackend`].
pub struct ClusterStorage<C: ClusterBackend + ?Sized> {
    name: String,
    cluster: Arc<C>,
    mutex: Mutex<Option<Arc<dyn DistributedMutex>>>,
}

impl<C: ClusterBackend + ?Sized + 'static> ClusterStorage<C> {
    /// Create a facade whose distributed mutex is named `name`.
    ///
    /// The mutex handle is created on first [`Storage::lock`]/[`Storage::unlock`].
    pub fn new(name: impl Into<String>, cluster: Arc<C>) -> Self {
        Self {
            name: name.into(),
            cluster,
            mutex: Mutex::new(None),
        }
    }

    /// Create a facade and eagerly try to create its mutex.
    ///
    /// A failure is logged and retried on first use.
    pub async fn connect(name: impl Into<String>, cluster: Arc<C>) -> Self {
        let storage = Self::new(name, cluster);
        if let Err(e) = storage.mutex_ready().await {
            warn!(name = %storage.name, error = %e, "distributed mutex not ready yet");
        }
        storage
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the cached mutex handle, creating it if needed.
    ///
    /// A failed creation is not cached.
    async fn mutex_ready(&self) -> Result<Arc<dyn DistributedMutex>, StorageError> {
        let mut slot = self.mutex.lock().await;
        if let Some(mutex) = slot.as_ref() {
            return Ok(Arc::clone(mutex));
        }

        let mutex = self.cluster.mutex(&self.name).await.context(MutexCreateSnafu { name: self.name.clone() })?;
        debug!(name = %self.name, "distributed mutex created");
        *slot = Some(Arc::clone(&mutex));
        Ok(mutex)
    }

    /// Read every entry under `prefix`, following continuation pages.
    async fn scan_all(&self, prefix: &str) -> Result<Vec<KeyValueWithRevision>, StorageError> {
        let mut entries = Vec::new();
        let mut request = ScanRequest::new(prefix, MAX_SCAN_RESULTS);
        loop {
            let page = self.cluster.scan(request.clone()).await.context(KvSnafu)?;
            let is_truncated = page.is_truncated;
            entries.extend(page.entries);
            if !is_truncated {
                return Ok(entries);
            }

            let last_key = entries.last().map(|kv| kv.key.clone());
            let Some(last_key) = last_key.filter(|key| request.continuation_token.as_ref() != Some(key)) else {
                return IncompleteScanSnafu { prefix }.fail();
            };
            debug!(prefix, fetched = entries.len(), "prefix read continues");
            request = request.after(last_key);
        }
    }

    fn batch(kvs: BTreeMap<String, Option<String>>) -> Vec<BatchOperation> {
        kvs.into_iter().map(|(key, value)| BatchOperation::from_entry(key, value)).collect()
    }
}

#[async_trait]
impl<C: ClusterBackend + ?Sized + 'static> Storage for ClusterStorage<C> {
    async fn lock(&self) -> Result<(), StorageError> {
        let mutex = self.mutex_ready().await?;
        mutex.lock().await.context(KvSnafu)
    }

    async fn unlock(&self) -> Result<(), StorageError> {
        let mutex = self.mutex_ready().await?;
        mutex.unlock().await.context(KvSnafu)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get_raw(key).await?.map(|kv| kv.value))
    }

    async fn get_raw(&self, key: &str) -> Result<Option<KeyValueWithRevision>, StorageError> {
        let result = self.cluster.read(ReadRequest::new(key)).await.context(KvSnafu)?;
        Ok(result.kv)
    }

    async fn get_prefix(&self, prefix: &str) -> Result<BTreeMap<String, String>, StorageError> {
        let entries = self.scan_all(prefix).await?;
        Ok(entries.into_iter().map(|kv| (kv.key, kv.value)).collect())
    }

    async fn get_raw_prefix(&self, prefix: &str) -> Result<BTreeMap<String, KeyValueWithRevision>, StorageError> {
        let entries = self.scan_all(prefix).await?;
        Ok(entries.into_iter().map(|kv| (kv.key.clone(), kv)).collect())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.cluster.write(WriteRequest::set(key, value)).await.context(KvSnafu)?;
        Ok(())
    }

    async fn put_under_lease(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let lease_id = self.cluster.session_lease().await.context(LeaseSnafu)?;
        self.cluster.write(WriteRequest::set_with_lease(key, value, lease_id)).await.context(KvSnafu)?;
        Ok(())
    }

    async fn put_and_delete(&self, kvs: BTreeMap<String, Option<String>>) -> Result<(), StorageError> {
        self.cluster.write(WriteRequest::batch(Self::batch(kvs))).await.context(KvSnafu)?;
        Ok(())
    }

    async fn put_and_delete_under_lease(&self, kvs: BTreeMap<String, Option<String>>) -> Result<(), StorageError> {
        let lease_id = self.cluster.session_lease().await.context(LeaseSnafu)?;
        self.cluster.write(WriteRequest::batch_with_lease(Self::batch(kvs), lease_id)).await.context(KvSnafu)?;
        Ok(())
    }

    async fn compare_and_put(&self, key: &str, expected: Option<&str>, value: &str) -> Result<(), StorageError> {
        self.cluster
            .write(WriteRequest::compare_and_swap(key, expected.map(str::to_string), value))
            .await
            .context(KvSnafu)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.cluster.delete(DeleteRequest::new(key)).await.context(KvSnafu)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        self.cluster.write(WriteRequest::delete_prefix(prefix)).await.context(KvSnafu)?;
        Ok(())
    }
}
