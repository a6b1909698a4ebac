//! In-memory implementation of [`ClusterBackend`].
//!
//! Stores key-value pairs in a `BTreeMap` with revision metadata, tracks a
//! single session lease and hands out named mutexes shared by every caller of
//! the same cluster. Used by the sidecar binary's local mode and by tests.
//!
//! # Limitations
//!
//! - One session lease per cluster, expired only via [`InMemoryCluster::expire_session_lease`]
//! - No persistence across restarts
//! - Single process only (mutexes exclude tasks, not OS processes)

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use meshreg_kv_types::BatchOperation;
use meshreg_kv_types::DeleteRequest;
use meshreg_kv_types::DeleteResult;
use meshreg_kv_types::KeyValueStoreError;
use meshreg_kv_types::KeyValueWithRevision;
use meshreg_kv_types::ReadRequest;
use meshreg_kv_types::ReadResult;
use meshreg_kv_types::ScanRequest;
use meshreg_kv_types::ScanResult;
use meshreg_kv_types::WriteCommand;
use meshreg_kv_types::WriteRequest;
use meshreg_kv_types::WriteResult;
use meshreg_traits::ClusterBackend;
use meshreg_traits::DistributedMutex;
use meshreg_traits::KeyValueStore;
use tokio::sync::Mutex;
use tokio::sync::Semaphore;

/// Lease id of the in-memory session.
const SESSION_LEASE_ID: u64 = 1;

#[derive(Debug, Clone)]
struct VersionedValue {
    value: String,
    create_revision: u64,
    mod_revision: u64,
    version: u64,
    lease_id: Option<u64>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    data: BTreeMap<String, VersionedValue>,
    revision: u64,
    lease_expired: bool,
}

impl InMemoryState {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn put(&mut self, key: String, value: String, lease_id: Option<u64>, revision: u64) {
        match self.data.get_mut(&key) {
            Some(existing) => {
                existing.value = value;
                existing.mod_revision = revision;
                existing.version += 1;
                existing.lease_id = lease_id;
            }
            None => {
                self.data.insert(key, VersionedValue {
                    value,
                    create_revision: revision,
                    mod_revision: revision,
                    version: 1,
                    lease_id,
                });
            }
        }
    }

    fn check_lease(&self, lease_id: u64) -> Result<(), KeyValueStoreError> {
        if lease_id != SESSION_LEASE_ID || self.lease_expired {
            return Err(KeyValueStoreError::LeaseNotFound { lease_id });
        }
        Ok(())
    }

    fn apply_batch(&mut self, operations: Vec<BatchOperation>, lease_id: Option<u64>, revision: u64) -> u32 {
        let mut deleted = 0u32;
        for op in operations {
            match op {
                BatchOperation::Set { key, value } => self.put(key, value, lease_id, revision),
                BatchOperation::Delete { key } => {
                    if self.data.remove(&key).is_some() {
                        deleted += 1;
                    }
                }
            }
        }
        deleted
    }
}

/// In-memory cluster backend.
#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<InMemoryState>,
    mutexes: parking_lot::Mutex<HashMap<String, Arc<InMemoryMutex>>>,
}

impl InMemoryCluster {
    /// Create an empty cluster wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Expire the session lease, deleting every key written under it.
    ///
    /// Later lease-bound writes fail with [`KeyValueStoreError::LeaseNotFound`].
    pub async fn expire_session_lease(&self) {
        let mut state = self.state.lock().await;
        state.lease_expired = true;
        state.data.retain(|_, v| v.lease_id != Some(SESSION_LEASE_ID));
    }
}

#[async_trait]
impl KeyValueStore for InMemoryCluster {
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        let mut state = self.state.lock().await;

        let mut keys_deleted = None;
        match request.command {
            WriteCommand::Set { key, value } => {
                let revision = state.next_revision();
                state.put(key, value, None, revision);
            }
            WriteCommand::SetWithLease { key, value, lease_id } => {
                state.check_lease(lease_id)?;
                let revision = state.next_revision();
                state.put(key, value, Some(lease_id), revision);
            }
            WriteCommand::Delete { key } => {
                state.next_revision();
                keys_deleted = Some(u32::from(state.data.remove(&key).is_some()));
            }
            WriteCommand::DeletePrefix { prefix } => {
                state.next_revision();
                let before = state.data.len();
                state.data.retain(|k, _| !k.starts_with(&prefix));
                keys_deleted = Some((before - state.data.len()) as u32);
            }
            WriteCommand::CompareAndSwap {
                key,
                expected,
                new_value,
            } => {
                let current = state.data.get(&key).map(|v| v.value.clone());
                if current != expected {
                    return Err(KeyValueStoreError::CompareAndSwapFailed {
                        key,
                        expected,
                        actual: current,
                    });
                }
                let revision = state.next_revision();
                state.put(key, new_value, None, revision);
            }
            WriteCommand::Batch { operations } => {
                let revision = state.next_revision();
                keys_deleted = Some(state.apply_batch(operations, None, revision));
            }
            WriteCommand::BatchWithLease { operations, lease_id } => {
                state.check_lease(lease_id)?;
                let revision = state.next_revision();
                keys_deleted = Some(state.apply_batch(operations, Some(lease_id), revision));
            }
        }

        Ok(WriteResult {
            header_revision: Some(state.revision),
            keys_deleted,
        })
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        let state = self.state.lock().await;
        let kv = state.data.get(&request.key).map(|v| KeyValueWithRevision {
            key: request.key.clone(),
            value: v.value.clone(),
            create_revision: v.create_revision,
            mod_revision: v.mod_revision,
            version: v.version,
        });
        Ok(ReadResult { kv })
    }

    async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult, KeyValueStoreError> {
        let mut state = self.state.lock().await;
        state.next_revision();
        let is_deleted = state.data.remove(&request.key).is_some();
        Ok(DeleteResult {
            key: request.key,
            is_deleted,
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        let state = self.state.lock().await;
        let limit = request.effective_limit() as usize;
        let start = match &request.continuation_token {
            Some(after) => Bound::Excluded(after.clone()),
            None => Bound::Included(request.prefix.clone()),
        };

        let mut entries: Vec<KeyValueWithRevision> = state
            .data
            .range((start, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(&request.prefix))
            .take(limit + 1)
            .map(|(k, v)| KeyValueWithRevision {
                key: k.clone(),
                value: v.value.clone(),
                create_revision: v.create_revision,
                mod_revision: v.mod_revision,
                version: v.version,
            })
            .collect();

        let is_truncated = entries.len() > limit;
        entries.truncate(limit);
        Ok(ScanResult { entries, is_truncated })
    }
}

#[async_trait]
impl ClusterBackend for InMemoryCluster {
    async fn session_lease(&self) -> Result<u64, KeyValueStoreError> {
        let state = self.state.lock().await;
        state.check_lease(SESSION_LEASE_ID)?;
        Ok(SESSION_LEASE_ID)
    }

    async fn mutex(&self, name: &str) -> Result<Arc<dyn DistributedMutex>, KeyValueStoreError> {
        let mut mutexes = self.mutexes.lock();
        let mutex = mutexes.entry(name.to_string()).or_insert_with(|| Arc::new(InMemoryMutex::new(name)));
        Ok(Arc::clone(mutex) as Arc<dyn DistributedMutex>)
    }
}

/// Named mutex shared by every handle created from the same [`InMemoryCluster`].
pub struct InMemoryMutex {
    name: String,
    permits: Semaphore,
    held: AtomicBool,
}

impl InMemoryMutex {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            permits: Semaphore::new(1),
            held: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DistributedMutex for InMemoryMutex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lock(&self) -> Result<(), KeyValueStoreError> {
        let permit = self.permits.acquire().await.map_err(|_| KeyValueStoreError::Unavailable {
            reason: format!("mutex '{}' closed", self.name),
        })?;
        // Ownership moves to `held`; unlock() returns the permit.
        permit.forget();
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unlock(&self) -> Result<(), KeyValueStoreError> {
        if self.held.compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(KeyValueStoreError::LockNotHeld {
                name: self.name.clone(),
            });
        }
        self.permits.add_permits(1);
        Ok(())
    }
}
