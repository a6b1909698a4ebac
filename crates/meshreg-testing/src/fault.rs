//! Fault-injecting cluster backend.

use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

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
use meshreg_storage::InMemoryCluster;
use meshreg_traits::ClusterBackend;
use meshreg_traits::DistributedMutex;
use meshreg_traits::KeyValueStore;
use tracing::debug;

/// [`InMemoryCluster`] wrapper that counts operations and injects faults.
///
/// Reads cover `read` and `scan`; writes cover `write` and `delete`. Every call
/// is counted, including the ones that fail or panic.
#[derive(Default)]
pub struct FaultInjectingCluster {
    inner: Arc<InMemoryCluster>,
    reads: AtomicU64,
    writes: AtomicU64,
    fail_reads: AtomicU32,
    fail_writes: AtomicU32,
    panic_reads: AtomicU32,
    panic_writes: AtomicU32,
}

/// Decrement `counter` if positive. Returns whether it was.
fn take_one(counter: &AtomicU32) -> bool {
    counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
}

impl FaultInjectingCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wrap an existing cluster, sharing its data.
    pub fn wrap(inner: Arc<InMemoryCluster>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            ..Self::default()
        })
    }

    /// The wrapped cluster. Operations on it are not counted.
    pub fn inner(&self) -> &Arc<InMemoryCluster> {
        &self.inner
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Reads plus writes.
    pub fn operations(&self) -> u64 {
        self.reads() + self.writes()
    }

    pub fn reset_counts(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Fail the next `n` reads with [`KeyValueStoreError::Unavailable`].
    pub fn fail_next_reads(&self, n: u32) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes with [`KeyValueStoreError::Unavailable`].
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Panic inside the next `n` reads.
    pub fn panic_next_reads(&self, n: u32) {
        self.panic_reads.store(n, Ordering::SeqCst);
    }

    /// Panic inside the next `n` writes.
    pub fn panic_next_writes(&self, n: u32) {
        self.panic_writes.store(n, Ordering::SeqCst);
    }

    fn before_read(&self) -> Result<(), KeyValueStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.panic_reads) {
            panic!("injected read panic");
        }
        if take_one(&self.fail_reads) {
            debug!("injecting read failure");
            return Err(KeyValueStoreError::Unavailable {
                reason: "injected read failure".into(),
            });
        }
        Ok(())
    }

    fn before_write(&self) -> Result<(), KeyValueStoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.panic_writes) {
            panic!("injected write panic");
        }
        if take_one(&self.fail_writes) {
            debug!("injecting write failure");
            return Err(KeyValueStoreError::Unavailable {
                reason: "injected write failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FaultInjectingCluster {
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        self.before_write()?;
        self.inner.write(request).await
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        self.before_read()?;
        self.inner.read(request).await
    }

    async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult, KeyValueStoreError> {
        self.before_write()?;
        self.inner.delete(request).await
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        self.before_read()?;
        self.inner.scan(request).await
    }
}

#[async_trait]
impl ClusterBackend for FaultInjectingCluster {
    async fn session_lease(&self) -> Result<u64, KeyValueStoreError> {
        self.inner.session_lease().await
    }

    async fn mutex(&self, name: &str) -> Result<Arc<dyn DistributedMutex>, KeyValueStoreError> {
        self.inner.mutex(name).await
    }
}
