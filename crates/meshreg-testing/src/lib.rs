//! Testing infrastructure for the mesh registry.
//!
//! - [`FaultInjectingCluster`]: wraps [`InMemoryCluster`] with operation
//!   counters and on-demand failures or panics
//! - [`ReadinessGate`]: a switchable readiness predicate that counts calls
//! - [`instance_store`]: an [`InstanceStore`] over any cluster backend
//!
//! ```ignore
//! let cluster = FaultInjectingCluster::new();
//! let store = instance_store(cluster.clone());
//!
//! cluster.fail_next_writes(1);
//! // ... exercise the reconciler ...
//! assert_eq!(cluster.writes(), 2);
//! ```

mod fault;
mod gate;

use std::sync::Arc;

pub use fault::FaultInjectingCluster;
pub use gate::ReadinessGate;
pub use meshreg_storage::InMemoryCluster;
use meshreg_storage::ClusterStorage;
use meshreg_storage::InstanceStore;
use meshreg_traits::ClusterBackend;

/// Storage name used by test stores.
pub const TEST_STORAGE_NAME: &str = "meshreg-test";

/// Build an [`InstanceStore`] writing through `cluster`.
pub fn instance_store<C: ClusterBackend + 'static>(cluster: Arc<C>) -> InstanceStore {
    InstanceStore::new(Arc::new(ClusterStorage::new(TEST_STORAGE_NAME, cluster)))
}
