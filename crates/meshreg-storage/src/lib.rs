//! Storage facade for the mesh instance registry.
//!
//! - [`Storage`] / [`ClusterStorage`]: pass-through facade over a
//!   [`ClusterBackend`](meshreg_traits::ClusterBackend) with a lazily created
//!   named distributed mutex
//! - [`InstanceStore`]: typed get/put of [`ServiceInstanceSpec`](meshreg_types::ServiceInstanceSpec)
//!   records
//! - [`InMemoryCluster`]: single-process backend with leases and named mutexes
//!
//! Nothing here caches. Consistency and staleness bounds are whatever the
//! backend provides.

mod error;
mod inmemory;
mod instance;
mod storage;

pub use error::StorageError;
pub use inmemory::InMemoryCluster;
pub use inmemory::InMemoryMutex;
pub use instance::InstanceEntry;
pub use instance::InstanceStore;
pub use storage::ClusterStorage;
pub use storage::Storage;
