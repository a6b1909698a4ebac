//! Typed access to service instance records.

use std::sync::Arc;

use meshreg_types::ServiceInstanceSpec;
use meshreg_types::keys;
use snafu::ResultExt;
use tracing::debug;

use crate::error::CorruptedRecordSnafu;
use crate::error::SerializationSnafu;
use crate::error::StorageError;
use crate::storage::Storage;

/// A decoded record together with the raw value it was decoded from.
///
/// The raw value is the expectation for a later conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceEntry {
    pub spec: ServiceInstanceSpec,
    pub raw: String,
}

/// Instance record store over any [`Storage`].
#[derive(Clone)]
pub struct InstanceStore {
    storage: Arc<dyn Storage>,
}

impl InstanceStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// The storage facade this store writes through.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Read the record for `(service_name, instance_id)`.
    ///
    /// Absence is `Ok(None)`. A value that does not parse is
    /// [`StorageError::CorruptedRecord`].
    pub async fn get_instance_spec(
        &self,
        service_name: &str,
        instance_id: &str,
    ) -> Result<Option<ServiceInstanceSpec>, StorageError> {
        Ok(self.get_instance_entry(service_name, instance_id).await?.map(|entry| entry.spec))
    }

    /// Read the record and keep its raw encoding.
    pub async fn get_instance_entry(
        &self,
        service_name: &str,
        instance_id: &str,
    ) -> Result<Option<InstanceEntry>, StorageError> {
        let key = keys::instance_spec_key(service_name, instance_id);
        let Some(raw) = self.storage.get(&key).await? else {
            return Ok(None);
        };
        let spec = serde_json::from_str(&raw).context(CorruptedRecordSnafu { key })?;
        Ok(Some(InstanceEntry { spec, raw }))
    }

    /// Write the record unconditionally (last writer wins).
    pub async fn put_instance_spec(&self, spec: &ServiceInstanceSpec) -> Result<(), StorageError> {
        let key = keys::instance_spec_key(&spec.service_name, &spec.instance_id);
        let value = serde_json::to_string(spec).context(SerializationSnafu)?;
        self.storage.put(&key, &value).await?;
        debug!(key = %key, "instance spec written");
        Ok(())
    }

    /// Write the record only if the stored value still equals `expected_raw`
    /// (`None` = the record must still be absent).
    ///
    /// A lost race surfaces as an error for which [`StorageError::is_conflict`] is true.
    pub async fn put_instance_spec_if(
        &self,
        spec: &ServiceInstanceSpec,
        expected_raw: Option<&str>,
    ) -> Result<(), StorageError> {
        let key = keys::instance_spec_key(&spec.service_name, &spec.instance_id);
        let value = serde_json::to_string(spec).context(SerializationSnafu)?;
        self.storage.compare_and_put(&key, expected_raw, &value).await?;
        debug!(key = %key, "instance spec written conditionally");
        Ok(())
    }

    /// Every record of `service_name`, ordered by instance id.
    pub async fn list_instance_specs(&self, service_name: &str) -> Result<Vec<ServiceInstanceSpec>, StorageError> {
        let prefix = keys::service_instances_prefix(service_name);
        let entries = self.storage.get_prefix(&prefix).await?;

        let mut specs = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            let spec = serde_json::from_str(&raw).context(CorruptedRecordSnafu { key })?;
            specs.push(spec);
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use meshreg_types::InstanceStatus;

    use super::*;
    use crate::ClusterStorage;
    use crate::InMemoryCluster;

    fn store() -> InstanceStore {
        let storage = ClusterStorage::new("mesh", InMemoryCluster::new());
        InstanceStore::new(Arc::new(storage))
    }

    fn spec(instance_id: &str, port: u32) -> ServiceInstanceSpec {
        ServiceInstanceSpec {
            service_name: "orders".into(),
            instance_id: instance_id.into(),
            ip: "10.0.0.5".into(),
            port,
            labels: HashMap::from([("zone".to_string(), "a".to_string())]),
            tenant: "retail".into(),
            status: InstanceStatus::Up,
            registry_time: "2024-05-01T10:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn get_absent_is_none() {
        let store = store();
        assert_eq!(store.get_instance_spec("orders", "i-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = store();
        let record = spec("i-1", 8080);
        store.put_instance_spec(&record).await.unwrap();

        assert_eq!(store.get_instance_spec("orders", "i-1").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn corrupted_value_is_an_error_not_absence() {
        let store = store();
        let key = keys::instance_spec_key("orders", "i-1");
        store.storage().put(&key, "{not json").await.unwrap();

        let err = store.get_instance_spec("orders", "i-1").await.unwrap_err();
        assert!(matches!(err, StorageError::CorruptedRecord { .. }));
    }

    #[tokio::test]
    async fn conditional_put_rejects_stale_expectation() {
        let store = store();
        store.put_instance_spec_if(&spec("i-1", 8080), None).await.unwrap();
        let entry = store.get_instance_entry("orders", "i-1").await.unwrap().unwrap();

        // Another writer updates the record behind our back.
        store.put_instance_spec(&spec("i-1", 9090)).await.unwrap();

        let err = store.put_instance_spec_if(&spec("i-1", 7070), Some(&entry.raw)).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get_instance_spec("orders", "i-1").await.unwrap().unwrap().port, 9090);
    }

    #[tokio::test]
    async fn list_is_scoped_to_service() {
        let store = store();
        store.put_instance_spec(&spec("i-2", 8080)).await.unwrap();
        store.put_instance_spec(&spec("i-1", 8080)).await.unwrap();
        let mut other = spec("i-9", 8080);
        other.service_name = "orders-v2".into();
        store.put_instance_spec(&other).await.unwrap();

        let ids: Vec<String> =
            store.list_instance_specs("orders").await.unwrap().into_iter().map(|s| s.instance_id).collect();
        assert_eq!(ids, vec!["i-1".to_string(), "i-2".to_string()]);
    }
}
