//! One reconciliation attempt.

use chrono::Utc;
use meshreg_types::InstanceStatus;
use meshreg_types::ServiceInstanceSpec;
use snafu::OptionExt;
use snafu::ResultExt;

use super::Inner;
use crate::error::NotRequestedSnafu;
use crate::error::ReadInstanceSnafu;
use crate::error::RegistryError;
use crate::error::WriteInstanceSnafu;
use crate::verified;

/// Result of an attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A readiness gate was closed; the store was not touched.
    NotReady { ingress: bool, egress: bool },
    /// The stored record already had the desired address.
    AlreadyConsistent,
    /// The desired record was written.
    Written,
}

impl Inner {
    /// Build the record this instance should have, without status or timestamp.
    fn desired_record(&self, ingress_port: u16, tenant: String) -> ServiceInstanceSpec {
        let port = if ingress_port == 0 { self.port } else { u32::from(ingress_port) };
        ServiceInstanceSpec {
            service_name: self.service_name.clone(),
            instance_id: self.instance_id.clone(),
            ip: self.ip.clone(),
            port,
            labels: self.labels.clone(),
            tenant,
            status: InstanceStatus::Unknown,
            registry_time: String::new(),
        }
    }

    /// Run one attempt. The caller holds `attempt_lock`.
    pub(super) async fn attempt(&self) -> Result<AttemptOutcome, RegistryError> {
        let (pending, tenant) = {
            let mut state = self.state.write();
            state.try_times += 1;
            (state.pending.clone(), state.tenant.clone())
        };
        let pending = pending.context(NotRequestedSnafu {
            service_name: &self.service_name,
            instance_id: &self.instance_id,
        })?;

        let ingress = (pending.ingress_ready)();
        let egress = (pending.egress_ready)();
        if !(ingress && egress) {
            return Ok(AttemptOutcome::NotReady { ingress, egress });
        }

        let mut desired = self.desired_record(pending.ingress_port, tenant);
        let existing = self.store.get_instance_entry(&self.service_name, &self.instance_id).await.context(
            ReadInstanceSnafu {
                service_name: &self.service_name,
                instance_id: &self.instance_id,
            },
        )?;

        if !verified::needs_update(existing.as_ref().map(|entry| &entry.spec), &desired) {
            self.state.write().registered = true;
            return Ok(AttemptOutcome::AlreadyConsistent);
        }

        desired.status = InstanceStatus::Up;
        desired.registry_time = verified::format_registry_time(Utc::now());

        let written = if self.config.conditional_write {
            let expected = existing.as_ref().map(|entry| entry.raw.as_str());
            self.store.put_instance_spec_if(&desired, expected).await
        } else {
            self.store.put_instance_spec(&desired).await
        };
        written.context(WriteInstanceSnafu {
            service_name: &self.service_name,
            instance_id: &self.instance_id,
        })?;

        self.state.write().registered = true;
        Ok(AttemptOutcome::Written)
    }
}
