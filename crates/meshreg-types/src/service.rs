//! Service and instance record types.

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// Registration status of an instance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    /// Not yet registered.
    #[default]
    Unknown,
    /// Registered and reachable.
    Up,
}

/// The persisted descriptor of one running service instance.
///
/// `(service_name, instance_id)` is the record's unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceSpec {
    pub service_name: String,
    #[serde(rename = "instanceID")]
    pub instance_id: String,
    #[serde(rename = "IP")]
    pub ip: String,
    pub port: u32,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Tenant the instance registered under.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant: String,
    #[serde(default)]
    pub status: InstanceStatus,
    /// RFC 3339 timestamp of the last successful write, empty before registration.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registry_time: String,
}

impl ServiceInstanceSpec {
    /// Whether `other` is reachable at the same address as `self`.
    pub fn same_address(&self, other: &ServiceInstanceSpec) -> bool {
        self.ip == other.ip && self.port == other.port
    }
}

/// Sidecar section of a mesh service spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSpec {
    /// Port the sidecar accepts inbound mesh traffic on.
    pub ingress_port: u16,
}

/// The part of a mesh service's specification the registrar consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    pub name: String,
    /// Tenant the service registers under.
    #[serde(default)]
    pub register_tenant: String,
    pub sidecar: SidecarSpec,
}
