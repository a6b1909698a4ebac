//! Consul `AgentServiceRegistration` bodies. Always JSON.

use std::collections::HashMap;

use meshreg_types::RegistryType;
use serde::Deserialize;

use super::RegistrationRecord;
use crate::error::DecodeError;

#[derive(Debug, Deserialize)]
struct AgentServiceRegistration {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Port", default)]
    port: u16,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Meta", default)]
    meta: HashMap<String, String>,
}

pub(super) fn decode(content_type: &str, body: &[u8]) -> Result<RegistrationRecord, DecodeError> {
    let malformed = |reason: String| DecodeError::MalformedBody {
        registry_type: RegistryType::Consul,
        content_type: content_type.to_string(),
        reason,
    };

    let registration: AgentServiceRegistration =
        serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
    if registration.name.trim().is_empty() {
        return Err(malformed("Name is empty".to_string()));
    }

    // Consul defaults the service ID to its name.
    let instance_id = if registration.id.is_empty() {
        registration.name.clone()
    } else {
        registration.id
    };

    Ok(RegistrationRecord {
        registry_type: RegistryType::Consul,
        service_name: registration.name,
        instance_id,
        ip: registration.address,
        port: registration.port,
        labels: registration.meta,
    })
}
