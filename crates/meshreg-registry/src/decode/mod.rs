//! Registration body decoders for third-party registry dialects.
//!
//! Sidecars accept registrations from applications that speak Eureka or
//! Consul. [`decode_registration_body`] turns such a body into a
//! [`RegistrationRecord`] the mesh understands.

mod consul;
mod eureka;

use std::collections::HashMap;

use meshreg_types::RegistryType;
use serde::Serialize;
use snafu::OptionExt;

use crate::error::DecodeError;
use crate::error::UnknownRegistryTypeSnafu;

/// A registration normalised across dialects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRecord {
    pub registry_type: RegistryType,
    pub service_name: String,
    pub instance_id: String,
    pub ip: String,
    pub port: u16,
    pub labels: HashMap<String, String>,
}

/// Decode `body` as a registration in the `registry_type` dialect.
///
/// An unrecognised `registry_type` is [`DecodeError::UnknownRegistryType`],
/// reported distinctly from a malformed body.
pub fn decode_registration_body(
    registry_type: &str,
    content_type: &str,
    body: &[u8],
) -> Result<RegistrationRecord, DecodeError> {
    let parsed = registry_type.parse::<RegistryType>().ok().context(UnknownRegistryTypeSnafu { registry_type })?;

    match parsed {
        RegistryType::Eureka => eureka::decode(content_type, body),
        RegistryType::Consul => consul::decode(content_type, body),
    }
}

/// Whether `content_type` names JSON, ignoring parameters and case.
fn is_json(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    media_type.eq_ignore_ascii_case("application/json")
}
