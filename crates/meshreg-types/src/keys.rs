//! Store key layout for instance records.

/// Prefix under which every instance record lives.
pub const SERVICE_INSTANCE_SPEC_PREFIX: &str = "/mesh/service-instances/spec/";

/// Key of the record for `(service_name, instance_id)`.
pub fn instance_spec_key(service_name: &str, instance_id: &str) -> String {
    format!("{SERVICE_INSTANCE_SPEC_PREFIX}{service_name}/{instance_id}")
}

/// Prefix covering every instance record of one service.
///
/// The trailing slash keeps `orders` from matching `orders-v2`.
pub fn service_instances_prefix(service_name: &str) -> String {
    format!("{SERVICE_INSTANCE_SPEC_PREFIX}{service_name}/")
}
