//! Data model of the mesh instance registry.
//!
//! - [`ServiceInstanceSpec`]: the persisted record of one running instance
//! - [`ServiceSpec`]: the slice of a mesh service's spec the registrar needs
//! - [`RegistryType`]: the third-party registry dialect a sidecar speaks
//! - [`ReadyFn`]: readiness gate callback
//! - [`keys`]: store key layout

pub mod keys;
mod readiness;
mod registry_type;
mod service;

pub use readiness::ReadyFn;
pub use registry_type::ParseRegistryTypeError;
pub use registry_type::RegistryType;
pub use service::InstanceStatus;
pub use service::ServiceInstanceSpec;
pub use service::ServiceSpec;
pub use service::SidecarSpec;
