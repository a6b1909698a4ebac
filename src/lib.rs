//! Sidecar self-registration for a service-mesh instance registry.
//!
//! The library crates do the work:
//!
//! - [`meshreg_registry`]: the registration controller and dialect decoders
//! - [`meshreg_storage`]: the store facade and instance record store
//! - [`meshreg_types`]: records, service specs and key layout
//!
//! This crate adds the sidecar's layered configuration ([`config`]) and
//! tracing setup ([`logging`]) used by the `meshreg-sidecar` binary.

pub mod config;
pub mod logging;

pub use config::ConfigError;
pub use config::SidecarConfig;
pub use meshreg_registry::RegistrationConfig;
pub use meshreg_registry::RegistryCenter;
pub use meshreg_storage::InstanceStore;
pub use meshreg_types::ServiceInstanceSpec;
