//! Self-registration of a mesh sidecar's local service instance.
//!
//! [`RegistryCenter`] takes a local service's network identity and keeps a
//! matching, up-to-date instance record in the shared registry store. It runs
//! one background reconciliation task per controller that retries at a fixed
//! interval until the record is in place or the controller is closed.
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use meshreg_registry::{RegistrationConfig, RegistryCenter};
//!
//! let center = RegistryCenter::new(
//!     "eureka",
//!     "orders",
//!     "i-1",
//!     "10.0.0.5",
//!     8080,
//!     labels,
//!     instance_store,
//!     RegistrationConfig::default(),
//! );
//!
//! center.register(&service_spec, Arc::new(|| ingress.ready()), Arc::new(|| egress.ready()));
//!
//! // Fire-and-forget: poll for the outcome.
//! if center.registered() { /* ... */ }
//!
//! center.close();
//! ```
//!
//! The [`decode`] module translates Eureka and Consul registration bodies into
//! a [`RegistrationRecord`](decode::RegistrationRecord).

mod center;
mod config;
pub mod decode;
mod error;
pub mod verified;

pub use center::AttemptOutcome;
pub use center::RegistryCenter;
pub use config::MIN_RETRY_INTERVAL_MS;
pub use config::RegistrationConfig;
pub use error::DecodeError;
pub use error::RegistryError;
pub use meshreg_types::ReadyFn;
