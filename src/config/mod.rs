//! Layered sidecar configuration.
//!
//! Precedence, lowest to highest:
//!
//! 1. Hardcoded defaults
//! 2. TOML file: explicit path, else `MESHREG_CONFIG_FILE`, else `./meshreg.toml`
//! 3. `MESHREG_*` environment variables
//! 4. CLI flags (applied by the binary)
//!
//! ```toml
//! [instance]
//! registry_type = "eureka"
//! service_name = "orders"
//! instance_id = "i-1"
//! ip = "10.0.0.5"
//! port = 8080
//! labels = { version = "v1" }
//!
//! [service]
//! tenant = "retail"
//! ingress_port = 13001
//!
//! [registration]
//! retry_interval_ms = 1000
//! conditional_write = false
//!
//! [storage]
//! name = "meshreg"
//! ```

pub mod error;

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use meshreg_registry::MIN_RETRY_INTERVAL_MS;
use meshreg_registry::RegistrationConfig;
use meshreg_types::RegistryType;
use meshreg_types::ServiceSpec;
use meshreg_types::SidecarSpec;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

pub use error::ConfigError;

/// Env var naming an explicit config file.
pub const CONFIG_FILE_ENV: &str = "MESHREG_CONFIG_FILE";
/// Config file tried when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "./meshreg.toml";

/// Identity of the local instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Registry dialect the local application speaks (`eureka` or `consul`).
    pub registry_type: String,
    pub service_name: String,
    pub instance_id: String,
    pub ip: String,
    pub port: u16,
    pub labels: HashMap<String, String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            registry_type: RegistryType::Eureka.as_str().to_string(),
            service_name: String::new(),
            instance_id: String::new(),
            ip: "127.0.0.1".to_string(),
            port: 0,
            labels: HashMap::new(),
        }
    }
}

/// The parts of the mesh service spec handed to `register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    pub tenant: String,
    /// Sidecar ingress port. 0 registers the instance port.
    pub ingress_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Name of the distributed mutex the store facade creates.
    pub name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            name: "meshreg".to_string(),
        }
    }
}

/// Top-level sidecar configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SidecarConfig {
    pub instance: InstanceConfig,
    pub service: ServiceConfig,
    pub registration: RegistrationConfig,
    pub storage: StorageConfig,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::invalid(key, value, e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "expected a boolean")),
    }
}

impl SidecarConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::invalid("config_file", path.display(), format!("Failed to read file: {e}")))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::invalid("config_file", path.display(), format!("Failed to parse TOML: {e}")))
    }

    /// Defaults, then the TOML file, then environment overrides.
    ///
    /// An explicit `path` must exist; the fallback locations are optional.
    pub fn load_with_layers(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_lookup(path, |key| std::env::var(key).ok())
    }

    /// [`load_with_layers`](Self::load_with_layers) with a custom variable source.
    pub fn load_with_lookup(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "loading configuration");
                Self::from_toml_file(path)?
            }
            None => Self::load_toml_with_fallbacks(&lookup)?,
        };
        config.apply_overrides(&lookup)?;
        Ok(config)
    }

    fn load_toml_with_fallbacks(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(config_path) = lookup(CONFIG_FILE_ENV) {
            let path = Path::new(&config_path);
            if path.exists() {
                info!(path = %config_path, "loading configuration from {CONFIG_FILE_ENV}");
                return Self::from_toml_file(path);
            }
            warn!(path = %config_path, "{CONFIG_FILE_ENV} specified but not found");
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            info!(path = DEFAULT_CONFIG_FILE, "loading configuration");
            return Self::from_toml_file(local);
        }

        info!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Apply `MESHREG_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(&|key: &str| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("MESHREG_REGISTRY_TYPE") {
            self.instance.registry_type = val;
        }
        if let Some(val) = lookup("MESHREG_SERVICE_NAME") {
            self.instance.service_name = val;
        }
        if let Some(val) = lookup("MESHREG_INSTANCE_ID") {
            self.instance.instance_id = val;
        }
        if let Some(val) = lookup("MESHREG_IP") {
            self.instance.ip = val;
        }
        if let Some(val) = lookup("MESHREG_PORT") {
            self.instance.port = parse_value("MESHREG_PORT", &val)?;
        }
        if let Some(val) = lookup("MESHREG_TENANT") {
            self.service.tenant = val;
        }
        if let Some(val) = lookup("MESHREG_INGRESS_PORT") {
            self.service.ingress_port = parse_value("MESHREG_INGRESS_PORT", &val)?;
        }
        if let Some(val) = lookup("MESHREG_RETRY_INTERVAL_MS") {
            self.registration.retry_interval_ms = parse_value("MESHREG_RETRY_INTERVAL_MS", &val)?;
        }
        if let Some(val) = lookup("MESHREG_CONDITIONAL_WRITE") {
            self.registration.conditional_write = parse_bool("MESHREG_CONDITIONAL_WRITE", &val)?;
        }
        if let Some(val) = lookup("MESHREG_STORAGE_NAME") {
            self.storage.name = val;
        }
        Ok(())
    }

    /// Reject configurations the sidecar cannot register with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instance.service_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "instance.service_name".to_string(),
                hint: "set MESHREG_SERVICE_NAME or --service-name".to_string(),
            });
        }
        if self.instance.instance_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "instance.instance_id".to_string(),
                hint: "set MESHREG_INSTANCE_ID or --instance-id".to_string(),
            });
        }
        if self.instance.ip.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "instance.ip".to_string(),
                hint: "set MESHREG_IP or --ip".to_string(),
            });
        }
        if self.instance.port == 0 {
            return Err(ConfigError::invalid("instance.port", 0, "must be between 1 and 65535"));
        }
        if let Err(e) = self.instance.registry_type.parse::<RegistryType>() {
            return Err(ConfigError::invalid("instance.registry_type", &self.instance.registry_type, e.to_string()));
        }
        if self.registration.retry_interval_ms < MIN_RETRY_INTERVAL_MS {
            return Err(ConfigError::invalid(
                "registration.retry_interval_ms",
                self.registration.retry_interval_ms,
                format!("must be at least {MIN_RETRY_INTERVAL_MS}"),
            ));
        }
        if self.storage.name.trim().is_empty() {
            return Err(ConfigError::invalid("storage.name", "", "must not be empty"));
        }
        Ok(())
    }

    /// The service spec passed to `register`.
    pub fn service_spec(&self) -> ServiceSpec {
        ServiceSpec {
            name: self.instance.service_name.clone(),
            register_tenant: self.service.tenant.clone(),
            sidecar: SidecarSpec {
                ingress_port: self.service.ingress_port,
            },
        }
    }
}
