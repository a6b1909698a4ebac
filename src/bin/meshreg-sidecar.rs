//! Sidecar registration entry point.
//!
//! Loads the layered configuration, registers the local instance in an
//! in-process registry store and waits until the record is in place or the
//! process is interrupted. The stored record is printed as JSON on success.
//!
//! # Usage
//!
//! ```bash
//! # TOML config
//! meshreg-sidecar --config /etc/meshreg/sidecar.toml
//!
//! # CLI args, gated on the proxy writing its ready file
//! meshreg-sidecar --service-name orders --instance-id i-1 --ip 10.0.0.5 --port 8080 \
//!     --ingress-ready-file /run/sidecar/ingress.ready
//!
//! # Environment variables
//! export MESHREG_SERVICE_NAME=orders
//! export MESHREG_INSTANCE_ID=i-1
//! meshreg-sidecar --port 8080
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use meshreg::SidecarConfig;
use meshreg::logging::init_tracing;
use meshreg_registry::ReadyFn;
use meshreg_registry::RegistryCenter;
use meshreg_storage::ClusterStorage;
use meshreg_storage::InMemoryCluster;
use meshreg_storage::InstanceStore;
use tokio::signal;
use tracing::info;
use tracing::warn;

/// How often the binary polls `registered()`.
const REGISTERED_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "meshreg-sidecar")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Registry dialect the local application speaks: "eureka" or "consul".
    #[arg(long)]
    registry_type: Option<String>,

    #[arg(long)]
    service_name: Option<String>,

    #[arg(long)]
    instance_id: Option<String>,

    #[arg(long)]
    ip: Option<String>,

    /// Application port, registered when no ingress port is configured.
    #[arg(long)]
    port: Option<u16>,

    /// Instance label as key=value. Repeatable.
    #[arg(long = "label", value_parser = parse_label)]
    labels: Vec<(String, String)>,

    #[arg(long)]
    tenant: Option<String>,

    /// Sidecar ingress port to register.
    #[arg(long)]
    ingress_port: Option<u16>,

    /// Delay between registration attempts in milliseconds.
    #[arg(long)]
    retry_interval_ms: Option<u64>,

    /// Write with compare-and-swap instead of last-writer-wins.
    #[arg(long)]
    conditional_write: bool,

    /// Name of the store's distributed mutex.
    #[arg(long)]
    storage_name: Option<String>,

    /// Ingress is ready once this file exists. Always ready when unset.
    #[arg(long)]
    ingress_ready_file: Option<PathBuf>,

    /// Egress is ready once this file exists. Always ready when unset.
    #[arg(long)]
    egress_ready_file: Option<PathBuf>,
}

impl Args {
    /// CLI flags win over every other layer.
    fn apply_to(&self, config: &mut SidecarConfig) {
        if let Some(val) = &self.registry_type {
            config.instance.registry_type = val.clone();
        }
        if let Some(val) = &self.service_name {
            config.instance.service_name = val.clone();
        }
        if let Some(val) = &self.instance_id {
            config.instance.instance_id = val.clone();
        }
        if let Some(val) = &self.ip {
            config.instance.ip = val.clone();
        }
        if let Some(val) = self.port {
            config.instance.port = val;
        }
        config.instance.labels.extend(self.labels.iter().cloned());
        if let Some(val) = &self.tenant {
            config.service.tenant = val.clone();
        }
        if let Some(val) = self.ingress_port {
            config.service.ingress_port = val;
        }
        if let Some(val) = self.retry_interval_ms {
            config.registration.retry_interval_ms = val;
        }
        if self.conditional_write {
            config.registration.conditional_write = true;
        }
        if let Some(val) = &self.storage_name {
            config.storage.name = val.clone();
        }
    }
}

fn parse_label(s: &str) -> Result<(String, String), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty label key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Gate that opens once `path` exists.
fn file_gate(path: Option<PathBuf>) -> ReadyFn {
    Arc::new(move || path.as_ref().is_none_or(|p| p.exists()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let mut config = SidecarConfig::load_with_layers(args.config.as_deref()).context("failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate().context("invalid configuration")?;

    let storage = ClusterStorage::connect(config.storage.name.clone(), InMemoryCluster::new()).await;
    let store = InstanceStore::new(Arc::new(storage));

    let center = RegistryCenter::new(
        config.instance.registry_type.clone(),
        config.instance.service_name.clone(),
        config.instance.instance_id.clone(),
        config.instance.ip.clone(),
        config.instance.port,
        config.instance.labels.clone(),
        store.clone(),
        config.registration.clone(),
    );
    center.register(
        &config.service_spec(),
        file_gate(args.ingress_ready_file.clone()),
        file_gate(args.egress_ready_file.clone()),
    );

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut poll = tokio::time::interval(REGISTERED_POLL_INTERVAL);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("failed to listen for shutdown signal")?;
                info!("shutdown signal received");
                break;
            }
            _ = poll.tick() => {
                if center.registered() {
                    break;
                }
            }
        }
    }

    if center.registered() {
        let record = store
            .get_instance_spec(center.service_name(), center.instance_id())
            .await
            .context("failed to read registered instance")?;
        match record {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => warn!("registered but no instance record found"),
        }
    } else {
        warn!(
            service = %center.service_name(),
            instance = %center.instance_id(),
            attempts = center.try_times(),
            "exiting before registration completed"
        );
    }

    center.close();
    center.wait_stopped().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("zone=a").unwrap(), ("zone".to_string(), "a".to_string()));
        assert_eq!(parse_label("empty=").unwrap(), ("empty".to_string(), String::new()));
        assert!(parse_label("novalue").is_err());
        assert!(parse_label("=a").is_err());
    }

    #[test]
    fn test_cli_flags_override_config() {
        let args = Args::parse_from([
            "meshreg-sidecar",
            "--service-name",
            "orders",
            "--port",
            "8080",
            "--label",
            "zone=a",
            "--conditional-write",
        ]);
        let mut config = SidecarConfig::default();
        config.instance.service_name = "from-file".into();
        args.apply_to(&mut config);

        assert_eq!(config.instance.service_name, "orders");
        assert_eq!(config.instance.port, 8080);
        assert_eq!(config.instance.labels.get("zone").map(String::as_str), Some("a"));
        assert!(config.registration.conditional_write);
    }

    #[test]
    fn test_port_flag_rejects_values_above_u16() {
        let result = Args::try_parse_from(["meshreg-sidecar", "--port", "70000"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_file_gate() {
        assert!(file_gate(None)());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingress.ready");
        let gate = file_gate(Some(path.clone()));
        assert!(!gate());
        std::fs::write(&path, b"").unwrap();
        assert!(gate());
    }
}
