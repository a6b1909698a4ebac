//! Reconciliation loop behaviour against a fault-injecting in-memory cluster.
//!
//! All tests run on paused time; sleeps advance the clock instantly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use meshreg_registry::RegistrationConfig;
use meshreg_registry::RegistryCenter;
use meshreg_storage::InstanceStore;
use meshreg_testing::FaultInjectingCluster;
use meshreg_testing::ReadinessGate;
use meshreg_testing::instance_store;
use meshreg_types::InstanceStatus;
use meshreg_types::ServiceInstanceSpec;
use meshreg_types::ServiceSpec;
use meshreg_types::SidecarSpec;

const SERVICE: &str = "orders";
const INSTANCE: &str = "i-1";
const IP: &str = "10.0.0.5";
const PORT: u16 = 8080;

struct Harness {
    cluster: Arc<FaultInjectingCluster>,
    /// Uncounted view of the same data for seeding and inspection.
    backdoor: InstanceStore,
    center: RegistryCenter,
    ingress: ReadinessGate,
    egress: ReadinessGate,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(RegistrationConfig::default())
    }

    fn with_config(config: RegistrationConfig) -> Self {
        let cluster = FaultInjectingCluster::new();
        let backdoor = instance_store(Arc::clone(cluster.inner()));
        let center = RegistryCenter::new(
            "eureka",
            SERVICE,
            INSTANCE,
            IP,
            PORT,
            labels(),
            instance_store(Arc::clone(&cluster)),
            config,
        );
        Self {
            cluster,
            backdoor,
            center,
            ingress: ReadinessGate::open(),
            egress: ReadinessGate::open(),
        }
    }

    fn register(&self) {
        self.register_spec(&service_spec(PORT, "retail"));
    }

    fn register_spec(&self, spec: &ServiceSpec) {
        self.center.register(spec, self.ingress.as_fn(), self.egress.as_fn());
    }

    async fn stored(&self) -> Option<ServiceInstanceSpec> {
        self.backdoor.get_instance_spec(SERVICE, INSTANCE).await.unwrap()
    }

    async fn seed(&self, record: &ServiceInstanceSpec) {
        self.backdoor.put_instance_spec(record).await.unwrap();
    }
}

fn labels() -> HashMap<String, String> {
    HashMap::from([("version".to_string(), "v1".to_string())])
}

fn service_spec(ingress_port: u16, tenant: &str) -> ServiceSpec {
    ServiceSpec {
        name: SERVICE.into(),
        register_tenant: tenant.into(),
        sidecar: SidecarSpec { ingress_port },
    }
}

fn record(ip: &str, port: u32) -> ServiceInstanceSpec {
    ServiceInstanceSpec {
        service_name: SERVICE.into(),
        instance_id: INSTANCE.into(),
        ip: ip.into(),
        port,
        labels: labels(),
        tenant: "retail".into(),
        status: InstanceStatus::Up,
        registry_time: "2020-01-01T00:00:00Z".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_registration_into_empty_store() {
    let h = Harness::new();
    assert!(!h.center.registered());

    h.register();
    h.center.wait_stopped().await;

    assert!(h.center.registered());
    assert_eq!(h.center.try_times(), 1);

    let stored = h.stored().await.expect("record written");
    assert_eq!(stored.ip, IP);
    assert_eq!(stored.port, 8080);
    assert_eq!(stored.status, InstanceStatus::Up);
    assert_eq!(stored.tenant, "retail");
    assert_eq!(stored.labels, labels());
    assert!(DateTime::parse_from_rfc3339(&stored.registry_time).is_ok());
    assert!(stored.registry_time.ends_with('Z'));
}

#[tokio::test(start_paused = true)]
async fn test_consistent_record_registers_without_write() {
    let h = Harness::new();
    let existing = record(IP, 8080);
    h.seed(&existing).await;

    h.register();
    h.center.wait_stopped().await;

    assert!(h.center.registered());
    assert_eq!(h.cluster.reads(), 1);
    assert_eq!(h.cluster.writes(), 0);
    assert_eq!(h.stored().await, Some(existing));
}

#[tokio::test(start_paused = true)]
async fn test_port_drift_issues_exactly_one_write() {
    let h = Harness::new();
    h.seed(&record(IP, 9090)).await;

    h.register();
    h.center.wait_stopped().await;

    assert!(h.center.registered());
    assert_eq!(h.cluster.writes(), 1);
    let stored = h.stored().await.unwrap();
    assert_eq!(stored.port, 8080);
    assert_eq!(stored.status, InstanceStatus::Up);
    assert_ne!(stored.registry_time, "2020-01-01T00:00:00Z");
}

#[tokio::test(start_paused = true)]
async fn test_ip_drift_rewrites_record() {
    let h = Harness::new();
    h.seed(&record("10.0.0.99", 8080)).await;

    h.register();
    h.center.wait_stopped().await;

    assert_eq!(h.cluster.writes(), 1);
    assert_eq!(h.stored().await.unwrap().ip, IP);
}

#[tokio::test(start_paused = true)]
async fn test_label_and_tenant_drift_do_not_trigger_write() {
    let h = Harness::new();
    let mut existing = record(IP, 8080);
    existing.labels = HashMap::from([("version".to_string(), "v0".to_string())]);
    existing.tenant = "wholesale".into();
    h.seed(&existing).await;

    h.register();
    h.center.wait_stopped().await;

    assert!(h.center.registered());
    assert_eq!(h.cluster.writes(), 0);
    assert_eq!(h.stored().await, Some(existing));
}

#[tokio::test(start_paused = true)]
async fn test_closed_gate_blocks_store_access() {
    let h = Harness::new();
    h.ingress.set(false);

    h.register();
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    assert!(!h.center.registered());
    assert_eq!(h.cluster.operations(), 0);
    assert!(h.ingress.calls() >= 2);
    assert!(h.center.try_times() >= 2);

    h.ingress.set(true);
    h.center.wait_stopped().await;

    assert!(h.center.registered());
    assert_eq!(h.cluster.writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_egress_gate_also_blocks() {
    let h = Harness::new();
    h.egress.set(false);

    h.register();
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    assert!(!h.center.registered());
    assert_eq!(h.cluster.operations(), 0);
    assert!(h.center.close());
}

#[tokio::test(start_paused = true)]
async fn test_no_store_access_after_registration() {
    let h = Harness::new();
    h.register();
    h.center.wait_stopped().await;
    let attempts = h.center.try_times();
    h.cluster.reset_counts();

    // Registering again is a no-op and starts nothing.
    h.register();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.cluster.operations(), 0);
    assert_eq!(h.center.try_times(), attempts);
    assert!(h.center.registered());
}

#[tokio::test(start_paused = true)]
async fn test_close_while_sleeping_stops_loop() {
    let h = Harness::new();
    h.ingress.set(false);
    h.register();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert!(h.center.close());
    h.center.wait_stopped().await;
    let attempts = h.center.try_times();

    h.ingress.set(true);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(!h.center.registered());
    assert_eq!(h.center.try_times(), attempts);
    assert_eq!(h.cluster.operations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_close_after_registration_is_noop() {
    let h = Harness::new();
    h.register();
    h.center.wait_stopped().await;

    assert!(h.center.close());
    assert!(!h.center.close());
    assert!(h.center.registered());
}

#[tokio::test(start_paused = true)]
async fn test_register_after_close_starts_nothing() {
    let h = Harness::new();
    h.center.close();

    h.register();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(h.center.try_times(), 0);
    assert!(!h.center.registered());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_gate_does_not_end_loop() {
    let h = Harness::new();
    h.ingress.panic_next(1);

    h.register();
    h.center.wait_stopped().await;

    assert!(h.center.registered());
    assert_eq!(h.center.try_times(), 2);
    assert!(h.stored().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_store_does_not_end_loop() {
    let h = Harness::new();
    h.cluster.panic_next_reads(1);

    h.register();
    h.center.wait_stopped().await;

    assert!(h.center.registered());
    assert_eq!(h.center.try_times(), 2);
    assert_eq!(h.cluster.reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_is_retried_before_marking_registered() {
    let h = Harness::new();
    h.cluster.fail_next_writes(2);

    h.register();
    h.center.wait_stopped().await;

    assert!(h.center.registered());
    assert_eq!(h.center.try_times(), 3);
    assert_eq!(h.cluster.writes(), 3);
    assert!(h.stored().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_failed_read_is_retried() {
    let h = Harness::new();
    h.cluster.fail_next_reads(1);

    h.register();
    h.center.wait_stopped().await;

    assert!(h.center.registered());
    assert_eq!(h.center.try_times(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_register_updates_pending_spec_without_second_task() {
    let h = Harness::new();
    h.ingress.set(false);

    h.register();
    h.register_spec(&service_spec(9091, "wholesale"));
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    // One task attempts once per interval.
    assert!(h.center.try_times() <= 5);

    h.ingress.set(true);
    h.center.wait_stopped().await;

    let stored = h.stored().await.unwrap();
    assert_eq!(stored.port, 9091);
    assert_eq!(stored.tenant, "wholesale");
    assert_eq!(h.cluster.writes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_wait_keeps_single_task() {
    let h = Harness::new();
    h.ingress.set(false);
    h.register();

    let waited = tokio::time::timeout(Duration::from_millis(500), h.center.wait_stopped()).await;
    assert!(waited.is_err(), "task is still retrying");

    h.register();
    let before = h.center.try_times();
    tokio::time::sleep(Duration::from_secs(10)).await;

    // A duplicate task would double the attempt rate.
    let attempts = h.center.try_times() - before;
    assert!(attempts <= 11, "{attempts} attempts in 10 intervals");
    assert!(attempts >= 9);

    let waited = tokio::time::timeout(Duration::from_millis(500), h.center.wait_stopped()).await;
    assert!(waited.is_err());

    assert!(h.center.close());
    h.center.wait_stopped().await;
    assert!(!h.center.registered());
}

#[tokio::test(start_paused = true)]
async fn test_wait_stopped_returns_again_after_exit() {
    let h = Harness::new();
    h.center.wait_stopped().await;

    h.register();
    h.center.wait_stopped().await;
    h.center.wait_stopped().await;
    assert!(h.center.registered());
}

#[tokio::test(start_paused = true)]
async fn test_zero_retry_interval_is_raised_to_minimum() {
    let h = Harness::with_config(RegistrationConfig {
        retry_interval_ms: 0,
        conditional_write: false,
    });
    h.ingress.set(false);

    h.register();
    tokio::time::sleep(Duration::from_millis(1_000)).await;

    let attempts = h.center.try_times();
    let max = 1_000 / meshreg_registry::MIN_RETRY_INTERVAL_MS + 1;
    assert!(attempts <= max, "{attempts} attempts in one second");
    assert!(attempts >= max / 2);
    assert!(h.center.close());
    h.center.wait_stopped().await;
}

#[tokio::test(start_paused = true)]
async fn test_zero_ingress_port_falls_back_to_instance_port() {
    let h = Harness::new();
    h.register_spec(&service_spec(0, "retail"));
    h.center.wait_stopped().await;

    assert_eq!(h.stored().await.unwrap().port, u32::from(PORT));
}

#[tokio::test(start_paused = true)]
async fn test_custom_retry_interval() {
    let h = Harness::with_config(RegistrationConfig {
        retry_interval_ms: 100,
        conditional_write: false,
    });
    h.ingress.set(false);

    h.register();
    tokio::time::sleep(Duration::from_millis(950)).await;

    assert!(h.center.try_times() >= 9);
    assert!(h.center.close());
}

#[tokio::test(start_paused = true)]
async fn test_decode_uses_configured_registry_type() {
    let h = Harness::new();
    let body = br#"{"instance": {"instanceId": "i-1", "app": "ORDERS", "ipAddr": "10.0.0.5", "port": {"$": 8080}}}"#;

    let decoded = h.center.decode_registry_body("application/json", body).unwrap();
    assert_eq!(decoded.port, 8080);
    assert_eq!(decoded.instance_id, INSTANCE);
}
