//! Registration controller.
//!
//! # Lifecycle
//!
//! 1. [`RegistryCenter::new`] captures the static identity of the local instance
//! 2. [`RegistryCenter::register`] stores the service spec and readiness gates
//!    and starts the single background reconciliation task
//! 3. The task retries at a fixed interval until the record is in place
//! 4. [`RegistryCenter::close`] cancels the task; it exits at its next check
//!
//! The task only ends in two ways: registered or cancelled. Errors and panics
//! inside an attempt are logged and retried.

mod attempt;

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use futures::FutureExt;
use meshreg_storage::InstanceStore;
use meshreg_types::ReadyFn;
use meshreg_types::ServiceSpec;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::MIN_RETRY_INTERVAL_MS;
use crate::config::RegistrationConfig;
use crate::decode;
use crate::decode::RegistrationRecord;
use crate::error::DecodeError;

pub use attempt::AttemptOutcome;

/// What `register` handed over for the next attempt.
#[derive(Clone)]
struct Pending {
    ingress_port: u16,
    ingress_ready: ReadyFn,
    egress_ready: ReadyFn,
}

#[derive(Default)]
struct RegistrationState {
    registered: bool,
    tenant: String,
    pending: Option<Pending>,
    try_times: u64,
}

struct Inner {
    registry_type: String,
    service_name: String,
    instance_id: String,
    ip: String,
    port: u32,
    labels: HashMap<String, String>,
    store: InstanceStore,
    config: RegistrationConfig,

    state: RwLock<RegistrationState>,
    /// Held for the full duration of an attempt, store calls included.
    attempt_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    closed: AtomicBool,
    /// Handle of the latest task. Stays in place until a new task replaces it.
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    /// `true` once the latest task has exited.
    stopped: watch::Sender<bool>,
}

/// Marks the task stopped when dropped, including on unwind.
struct StoppedOnExit(Arc<Inner>);

impl Drop for StoppedOnExit {
    fn drop(&mut self) {
        self.0.stopped.send_replace(true);
    }
}

/// Keeps the local instance's record present in the registry store.
///
/// Dropping the controller cancels its background task.
pub struct RegistryCenter {
    inner: Arc<Inner>,
}

impl RegistryCenter {
    /// Create a controller for one local instance.
    ///
    /// `port` is used for the record when the service spec does not configure
    /// a sidecar ingress port. A retry interval below
    /// [`MIN_RETRY_INTERVAL_MS`](crate::MIN_RETRY_INTERVAL_MS) is raised to it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry_type: impl Into<String>,
        service_name: impl Into<String>,
        instance_id: impl Into<String>,
        ip: impl Into<String>,
        port: u16,
        labels: HashMap<String, String>,
        store: InstanceStore,
        config: RegistrationConfig,
    ) -> Self {
        let service_name = service_name.into();
        let instance_id = instance_id.into();
        if config.retry_interval_ms < MIN_RETRY_INTERVAL_MS {
            warn!(
                service = %service_name,
                instance = %instance_id,
                retry_interval_ms = config.retry_interval_ms,
                min_retry_interval_ms = MIN_RETRY_INTERVAL_MS,
                "retry interval too small, using minimum"
            );
        }

        Self {
            inner: Arc::new(Inner {
                registry_type: registry_type.into(),
                service_name,
                instance_id,
                ip: ip.into(),
                port: u32::from(port),
                labels,
                store,
                config,
                state: RwLock::new(RegistrationState::default()),
                attempt_lock: tokio::sync::Mutex::new(()),
                cancel: CancellationToken::new(),
                closed: AtomicBool::new(false),
                task: parking_lot::Mutex::new(None),
                stopped: watch::Sender::new(false),
            }),
        }
    }

    pub fn registry_type(&self) -> &str {
        &self.inner.registry_type
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    /// Whether registration has been observed. Never touches the network.
    pub fn registered(&self) -> bool {
        self.inner.state.read().registered
    }

    /// Number of attempts the background task has started.
    pub fn try_times(&self) -> u64 {
        self.inner.state.read().try_times
    }

    /// Request registration and start the background task.
    ///
    /// Returns immediately. No-op once registered. Calling again while the task
    /// is still running replaces the spec and gates used by the next attempt.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register(&self, spec: &ServiceSpec, ingress_ready: ReadyFn, egress_ready: ReadyFn) {
        {
            let mut state = self.inner.state.write();
            state.tenant = spec.register_tenant.clone();
            if state.registered {
                debug!(
                    service = %self.inner.service_name,
                    instance = %self.inner.instance_id,
                    "already registered, ignoring register"
                );
                return;
            }
            state.pending = Some(Pending {
                ingress_port: spec.sidecar.ingress_port,
                ingress_ready,
                egress_ready,
            });
        }

        if self.inner.cancel.is_cancelled() {
            warn!(
                service = %self.inner.service_name,
                instance = %self.inner.instance_id,
                "register called after close, not starting registration"
            );
            return;
        }

        let mut task = self.inner.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!(
                service = %self.inner.service_name,
                instance = %self.inner.instance_id,
                "registration already running, updated pending spec"
            );
            return;
        }

        self.inner.stopped.send_replace(false);
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            let _stopped = StoppedOnExit(Arc::clone(&inner));
            inner.run().await;
        }));
        info!(
            service = %self.inner.service_name,
            instance = %self.inner.instance_id,
            tenant = %spec.register_tenant,
            "registration started"
        );
    }

    /// Cancel the background task.
    ///
    /// Returns `true` for the call that performed the close. Later calls warn
    /// and return `false`.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            warn!(
                service = %self.inner.service_name,
                instance = %self.inner.instance_id,
                "registry center already closed"
            );
            return false;
        }
        self.inner.cancel.cancel();
        debug!(
            service = %self.inner.service_name,
            instance = %self.inner.instance_id,
            "registry center closed"
        );
        true
    }

    /// Wait for the background task to exit. Returns immediately if none was started.
    ///
    /// Safe to drop before completion: the task handle stays registered, so a
    /// later `register` still sees the running task.
    pub async fn wait_stopped(&self) {
        let mut stopped = {
            let task = self.inner.task.lock();
            if task.is_none() {
                return;
            }
            self.inner.stopped.subscribe()
        };
        if stopped.wait_for(|stopped| *stopped).await.is_err() {
            debug!(
                service = %self.inner.service_name,
                instance = %self.inner.instance_id,
                "stop signal dropped"
            );
        }
    }

    /// Decode a registration body in this controller's registry dialect.
    pub fn decode_registry_body(&self, content_type: &str, body: &[u8]) -> Result<RegistrationRecord, DecodeError> {
        decode::decode_registration_body(&self.inner.registry_type, content_type, body)
    }
}

impl Drop for RegistryCenter {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl Inner {
    async fn run(self: Arc<Self>) {
        let interval = self.config.retry_interval();

        loop {
            if self.cancel.is_cancelled() {
                info!(service = %self.service_name, instance = %self.instance_id, "registration stopped");
                return;
            }

            {
                let _guard = self.attempt_lock.lock().await;
                if self.state.read().registered {
                    return;
                }

                match AssertUnwindSafe(self.attempt()).catch_unwind().await {
                    Ok(Ok(AttemptOutcome::NotReady { ingress, egress })) => {
                        debug!(
                            service = %self.service_name,
                            instance = %self.instance_id,
                            ingress,
                            egress,
                            "sidecar not ready, retrying registration"
                        );
                    }
                    Ok(Ok(outcome)) => {
                        info!(
                            service = %self.service_name,
                            instance = %self.instance_id,
                            try_times = self.state.read().try_times,
                            written = matches!(outcome, AttemptOutcome::Written),
                            "registration succeeded"
                        );
                        return;
                    }
                    Ok(Err(e)) => {
                        warn!(
                            service = %self.service_name,
                            instance = %self.instance_id,
                            error = %e,
                            conflict = e.is_write_conflict(),
                            retryable = e.is_retryable(),
                            "registration attempt failed"
                        );
                    }
                    Err(payload) => {
                        error!(
                            service = %self.service_name,
                            instance = %self.instance_id,
                            panic = %panic_message(payload.as_ref()),
                            "registration attempt panicked"
                        );
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!(service = %self.service_name, instance = %self.instance_id, "registration stopped");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
