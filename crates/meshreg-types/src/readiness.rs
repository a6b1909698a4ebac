//! Readiness gate callback shared by the registrar and its callers.

use std::sync::Arc;

/// Reports whether a sidecar traffic path is ready. Called from the
/// registration task, so it must be cheap and must not block.
pub type ReadyFn = Arc<dyn Fn() -> bool + Send + Sync>;
