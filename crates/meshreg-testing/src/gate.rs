//! Readiness gates tests can open, close, or make panic while a reconciler
//! is polling them.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use meshreg_types::ReadyFn;

#[derive(Default)]
struct GateState {
    open: AtomicBool,
    calls: AtomicU64,
    panics: AtomicU32,
}

/// Switchable readiness predicate.
///
/// Clones share state, so a test can flip a gate the reconciler already holds.
#[derive(Clone, Default)]
pub struct ReadinessGate {
    state: Arc<GateState>,
}

impl ReadinessGate {
    pub fn open() -> Self {
        let gate = Self::default();
        gate.set(true);
        gate
    }

    pub fn closed() -> Self {
        Self::default()
    }

    pub fn set(&self, open: bool) {
        self.state.open.store(open, Ordering::SeqCst);
    }

    /// Panic inside the next `n` evaluations.
    pub fn panic_next(&self, n: u32) {
        self.state.panics.store(n, Ordering::SeqCst);
    }

    /// Number of times the predicate was evaluated.
    pub fn calls(&self) -> u64 {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        if self.state.panics.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            panic!("injected readiness panic");
        }
        self.state.open.load(Ordering::SeqCst)
    }

    /// The predicate as a shareable closure.
    pub fn as_fn(&self) -> ReadyFn {
        let gate = self.clone();
        Arc::new(move || gate.is_ready())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let gate = ReadinessGate::closed();
        let ready = gate.as_fn();
        assert!(!ready());

        gate.set(true);
        assert!(ready());
        assert_eq!(gate.calls(), 2);
    }

    #[test]
    #[should_panic(expected = "injected readiness panic")]
    fn panic_next_fires_on_evaluation() {
        let gate = ReadinessGate::open();
        gate.panic_next(1);
        let ready = gate.as_fn();
        ready();
    }
}
