//! Per-collection in-flight guard.
//!
//! At most one fetch or mutation runs against a collection at a time. A
//! shopper-initiated attempt while the gate is held is rejected outright; it
//! is never queued or merged, so an older snapshot can never land after a
//! newer one. Internal follow-ups that must not be dropped (the cart clear
//! after an order) wait for the gate with [`MutationGate::acquire`].

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Boolean in-flight flag with RAII release.
#[derive(Debug, Default)]
pub struct MutationGate {
    in_flight: AtomicBool,
    released: Notify,
}

impl MutationGate {
    /// Create an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate if nobody holds it.
    ///
    /// The returned guard releases the gate when dropped, on every exit path.
    #[must_use]
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GateGuard { gate: self })
    }

    /// Wait until the gate is free, then take it.
    pub async fn acquire(&self) -> GateGuard<'_> {
        loop {
            if let Some(guard) = self.try_acquire() {
                return guard;
            }

            // Register before re-checking so a release in between is not missed
            let mut released = pin!(self.released.notified());
            released.as_mut().enable();
            if let Some(guard) = self.try_acquire() {
                return guard;
            }
            released.await;
        }
    }

    /// Whether an operation is in flight.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the gate.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    gate: &'a MutationGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::Release);
        self.gate.released.notify_waiters();
    }
}
