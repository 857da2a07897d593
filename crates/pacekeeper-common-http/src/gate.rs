//! Process-wide dispatch gate.
//!
//! Every [`Requester`](crate::Requester) dispatches through the same
//! [`RequestGate::global`] instance, so at most one "network call plus
//! pacing delay" window is open in the whole process at any time.

use once_cell::sync::Lazy;
use pacekeeper_common_async::sleep;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

static GLOBAL_GATE: Lazy<RequestGate> = Lazy::new(RequestGate::new);

/// A single-permit, async-aware mutual exclusion gate.
///
/// Waiters are not promised any particular order.
#[derive(Debug, Default)]
pub struct RequestGate {
    permit: Mutex<()>,
}

/// Proof of holding the gate. Dropping it releases the permit.
#[derive(Debug)]
pub struct GatePermit<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl RequestGate {
    /// Create an independent gate.
    ///
    /// Requesters never use one of these; they always go through
    /// [`RequestGate::global`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The gate shared by every requester in the process.
    pub fn global() -> &'static RequestGate {
        &GLOBAL_GATE
    }

    /// Wait until the permit is free and take it.
    pub async fn acquire(&self) -> GatePermit<'_> {
        GatePermit {
            _guard: self.permit.lock().await,
        }
    }

    /// Take the permit only if nobody holds it.
    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        self.permit
            .try_lock()
            .ok()
            .map(|guard| GatePermit { _guard: guard })
    }

    /// Whether the permit is currently held.
    pub fn is_held(&self) -> bool {
        self.permit.try_lock().is_err()
    }

    /// Run `task` while holding the permit, then wait `pacing` before
    /// releasing it.
    ///
    /// The pacing wait happens whatever `task` produced. If the returned
    /// future is dropped mid-flight, or `task` panics, the permit is
    /// released immediately without pacing.
    pub async fn run_exclusive<F, T>(&self, pacing: Duration, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await;
        let output = task.await;
        if !pacing.is_zero() {
            sleep(pacing).await;
        }
        output
    }
}
