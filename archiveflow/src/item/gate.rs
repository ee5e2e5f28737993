//! Cancellation gate for a single work item.
//!
//! An item can only be canceled while it is parked in a cancelable retry
//! wait. The gate holds both flags under one lock so that a retry firing and
//! a cancellation request can never both succeed.

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct GateState {
    may_be_canceled: bool,
    canceled: bool,
    reason: Option<String>,
}

/// Cooperative cancellation state shared between an item and its handles.
#[derive(Debug, Default)]
pub struct CancelGate {
    state: Mutex<GateState>,
    notify: Notify,
}

impl CancelGate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a retry wait, opening the gate only if the stage allows it.
    pub fn enter_wait(&self, cancelable: bool) {
        self.state.lock().may_be_canceled = cancelable;
    }

    /// Leaves the retry wait. Returns true if the retry should run.
    ///
    /// The gate is closed again either way.
    pub fn fire(&self) -> bool {
        let mut state = self.state.lock();
        state.may_be_canceled = false;
        !state.canceled
    }

    /// Requests cancellation.
    ///
    /// Only the first request made while the gate is open takes effect;
    /// returns whether this request did.
    pub fn request_cancel(&self, reason: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        if !state.may_be_canceled || state.canceled {
            return false;
        }
        state.canceled = true;
        state.reason = Some(reason.into());
        drop(state);

        self.notify.notify_one();
        true
    }

    /// Returns whether a cancellation request would currently take effect.
    #[must_use]
    pub fn may_be_canceled(&self) -> bool {
        self.state.lock().may_be_canceled
    }

    /// Returns whether the item has been canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.state.lock().canceled
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.lock().reason.clone()
    }

    /// Resolves once the item has been canceled.
    pub async fn cancelled(&self) {
        loop {
            if self.is_canceled() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

/// A cloneable handle used to cancel an item from outside the pipeline.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    item_id: Uuid,
    gate: std::sync::Arc<CancelGate>,
}

impl CancelHandle {
    pub(crate) fn new(item_id: Uuid, gate: std::sync::Arc<CancelGate>) -> Self {
        Self { item_id, gate }
    }

    /// The internal id of the item this handle controls.
    #[must_use]
    pub fn item_id(&self) -> Uuid {
        self.item_id
    }

    /// Requests cancellation; see [`CancelGate::request_cancel`].
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let accepted = self.gate.request_cancel(reason);
        debug!(item_id = %self.item_id, accepted, "Cancellation requested");
        accepted
    }

    /// Returns whether the item has been canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.gate.is_canceled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_gate_starts_closed() {
        let gate = CancelGate::new();
        assert!(!gate.may_be_canceled());
        assert!(!gate.is_canceled());
        assert!(!gate.request_cancel("too early"));
        assert!(!gate.is_canceled());
    }

    #[test]
    fn test_cancel_while_open() {
        let gate = CancelGate::new();
        gate.enter_wait(true);
        assert!(gate.may_be_canceled());

        assert!(gate.request_cancel("shutdown"));
        assert!(gate.is_canceled());
        assert_eq!(gate.reason(), Some("shutdown".to_string()));
        assert!(!gate.fire());
        assert!(!gate.may_be_canceled());
    }

    #[test]
    fn test_first_reason_wins() {
        let gate = CancelGate::new();
        gate.enter_wait(true);
        assert!(gate.request_cancel("first"));
        assert!(!gate.request_cancel("second"));
        assert_eq!(gate.reason(), Some("first".to_string()));
    }

    #[test]
    fn test_non_cancelable_wait_ignores_requests() {
        let gate = CancelGate::new();
        gate.enter_wait(false);
        assert!(!gate.request_cancel("ignored"));
        assert!(gate.fire());
    }

    #[test]
    fn test_cancel_after_fire_has_no_effect() {
        let gate = CancelGate::new();
        gate.enter_wait(true);
        assert!(gate.fire());
        assert!(!gate.request_cancel("late"));
        assert!(!gate.is_canceled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let gate = Arc::new(CancelGate::new());
        gate.enter_wait(true);

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.cancelled().await })
        };

        tokio::task::yield_now().await;
        assert!(gate.request_cancel("wake"));

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_handle_cancels_shared_gate() {
        let gate = Arc::new(CancelGate::new());
        let handle = CancelHandle::new(Uuid::new_v4(), gate.clone());
        let clone = handle.clone();

        gate.enter_wait(true);
        assert!(clone.cancel("via handle"));
        assert!(handle.is_canceled());
        assert!(gate.is_canceled());
    }
}
