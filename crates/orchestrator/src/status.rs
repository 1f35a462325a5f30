use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::TxError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    #[default]
    Idle,
    Signing,
    Confirming,
}

/// What the view shows while an action is in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TxSnapshot {
    pub status: TxStatus,
    pub action: Option<String>,
    /// One-based step currently running, and the plan length.
    pub step: Option<(usize, usize)>,
}

impl TxSnapshot {
    pub fn is_busy(&self) -> bool {
        self.status != TxStatus::Idle
    }
}

/// Shared status cell. At most one action runs at a time.
#[derive(Debug, Clone, Default)]
pub struct TxTracker {
    state: Arc<Mutex<TxSnapshot>>,
}

impl TxTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TxSnapshot {
        self.lock().clone()
    }

    /// Claims the tracker for `action`. The returned guard resets the status
    /// to idle when dropped, on every exit path.
    pub fn begin(&self, action: &str) -> Result<ActiveAction, TxError> {
        let mut state = self.lock();
        if let Some(running) = state.action.as_ref() {
            return Err(TxError::Busy(running.clone()));
        }
        *state = TxSnapshot {
            status: TxStatus::Signing,
            action: Some(action.to_string()),
            step: None,
        };
        Ok(ActiveAction {
            tracker: self.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TxSnapshot> {
        // a poisoned cell still holds a usable snapshot
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
pub struct ActiveAction {
    tracker: TxTracker,
}

impl ActiveAction {
    pub fn signing(&self, step: usize, total: usize) {
        let mut state = self.tracker.lock();
        state.status = TxStatus::Signing;
        state.step = Some((step + 1, total));
    }

    pub fn confirming(&self) {
        self.tracker.lock().status = TxStatus::Confirming;
    }
}

impl Drop for ActiveAction {
    fn drop(&mut self) {
        *self.tracker.lock() = TxSnapshot::default();
    }
}
