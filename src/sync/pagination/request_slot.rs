//! Single-flight guard for page loads.
//!
//! A slot admits one fetch at a time. Re-targeting the pager bumps the
//! epoch, which frees the slot at once and marks any fetch still running
//! as stale, so its response is discarded instead of written into the
//! wrong conversation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Idle,
    Fetching { epoch: u64 },
}

#[derive(Debug)]
struct SlotInner {
    state: SlotState,
    epoch: u64,
}

/// Re-entrancy guard shared by a pager and its in-flight requests.
#[derive(Debug, Clone)]
pub struct RequestSlot {
    inner: Arc<Mutex<SlotInner>>,
}

impl RequestSlot {
    /// Create an idle slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotInner {
                state: SlotState::Idle,
                epoch: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot. Returns `None` while a current fetch is in flight.
    #[must_use]
    pub fn try_begin(&self) -> Option<InFlight> {
        let mut inner = self.lock();
        if let SlotState::Fetching { epoch } = inner.state
            && epoch == inner.epoch
        {
            return None;
        }
        let epoch = inner.epoch;
        inner.state = SlotState::Fetching { epoch };
        drop(inner);

        Some(InFlight {
            slot: self.clone(),
            epoch,
        })
    }

    /// Start a new epoch. Any outstanding request becomes stale.
    pub fn invalidate(&self) -> u64 {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.state = SlotState::Idle;
        inner.epoch
    }

    /// Whether a current-epoch fetch is in flight.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        let inner = self.lock();
        matches!(inner.state, SlotState::Fetching { epoch } if epoch == inner.epoch)
    }

    fn current_epoch(&self) -> u64 {
        self.lock().epoch
    }

    fn release(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.state == (SlotState::Fetching { epoch }) {
            inner.state = SlotState::Idle;
        }
    }
}

impl Default for RequestSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Claim on a [`RequestSlot`]; releases it on drop.
#[derive(Debug)]
pub struct InFlight {
    slot: RequestSlot,
    epoch: u64,
}

impl InFlight {
    /// Epoch this request was started in.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the slot has not been invalidated since this request began.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.slot.current_epoch() == self.epoch
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.slot.release(self.epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let slot = RequestSlot::new();
        let first = slot.try_begin();
        assert!(first.is_some());
        assert!(slot.is_fetching());
        assert!(slot.try_begin().is_none());

        drop(first);
        assert!(!slot.is_fetching());
        assert!(slot.try_begin().is_some());
    }

    #[test]
    fn test_invalidate_frees_slot_and_marks_stale() {
        let slot = RequestSlot::new();
        let stale = slot.try_begin().unwrap();
        slot.invalidate();

        assert!(!stale.is_current());
        let fresh = slot.try_begin().unwrap();
        assert!(fresh.is_current());
        assert_eq!(fresh.epoch(), 1);

        drop(stale);
        assert!(slot.is_fetching());
        drop(fresh);
        assert!(!slot.is_fetching());
    }
}
