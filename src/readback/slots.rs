//! Shared state flags of the staging slots

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

/// Lifecycle of a staging slot.
///
/// `Free -> Mapped` when a copy is scheduled into the slot, `Mapped -> Free`
/// once the mapping has been released again. `Retired` is terminal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free = 0,
    Mapped = 1,
    Retired = 2,
}

impl SlotState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => SlotState::Free,
            1 => SlotState::Mapped,
            _ => SlotState::Retired,
        }
    }
}

/// State flags of K staging slots plus a rotating search cursor.
///
/// Cloning shares the flags, so a clone handed to another thread observes
/// the same slots.
#[derive(Debug, Clone)]
pub struct SlotTable {
    states: Arc<[AtomicU8]>,
    cursor: Arc<AtomicUsize>,
}

impl SlotTable {
    pub fn new(slot_count: usize) -> Self {
        let states: Vec<AtomicU8> = (0..slot_count)
            .map(|_| AtomicU8::new(SlotState::Free as u8))
            .collect();
        Self {
            states: states.into(),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, slot: usize) -> Option<SlotState> {
        self.states
            .get(slot)
            .map(|state| SlotState::from_raw(state.load(Ordering::Acquire)))
    }

    /// First free slot at or after the cursor, wrapping around once.
    pub fn find_free(&self) -> Option<usize> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let start = self.cursor.load(Ordering::Relaxed) % len;
        (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&slot| self.state(slot) == Some(SlotState::Free))
    }

    /// Claims a free slot for a copy and moves the cursor past it.
    pub fn reserve(&self) -> Option<usize> {
        let len = self.len();
        for _ in 0..len {
            let slot = self.find_free()?;
            if self.transition(slot, SlotState::Free, SlotState::Mapped) {
                self.cursor.store((slot + 1) % len, Ordering::Relaxed);
                return Some(slot);
            }
        }
        None
    }

    /// Marks a slot as in use regardless of its current state, unless retired.
    pub fn mark_mapped(&self, slot: usize) -> bool {
        self.transition(slot, SlotState::Free, SlotState::Mapped)
            || self.state(slot) == Some(SlotState::Mapped)
    }

    /// Returns a mapped slot to the pool. Only valid after its unmap completed.
    pub fn release(&self, slot: usize) -> bool {
        self.transition(slot, SlotState::Mapped, SlotState::Free)
    }

    /// Takes a mapped slot out of rotation for good.
    pub fn retire(&self, slot: usize) -> bool {
        self.transition(slot, SlotState::Mapped, SlotState::Retired)
    }

    fn transition(&self, slot: usize, from: SlotState, to: SlotState) -> bool {
        self.states.get(slot).is_some_and(|state| {
            state
                .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    fn count(&self, wanted: SlotState) -> usize {
        (0..self.len())
            .filter(|&slot| self.state(slot) == Some(wanted))
            .count()
    }

    pub fn free_count(&self) -> usize {
        self.count(SlotState::Free)
    }

    pub fn mapped_count(&self) -> usize {
        self.count(SlotState::Mapped)
    }

    pub fn retired_count(&self) -> usize {
        self.count(SlotState::Retired)
    }
}
