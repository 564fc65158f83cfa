//! Hazard slot registry.
//!
//! A fixed array of per-thread published pointers. A cell that appears
//! in any slot must not be freed; the retirement engine consults the
//! registry before reclaiming. Slot indices are handed out from a
//! free-list so they can be reused across thread lifetimes.

use crate::error::{Error, Result};
use crate::util::CachePadded;
use parking_lot::Mutex;
use std::fmt;
use std::ptr;
use std::sync::atomic::{fence, AtomicPtr, Ordering};
use std::sync::OnceLock;

/// Total hazard slots in the process-wide registry. At two slots per
/// thread this supports up to 1024 concurrent participants.
pub const DOMAIN_CAPACITY: usize = 2048;

/// Slots each participating thread reserves for its lifetime.
pub const SLOTS_PER_THREAD: usize = 2;

/// Registry of hazard slots with a free-list of indices.
pub struct HazardDomain {
    slots: Box<[CachePadded<AtomicPtr<u8>>]>,
    free: Mutex<Vec<usize>>,
}

impl HazardDomain {
    fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| CachePadded::new(AtomicPtr::new(ptr::null_mut())))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        // Hand out low indices first so snapshots of a lightly loaded
        // process walk a compact, mostly-null prefix.
        let free = (0..capacity).rev().collect();

        Self {
            slots,
            free: Mutex::new(free),
        }
    }

    /// Reserves a slot index for the calling thread.
    pub fn acquire_slot(&self) -> Result<usize> {
        self.free.lock().pop().ok_or(Error::CapacityExhausted)
    }

    /// Returns `index` to the free pool. The slot is cleared before the
    /// index becomes reusable. Callers must not release an index twice.
    pub fn release_slot(&self, index: usize) {
        self.slots[index].store(ptr::null_mut(), Ordering::Release);
        self.free.lock().push(index);
    }

    /// Publishes `ptr` in `index`. The fence orders the publication
    /// before the caller's revalidating reload; without it a scanning
    /// thread could miss the slot and free the cell under us.
    pub fn protect(&self, index: usize, ptr: *mut u8) {
        self.slots[index].store(ptr, Ordering::Release);
        fence(Ordering::SeqCst);
    }

    /// Clears `index` to null.
    pub fn clear(&self, index: usize) {
        self.slots[index].store(ptr::null_mut(), Ordering::Release);
    }

    /// Collects every currently published pointer into `out`. A slot
    /// being written or cleared concurrently may or may not be
    /// observed; either outcome keeps reclamation sound.
    pub fn snapshot(&self, out: &mut Vec<*mut u8>) {
        out.clear();
        fence(Ordering::SeqCst);
        for slot in self.slots.iter() {
            let p = slot.load(Ordering::Acquire);
            if !p.is_null() {
                out.push(p);
            }
        }
    }

    /// Number of slot indices currently available.
    #[cfg(test)]
    fn free_len(&self) -> usize {
        self.free.lock().len()
    }
}

impl fmt::Debug for HazardDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HazardDomain")
            .field("capacity", &self.slots.len())
            .finish_non_exhaustive()
    }
}

/// The process-wide registry. Statics are never destroyed, so a thread
/// still clearing its slots during process teardown cannot race a dead
/// registry.
pub(crate) fn global() -> &'static HazardDomain {
    static DOMAIN: OnceLock<HazardDomain> = OnceLock::new();
    DOMAIN.get_or_init(|| HazardDomain::with_capacity(DOMAIN_CAPACITY))
}
