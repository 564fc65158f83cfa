//! Deferred reclamation of unlinked queue cells.
//!
//! A dequeuer that unlinks a cell cannot free it outright: another
//! thread may still hold it through a published hazard slot. Unlinked
//! cells are parked on the owning thread's retired bag and freed by a
//! periodic scan once no hazard covers them. A thread that exits hands
//! its leftovers to a global list, which is only emptied at full
//! quiescence.

use super::hazard;
use crate::error::Result;
use parking_lot::Mutex;
use std::cell::RefCell;

/// Retirements between scans of the hazard registry. Amortizes the
/// O(H log H) scan over many retirements.
const SCAN_THRESHOLD: usize = 64;

/// A cell that has been unlinked from a queue but may still be
/// referenced through a hazard slot. Type-erased so bags can hold cells
/// from queues of different payload types.
pub(crate) struct RetiredCell {
    ptr: *mut u8,
    reclaim: unsafe fn(*mut u8),
}

// The pointee is unlinked; only the eventual reclaim call touches it.
unsafe impl Send for RetiredCell {}

impl RetiredCell {
    /// # Safety
    ///
    /// `ptr` must be exclusively owned by the retirement engine from
    /// this point on, and `reclaim(ptr)` must be sound once no hazard
    /// slot publishes `ptr`.
    pub(crate) unsafe fn new(ptr: *mut u8, reclaim: unsafe fn(*mut u8)) -> Self {
        Self { ptr, reclaim }
    }

    unsafe fn reclaim(self) {
        unsafe { (self.reclaim)(self.ptr) }
    }
}

static GLOBAL_RETIRED: Mutex<Vec<RetiredCell>> = Mutex::new(Vec::new());

/// Per-thread queue participation state: two reserved hazard slots plus
/// the local retired bag. Built lazily on a thread's first queue
/// operation, torn down by the `thread_local!` destructor at thread
/// exit.
pub(crate) struct Participant {
    slots: [usize; hazard::SLOTS_PER_THREAD],
    retired: Vec<RetiredCell>,
    snapshot_buf: Vec<*mut u8>,
}

impl Participant {
    fn new() -> Result<Self> {
        let domain = hazard::global();
        let slot0 = domain.acquire_slot()?;
        let slot1 = match domain.acquire_slot() {
            Ok(slot) => slot,
            Err(err) => {
                domain.release_slot(slot0);
                return Err(err);
            }
        };

        Ok(Self {
            slots: [slot0, slot1],
            retired: Vec::new(),
            snapshot_buf: Vec::new(),
        })
    }

    /// Publishes `ptr` in this thread's slot `which` (0 or 1).
    pub(crate) fn protect(&self, which: usize, ptr: *mut u8) {
        hazard::global().protect(self.slots[which], ptr);
    }

    /// Clears both of this thread's slots.
    pub(crate) fn clear_all(&self) {
        let domain = hazard::global();
        domain.clear(self.slots[0]);
        domain.clear(self.slots[1]);
    }

    /// Parks an unlinked cell; scans once the bag reaches the
    /// threshold.
    pub(crate) fn retire(&mut self, cell: RetiredCell) {
        self.retired.push(cell);
        if self.retired.len() >= SCAN_THRESHOLD {
            self.scan();
        }
    }

    /// Frees every parked cell no hazard slot currently covers.
    fn scan(&mut self) {
        let domain = hazard::global();
        let mut hazards = std::mem::take(&mut self.snapshot_buf);
        domain.snapshot(&mut hazards);

        // Adopt the global overflow opportunistically; never block the
        // hot path on that lock.
        if let Some(mut global) = GLOBAL_RETIRED.try_lock() {
            self.retired.append(&mut global);
        }

        hazards.sort_unstable();
        let mut kept = Vec::with_capacity(self.retired.len());
        for cell in self.retired.drain(..) {
            if hazards.binary_search(&cell.ptr).is_ok() {
                kept.push(cell);
            } else {
                unsafe { cell.reclaim() };
            }
        }
        self.retired = kept;
        self.snapshot_buf = hazards;
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        if !self.retired.is_empty() {
            GLOBAL_RETIRED.lock().append(&mut self.retired);
        }
        let domain = hazard::global();
        for &slot in &self.slots {
            domain.release_slot(slot);
        }
    }
}

thread_local! {
    static PARTICIPANT: RefCell<Option<Participant>> = const { RefCell::new(None) };
}

/// Runs `f` with the calling thread's participation state, registering
/// the thread with the hazard registry on first use.
pub(crate) fn with_participant<R>(f: impl FnOnce(&mut Participant) -> R) -> Result<R> {
    PARTICIPANT.with(|cell| {
        let mut guard = cell.borrow_mut();
        if guard.is_none() {
            *guard = Some(Participant::new()?);
        }
        let participant = guard.as_mut().expect("registered above");
        Ok(f(participant))
    })
}

/// Frees every cell on the global retired list. See
/// [`crate::queue::drain_retired`] for the quiescence contract.
pub(crate) unsafe fn drain_global() {
    let mut global = GLOBAL_RETIRED.lock();
    for cell in global.drain(..) {
        unsafe { cell.reclaim() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static RECLAIMED: AtomicUsize = AtomicUsize::new(0);

    unsafe fn count_reclaim(ptr: *mut u8) {
        RECLAIMED.fetch_add(1, Ordering::SeqCst);
        unsafe { drop(Box::from_raw(ptr.cast::<u64>())) };
    }

    fn retired_box(v: u64) -> RetiredCell {
        let ptr = Box::into_raw(Box::new(v)).cast::<u8>();
        unsafe { RetiredCell::new(ptr, count_reclaim) }
    }

    #[test]
    fn test_unprotected_cells_reclaimed_by_scan() {
        let before = RECLAIMED.load(Ordering::SeqCst);

        with_participant(|p| {
            for i in 0..SCAN_THRESHOLD as u64 {
                p.retire(retired_box(i));
            }
        })
        .unwrap();

        let freed = RECLAIMED.load(Ordering::SeqCst) - before;
        assert!(freed >= SCAN_THRESHOLD);
    }

    #[test]
    fn test_protected_cell_survives_scan() {
        let ptr = Box::into_raw(Box::new(99u64)).cast::<u8>();

        with_participant(|p| {
            p.protect(0, ptr);
            p.retire(unsafe { RetiredCell::new(ptr, count_reclaim) });
            // Force scans past the threshold; the protected cell must
            // stay parked.
            for i in 0..(2 * SCAN_THRESHOLD as u64) {
                p.retire(retired_box(i));
            }
            assert!(p.retired.iter().any(|c| c.ptr == ptr));
            p.clear_all();
            // With the slot cleared the next scan frees it.
            for i in 0..SCAN_THRESHOLD as u64 {
                p.retire(retired_box(i));
            }
            assert!(!p.retired.iter().any(|c| c.ptr == ptr));
        })
        .unwrap();
    }
}
