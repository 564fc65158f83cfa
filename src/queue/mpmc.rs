//! Michael-Scott lock-free MPMC FIFO.
//!
//! A singly linked list headed by a payload-less sentinel. Enqueuers
//! link new cells after the tail with a CAS; dequeuers advance the head
//! and move the payload out of the new first cell. A thread publishes a
//! hazard for every cell it is about to dereference and revalidates the
//! source pointer afterwards, so a concurrently unlinked cell is never
//! touched after being freed. Unlinked cells go through the retirement
//! engine rather than straight to the allocator.

use super::retire::{self, Participant, RetiredCell};
use crate::error::Result;
use crate::util::{Backoff, CachePadded};
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: MaybeUninit<T>,
}

impl<T> Node<T> {
    fn sentinel() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            value: MaybeUninit::uninit(),
        }
    }

    fn new(value: T) -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            value: MaybeUninit::new(value),
        }
    }
}

/// Retired cells are former sentinels: their payload has been moved out
/// (or never existed), so only the allocation is released here.
unsafe fn reclaim_node<T>(ptr: *mut u8) {
    unsafe { drop(Box::from_raw(ptr.cast::<Node<T>>())) };
}

/// Unbounded lock-free multi-producer multi-consumer FIFO queue.
///
/// Any number of threads may enqueue and dequeue concurrently. Elements
/// come out in the order their enqueues linearized. The first queue
/// operation on a thread reserves two hazard slots for that thread's
/// lifetime, which is the only way an operation can fail:
/// [`Error::CapacityExhausted`](crate::Error::CapacityExhausted) when
/// the registry is full.
pub struct MpmcQueue<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
}

unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T: Send> MpmcQueue<T> {
    /// Creates an empty queue holding only the sentinel cell.
    pub fn new() -> Self {
        let sentinel = Box::into_raw(Box::new(Node::<T>::sentinel()));
        Self {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
        }
    }

    /// Appends `value` to the back of the queue.
    pub fn enqueue(&self, value: T) -> Result<()> {
        let node = Box::into_raw(Box::new(Node::new(value)));
        let linked = retire::with_participant(|p| self.link_back(p, node));
        if let Err(err) = linked {
            // The thread could not register with the hazard registry,
            // so the cell was never linked; take the payload back out
            // and free it. Observable state is unchanged.
            unsafe {
                let mut cell = Box::from_raw(node);
                cell.value.assume_init_drop();
            }
            return Err(err);
        }
        Ok(())
    }

    fn link_back(&self, p: &mut Participant, node: *mut Node<T>) {
        let mut backoff = Backoff::new();
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            p.protect(0, tail.cast());
            if self.tail.load(Ordering::Acquire) != tail {
                continue;
            }

            // Safety: tail is published in slot 0 and revalidated, so
            // the cell cannot have been reclaimed.
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };
            p.protect(1, next.cast());
            if self.tail.load(Ordering::Acquire) != tail {
                continue;
            }
            if unsafe { (*tail).next.load(Ordering::Acquire) } != next {
                continue;
            }

            if !next.is_null() {
                // Tail lags by one link; help it forward and retry.
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                continue;
            }

            // Linearization point on success.
            let link = unsafe {
                (*tail).next.compare_exchange_weak(
                    ptr::null_mut(),
                    node,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
            };
            match link {
                Ok(_) => {
                    // Swing the tail; losing this CAS is fine, someone
                    // helped us.
                    let _ = self.tail.compare_exchange(
                        tail,
                        node,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    break;
                }
                Err(_) => backoff.spin(),
            }
        }
        p.clear_all();
    }

    /// Removes the element at the front of the queue, or returns
    /// `Ok(None)` if the queue was observed empty.
    pub fn try_dequeue(&self) -> Result<Option<T>> {
        retire::with_participant(|p| self.unlink_front(p))
    }

    fn unlink_front(&self, p: &mut Participant) -> Option<T> {
        let mut backoff = Backoff::new();
        loop {
            let head = self.head.load(Ordering::Acquire);
            p.protect(0, head.cast());
            if self.head.load(Ordering::Acquire) != head {
                continue;
            }

            let tail = self.tail.load(Ordering::Acquire);
            // Safety: head is published in slot 0 and revalidated.
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            p.protect(1, next.cast());
            if self.head.load(Ordering::Acquire) != head {
                continue;
            }
            if unsafe { (*head).next.load(Ordering::Acquire) } != next {
                continue;
            }

            if head == tail {
                if next.is_null() {
                    p.clear_all();
                    return None;
                }
                // An enqueue linked a cell but has not swung the tail
                // yet; help it forward and retry.
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                continue;
            }

            // Read the payload before publishing the new head so a
            // winning CAS hands out a fully transferred value.
            // Safety: next is non-null here (head != tail implies a
            // successor), published in slot 1, and revalidated.
            let value = unsafe { ptr::read((*next).value.as_ptr()) };
            match self.head.compare_exchange(
                head,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    p.clear_all();
                    // The old sentinel is unlinked; its free is deferred
                    // until no hazard covers it.
                    unsafe {
                        p.retire(RetiredCell::new(head.cast(), reclaim_node::<T>));
                    }
                    return Some(value);
                }
                Err(_) => {
                    // Lost the race; the bitwise copy belongs to the
                    // winner and must not be dropped here.
                    std::mem::forget(value);
                    backoff.spin();
                }
            }
        }
    }

    /// Conservative emptiness check: may report non-empty while a
    /// concurrent dequeue is mid-flight, and reports empty only when
    /// the sentinel's successor was actually observed null.
    pub fn is_empty(&self) -> Result<bool> {
        retire::with_participant(|p| loop {
            let head = self.head.load(Ordering::Acquire);
            p.protect(0, head.cast());
            if self.head.load(Ordering::Acquire) != head {
                continue;
            }
            // Safety: head is published in slot 0 and revalidated.
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            p.clear_all();
            return next.is_null();
        })
    }
}

impl<T: Send> Default for MpmcQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        // Exclusive access: walk the list, dropping payloads of the
        // value-bearing cells (everything after the sentinel) and
        // freeing every cell.
        let mut node = *self.head.get_mut();
        let mut is_sentinel = true;
        while !node.is_null() {
            unsafe {
                let mut cell = Box::from_raw(node);
                node = *cell.next.get_mut();
                if !is_sentinel {
                    cell.value.assume_init_drop();
                }
            }
            is_sentinel = false;
        }
    }
}

impl<T> fmt::Debug for MpmcQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpmcQueue").finish_non_exhaustive()
    }
}
