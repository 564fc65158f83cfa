use karya_rs::MpmcQueue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_roundtrip_on_fresh_queue() {
    let queue = MpmcQueue::new();
    queue.enqueue(123u64).unwrap();

    assert_eq!(queue.try_dequeue().unwrap(), Some(123));
    assert!(queue.is_empty().unwrap());
}

#[test]
fn test_empty_queue_dequeue_returns_none() {
    let queue: MpmcQueue<String> = MpmcQueue::new();
    assert_eq!(queue.try_dequeue().unwrap(), None);
    assert!(queue.is_empty().unwrap());
}

#[test]
fn test_single_thread_fifo() {
    let queue = MpmcQueue::new();
    for i in 0..1_000u32 {
        queue.enqueue(i).unwrap();
    }
    for i in 0..1_000u32 {
        assert_eq!(queue.try_dequeue().unwrap(), Some(i));
    }
    assert_eq!(queue.try_dequeue().unwrap(), None);
}

// Every enqueued item must come out exactly once, across 4 producers
// and 4 consumers running concurrently.
#[test]
fn test_mpmc_exactly_once() {
    const NUM_PRODUCERS: usize = 4;
    const NUM_CONSUMERS: usize = 4;
    const ITEMS_PER_PRODUCER: usize = 50_000;
    const TOTAL_ITEMS: usize = NUM_PRODUCERS * ITEMS_PER_PRODUCER;

    let queue = Arc::new(MpmcQueue::new());
    let received: Arc<Vec<AtomicBool>> =
        Arc::new((0..TOTAL_ITEMS).map(|_| AtomicBool::new(false)).collect());
    let producers_done = Arc::new(AtomicUsize::new(0));
    let consumed = Arc::new(AtomicUsize::new(0));
    let duplicates = Arc::new(AtomicUsize::new(0));
    let out_of_range = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();

    for p in 0..NUM_PRODUCERS {
        let queue = queue.clone();
        let producers_done = producers_done.clone();
        handles.push(thread::spawn(move || {
            for i in 0..ITEMS_PER_PRODUCER {
                queue.enqueue(p * ITEMS_PER_PRODUCER + i).unwrap();
            }
            producers_done.fetch_add(1, Ordering::Release);
        }));
    }

    for _ in 0..NUM_CONSUMERS {
        let queue = queue.clone();
        let received = received.clone();
        let producers_done = producers_done.clone();
        let consumed = consumed.clone();
        let duplicates = duplicates.clone();
        let out_of_range = out_of_range.clone();
        handles.push(thread::spawn(move || loop {
            match queue.try_dequeue().unwrap() {
                Some(value) => {
                    if value >= TOTAL_ITEMS {
                        out_of_range.fetch_add(1, Ordering::Relaxed);
                    } else if received[value].swap(true, Ordering::AcqRel) {
                        duplicates.fetch_add(1, Ordering::Relaxed);
                    }
                    consumed.fetch_add(1, Ordering::AcqRel);
                }
                None => {
                    let done = producers_done.load(Ordering::Acquire) == NUM_PRODUCERS;
                    if done && queue.is_empty().unwrap() {
                        break;
                    }
                    thread::yield_now();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(consumed.load(Ordering::Acquire), TOTAL_ITEMS);
    assert_eq!(duplicates.load(Ordering::Relaxed), 0);
    assert_eq!(out_of_range.load(Ordering::Relaxed), 0);
    assert!(received.iter().all(|slot| slot.load(Ordering::Acquire)));
    assert!(queue.is_empty().unwrap());
}

// Concurrent dequeuers racing over fewer items than consumers must not
// invent or lose values.
#[test]
fn test_more_consumers_than_items() {
    let queue = Arc::new(MpmcQueue::new());
    for i in 0..3u32 {
        queue.enqueue(i).unwrap();
    }

    let popped = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let queue = queue.clone();
            let popped = popped.clone();
            thread::spawn(move || {
                while queue.try_dequeue().unwrap().is_some() {
                    popped.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(popped.load(Ordering::Relaxed), 3);
}

#[test]
fn test_drop_frees_queued_payloads() {
    let marker = Arc::new(());
    {
        let queue = MpmcQueue::new();
        for _ in 0..64 {
            queue.enqueue(marker.clone()).unwrap();
        }
    }
    assert_eq!(Arc::strong_count(&marker), 1);
}

#[test]
fn test_interleaved_enqueue_dequeue() {
    let queue = MpmcQueue::new();

    for round in 0..50u64 {
        queue.enqueue(round * 2).unwrap();
        queue.enqueue(round * 2 + 1).unwrap();
        assert_eq!(queue.try_dequeue().unwrap(), Some(round * 2));
        assert_eq!(queue.try_dequeue().unwrap(), Some(round * 2 + 1));
    }
    assert!(queue.is_empty().unwrap());
}
