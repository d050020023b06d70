//! Tests for DatagramQueue and QueuedReturn
//!
//! These tests verify:
//! - FIFO ordering
//! - Backpressure at capacity (rejecting and blocking inserts)
//! - Shutdown semantics and draining
//! - De-duplicated enqueue

use std::time::Duration;

use crossbeam::channel;
use framenet::queue::{DatagramQueue, QueuedReturn};
use framenet::NetError;

// =============================================================================
// DatagramQueue Tests
// =============================================================================

#[test]
fn test_queue_fifo_order() {
    let queue = DatagramQueue::new(10);
    for i in 0..5 {
        queue.insert(i, false).unwrap();
    }
    let drained: Vec<i32> = (0..5).filter_map(|_| queue.try_extract()).collect();
    assert_eq!(drained, vec![0, 1, 2, 3, 4]);
    assert!(queue.is_empty());
}

#[test]
fn test_queue_rejects_past_capacity() {
    let queue = DatagramQueue::new(3);
    for i in 0..3 {
        queue.insert(i, false).unwrap();
    }
    assert!(matches!(queue.insert(3, false), Err(NetError::QueueFull(3))));
    assert_eq!(queue.len(), 3);

    queue.try_extract();
    queue.insert(3, false).unwrap();
}

#[test]
fn test_queue_concurrent_inserts_reject_overflow() {
    const MAX: usize = 8;
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 5;

    let queue = DatagramQueue::new(MAX);
    let accepted: usize = crossbeam::scope(|s| {
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = &queue;
                s.spawn(move |_| {
                    (0..PER_PRODUCER)
                        .filter(|i| queue.insert(p * 100 + i, false).is_ok())
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    })
    .unwrap();

    assert_eq!(accepted, MAX);
    assert_eq!(queue.len(), MAX);
}

#[test]
fn test_queue_blocking_insert_waits_for_space() {
    let queue = DatagramQueue::new(1);
    queue.insert(1, false).unwrap();

    let (tx, rx) = channel::unbounded();
    crossbeam::scope(|s| {
        s.spawn(|_| {
            queue.insert(2, true).unwrap();
            tx.send(()).unwrap();
        });

        // The blocked producer cannot finish until space frees
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(queue.extract(), Some(1));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    })
    .unwrap();

    assert_eq!(queue.try_extract(), Some(2));
}

#[test]
fn test_queue_extract_blocks_until_insert() {
    let queue = DatagramQueue::new(4);
    crossbeam::scope(|s| {
        let consumer = s.spawn(|_| queue.extract());
        std::thread::sleep(Duration::from_millis(50));
        queue.insert(42, false).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(42));
    })
    .unwrap();
}

#[test]
fn test_queue_shutdown_drains_then_stops() {
    let queue = DatagramQueue::new(4);
    queue.insert(1, false).unwrap();
    queue.insert(2, false).unwrap();
    queue.shutdown();

    assert!(queue.is_shutdown());
    assert!(matches!(queue.insert(3, false), Err(NetError::QueueShutdown)));
    assert_eq!(queue.extract(), Some(1));
    assert_eq!(queue.extract(), Some(2));
    assert_eq!(queue.extract(), None);
}

#[test]
fn test_queue_shutdown_wakes_waiters() {
    let queue: DatagramQueue<u32> = DatagramQueue::new(1);
    crossbeam::scope(|s| {
        let queue = &queue;
        let consumers: Vec<_> = (0..3).map(|_| s.spawn(move |_| queue.extract())).collect();
        std::thread::sleep(Duration::from_millis(50));
        queue.shutdown();
        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), None);
        }
    })
    .unwrap();
}

#[test]
fn test_queue_set_max_size() {
    let queue = DatagramQueue::new(1);
    queue.insert(1, false).unwrap();
    assert!(queue.insert(2, false).is_err());

    queue.set_max_size(2);
    assert_eq!(queue.max_size(), 2);
    queue.insert(2, false).unwrap();
}

// =============================================================================
// QueuedReturn Tests
// =============================================================================

#[test]
fn test_return_fifo() {
    let fifo = QueuedReturn::new(10);
    assert!(!fifo.thing_available());

    fifo.enqueue_thing("a");
    fifo.enqueue_thing("b");
    assert!(fifo.thing_available());
    assert_eq!(fifo.get_thing(), Some("a"));
    assert_eq!(fifo.get_thing(), Some("b"));
    assert_eq!(fifo.get_thing(), None);
}

#[test]
fn test_return_rejects_past_capacity() {
    let fifo = QueuedReturn::new(2);
    assert!(fifo.enqueue_thing(1));
    assert!(fifo.enqueue_thing(2));
    assert!(!fifo.enqueue_thing(3));
    assert!(!fifo.enqueue_thing(4));
    assert_eq!(fifo.len(), 2);

    fifo.get_thing();
    assert!(fifo.enqueue_thing(5));
    assert_eq!(fifo.get_thing(), Some(2));
    assert_eq!(fifo.get_thing(), Some(5));
}

#[test]
fn test_return_unique() {
    let fifo = QueuedReturn::new(10);
    assert!(fifo.enqueue_unique_thing(7));
    assert!(!fifo.enqueue_unique_thing(7));
    assert!(fifo.enqueue_unique_thing(8));
    assert_eq!(fifo.len(), 2);

    fifo.get_thing();
    assert!(fifo.enqueue_unique_thing(7));
}

#[test]
fn test_return_concurrent_producers() {
    let fifo = QueuedReturn::new(1000);
    crossbeam::scope(|s| {
        for p in 0..4 {
            let fifo = &fifo;
            s.spawn(move |_| {
                for i in 0..100 {
                    fifo.enqueue_thing(p * 1000 + i);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(fifo.len(), 400);
    let mut last = [None::<i32>; 4];
    while let Some(item) = fifo.get_thing() {
        let producer = (item / 1000) as usize;
        // Items from one producer keep their order
        assert!(last[producer].map_or(true, |prev| prev < item));
        last[producer] = Some(item);
    }
}
