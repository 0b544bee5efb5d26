use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::invariants::debug_assert_stop_monotonic;
use crate::sc_queue::Recv;
use crate::semaphore::Semaphore;
use crate::spin_lock::SpinLock;

/// A thread-safe priority queue ordered by `Ord`/`BinaryHeap`'s max-heap
/// convention: `pop` returns the *greatest* element first. Callers that want
/// earliest-created-first (the maintainer's neck queue, ordered by
/// ascending `tick`) should wrap their item in a `Reverse`-like newtype or
/// implement `Ord` so that "lower tick" compares greater.
///
/// Heap mutation is guarded by a spin lock rather than a full mutex: the
/// critical section is a single `BinaryHeap::push`/`pop`, short enough that
/// parking a thread would cost more than spinning briefly.
pub struct PriorityQueue<T: Ord> {
    heap: SpinLock<BinaryHeap<T>>,
    wake: Semaphore,
    stopped: AtomicBool,
}

impl<T: Ord> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: SpinLock::new(BinaryHeap::new()),
            wake: Semaphore::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Push an item and wake the consumer if it's parked.
    pub fn push(&self, item: T) {
        self.heap.lock().push(item);
        self.wake.release();
    }

    /// Request shutdown: any currently- or future-parked `pop` returns
    /// `Recv::Stop` once the heap has drained.
    pub fn request_stop(&self) {
        let was_stopped = self.stopped.swap(true, Ordering::Release);
        debug_assert_stop_monotonic!(was_stopped, true);
        self.wake.release();
    }

    /// Non-blocking pop: `Some` if the heap has an item, `None` if empty
    /// (regardless of stop state — callers distinguish "empty for now" from
    /// "stopped" only through [`PriorityQueue::pop`]).
    pub fn try_pop(&self) -> Option<T> {
        self.heap.lock().pop()
    }

    /// Blocking pop. Returns the highest-priority item, or `Recv::Stop` once
    /// the heap is empty and `request_stop` has been called.
    ///
    /// Unlike `ScQueue`, a `PriorityQueue` may have many concurrent
    /// consumers (the worker pool), so a single `request_stop` wake-up
    /// isn't enough to drain every parked waiter: each thread that wakes
    /// up and observes `stopped` re-releases a permit before returning,
    /// relaying the wake-up to the next parked consumer in a chain.
    pub fn pop(&self) -> Recv<T> {
        loop {
            if let Some(item) = self.heap.lock().pop() {
                return Recv::Value(item);
            }
            if self.stopped.load(Ordering::Acquire) {
                self.wake.release();
                return Recv::Stop;
            }
            self.wake.acquire();
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
