use std::sync::{Condvar, Mutex};

/// A classic counting semaphore.
///
/// Used for the engine-level suspension points (§5): workers park on a work
/// semaphore, the maintainer parks on a maintain semaphore, the dispatcher
/// parks on a callback semaphore. Shutdown releases `worker_count + 2`
/// permits so every parked thread wakes exactly once and observes the
/// `stop` flag.
pub struct Semaphore {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            condvar: Condvar::new(),
        }
    }

    /// Block until a permit is available, then consume it.
    pub fn acquire(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.condvar.wait(count).unwrap();
        }
        *count -= 1;
    }

    /// Release one permit, waking a single waiter if any are parked.
    pub fn release(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.condvar.notify_one();
    }
}
