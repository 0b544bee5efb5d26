//! Lock-free single-consumer queue and spin-locked priority queue
//! primitives underlying the frame-graph scheduler's inter-thread
//! handoffs: the maintainer's task queue, the callback dispatcher's
//! delivery queue, and the neck (single-threaded backpressure) queue all
//! build on these two types.

mod backoff;
mod invariants;
mod priority_queue;
mod sc_queue;
mod semaphore;
mod spin_lock;

pub use backoff::Backoff;
pub use priority_queue::PriorityQueue;
pub use sc_queue::{Recv, ScQueue};
pub use semaphore::Semaphore;
pub use spin_lock::{SpinLock, SpinLockGuard};
