use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::backoff::Backoff;
use crate::invariants::debug_assert_has_successor;
use crate::semaphore::Semaphore;

/// Result of a blocking [`ScQueue::pop`].
///
/// Replaces the "catch an exception at the bottom of the stack" pattern of
/// the original engine: a consumer loop matches on `Recv` instead of
/// wrapping every `pop` in a handler for a stop signal.
#[derive(Debug)]
pub enum Recv<T> {
    /// A value pushed by a producer.
    Value(T),
    /// `request_stop` was observed; no more values will ever arrive.
    Stop,
}

impl<T> Recv<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Recv::Value(v) => Some(v),
            Recv::Stop => None,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Recv::Stop)
    }
}

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: Option<T>,
}

impl<T> Node<T> {
    fn new(value: Option<T>) -> *mut Self {
        Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            value,
        }))
    }
}

/// An intrusive, lock-free, multi-producer single-consumer queue.
///
/// Based on Dmitry Vyukov's non-intrusive MPSC queue algorithm: `head` is
/// the insertion point producers race on with a single atomic exchange,
/// `tail` is owned exclusively by the one consumer. A stub node keeps the
/// list never-empty so `push` and `pop` never need to special-case the
/// empty-queue transition.
///
/// `request_stop` pushes a sentinel node (`value: None`) that `pop` surfaces
/// as [`Recv::Stop`] instead of unwinding the consumer's stack.
pub struct ScQueue<T> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    wake: Semaphore,
}

unsafe impl<T: Send> Send for ScQueue<T> {}
unsafe impl<T: Send> Sync for ScQueue<T> {}

impl<T> Default for ScQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ScQueue<T> {
    pub fn new() -> Self {
        let stub = Node::new(None);
        Self {
            head: AtomicPtr::new(stub),
            tail: AtomicPtr::new(stub),
            wake: Semaphore::new(0),
        }
    }

    fn push_node(&self, node: *mut Node<T>) {
        let prev = self.head.swap(node, Ordering::AcqRel);
        // SAFETY: `prev` was the head; we are the only thread that can ever
        // link a successor onto it, since head.swap() hands each producer a
        // distinct, never-again-returned previous node.
        unsafe {
            (*prev).next.store(node, Ordering::Release);
        }
        self.wake.release();
    }

    /// Enqueue a value. Wakes the consumer if it is parked in `pop`.
    pub fn push(&self, value: T) {
        self.push_node(Node::new(Some(value)));
    }

    /// Enqueue the stop sentinel. Idempotent in the sense that each call
    /// appends one more sentinel, delivered once stop-request ordering
    /// reaches it — callers should call this exactly once.
    pub fn request_stop(&self) {
        self.push_node(Node::new(None));
    }

    /// Attempt to advance past the stub/consumed node, returning the next
    /// node's value if the link is already visible. Consumer-only.
    fn try_advance(&self) -> Option<Recv<T>> {
        let t = self.tail.load(Ordering::Relaxed);
        let next = unsafe { (*t).next.load(Ordering::Acquire) };
        if next.is_null() {
            return None;
        }
        debug_assert_has_successor!(next);
        self.tail.store(next, Ordering::Relaxed);
        // SAFETY: `next` is now the sole tail; its value is ours to take,
        // and `t` is no longer reachable from any producer or the consumer.
        let value = unsafe { (*next).value.take() };
        unsafe {
            drop(Box::from_raw(t));
        }
        Some(match value {
            Some(v) => Recv::Value(v),
            None => Recv::Stop,
        })
    }

    /// Non-blocking pop. Consumer-only.
    pub fn try_pop(&self) -> Option<Recv<T>> {
        self.try_advance()
    }

    /// True iff `tail` has caught up with `head`: no producer is currently
    /// between its `head.swap` and the `next`-link store that follows it.
    fn head_eq_tail(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Relaxed)
    }

    /// Blocking pop. Consumer-only — calling this from more than one thread
    /// at a time is a logic error (the queue has exactly one consumer).
    ///
    /// `try_advance` returning `None` is ambiguous between "truly empty" and
    /// "a producer swapped `head` but hasn't linked its node's predecessor
    /// yet" (§4.A). The former parks on the wake semaphore; the latter
    /// spin-retries instead, since the window is only a handful of
    /// instructions wide and the producer will finish it imminently.
    pub fn pop(&self) -> Recv<T> {
        let mut backoff = Backoff::new();
        loop {
            if let Some(recv) = self.try_advance() {
                return recv;
            }
            if self.head_eq_tail() {
                self.wake.acquire();
                backoff.reset();
            } else {
                backoff.snooze();
            }
        }
    }

    /// Drain everything currently queued without blocking, invoking `f` for
    /// each value in FIFO order. Returns `true` if the stop sentinel was
    /// seen (callers should stop calling `pop`/`consume_all` afterward).
    pub fn consume_all<F: FnMut(T)>(&self, mut f: F) -> bool {
        while let Some(recv) = self.try_advance() {
            match recv {
                Recv::Value(v) => f(v),
                Recv::Stop => return true,
            }
        }
        false
    }

    /// Block for at least one item, then drain everything else available
    /// without blocking. Mirrors the maintainer's batch-drain loop: wake
    /// once, then sweep up whatever accumulated while it was busy.
    pub fn consume_all_blocking<F: FnMut(T)>(&self, mut f: F) -> bool {
        match self.pop() {
            Recv::Value(v) => f(v),
            Recv::Stop => return true,
        }
        self.consume_all(f)
    }
}

impl<T> Drop for ScQueue<T> {
    fn drop(&mut self) {
        let mut cur = *self.tail.get_mut();
        while !cur.is_null() {
            let next = unsafe { (*cur).next.load(Ordering::Relaxed) };
            unsafe {
                drop(Box::from_raw(cur));
            }
            cur = next;
        }
    }
}
