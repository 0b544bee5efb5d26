//! Loom model-checked tests for the SC queue's push/pop handoff.
//!
//! `loom` explores thread interleavings exhaustively, so the model here is
//! deliberately tiny: a handful of pushes against a single consumer, not
//! the full `ScQueue` (loom requires its own atomics/UnsafeCell shims, so
//! production code and loom-checked code can't literally share a type
//! without `#[cfg]`-gating every atomic op — instead this re-derives the
//! same push/pop shape against `loom::sync::atomic` to validate the
//! ordering discipline used in `sc_queue.rs`).

#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicPtr, Ordering};
use loom::thread;
use std::ptr;

struct Node {
    next: AtomicPtr<Node>,
    value: Option<i32>,
}

fn new_node(value: Option<i32>) -> *mut Node {
    Box::into_raw(Box::new(Node {
        next: AtomicPtr::new(ptr::null_mut()),
        value,
    }))
}

struct LoomScQueue {
    head: AtomicPtr<Node>,
    tail: AtomicPtr<Node>,
}

impl LoomScQueue {
    fn new() -> Self {
        let stub = new_node(None);
        Self {
            head: AtomicPtr::new(stub),
            tail: AtomicPtr::new(stub),
        }
    }

    fn push(&self, value: i32) {
        let node = new_node(Some(value));
        let prev = self.head.swap(node, Ordering::AcqRel);
        unsafe {
            (*prev).next.store(node, Ordering::Release);
        }
    }

    fn try_pop(&self) -> Option<i32> {
        let t = self.tail.load(Ordering::Relaxed);
        let next = unsafe { (*t).next.load(Ordering::Acquire) };
        if next.is_null() {
            return None;
        }
        self.tail.store(next, Ordering::Relaxed);
        let value = unsafe { (*next).value.take() };
        unsafe {
            drop(Box::from_raw(t));
        }
        value
    }
}

unsafe impl Send for LoomScQueue {}
unsafe impl Sync for LoomScQueue {}

#[test]
fn loom_single_producer_single_consumer() {
    loom::model(|| {
        let q = loom::sync::Arc::new(LoomScQueue::new());
        let q2 = q.clone();

        let producer = thread::spawn(move || {
            q2.push(1);
            q2.push(2);
        });

        let mut seen = Vec::new();
        while seen.len() < 2 {
            if let Some(v) = q.try_pop() {
                seen.push(v);
            }
        }
        producer.join().unwrap();
        assert_eq!(seen, vec![1, 2]);
    });
}
