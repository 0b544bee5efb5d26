use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A refcounted, copy-on-write handle.
///
/// Grounds the engine's "usurp-or-clone" pattern: a shared value is never
/// mutated in place while other handles observe it. [`CowHandle::make_mut`]
/// returns a mutable borrow directly when the handle is unique
/// (`Arc::strong_count == 1`), and transparently clones the underlying
/// value onto a fresh allocation otherwise — the same guarantee the
/// original engine's `try_usurp`/`clone`/`usurp_or_clone` trio provided by
/// hand over an atomic refcount.
pub struct CowHandle<T>(Arc<T>);

impl<T> CowHandle<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// True iff no other handle shares this value.
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.0) == 1 && Arc::weak_count(&self.0) == 0
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl<T: Clone> CowHandle<T> {
    /// Usurp-or-clone: returns a mutable reference to a uniquely-owned
    /// value, cloning first if this handle's value is shared.
    pub fn make_mut(&mut self) -> &mut T {
        Arc::make_mut(&mut self.0)
    }

    /// Force a deep copy regardless of uniqueness, mirroring the engine's
    /// explicit `clone()` (as opposed to `usurp_or_clone()`).
    pub fn deep_clone(&self) -> Self {
        Self::new((*self.0).clone())
    }
}

impl<T> Clone for CowHandle<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for CowHandle<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for CowHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl<T: PartialEq> PartialEq for CowHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_mut_unique_mutates_in_place() {
        let mut h = CowHandle::new(vec![1, 2, 3]);
        let ptr_before = h.deref() as *const Vec<i32>;
        h.make_mut().push(4);
        assert_eq!(*h, vec![1, 2, 3, 4]);
        assert_eq!(h.deref() as *const Vec<i32>, ptr_before);
    }

    #[test]
    fn test_make_mut_shared_clones() {
        let mut h1 = CowHandle::new(vec![1, 2, 3]);
        let h2 = h1.clone();
        assert!(!h1.is_unique());
        h1.make_mut().push(4);
        assert_eq!(*h1, vec![1, 2, 3, 4]);
        assert_eq!(*h2, vec![1, 2, 3]);
        assert!(h1.is_unique());
    }

    #[test]
    fn test_ptr_eq() {
        let h1 = CowHandle::new(42);
        let h2 = h1.clone();
        let h3 = CowHandle::new(42);
        assert!(CowHandle::ptr_eq(&h1, &h2));
        assert!(!CowHandle::ptr_eq(&h1, &h3));
    }
}
