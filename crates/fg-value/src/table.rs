use thiserror::Error;

use crate::bytes::AlignedBytes;
use crate::frame::Frame;
use crate::handle::CowHandle;
use crate::numeric::NumericArray;

/// Sentinel position meaning "append" — passed to [`Table::set`] or
/// [`Table::set_key`] to push a new entry rather than overwrite one.
pub const NPOS: usize = usize::MAX;

/// Errors from a bad-ref lookup on a [`Table`], mirroring `ChannelError` in
/// the teacher's `channel.rs`: a small, `Clone`-able, `thiserror`-derived
/// enum rather than a bare `Option`, for callers that need to report which
/// ref was bad rather than just that the lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// `idx` is outside `[0, size())`.
    #[error("no entry at index {0}")]
    NoSuchIndex(usize),
    /// No entry is keyed `key`.
    #[error("no entry keyed {0:?}")]
    NoSuchKey(String),
}

/// The closed set of value kinds an engine [`Table`] can hold.
///
/// The original engine stores `IObject*` pointers and relies on
/// `dynamic_cast` to recover a concrete type; per the redesign notes this
/// becomes a tagged variant instead. `Substrate` and host `Function`
/// objects are deliberately absent — plugin/function-registration ABI
/// surface is out of scope (§1) — so a table here can only ever hold the
/// value-model primitives plus nested tables and frames.
#[derive(Debug, Clone)]
pub enum Value {
    Bytes(CowHandle<AlignedBytes>),
    NumericArray(CowHandle<NumericArray>),
    Table(CowHandle<Table>),
    Frame(CowHandle<Frame>),
}

/// An ordered, optionally-keyed property table.
///
/// Backed by a flat `Vec` rather than a `HashMap` because insertion order
/// must be preserved (`begin`/`next`/`prev` walk it) and most tables are
/// small (frame properties rarely exceed a dozen entries) — linear
/// `get_ref` scans are cheaper here than hashing.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Vec<(Option<String>, Value)>,
}

impl Table {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn norm_idx(&self, idx: usize) -> usize {
        if idx == NPOS {
            self.entries.len()
        } else {
            idx
        }
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.entries.get(idx).map(|(_, v)| v)
    }

    /// Like [`Table::get`], but reports *why* a bad ref failed instead of
    /// collapsing it to `None`.
    pub fn try_get(&self, idx: usize) -> Result<&Value, TableError> {
        self.get(idx).ok_or(TableError::NoSuchIndex(idx))
    }

    /// Set the value at `idx`, or append if `idx == NPOS`. Growing past the
    /// current length is not supported (mirrors the original's "expand"
    /// only ever appending one slot at a time via `NPOS`).
    pub fn set(&mut self, idx: usize, value: Value) {
        let idx = self.norm_idx(idx);
        if idx == self.entries.len() {
            self.entries.push((None, value));
        } else {
            self.entries[idx].1 = value;
        }
    }

    pub fn get_key(&self, idx: usize) -> Option<&str> {
        self.entries.get(idx).and_then(|(k, _)| k.as_deref())
    }

    pub fn set_key(&mut self, idx: usize, key: Option<String>) {
        let idx = self.norm_idx(idx);
        if idx < self.entries.len() {
            self.entries[idx].0 = key;
        }
    }

    /// Look up the index of the first entry keyed `key`.
    pub fn get_ref(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.as_deref() == Some(key))
    }

    pub fn get_by_key(&self, key: &str) -> Option<&Value> {
        self.get_ref(key).and_then(|idx| self.get(idx))
    }

    /// Like [`Table::get_by_key`], but reports *why* a bad ref failed
    /// instead of collapsing it to `None`.
    pub fn try_get_by_key(&self, key: &str) -> Result<&Value, TableError> {
        let idx = self.get_ref(key).ok_or_else(|| TableError::NoSuchKey(key.to_string()))?;
        self.try_get(idx)
    }

    /// Append a keyed value; returns the new entry's index.
    pub fn push(&mut self, key: Option<String>, value: Value) -> usize {
        self.entries.push((key, value));
        self.entries.len() - 1
    }

    /// First valid index, or `NPOS` if empty. Paired with `next`/`prev` to
    /// let callers walk the table without allocating an iterator — mirrors
    /// the original engine's `begin`/`end`/`next`/`prev` cursor API.
    pub fn begin(&self) -> usize {
        if self.entries.is_empty() {
            NPOS
        } else {
            0
        }
    }

    pub fn end(&self) -> usize {
        NPOS
    }

    pub fn next(&self, idx: usize) -> usize {
        let next = idx + 1;
        if next >= self.entries.len() {
            NPOS
        } else {
            next
        }
    }

    pub fn prev(&self, idx: usize) -> usize {
        if idx == 0 || idx == NPOS {
            NPOS
        } else {
            idx - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::AlignedBytes;

    fn bytes_value(n: u8) -> Value {
        let mut b = AlignedBytes::new(1);
        b.as_mut_slice()[0] = n;
        Value::Bytes(CowHandle::new(b))
    }

    #[test]
    fn test_append_via_npos() {
        let mut t = Table::new();
        t.set(NPOS, bytes_value(1));
        t.set(NPOS, bytes_value(2));
        assert_eq!(t.size(), 2);
    }

    #[test]
    fn test_keyed_lookup() {
        let mut t = Table::new();
        t.push(Some("width".into()), bytes_value(10));
        t.push(Some("height".into()), bytes_value(20));
        assert_eq!(t.get_ref("height"), Some(1));
        assert_eq!(t.get_ref("missing"), None);
    }

    #[test]
    fn test_cursor_walk_is_insertion_order() {
        let mut t = Table::new();
        for i in 0..5 {
            t.push(None, bytes_value(i));
        }
        let mut idx = t.begin();
        let mut count = 0;
        while idx != t.end() {
            count += 1;
            idx = t.next(idx);
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn test_clone_is_deep_copy() {
        let mut t = Table::new();
        t.push(Some("k".into()), bytes_value(1));
        let t2 = t.clone();
        t.set(0, bytes_value(2));
        if let Value::Bytes(b) = t2.get(0).unwrap() {
            assert_eq!(b.as_slice()[0], 1);
        } else {
            panic!("expected bytes value");
        }
    }

    #[test]
    fn test_empty_table_begin_is_end() {
        let t = Table::new();
        assert_eq!(t.begin(), t.end());
    }

    #[test]
    fn test_try_get_reports_bad_index() {
        let t = Table::new();
        assert_eq!(t.try_get(3), Err(TableError::NoSuchIndex(3)));
    }

    #[test]
    fn test_try_get_by_key_reports_bad_key() {
        let mut t = Table::new();
        t.push(Some("width".into()), bytes_value(10));
        assert_eq!(
            t.try_get_by_key("height"),
            Err(TableError::NoSuchKey("height".into()))
        );
        assert!(t.try_get_by_key("width").is_ok());
    }
}
