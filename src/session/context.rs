//! Run context stack.
//!
//! Contexts are diagnostic only. A push merges the new record over the
//! current top so outer fields stay visible to nested work.

use std::collections::BTreeMap;

/// One context record (field name to value).
pub type ContextRecord = BTreeMap<String, String>;

/// Last-in-first-out stack of merged context records.
#[derive(Debug, Default, Clone)]
pub struct ContextStack {
    frames: Vec<ContextRecord>,
}

impl ContextStack {
    /// Creates an empty stack.
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Pushes `fields` merged over the current top.
    pub fn push<K, V>(&mut self, fields: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = self.current();
        record.extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.frames.push(record);
    }

    /// Pops the top record.
    pub fn pop(&mut self) -> Option<ContextRecord> {
        self.frames.pop()
    }

    /// Returns a copy of the current top, or an empty record.
    #[must_use]
    pub fn current(&self) -> ContextRecord {
        self.frames.last().cloned().unwrap_or_default()
    }

    /// Number of pushed records.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
