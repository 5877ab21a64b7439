//! Insert-if-absent memoization for identifier-to-name lookups.

use std::collections::HashMap;
use std::sync::Mutex;

/// Memoization map from an identifier to a resolved display name.
///
/// Shared by both collection tracks to avoid redundant lookups. The map
/// is internally synchronized with an insert-if-absent discipline: the
/// first writer for an id wins and later writers get the cached value
/// back, so concurrent resolution of the same id stays consistent.
#[derive(Debug, Default)]
pub struct NameCache {
    inner: Mutex<HashMap<String, String>>,
}

impl NameCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached name for an id, if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<String> {
        self.inner
            .lock()
            .expect("name cache lock poisoned")
            .get(id)
            .cloned()
    }

    /// Inserts a name unless the id is already cached.
    ///
    /// Returns the canonical name for the id: the existing entry when one
    /// was already present, otherwise the newly inserted value.
    pub fn insert_if_absent(&self, id: &str, name: &str) -> String {
        self.inner
            .lock()
            .expect("name cache lock poisoned")
            .entry(id.to_string())
            .or_insert_with(|| name.to_string())
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("name cache lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
