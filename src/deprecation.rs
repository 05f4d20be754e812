//! Once-per-name deprecation warnings.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Tracks which deprecated API names have already warned.
///
/// Builders share the process-wide [`DeprecationRegistry::global`] instance
/// unless given their own, which keeps tests isolated from each other.
#[derive(Debug, Default)]
pub struct DeprecationRegistry {
    warned: Mutex<HashSet<String>>,
}

impl DeprecationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> Arc<DeprecationRegistry> {
        static GLOBAL: OnceLock<Arc<DeprecationRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(DeprecationRegistry::new())).clone()
    }

    /// Log `message` unless `name` has warned before.
    ///
    /// Returns `true` if this call emitted the warning.
    pub fn warn_once(&self, name: &str, message: &str) -> bool {
        let mut warned = self.warned.lock().unwrap_or_else(PoisonError::into_inner);
        if !warned.insert(name.to_string()) {
            return false;
        }
        tracing::warn!(api = name, "[DEPRECATED] {name}: {message}");
        true
    }

    pub fn has_warned(&self, name: &str) -> bool {
        self.warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    /// Forget every recorded warning.
    pub fn clear(&self) {
        self.warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.warned.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
