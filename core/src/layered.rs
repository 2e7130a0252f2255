//! Three-level option resolution: per-call over per-monitoring over global

use serde::{Deserialize, Serialize};

/// An option that may be set globally, for one monitoring scope, or for a single call.
///
/// The most specific level that is set wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layered<T> {
    pub global: Option<T>,
    pub scoped: Option<T>,
    pub call: Option<T>,
}

impl<T> Default for Layered<T> {
    fn default() -> Self {
        Self {
            global: None,
            scoped: None,
            call: None,
        }
    }
}

impl<T: Clone> Layered<T> {
    /// Start from the global level
    pub fn new(global: Option<T>) -> Self {
        Self {
            global,
            scoped: None,
            call: None,
        }
    }

    pub fn scoped(mut self, value: Option<T>) -> Self {
        self.scoped = value;
        self
    }

    pub fn call(mut self, value: Option<T>) -> Self {
        self.call = value;
        self
    }

    /// Most specific value, if any level is set
    pub fn resolve(&self) -> Option<T> {
        self.call
            .clone()
            .or_else(|| self.scoped.clone())
            .or_else(|| self.global.clone())
    }

    pub fn resolve_or(&self, fallback: T) -> T {
        self.resolve().unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_beats_scoped_beats_global() {
        let layered = Layered::new(Some(1)).scoped(Some(2)).call(Some(3));
        assert_eq!(layered.resolve(), Some(3));

        let layered = Layered::new(Some(1)).scoped(Some(2)).call(None);
        assert_eq!(layered.resolve(), Some(2));

        let layered = Layered::new(Some(1));
        assert_eq!(layered.resolve(), Some(1));
    }

    #[test]
    fn test_fallback_when_unset() {
        let layered: Layered<u32> = Layered::default();
        assert_eq!(layered.resolve(), None);
        assert_eq!(layered.resolve_or(3), 3);
    }
}
