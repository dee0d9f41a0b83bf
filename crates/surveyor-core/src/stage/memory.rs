//! Instance-scoped deduplication memory.

use std::collections::HashSet;

/// Keys a stage instance has already submitted for processing.
///
/// Owned by exactly one stage instance and dropped with it; never persisted
/// or shared between stages or missions.
#[derive(Debug, Clone, Default)]
pub struct DedupMemory {
    seen: HashSet<String>,
}

impl DedupMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`, returning `true` if it had not been seen before.
    pub fn admit(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_each_key_once() {
        let mut memory = DedupMemory::new();
        assert!(memory.is_empty());
        assert!(memory.admit("https://a"));
        assert!(!memory.admit("https://a"));
        assert!(memory.admit("https://b"));
        assert_eq!(memory.len(), 2);
        assert!(memory.contains("https://a"));
        assert!(!memory.contains("https://c"));
    }
}
