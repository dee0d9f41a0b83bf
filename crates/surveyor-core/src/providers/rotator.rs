//! Round-robin rotation over a pool of API keys.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out API keys in round-robin order.
///
/// Safe to share between concurrent searches; each call to [`next`]
/// advances the cursor by one.
///
/// [`next`]: KeyRotator::next
#[derive(Debug, Default)]
pub struct KeyRotator {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRotator {
    /// Build a rotator, dropping blank keys.
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Collect keys from `PREFIX`, `PREFIX_1`, `PREFIX_2`, ... until the
    /// first missing suffix.
    pub fn from_env(prefix: &str) -> Self {
        let mut keys = Vec::new();
        if let Ok(k) = std::env::var(prefix) {
            keys.push(k);
        }
        for i in 1.. {
            match std::env::var(format!("{prefix}_{i}")) {
                Ok(k) => keys.push(k),
                Err(_) => break,
            }
        }
        Self::new(keys)
    }

    /// Return the next key, or `None` if no keys are configured.
    pub fn next(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(&self.keys[idx])
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
