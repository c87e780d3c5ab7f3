use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe API key rotation manager.
///
/// The agency and rates adapters accept multiple keys so that repeated
/// assessments spread load across quota-limited accounts.
#[derive(Clone, Debug)]
pub struct ApiKeyRotator {
    keys: Vec<String>,
    counter: Arc<AtomicUsize>,
}

impl ApiKeyRotator {
    /// Create a new API key rotator with the given keys
    pub fn new(keys: Vec<String>) -> Self {
        ApiKeyRotator {
            keys,
            counter: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the next API key in rotation
    pub fn next_key(&self) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(self.keys[index].clone())
    }

    /// Check if the rotator has any keys
    #[allow(dead_code)]
    pub fn has_keys(&self) -> bool {
        !self.keys.is_empty()
    }
}
