// ABOUTME: Read-through/write-back cache seam keyed by a content address of the URL.
// ABOUTME: Cache failures are invisible to callers; a corrupt payload is a miss.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// External cache interface. Both operations are best-effort from the
/// pipeline's perspective: `get` answers `None` for miss or any failure, and
/// `set` is fire-and-forget (implementations log their own failures).
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: &[u8]);
}

/// Content address of a URL string: lowercase hex SHA-256. Yields fixed-width
/// keys that are safe for any key-value backend.
pub fn cache_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)
}

/// In-memory cache used by tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().expect("cache lock").get(key).cloned()
    }

    async fn set(&self, key: &str, value: &[u8]) {
        self.entries
            .lock()
            .expect("cache lock")
            .insert(key.to_string(), value.to_vec());
    }
}
