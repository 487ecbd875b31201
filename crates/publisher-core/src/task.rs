//! Unit-of-work description and the shared metadata response cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One token's fetch task, as scheduled onto a [`JobContext`].
///
/// [`JobContext`]: crate::context::JobContext
#[derive(Debug, Clone)]
pub struct TokenTask {
    pub collection_id: String,
    pub collection_address: String,
    /// Decimal token id.
    pub token_id: String,
    /// Already-resolved metadata URI, when the enumeration produced one.
    /// `None` means the worker resolves it via `tokenURI` first.
    pub token_uri: Option<String>,
    pub only_gif: bool,
    pub modified_name: bool,
}

/// URL-keyed cache of metadata document bodies, shared across all jobs.
///
/// Collections commonly point many tokens at the same document; retries also
/// hit the cache when an earlier attempt already fetched the body.
#[derive(Default)]
pub struct ResponseCache {
    inner: Mutex<HashMap<String, Arc<str>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Arc<str>> {
        self.inner
            .lock()
            .expect("response cache lock poisoned")
            .get(url)
            .cloned()
    }

    /// Insert a body, keeping the first writer's value on a race.
    pub fn insert(&self, url: String, body: String) -> Arc<str> {
        let mut inner = self.inner.lock().expect("response cache lock poisoned");
        Arc::clone(inner.entry(url).or_insert_with(|| Arc::from(body)))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("response cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
