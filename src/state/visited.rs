use crate::url::canonicalize;
use std::collections::HashSet;
use std::sync::Mutex;

/// Shared set of canonical URLs already scheduled during one seed's crawl
///
/// URLs are compared without their query string or fragment, so
/// `app.js?v=1` and `app.js#x` count as the same resource. Concurrent
/// callers race safely: for each canonical URL exactly one [`add`] call
/// returns `true`.
///
/// [`add`]: VisitedSet::add
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a URL, returning true if its canonical form was not yet present
    pub fn add(&self, url: &str) -> bool {
        let canonical = canonicalize(url);
        // A poisoned lock only means another worker panicked mid-insert;
        // the set itself is still consistent
        let mut urls = self.urls.lock().unwrap_or_else(|e| e.into_inner());
        urls.insert(canonical)
    }

    /// Returns true if the canonical form of `url` has been recorded
    pub fn contains(&self, url: &str) -> bool {
        let canonical = canonicalize(url);
        let urls = self.urls.lock().unwrap_or_else(|e| e.into_inner());
        urls.contains(&canonical)
    }

    pub fn len(&self) -> usize {
        self.urls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
