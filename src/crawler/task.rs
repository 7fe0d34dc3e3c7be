//! Units of work flowing through the crawl queue

use crate::state::VisitedSet;
use crate::url::ResourceType;
use std::fmt;
use std::sync::Arc;

/// A resource to analyse
///
/// Network and `file://` targets carry only a URL. Prefetched targets (for
/// example responses taken from a Burp export) already carry their content
/// and are never fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub content: String,
    pub prefetched: bool,
}

impl Target {
    /// A target whose content must be fetched
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: String::new(),
            prefetched: false,
        }
    }

    /// A target whose content is already known
    pub fn prefetched(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            prefetched: true,
        }
    }

    pub fn is_local_file(&self) -> bool {
        self.url.starts_with("file://")
    }
}

/// Remaining recursion hops for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    /// Never exhausted
    Unlimited,
    /// This many further hops may be taken
    Remaining(u32),
}

impl Depth {
    /// Converts a configured maximum depth, where 0 means unlimited
    pub fn from_max_depth(max_depth: u32) -> Self {
        if max_depth == 0 {
            Self::Unlimited
        } else {
            Self::Remaining(max_depth)
        }
    }

    /// Returns true if children may be discovered from a task at this depth
    pub fn can_expand(&self) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Remaining(n) => *n > 0,
        }
    }

    /// Depth carried by tasks discovered from a task at this depth
    ///
    /// `None` once the budget is exhausted.
    pub fn child(&self) -> Option<Depth> {
        match self {
            Self::Unlimited => Some(Self::Unlimited),
            Self::Remaining(0) => None,
            Self::Remaining(n) => Some(Self::Remaining(n - 1)),
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Remaining(n) => write!(f, "{}", n),
        }
    }
}

/// Where a task came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Given explicitly by the user
    Seed,
    /// Found while expanding another resource
    Discovered,
}

/// A queued unit of work
#[derive(Debug, Clone)]
pub struct ResourceTask {
    pub target: Target,

    /// Present only in recursive mode; shared by every task of one seed
    pub visited: Option<Arc<VisitedSet>>,

    pub depth: Depth,
    pub origin: Origin,

    /// Type of a discovered resource, `None` for seeds
    pub resource_type: Option<ResourceType>,
}

impl ResourceTask {
    /// Creates the task for a user-supplied target
    ///
    /// In recursive mode the seed gets its own fresh visited set that already
    /// contains the seed URL, so a resource linking back to it is not
    /// fetched twice.
    pub fn seed(target: Target, recursive: bool, depth: Depth) -> Self {
        let visited = recursive.then(|| {
            let visited = VisitedSet::new();
            visited.add(&target.url);
            Arc::new(visited)
        });

        Self {
            target,
            visited,
            depth,
            origin: Origin::Seed,
            resource_type: None,
        }
    }

    /// Creates a child task sharing this task's visited set
    pub fn child(&self, url: String, resource_type: ResourceType, depth: Depth) -> Self {
        Self {
            target: Target::url(url),
            visited: self.visited.clone(),
            depth,
            origin: Origin::Discovered,
            resource_type: Some(resource_type),
        }
    }

    pub fn url(&self) -> &str {
        &self.target.url
    }

    pub fn is_seed(&self) -> bool {
        self.origin == Origin::Seed
    }

    pub fn is_recursive(&self) -> bool {
        self.visited.is_some()
    }
}
