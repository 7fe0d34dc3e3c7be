//! URL handling module for jsripple
//!
//! This module classifies discovered endpoints, resolves them into absolute
//! URLs, checks them against the crawl scope, and canonicalizes URLs for the
//! visited set.

mod domain;
mod matcher;
mod normalize;
mod resolve;

// Re-export main functions
pub use domain::{extract_host, scope_host};
pub use matcher::{host_in_scope, within_scope};
pub use normalize::{canonicalize, strip_query_and_fragment};
pub use resolve::{check_url, resolve_url, ResourceResolver, ResourceType};
