//! Per-session state, passed explicitly into every core call.

mod cache;
mod events;

pub use cache::*;
pub use events::*;

use std::time::Duration;

use crate::config::DEFAULT_CACHE_TTL;
use crate::models::Branch;

/// Request-scoped context: branch scope plus the result cache.
pub struct SessionContext {
    /// Selected branch; `None` means all branches
    pub branch: Option<Branch>,
    pub cache: ResultCache,
}

impl SessionContext {
    pub fn new(branch: Option<Branch>) -> Self {
        Self::with_ttl(branch, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(branch: Option<Branch>, ttl: Duration) -> Self {
        Self {
            branch,
            cache: ResultCache::new(ttl),
        }
    }

    /// Switch branch scope. Cached results stay valid since cache keys
    /// include the branch.
    pub fn select_branch(&mut self, branch: Option<Branch>) {
        self.branch = branch;
    }
}
