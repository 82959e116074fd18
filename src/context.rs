use std::sync::Arc;

use crate::services::IssueTrackerService;
use crate::workflow::detail::DetailLoader;
use crate::workflow::identity::{IdentityCache, IdentityResolver};

/// Everything that needs a live tracker session. Rebuilt on reconnect; the
/// identity cache is passed in so it outlives any single session.
#[derive(Clone)]
pub struct AppContext {
    pub issue_tracker: Arc<dyn IssueTrackerService>,
    pub details: Arc<DetailLoader>,
}

impl AppContext {
    pub fn new(issue_tracker: Arc<dyn IssueTrackerService>, identities: IdentityCache) -> Self {
        let resolver = Arc::new(IdentityResolver::new(issue_tracker.clone(), identities));
        Self {
            details: Arc::new(DetailLoader::new(issue_tracker.clone(), resolver)),
            issue_tracker,
        }
    }
}
