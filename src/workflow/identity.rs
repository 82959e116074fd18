use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::services::IssueTrackerService;

pub const UNKNOWN_USER: &str = "Unknown User";

/// Display names keyed by account id. Lives for the whole process and is
/// shared by every resolver; entries are never invalidated.
#[derive(Clone, Default)]
pub struct IdentityCache {
    names: Arc<RwLock<HashMap<String, String>>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<String> {
        self.names.read().get(user_id).cloned()
    }

    pub fn insert(&self, user_id: &str, name: &str) {
        self.names
            .write()
            .insert(user_id.to_string(), name.to_string());
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }
}

pub struct IdentityResolver {
    tracker: Arc<dyn IssueTrackerService>,
    cache: IdentityCache,
}

impl IdentityResolver {
    pub fn new(tracker: Arc<dyn IssueTrackerService>, cache: IdentityCache) -> Self {
        Self { tracker, cache }
    }

    /// Never fails: lookup errors degrade to [`UNKNOWN_USER`] and are not
    /// cached, so a later call retries.
    pub async fn resolve(&self, user_id: &str) -> String {
        if let Some(name) = self.cache.get(user_id) {
            return name;
        }

        debug!(user_id, cached = self.cache.len(), "resolving display name");
        match self.tracker.display_name(user_id).await {
            Ok(name) => {
                self.cache.insert(user_id, &name);
                name
            }
            Err(err) => {
                warn!(user_id, error = %err, "display name lookup failed");
                UNKNOWN_USER.to_string()
            }
        }
    }
}
