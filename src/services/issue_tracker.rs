use async_trait::async_trait;
use tracing::warn;

use crate::domain::ticket::{Ticket, TicketDetail, TicketKey};
use crate::error::AppResult;

#[async_trait]
pub trait IssueTrackerService: Send + Sync {
    /// Tickets ordered by creation time, newest first. An exhausted listing
    /// yields an empty page.
    async fn list_recent(&self, offset: usize, limit: usize) -> AppResult<Vec<Ticket>>;

    /// Full ticket detail, comments included.
    async fn fetch_ticket(&self, key: &TicketKey) -> AppResult<TicketDetail>;

    async fn display_name(&self, user_id: &str) -> AppResult<String>;

    fn browse_url(&self, key: &TicketKey) -> Option<String>;

    /// Keys that cannot be fetched are dropped from the result.
    async fn search_by_keys(&self, keys: &[TicketKey]) -> Vec<TicketDetail> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            match self.fetch_ticket(key).await {
                Ok(detail) => found.push(detail),
                Err(err) => warn!(%key, error = %err, "search skipped ticket"),
            }
        }
        found
    }
}
