use std::sync::Arc;

use tracing::warn;

use crate::domain::ticket::{Comment, TicketKey};
use crate::services::IssueTrackerService;
use crate::workflow::mentions::MentionRewriter;

pub const NO_COMMENTS: &str = "No Comments";

pub struct ConversationAssembler {
    tracker: Arc<dyn IssueTrackerService>,
    mentions: Arc<MentionRewriter>,
}

impl ConversationAssembler {
    pub fn new(tracker: Arc<dyn IssueTrackerService>, mentions: Arc<MentionRewriter>) -> Self {
        Self { tracker, mentions }
    }

    /// Renders the ticket's comment thread oldest first. Fetch failures come
    /// back as a message in place of the thread.
    pub async fn build(&self, key: &TicketKey) -> String {
        match self.tracker.fetch_ticket(key).await {
            Ok(detail) => self.render(detail.comments).await,
            Err(err) => {
                warn!(%key, error = %err, "comment fetch failed");
                format!("Failed to retrieve comments for Ticket {key}: {err}")
            }
        }
    }

    async fn render(&self, mut comments: Vec<Comment>) -> String {
        if comments.is_empty() {
            return NO_COMMENTS.to_string();
        }

        // Unreadable timestamps go last, in the order the tracker sent them.
        comments.sort_by_key(|comment| (comment.created.is_none(), comment.created));

        let mut conversation = String::new();
        for comment in &comments {
            let body = self.mentions.rewrite(comment.body.trim()).await;
            conversation.push_str(&format!(
                "{} - {} commented:\n{}\n\n",
                comment.date_label(),
                comment.author,
                body
            ));
        }
        conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTracker, comment, detail};
    use crate::workflow::identity::{IdentityCache, IdentityResolver};

    fn assembler(tracker: Arc<FakeTracker>) -> ConversationAssembler {
        let identities = Arc::new(IdentityResolver::new(tracker.clone(), IdentityCache::new()));
        ConversationAssembler::new(tracker, Arc::new(MentionRewriter::new(identities)))
    }

    #[tokio::test]
    async fn orders_comments_oldest_first() {
        let mut ticket = detail("OPS-7", "Disk full");
        ticket.comments = vec![
            comment("Carol", "2024-03-03T09:00:00+00:00", "third"),
            comment("Alice", "2024-03-01T09:00:00+00:00", "  first  "),
            comment("Bob", "2024-03-02T09:00:00+00:00", "ping [~accountid:u1]"),
        ];
        let tracker = Arc::new(FakeTracker::new().with_ticket(ticket).with_user("u1", "Alice"));

        let conversation = assembler(tracker).build(&TicketKey::new("OPS-7")).await;

        assert_eq!(
            conversation,
            "2024-03-01 - Alice commented:\nfirst\n\n\
             2024-03-02 - Bob commented:\nping @Alice\n\n\
             2024-03-03 - Carol commented:\nthird\n\n"
        );
    }

    #[tokio::test]
    async fn unreadable_timestamp_sorts_last_and_keeps_the_thread() {
        let mut ticket = detail("OPS-3", "Clock skew");
        let mut odd = comment("Dan", "2024-03-01T09:00:00+00:00", "odd clock");
        odd.created = None;
        odd.created_raw = "2024-02-30 25:00".to_string();
        ticket.comments = vec![odd, comment("Eve", "2024-03-05T09:00:00+00:00", "ok")];
        let tracker = Arc::new(FakeTracker::new().with_ticket(ticket));

        let conversation = assembler(tracker).build(&TicketKey::new("OPS-3")).await;

        assert_eq!(
            conversation,
            "2024-03-05 - Eve commented:\nok\n\n\
             2024-02-30 - Dan commented:\nodd clock\n\n"
        );
    }

    #[tokio::test]
    async fn empty_thread_renders_sentinel() {
        let tracker = Arc::new(FakeTracker::new().with_ticket(detail("OPS-8", "Quiet")));
        let conversation = assembler(tracker).build(&TicketKey::new("OPS-8")).await;
        assert_eq!(conversation, NO_COMMENTS);
    }

    #[tokio::test]
    async fn fetch_failure_becomes_message() {
        let tracker = Arc::new(FakeTracker::new());
        let conversation = assembler(tracker).build(&TicketKey::new("OPS-9")).await;
        assert!(conversation.starts_with("Failed to retrieve comments for Ticket OPS-9:"));
    }
}
