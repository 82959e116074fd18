use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::ticket::{Ticket, TicketDetail, TicketKey};
use crate::error::AppResult;
use crate::services::IssueTrackerService;
use crate::workflow::conversation::ConversationAssembler;
use crate::workflow::identity::IdentityResolver;
use crate::workflow::mentions::MentionRewriter;

pub const NO_DESCRIPTION: &str = "No Description";
pub const LOADING: &str = "Loading, please wait...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDetailView {
    pub key: TicketKey,
    pub summary: String,
    pub description: String,
    pub conversation: String,
}

impl fmt::Display for TicketDetailView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ticket\n{}\n", self.key)?;
        writeln!(f, "Title\n{}\n", self.summary)?;
        writeln!(f, "Description\n{}\n", self.description)?;
        write!(f, "Full Comment Conversation\n{}", self.conversation)
    }
}

#[derive(Debug)]
pub struct LoadedDetail {
    pub ticket: TicketDetail,
    pub view: TicketDetailView,
}

/// Result of a background detail load, tagged with the key it answers.
#[derive(Debug)]
pub struct DetailMessage {
    pub key: TicketKey,
    pub result: Result<LoadedDetail, String>,
}

pub struct DetailLoader {
    tracker: Arc<dyn IssueTrackerService>,
    mentions: Arc<MentionRewriter>,
    conversations: ConversationAssembler,
}

impl DetailLoader {
    pub fn new(tracker: Arc<dyn IssueTrackerService>, identities: Arc<IdentityResolver>) -> Self {
        let mentions = Arc::new(MentionRewriter::new(identities));
        Self {
            conversations: ConversationAssembler::new(tracker.clone(), mentions.clone()),
            tracker,
            mentions,
        }
    }

    /// Upgrades a stub with a remote fetch, then assembles the view. Only the
    /// upgrade can fail; the conversation degrades to an inline message.
    pub async fn load(&self, ticket: Ticket) -> AppResult<LoadedDetail> {
        let detail = match ticket {
            Ticket::Full(detail) => detail,
            Ticket::Stub { key } => {
                debug!(%key, "loading stub ticket");
                self.tracker.fetch_ticket(&key).await?
            }
        };

        let description = match detail.description.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => NO_DESCRIPTION,
        };
        let description = self.mentions.rewrite(description).await;
        let conversation = self.conversations.build(&detail.key).await;

        let view = TicketDetailView {
            key: detail.key.clone(),
            summary: detail.summary.clone(),
            description,
            conversation,
        };
        Ok(LoadedDetail {
            ticket: detail,
            view,
        })
    }
}

/// Loads the ticket off the interactive loop and hands the outcome back over
/// `sender`. No cancellation: a newer selection simply races this one.
pub fn spawn_detail_fetch(
    loader: Arc<DetailLoader>,
    ticket: Ticket,
    sender: UnboundedSender<DetailMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let key = ticket.key().clone();
        let result = loader
            .load(ticket)
            .await
            .map_err(|err| format!("Failed to load ticket {key}: {err}"));
        if sender.send(DetailMessage { key, result }).is_err() {
            warn!("detail receiver dropped before delivery");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTracker, comment, detail};
    use crate::workflow::identity::IdentityCache;

    fn loader(tracker: Arc<FakeTracker>) -> DetailLoader {
        let identities = Arc::new(IdentityResolver::new(tracker.clone(), IdentityCache::new()));
        DetailLoader::new(tracker, identities)
    }

    #[tokio::test]
    async fn stub_is_fetched_and_rendered() {
        let mut ticket = detail("APP-4", "Login broken");
        ticket.description = Some("Reported by [~accountid:u9]".to_string());
        ticket.comments = vec![comment("Dana", "2024-05-01T08:00:00+02:00", "on it")];
        let tracker = Arc::new(FakeTracker::new().with_ticket(ticket).with_user("u9", "Eve"));

        let loaded = loader(tracker)
            .load(Ticket::stub(TicketKey::new("APP-4")))
            .await
            .expect("stub loads");

        assert_eq!(loaded.ticket.summary, "Login broken");
        assert_eq!(loaded.view.description, "Reported by @Eve");
        assert_eq!(
            loaded.view.conversation,
            "2024-05-01 - Dana commented:\non it\n\n"
        );
    }

    #[tokio::test]
    async fn missing_description_uses_sentinel() {
        let ticket = detail("APP-5", "Empty");
        let tracker = Arc::new(FakeTracker::new().with_ticket(ticket.clone()));

        let loaded = loader(tracker)
            .load(Ticket::Full(ticket))
            .await
            .expect("full ticket loads");

        assert_eq!(loaded.view.description, NO_DESCRIPTION);
        let rendered = loaded.view.to_string();
        assert!(rendered.starts_with("Ticket\nAPP-5\n\nTitle\nEmpty\n\nDescription\nNo Description\n\n"));
        assert!(rendered.ends_with("Full Comment Conversation\nNo Comments"));
    }

    #[tokio::test]
    async fn failed_stub_upgrade_is_delivered_as_error() {
        let tracker = Arc::new(FakeTracker::new());
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();

        spawn_detail_fetch(
            Arc::new(loader(tracker)),
            Ticket::stub(TicketKey::new("APP-6")),
            sender,
        )
        .await
        .expect("task completes");

        let message = receiver.recv().await.expect("message delivered");
        assert_eq!(message.key.as_str(), "APP-6");
        let error = message.result.expect_err("stub upgrade fails");
        assert!(error.starts_with("Failed to load ticket APP-6"));
    }
}
