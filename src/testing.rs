use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::DateTime;
use parking_lot::Mutex;

use crate::domain::ticket::{Comment, Ticket, TicketDetail, TicketKey};
use crate::error::{AppError, AppResult};
use crate::services::IssueTrackerService;

/// In-memory issue tracker used by unit tests.
#[derive(Default)]
pub struct FakeTracker {
    recent: Mutex<Vec<TicketDetail>>,
    tickets: Mutex<HashMap<TicketKey, TicketDetail>>,
    users: Mutex<HashMap<String, String>>,
    fail_transport: AtomicBool,
    pub list_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub user_calls: AtomicUsize,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ticket both for by-key lookups and the recent listing.
    /// Listing order follows insertion order, newest first.
    pub fn with_recent(self, detail: TicketDetail) -> Self {
        self.recent.lock().push(detail.clone());
        self.tickets.lock().insert(detail.key.clone(), detail);
        self
    }

    pub fn with_ticket(self, detail: TicketDetail) -> Self {
        self.tickets.lock().insert(detail.key.clone(), detail);
        self
    }

    pub fn with_user(self, id: &str, name: &str) -> Self {
        self.users.lock().insert(id.to_string(), name.to_string());
        self
    }

    pub fn set_user(&self, id: &str, name: &str) {
        self.users.lock().insert(id.to_string(), name.to_string());
    }

    pub fn replace_ticket(&self, detail: TicketDetail) {
        self.tickets.lock().insert(detail.key.clone(), detail);
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_transport.store(failing, Ordering::SeqCst);
    }

    fn check_transport(&self) -> AppResult<()> {
        if self.fail_transport.load(Ordering::SeqCst) {
            Err(AppError::Transport("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IssueTrackerService for FakeTracker {
    async fn list_recent(&self, offset: usize, limit: usize) -> AppResult<Vec<Ticket>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_transport()?;
        Ok(self
            .recent
            .lock()
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .map(Ticket::from)
            .collect())
    }

    async fn fetch_ticket(&self, key: &TicketKey) -> AppResult<TicketDetail> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_transport()?;
        self.tickets
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("issue {key} does not exist")))
    }

    async fn display_name(&self, user_id: &str) -> AppResult<String> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        self.check_transport()?;
        self.users
            .lock()
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {user_id} does not exist")))
    }

    fn browse_url(&self, key: &TicketKey) -> Option<String> {
        Some(format!("https://tracker.test/browse/{key}"))
    }
}

pub fn detail(key: &str, summary: &str) -> TicketDetail {
    TicketDetail {
        key: TicketKey::new(key),
        summary: summary.to_string(),
        description: None,
        comments: Vec::new(),
    }
}

pub fn comment(author: &str, created: &str, body: &str) -> Comment {
    Comment {
        author: author.to_string(),
        created: Some(DateTime::parse_from_rfc3339(created).expect("valid test timestamp")),
        created_raw: created.to_string(),
        body: body.to_string(),
    }
}

pub fn keys(values: &[&str]) -> Vec<TicketKey> {
    values.iter().copied().map(TicketKey::new).collect()
}
