use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info};

use crate::domain::ticket::{Ticket, TicketKey};
use crate::error::{AppError, AppResult};
use crate::services::IssueTrackerService;
use crate::workflow::detail::{DetailMessage, TicketDetailView};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Loaded { received: usize, added: usize },
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Distinct tickets the tracker returned.
    pub found: usize,
    /// Size of the working set after the merge.
    pub shown: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    Ready(TicketDetailView),
    Failed(String),
}

/// The working set of tickets shown to the user.
///
/// Keys are unique within the set. Locked keys are always present, as a stub
/// when nothing has been fetched for them yet, and survive page resets and
/// searches until unlocked.
#[derive(Debug)]
pub struct TicketSetManager {
    tickets: Vec<Ticket>,
    locked: BTreeSet<TicketKey>,
    page_cursor: usize,
    page_size: usize,
    selected: Option<TicketKey>,
}

impl TicketSetManager {
    pub fn new(page_size: usize, locked: impl IntoIterator<Item = TicketKey>) -> Self {
        let mut manager = Self {
            tickets: Vec::new(),
            locked: locked.into_iter().collect(),
            page_cursor: 0,
            page_size: page_size.max(1),
            selected: None,
        };
        manager.restore_locked();
        manager
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn locked_keys(&self) -> &BTreeSet<TicketKey> {
        &self.locked
    }

    pub fn is_locked(&self, key: &TicketKey) -> bool {
        self.locked.contains(key)
    }

    pub fn page_cursor(&self) -> usize {
        self.page_cursor
    }

    pub fn get(&self, key: &TicketKey) -> Option<&Ticket> {
        self.position(key).map(|index| &self.tickets[index])
    }

    fn position(&self, key: &TicketKey) -> Option<usize> {
        self.tickets.iter().position(|ticket| ticket.key() == key)
    }

    fn restore_locked(&mut self) {
        let missing: Vec<TicketKey> = self
            .locked
            .iter()
            .filter(|key| self.position(key).is_none())
            .cloned()
            .collect();
        for key in missing {
            debug!(%key, "restoring locked ticket as stub");
            self.tickets.push(Ticket::stub(key));
        }
    }

    fn retain_locked(&mut self) {
        let locked = &self.locked;
        self.tickets.retain(|ticket| locked.contains(ticket.key()));
        self.restore_locked();
    }

    /// Makes the next [`fetch_next_page`](Self::fetch_next_page) start a
    /// fresh browse from the newest ticket.
    pub fn restart_browse(&mut self) {
        self.page_cursor = 0;
    }

    /// Fetches the next page of recent tickets. The first page of a browse
    /// drops every unlocked ticket before merging. Errors leave the set as
    /// it was.
    pub async fn fetch_next_page(
        &mut self,
        tracker: &dyn IssueTrackerService,
    ) -> AppResult<PageOutcome> {
        let page = tracker.list_recent(self.page_cursor, self.page_size).await?;

        if self.page_cursor == 0 {
            self.retain_locked();
        }

        if page.is_empty() {
            info!(cursor = self.page_cursor, "no more tickets");
            return Ok(PageOutcome::Exhausted);
        }

        let received = page.len();
        let mut added = 0;
        for ticket in page {
            match self.position(ticket.key()) {
                Some(index) => {
                    if self.tickets[index].is_stub() && !ticket.is_stub() {
                        self.tickets[index] = ticket;
                    }
                }
                None => {
                    self.tickets.push(ticket);
                    added += 1;
                }
            }
        }
        self.page_cursor += self.page_size;

        info!(received, added, cursor = self.page_cursor, "page merged");
        Ok(PageOutcome::Loaded { received, added })
    }

    /// Replaces the unlocked part of the set with the tickets named in `raw`.
    /// Locked tickets stay, refreshed in place when the search returned them.
    pub async fn search(
        &mut self,
        tracker: &dyn IssueTrackerService,
        raw: &str,
    ) -> AppResult<SearchOutcome> {
        let keys = TicketKey::extract_all(raw);
        if keys.is_empty() {
            return Err(AppError::Configuration(
                "enter one or more ticket keys such as ABC-123".to_string(),
            ));
        }

        let results = tracker.search_by_keys(&keys).await;
        if results.is_empty() {
            info!(requested = keys.len(), "search found nothing");
            return Ok(SearchOutcome {
                found: 0,
                shown: self.tickets.len(),
            });
        }

        let found = results
            .iter()
            .map(|detail| &detail.key)
            .collect::<HashSet<_>>()
            .len();

        let locked = &self.locked;
        self.tickets.retain(|ticket| locked.contains(ticket.key()));
        for detail in results {
            match self.position(&detail.key) {
                Some(index) => self.tickets[index] = Ticket::Full(detail),
                None => self.tickets.push(Ticket::Full(detail)),
            }
        }
        self.restore_locked();

        info!(found, shown = self.tickets.len(), "search merged");
        Ok(SearchOutcome {
            found,
            shown: self.tickets.len(),
        })
    }

    /// Flips the lock on each key and returns the resulting states.
    pub fn toggle_lock(&mut self, keys: &[TicketKey]) -> Vec<(TicketKey, bool)> {
        let mut changes = Vec::with_capacity(keys.len());
        for key in keys {
            let now_locked = if self.locked.remove(key) {
                false
            } else {
                self.locked.insert(key.clone());
                true
            };
            debug!(%key, locked = now_locked, "lock toggled");
            changes.push((key.clone(), now_locked));
        }
        self.restore_locked();
        changes
    }

    /// Locked first, then project prefix ascending, then number descending.
    pub fn display_order(&self) -> Vec<&TicketKey> {
        let mut keys: Vec<&TicketKey> = self.tickets.iter().map(Ticket::key).collect();
        keys.sort_by(|a, b| {
            let (a_prefix, a_number) = a.sort_parts();
            let (b_prefix, b_number) = b.sort_parts();
            (!self.is_locked(a))
                .cmp(&!self.is_locked(b))
                .then_with(|| a_prefix.cmp(b_prefix))
                .then_with(|| b_number.cmp(&a_number))
        });
        keys
    }

    pub fn label_for(&self, key: &TicketKey) -> String {
        key.label(self.is_locked(key))
    }

    pub fn display_labels(&self) -> Vec<String> {
        self.display_order()
            .into_iter()
            .map(|key| self.label_for(key))
            .collect()
    }

    /// Records `key` as the current selection and returns a snapshot for the
    /// background loader.
    pub fn select(&mut self, key: &TicketKey) -> AppResult<Ticket> {
        let ticket = self
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("ticket {key} is not in the list")))?;
        self.selected = Some(key.clone());
        Ok(ticket)
    }

    pub fn selected(&self) -> Option<&TicketKey> {
        self.selected.as_ref()
    }

    /// Applies a background delivery. The stored ticket is upgraded whenever
    /// the load succeeded; the view is only returned if it answers the
    /// current selection.
    pub fn apply_detail(&mut self, message: DetailMessage) -> Option<DetailOutcome> {
        let current = self.selected.as_ref() == Some(&message.key);

        match message.result {
            Ok(loaded) => {
                let key = loaded.ticket.key.clone();
                if key != message.key {
                    self.rename(&message.key, &key);
                }
                if let Some(index) = self.position(&key) {
                    if self.tickets[index].is_stub() {
                        debug!(%key, "stub upgraded");
                    }
                    self.tickets[index] = Ticket::Full(loaded.ticket);
                }
                if current {
                    Some(DetailOutcome::Ready(loaded.view))
                } else {
                    debug!(key = %message.key, "dropping stale detail");
                    None
                }
            }
            Err(error) => current.then_some(DetailOutcome::Failed(error)),
        }
    }

    /// Moves the entry, lock and selection of `old` over to `new` after the
    /// tracker answered a request under a different key (a moved issue).
    fn rename(&mut self, old: &TicketKey, new: &TicketKey) {
        info!(%old, %new, "tracker returned the ticket under a new key");
        if self.locked.remove(old) {
            self.locked.insert(new.clone());
        }
        if let Some(index) = self.position(old) {
            if self.position(new).is_some() {
                self.tickets.remove(index);
            } else {
                self.tickets[index] = Ticket::stub(new.clone());
            }
        }
        if self.selected.as_ref() == Some(old) {
            self.selected = Some(new.clone());
        }
    }

    /// Labels of the given keys that are in the set, in display order.
    pub fn export_selection(&self, keys: &[TicketKey]) -> Vec<String> {
        let wanted: HashSet<&TicketKey> = keys.iter().collect();
        self.display_order()
            .into_iter()
            .filter(|key| wanted.contains(key))
            .map(|key| self.label_for(key))
            .collect()
    }
}
