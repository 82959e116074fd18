use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset};
use regex::Regex;

/// Suffix appended to the label of a locked ticket. Never part of a key.
pub const LOCK_MARKER: char = '*';

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+-\d+").expect("invalid ticket key regex"));

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TicketKey(String);

impl TicketKey {
    /// Keys are stored upper-case, so `abc-1` and `ABC-1` name one ticket.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_uppercase())
    }

    /// Recovers the key behind a rendered list label such as `ABC-12*`.
    pub fn from_label(label: &str) -> Self {
        Self::new(label.trim().trim_end_matches(LOCK_MARKER))
    }

    /// Pulls every `LETTERS-DIGITS` key out of free-form input, whatever the
    /// delimiter, in order of appearance.
    pub fn extract_all(input: &str) -> Vec<TicketKey> {
        KEY_PATTERN
            .find_iter(input)
            .map(|found| TicketKey::new(found.as_str()))
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the key into its project prefix and number. Keys that do not
    /// have exactly one `-` followed by an integer sort as `(whole key, 0)`.
    pub fn sort_parts(&self) -> (&str, TicketNumber<'_>) {
        self.0
            .split_once('-')
            .and_then(|(prefix, number)| Some((prefix, TicketNumber::parse(number)?)))
            .unwrap_or((self.0.as_str(), TicketNumber::default()))
    }

    pub fn label(&self, locked: bool) -> String {
        if locked {
            format!("{}{}", self.0, LOCK_MARKER)
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for TicketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digits of a ticket number with leading zeros dropped. Compared by
/// length first, so there is no upper bound on the value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketNumber<'a>(&'a str);

impl<'a> TicketNumber<'a> {
    fn parse(digits: &'a str) -> Option<Self> {
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        Some(Self(digits.trim_start_matches('0')))
    }
}

impl Ord for TicketNumber<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(other.0))
    }
}

impl PartialOrd for TicketNumber<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub author: String,
    /// `None` when the tracker's timestamp could not be read; `created_raw`
    /// keeps the text as received.
    pub created: Option<DateTime<FixedOffset>>,
    pub created_raw: String,
    pub body: String,
}

impl Comment {
    pub fn date_label(&self) -> String {
        match self.created {
            Some(created) => created.format("%Y-%m-%d").to_string(),
            None => self.created_raw.trim().chars().take(10).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicketDetail {
    pub key: TicketKey,
    pub summary: String,
    pub description: Option<String>,
    pub comments: Vec<Comment>,
}

/// A ticket in the working set. Locked tickets restored from a previous
/// session start as `Stub` and are upgraded once their detail is loaded.
#[derive(Debug, Clone)]
pub enum Ticket {
    Stub { key: TicketKey },
    Full(TicketDetail),
}

impl Ticket {
    pub fn stub(key: TicketKey) -> Self {
        Ticket::Stub { key }
    }

    pub fn key(&self) -> &TicketKey {
        match self {
            Ticket::Stub { key } => key,
            Ticket::Full(detail) => &detail.key,
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, Ticket::Stub { .. })
    }

    pub fn detail(&self) -> Option<&TicketDetail> {
        match self {
            Ticket::Stub { .. } => None,
            Ticket::Full(detail) => Some(detail),
        }
    }
}

impl From<TicketDetail> for Ticket {
    fn from(detail: TicketDetail) -> Self {
        Ticket::Full(detail)
    }
}
