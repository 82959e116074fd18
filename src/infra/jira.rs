use async_trait::async_trait;
use base64::prelude::{BASE64_STANDARD, Engine as _};
use chrono::{DateTime, FixedOffset};
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::domain::ticket::{Comment, Ticket, TicketDetail, TicketKey};
use crate::error::{AppError, AppResult};
use crate::services::IssueTrackerService;
use crate::session::SessionConfig;
use crate::workflow::identity::UNKNOWN_USER;

const RECENT_JQL: &str = "ORDER BY created DESC";
const LIST_FIELDS: &str = "summary,description";
const DETAIL_FIELDS: &str = "summary,description,comment";

pub struct JiraClient {
    http: Client,
    base_url: Option<String>,
    user: Option<String>,
    token: Option<String>,
}

impl JiraClient {
    pub fn new(base_url: Option<String>, user: Option<String>, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.filter(|value| !value.trim().is_empty()),
            user: user.filter(|value| !value.trim().is_empty()),
            token: token.filter(|value| !value.trim().is_empty()),
        }
    }

    /// Builds a client and checks the credentials against `/myself`.
    pub async fn connect(config: &SessionConfig) -> AppResult<Self> {
        let client = Self::new(
            Some(config.url.clone()),
            Some(config.user.clone()),
            config.token.clone(),
        );
        let (base_url, user, token) = client.api_details()?;

        let response = client
            .http
            .get(Self::api_endpoint(base_url, "myself"))
            .header(AUTHORIZATION, Self::auth_header(user, token))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| AppError::Connection(format!("unable to reach Jira: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Connection(format!(
                "Jira rejected the session with {status}"
            )));
        }

        info!(base_url, user, "connected to Jira");
        Ok(client)
    }

    fn api_details(&self) -> AppResult<(&str, &str, &str)> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Jira base URL not configured".to_string()))?;
        let user = self
            .user
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Jira user not configured".to_string()))?;
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Jira API token not configured".to_string()))?;
        Ok((base_url, user, token))
    }

    fn auth_header(user: &str, token: &str) -> String {
        let credentials = format!("{user}:{token}");
        let encoded = BASE64_STANDARD.encode(credentials);
        format!("Basic {encoded}")
    }

    fn api_endpoint(base_url: &str, path: &str) -> String {
        format!("{}/rest/api/2/{}", base_url.trim_end_matches('/'), path)
    }

    pub fn browse_link(base_url: &str, key: &str) -> String {
        format!("{}/browse/{}", base_url.trim_end_matches('/'), key)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let (base_url, user, token) = self.api_details()?;
        debug!(path, "calling Jira");

        let response = self
            .http
            .get(Self::api_endpoint(base_url, path))
            .query(query)
            .header(AUTHORIZATION, Self::auth_header(user, token))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| AppError::Transport(format!("failed to call Jira: {err}")))?;

        read_json(response, path).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, path: &str) -> AppResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read response>".to_string());
        let message = format!("Jira responded to {path} with {status}: {body}");
        return Err(match status {
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Connection(message),
            _ => AppError::Transport(message),
        });
    }

    response
        .json()
        .await
        .map_err(|err| AppError::Transport(format!("failed to parse Jira response: {err}")))
}

#[async_trait]
impl IssueTrackerService for JiraClient {
    async fn list_recent(&self, offset: usize, limit: usize) -> AppResult<Vec<Ticket>> {
        let page: JiraSearchResponse = self
            .get_json(
                "search",
                &[
                    ("jql", RECENT_JQL.to_string()),
                    ("startAt", offset.to_string()),
                    ("maxResults", limit.to_string()),
                    ("fields", LIST_FIELDS.to_string()),
                ],
            )
            .await?;

        Ok(page
            .issues
            .into_iter()
            .map(|issue| Ticket::Full(issue.into_detail()))
            .collect())
    }

    async fn fetch_ticket(&self, key: &TicketKey) -> AppResult<TicketDetail> {
        let issue: JiraIssue = self
            .get_json(
                &format!("issue/{key}"),
                &[("fields", DETAIL_FIELDS.to_string())],
            )
            .await?;
        Ok(issue.into_detail())
    }

    async fn display_name(&self, user_id: &str) -> AppResult<String> {
        let user: JiraUser = self
            .get_json("user", &[("accountId", user_id.to_string())])
            .await?;
        Ok(user.display_name.unwrap_or_else(|| user_id.to_string()))
    }

    fn browse_url(&self, key: &TicketKey) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|base_url| Self::browse_link(base_url, key.as_str()))
    }
}

#[derive(Deserialize)]
struct JiraSearchResponse {
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraIssueFields,
}

impl JiraIssue {
    fn into_detail(self) -> TicketDetail {
        let key = TicketKey::new(self.key);
        let comments = self
            .fields
            .comment
            .map(|page| page.comments)
            .unwrap_or_default()
            .into_iter()
            .map(|comment| comment.into_comment(&key))
            .collect();

        TicketDetail {
            key,
            summary: self.fields.summary,
            description: self.fields.description,
            comments,
        }
    }
}

#[derive(Deserialize)]
struct JiraIssueFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    comment: Option<JiraCommentPage>,
}

#[derive(Deserialize)]
struct JiraCommentPage {
    #[serde(default)]
    comments: Vec<JiraComment>,
}

#[derive(Deserialize)]
struct JiraComment {
    #[serde(default)]
    author: Option<JiraUser>,
    #[serde(default)]
    created: String,
    #[serde(default)]
    body: String,
}

impl JiraComment {
    fn into_comment(self, key: &TicketKey) -> Comment {
        let author = self
            .author
            .and_then(|user| user.display_name.or(user.name))
            .unwrap_or_else(|| UNKNOWN_USER.to_string());
        let created = parse_timestamp(&self.created);
        if created.is_none() {
            warn!(%key, created = %self.created, "unreadable comment timestamp");
        }
        Comment {
            author,
            created,
            created_raw: self.created,
            body: self.body,
        }
    }
}

#[derive(Deserialize)]
struct JiraUser {
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Jira writes offsets without a colon (`+0000`), which RFC 3339 rejects.
fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;

    use super::*;

    #[test]
    fn parses_jira_timestamps() {
        let created = parse_timestamp("2024-03-01T23:15:30.000+0000").expect("jira format");
        assert_eq!(created.format("%Y-%m-%d").to_string(), "2024-03-01");
        assert!(parse_timestamp("2024-03-01T23:15:30+01:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn decodes_issue_with_comments() {
        let raw = r#"{
            "key": "OPS-1",
            "fields": {
                "summary": "Pager storm",
                "description": null,
                "comment": {
                    "comments": [
                        {"author": {"displayName": "Ann"}, "created": "2024-01-02T10:00:00.000+0000", "body": "ack"},
                        {"author": {"name": "bob"}, "created": "2024-01-01T10:00:00.000+0000", "body": "first"},
                        {"created": "2024-01-03T10:00:00.000+0000", "body": "ghost"}
                    ]
                }
            }
        }"#;
        let issue: JiraIssue = serde_json::from_str(raw).expect("valid payload");
        let detail = issue.into_detail();

        assert_eq!(detail.key.as_str(), "OPS-1");
        assert_eq!(detail.description, None);
        let authors: Vec<&str> = detail.comments.iter().map(|c| c.author.as_str()).collect();
        assert_eq!(authors, vec!["Ann", "bob", UNKNOWN_USER]);
    }

    #[test]
    fn listing_issue_without_comment_field_has_no_comments() {
        let raw = r#"{"issues": [{"key": "A-1", "fields": {"summary": "s"}}]}"#;
        let page: JiraSearchResponse = serde_json::from_str(raw).expect("valid payload");
        let detail = page
            .issues
            .into_iter()
            .next()
            .expect("one issue")
            .into_detail();
        assert!(detail.comments.is_empty());
    }

    #[test]
    fn unreadable_comment_timestamp_keeps_the_ticket() {
        let raw = r#"{
            "key": "ops-2",
            "fields": {
                "summary": "Odd clock",
                "comment": {
                    "comments": [
                        {"author": {"displayName": "Ann"}, "created": "2024-01-02 10:00", "body": "odd"},
                        {"author": {"displayName": "Bob"}, "created": "2024-01-01T10:00:00.000+0000", "body": "fine"}
                    ]
                }
            }
        }"#;
        let issue: JiraIssue = serde_json::from_str(raw).expect("valid payload");
        let detail = issue.into_detail();

        assert_eq!(detail.key.as_str(), "OPS-2");
        assert_eq!(detail.comments.len(), 2);
        assert!(detail.comments[0].created.is_none());
        assert_eq!(detail.comments[0].created_raw, "2024-01-02 10:00");
        assert!(detail.comments[1].created.is_some());
    }

    #[test]
    fn builds_endpoints_and_links() {
        assert_eq!(
            JiraClient::api_endpoint("https://acme.atlassian.net/", "issue/A-1"),
            "https://acme.atlassian.net/rest/api/2/issue/A-1"
        );
        let client = JiraClient::new(Some("https://acme.atlassian.net/".to_string()), None, None);
        assert_eq!(
            client.browse_url(&TicketKey::new("A-1")).as_deref(),
            Some("https://acme.atlassian.net/browse/A-1")
        );
    }

    #[test]
    fn blank_settings_are_configuration_errors() {
        let client = JiraClient::new(
            Some("https://acme.atlassian.net".to_string()),
            Some("dev".to_string()),
            Some("  ".to_string()),
        );
        assert!(matches!(
            client.api_details(),
            Err(AppError::Configuration(_))
        ));
        assert_eq!(
            JiraClient::auth_header("dev", "t0ken"),
            format!("Basic {}", BASE64_STANDARD.encode("dev:t0ken"))
        );
    }
}
