pub mod browser;
pub mod jira;
