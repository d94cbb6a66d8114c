//! The Jira client seam.
//!
//! The HTTP transport lives outside this crate; sync services talk to Jira
//! through this trait. Implementations are expected to carry the request
//! deadline and retry policy of the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A Jira issue as the sync engine sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    /// Status display name, e.g. "In Progress".
    pub status: String,
    pub project_key: String,
    /// Jira's own update timestamp; the last-write-wins tiebreaker. Stored
    /// exactly as returned, never derived.
    pub updated: DateTime<Utc>,
}

/// Arguments for creating a new issue.
#[derive(Debug, Clone)]
pub struct CreateIssue<'a> {
    pub project_key: &'a str,
    pub summary: &'a str,
    pub issue_type: &'a str,
    pub description: &'a str,
    /// Parent Epic to attach to, when known.
    pub epic_key: Option<&'a str>,
    pub labels: Vec<String>,
}

/// Errors surfaced by a Jira client implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JiraError {
    #[error("jira transport error: {0}")]
    Transport(String),

    #[error("jira issue not found: {0}")]
    IssueNotFound(String),

    #[error("jira rejected the request: {0}")]
    Rejected(String),

    #[error("status transition to '{target}' unavailable for {issue_key}")]
    TransitionUnavailable { issue_key: String, target: String },
}

/// Minimal Jira surface the sync engine needs.
pub trait JiraClient {
    fn create_epic(
        &self,
        project_key: &str,
        summary: &str,
        description: &str,
    ) -> Result<JiraIssue, JiraError>;

    fn create_issue(&self, request: &CreateIssue<'_>) -> Result<JiraIssue, JiraError>;

    fn update_issue(
        &self,
        issue_key: &str,
        summary: &str,
        description: &str,
    ) -> Result<(), JiraError>;

    fn get_issue(&self, issue_key: &str) -> Result<JiraIssue, JiraError>;

    fn transition_issue(&self, issue_key: &str, target_status: &str) -> Result<(), JiraError>;
}
