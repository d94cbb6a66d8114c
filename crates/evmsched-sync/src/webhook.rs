//! Inbound Jira webhook processing.
//!
//! Signatures arrive as `X-Hub-Signature: sha256=<hex>` and are verified
//! with HMAC-SHA-256 in constant time; verification is bypassed when the
//! integration has no secret configured. Processing never fails the
//! endpoint: every outcome, including the ignore paths, becomes a response
//! body and one audit-log record.
//!
//! Jira may deliver an event twice. Updates are idempotent by the
//! last-write-wins timestamp rule and deletes by "already absent is
//! success".

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use evmsched_core::{Activity, ActivityId, WbsElement, WbsId};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};

use crate::activity::percent_for_status;
use crate::log::{SyncLogEntry, SyncLogStore, SyncStatus, SyncType};
use crate::store::{IntegrationStore, MappingStore};

type HmacSha256 = Hmac<Sha256>;

/// Verify an `X-Hub-Signature`-style header against the payload.
///
/// No configured secret bypasses verification. The comparison runs in
/// constant time regardless of where a mismatch occurs.
pub fn verify_signature(secret: Option<&str>, payload: &[u8], signature: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(signature) = signature else {
        return false;
    };
    let hex_digest = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

// ============================================================================
// Payload
// ============================================================================

/// Webhook body as Jira sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "webhookEvent")]
    pub webhook_event: String,
    pub issue: Option<WebhookIssue>,
    pub changelog: Option<Changelog>,
    /// Event time in epoch milliseconds.
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookIssue {
    pub key: String,
    pub id: String,
    #[serde(default)]
    pub fields: WebhookFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookFields {
    pub summary: Option<String>,
    pub status: Option<NamedField>,
    pub project: Option<KeyedField>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedField {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyedField {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Changelog {
    #[serde(default)]
    pub items: Vec<ChangelogItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangelogItem {
    pub field: String,
    #[serde(rename = "fromString")]
    pub from_string: Option<String>,
    #[serde(rename = "toString")]
    pub to_string: Option<String>,
}

impl WebhookPayload {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    fn event_time(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }
}

/// Response body; the endpoint always answers HTTP 200 with one of these
/// (signature failure is the only 401).
#[derive(Debug, Clone, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub event_type: String,
    pub issue_key: Option<String>,
    pub action: String,
}

impl WebhookResponse {
    fn ok(event: &str, issue_key: Option<String>, action: &str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            event_type: event.to_owned(),
            issue_key,
            action: action.to_owned(),
        }
    }

    fn failed(event: &str, issue_key: Option<String>, action: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            event_type: event.to_owned(),
            issue_key,
            action: action.to_owned(),
        }
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Applies one webhook event against local state. One webhook is one
/// transaction; the caller commits only on success.
pub struct WebhookProcessor<'a> {
    pub integrations: &'a mut dyn IntegrationStore,
    pub mappings: &'a mut dyn MappingStore,
    pub log: &'a mut dyn SyncLogStore,
}

impl WebhookProcessor<'_> {
    pub fn process(
        &mut self,
        payload: &WebhookPayload,
        activities: &mut BTreeMap<ActivityId, Activity>,
        wbs_elements: &mut BTreeMap<WbsId, WbsElement>,
    ) -> WebhookResponse {
        let started = Instant::now();
        let event = payload.webhook_event.as_str();

        let Some(issue) = &payload.issue else {
            return WebhookResponse::failed(event, None, "ignored_invalid_payload", "missing issue data");
        };
        let issue_key = issue.key.clone();

        let Some(project_key) = issue.fields.project.as_ref().map(|p| p.key.clone()) else {
            return WebhookResponse::failed(
                event,
                Some(issue_key),
                "ignored_invalid_payload",
                "missing project key",
            );
        };

        let Some(integration) = self.integrations.by_project_key(&project_key) else {
            info!(project = %project_key, event, "webhook for unknown project ignored");
            return WebhookResponse::ok(
                event,
                Some(issue_key),
                "ignored_no_integration",
                format!("no integration for project {project_key}"),
            );
        };

        if !integration.sync_enabled {
            let response = WebhookResponse::ok(
                event,
                Some(issue_key),
                "ignored_sync_disabled",
                "sync is disabled for this integration",
            );
            self.log_outcome(integration.id, None, &response, started);
            return response;
        }

        let response = match event {
            "jira:issue_updated" => self.handle_updated(payload, issue, activities, wbs_elements),
            "jira:issue_created" => self.handle_created(issue, event),
            "jira:issue_deleted" => self.handle_deleted(issue, event),
            _ => WebhookResponse::ok(
                event,
                Some(issue_key),
                "ignored_unsupported_event",
                format!("event {event} is not handled"),
            ),
        };

        let mapping_id = self.mappings.by_issue_key(&issue.key).map(|m| m.id);
        self.log_outcome(integration.id, mapping_id, &response, started);
        response
    }

    fn handle_updated(
        &mut self,
        payload: &WebhookPayload,
        issue: &WebhookIssue,
        activities: &mut BTreeMap<ActivityId, Activity>,
        wbs_elements: &mut BTreeMap<WbsId, WbsElement>,
    ) -> WebhookResponse {
        let event = payload.webhook_event.as_str();
        let Some(mapping) = self.mappings.by_issue_key(&issue.key) else {
            return WebhookResponse::ok(
                event,
                Some(issue.key.clone()),
                "ignored_no_mapping",
                "no mapping for issue",
            );
        };

        if !mapping.sync_direction.allows_pull() {
            return WebhookResponse::ok(
                event,
                Some(issue.key.clone()),
                "ignored_sync_direction",
                "mapping does not accept changes from Jira",
            );
        }

        // Last-write-wins: a replayed or out-of-order delivery no-ops.
        let event_time = payload.event_time();
        if let (Some(event_time), Some(last)) = (event_time, mapping.last_jira_updated) {
            if event_time <= last {
                return WebhookResponse::ok(
                    event,
                    Some(issue.key.clone()),
                    "no_change",
                    "local state is current",
                );
            }
        }

        let applied = match (mapping.activity_id, mapping.wbs_id) {
            (Some(activity_id), _) => apply_issue_to_activity(issue, activities.get_mut(&activity_id)),
            (None, Some(wbs_id)) => apply_issue_to_wbs(issue, wbs_elements.get_mut(&wbs_id)),
            (None, None) => false,
        };

        if !applied {
            warn!(issue = %issue.key, "mapped local entity missing, webhook ignored");
            return WebhookResponse::ok(
                event,
                Some(issue.key.clone()),
                "ignored_no_mapping",
                "mapped local entity is missing",
            );
        }

        let mut updated = mapping;
        updated.last_synced_at = Utc::now();
        if let Some(event_time) = event_time {
            updated.last_jira_updated = Some(event_time);
        }
        self.mappings.update(&updated);

        info!(issue = %issue.key, "webhook update applied");
        WebhookResponse::ok(event, Some(issue.key.clone()), "updated", "local entity updated")
    }

    /// Mappings are created by the push path; a create event only refreshes
    /// the sync timestamp when the mapping already exists.
    fn handle_created(&mut self, issue: &WebhookIssue, event: &str) -> WebhookResponse {
        match self.mappings.by_issue_key(&issue.key) {
            Some(mut mapping) => {
                mapping.last_synced_at = Utc::now();
                self.mappings.update(&mapping);
                WebhookResponse::ok(
                    event,
                    Some(issue.key.clone()),
                    "mapping_refreshed",
                    "sync timestamp refreshed",
                )
            }
            None => WebhookResponse::ok(
                event,
                Some(issue.key.clone()),
                "ignored_no_mapping",
                "no mapping for issue",
            ),
        }
    }

    /// Hard-delete the mapping; deleting an already-absent mapping is
    /// success.
    fn handle_deleted(&mut self, issue: &WebhookIssue, event: &str) -> WebhookResponse {
        if self.mappings.remove_by_issue_key(&issue.key) {
            info!(issue = %issue.key, "mapping hard-deleted on issue deletion");
            WebhookResponse::ok(
                event,
                Some(issue.key.clone()),
                "mapping_deleted",
                "mapping removed",
            )
        } else {
            WebhookResponse::ok(
                event,
                Some(issue.key.clone()),
                "no_change",
                "mapping already absent",
            )
        }
    }

    fn log_outcome(
        &mut self,
        integration_id: evmsched_core::IntegrationId,
        mapping_id: Option<evmsched_core::MappingId>,
        response: &WebhookResponse,
        started: Instant,
    ) {
        let status = if response.success {
            SyncStatus::Success
        } else {
            SyncStatus::Failed
        };
        let items = u32::from(response.action == "updated" || response.action == "mapping_deleted");
        let mut entry = SyncLogEntry::new(integration_id, SyncType::Webhook, status, items)
            .duration(started.elapsed().as_millis() as u64);
        if let Some(mapping_id) = mapping_id {
            entry = entry.mapping(mapping_id);
        }
        if !response.success {
            entry = entry.error(response.message.clone());
        }
        self.log.append(entry);
    }
}

fn apply_issue_to_activity(issue: &WebhookIssue, activity: Option<&mut Activity>) -> bool {
    let Some(activity) = activity else {
        return false;
    };
    if let Some(summary) = &issue.fields.summary {
        activity.name = summary.clone();
    }
    if let Some(status) = &issue.fields.status {
        if let Some(percent) = percent_for_status(&status.name, activity.percent_complete) {
            activity.percent_complete = percent;
        }
    }
    true
}

fn apply_issue_to_wbs(issue: &WebhookIssue, element: Option<&mut WbsElement>) -> bool {
    let Some(element) = element else {
        return false;
    };
    if let Some(summary) = &issue.fields.summary {
        element.name = summary.clone();
    }
    if issue.fields.description.is_some() {
        element.description = issue.fields.description.clone();
    }
    true
}
