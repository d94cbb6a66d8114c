//! Activity <-> Jira Issue synchronization.
//!
//! Push creates or updates Issues (linking new ones to the parent WBS Epic
//! when mapped), pull applies last-write-wins updates back onto activities,
//! and progress sync drives Jira status transitions from percent complete.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use evmsched_core::{Activity, ActivityId, IntegrationId, MappingId};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::client::{CreateIssue, JiraClient, JiraError};
use crate::log::{SyncLogEntry, SyncLogStore, SyncType};
use crate::report::{batch_status, SyncAction, SyncError, SyncReport};
use crate::store::{EntityKind, IntegrationStore, JiraIntegration, JiraMapping, MappingStore};

/// Jira status names targeted by progress sync.
pub const STATUS_NOT_STARTED: &str = "To Do";
pub const STATUS_IN_PROGRESS: &str = "In Progress";
pub const STATUS_COMPLETED: &str = "Done";

/// Target Jira status for a completion percentage: 0 -> To Do, (0, 100) ->
/// In Progress, >= 100 -> Done.
pub fn status_for_percent(percent: Decimal) -> &'static str {
    if percent >= Decimal::from(100) {
        STATUS_COMPLETED
    } else if percent > Decimal::ZERO {
        STATUS_IN_PROGRESS
    } else {
        STATUS_NOT_STARTED
    }
}

/// Map an inbound Jira status name to a completion percentage.
///
/// Matching is case-insensitive and substring-based. "In progress" bumps to
/// 50 only when the activity has not started; other statuses leave the value
/// untouched (`None`).
pub fn percent_for_status(status: &str, current: Decimal) -> Option<Decimal> {
    let status = status.to_lowercase();
    if status.contains("done") || status.contains("complete") {
        Some(Decimal::from(100))
    } else if status.contains("progress") {
        (current == Decimal::ZERO).then(|| Decimal::from(50))
    } else if status == "to do" || status == "open" || status.contains("todo") {
        Some(Decimal::ZERO)
    } else {
        None
    }
}

/// Issue description body built from the activity's schedule state.
pub fn issue_description(activity: &Activity) -> String {
    let mut lines = vec![
        format!("*Activity Code:* {}", activity.code),
        format!("*Duration:* {} days", activity.duration_days),
    ];
    if let Some(planned_start) = activity.planned_start {
        lines.push(format!("*Planned Start:* {planned_start}"));
    }
    if let Some(planned_finish) = activity.planned_finish {
        lines.push(format!("*Planned Finish:* {planned_finish}"));
    }
    if let Some(early_start) = activity.early_start {
        lines.push(format!("*Early Start:* {early_start}"));
    }
    if let Some(early_finish) = activity.early_finish {
        lines.push(format!("*Early Finish:* {early_finish}"));
    }
    lines.push(format!("\n*Progress:* {}%", activity.percent_complete));
    if activity.is_critical {
        lines.push("\n_This activity is on the critical path._".into());
    }
    if activity.is_milestone {
        lines.push("\n_This is a milestone._".into());
    }
    if let Some(description) = &activity.description {
        lines.push(format!("\n{description}"));
    }
    lines.join("\n")
}

/// Activity <-> Issue sync operations over borrowed collaborators.
pub struct ActivitySyncService<'a> {
    pub client: &'a dyn JiraClient,
    pub integrations: &'a mut dyn IntegrationStore,
    pub mappings: &'a mut dyn MappingStore,
    pub log: &'a mut dyn SyncLogStore,
}

impl ActivitySyncService<'_> {
    /// Push activities to Jira as Issues.
    pub fn push(
        &mut self,
        integration_id: IntegrationId,
        activities: &[Activity],
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let integration = self.integration(integration_id)?;
        let mut report = SyncReport::new();

        for activity in activities {
            if activity.deleted_at.is_some() {
                continue;
            }
            let action = match self.mappings.by_activity(integration_id, activity.id) {
                None => SyncAction::Create,
                Some(mapping) if mapping.sync_direction.allows_push() => SyncAction::Update,
                Some(_) => SyncAction::Skip,
            };

            let outcome = match action {
                SyncAction::Create => self.create_issue(&integration, activity).map(|id| {
                    report.created_mappings.push(id);
                }),
                SyncAction::Update => self.update_issue(integration_id, activity).map(|id| {
                    if let Some(id) = id {
                        report.updated_mappings.push(id);
                    }
                }),
                SyncAction::Skip => continue,
            };

            match outcome {
                Ok(()) => report.items_synced += 1,
                Err(error) => {
                    report.items_failed += 1;
                    report
                        .errors
                        .push(format!("Activity {}: {}", activity.code, error));
                    warn!(activity = %activity.code, %error, "activity push item failed");
                }
            }
        }

        self.finish(
            integration_id,
            integration,
            SyncType::Push,
            &mut report,
            started,
        );
        Ok(report)
    }

    /// Pull Issue changes back onto local activities.
    pub fn pull(
        &mut self,
        integration_id: IntegrationId,
        activities: &mut BTreeMap<ActivityId, Activity>,
        mapping_ids: Option<&[MappingId]>,
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let integration = self.integration(integration_id)?;
        let mut report = SyncReport::new();

        let mappings: Vec<JiraMapping> = self
            .mappings
            .by_integration(integration_id, Some(EntityKind::Activity))
            .into_iter()
            .filter(|m| m.sync_direction.allows_pull())
            .filter(|m| mapping_ids.map_or(true, |ids| ids.contains(&m.id)))
            .collect();

        for mapping in mappings {
            match self.pull_one(&mapping, activities) {
                Ok(updated) => {
                    if updated {
                        report.updated_mappings.push(mapping.id);
                    }
                    report.items_synced += 1;
                }
                Err(error) => {
                    report.items_failed += 1;
                    report
                        .errors
                        .push(format!("Issue {}: {}", mapping.jira_issue_key, error));
                    warn!(issue = %mapping.jira_issue_key, %error, "activity pull item failed");
                }
            }
        }

        self.finish(
            integration_id,
            integration,
            SyncType::Pull,
            &mut report,
            started,
        );
        Ok(report)
    }

    /// Push progress: transition each mapped Issue toward the status implied
    /// by percent complete. A failed transition is logged but not fatal.
    pub fn sync_progress(
        &mut self,
        integration_id: IntegrationId,
        activities: &BTreeMap<ActivityId, Activity>,
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let integration = self.integration(integration_id)?;
        let mut report = SyncReport::new();

        for mapping in self
            .mappings
            .by_integration(integration_id, Some(EntityKind::Activity))
        {
            let Some(activity_id) = mapping.activity_id else {
                continue;
            };
            let Some(activity) = activities.get(&activity_id) else {
                continue;
            };

            match self.sync_one_progress(&mapping, activity) {
                Ok(()) => {
                    report.updated_mappings.push(mapping.id);
                    report.items_synced += 1;
                }
                Err(error) => {
                    report.items_failed += 1;
                    report
                        .errors
                        .push(format!("Issue {}: {}", mapping.jira_issue_key, error));
                }
            }
        }

        self.finish(
            integration_id,
            integration,
            SyncType::Push,
            &mut report,
            started,
        );
        Ok(report)
    }

    fn integration(&self, id: IntegrationId) -> Result<JiraIntegration, SyncError> {
        let integration = self
            .integrations
            .get(id)
            .ok_or(SyncError::IntegrationNotFound(id))?;
        if !integration.sync_enabled {
            return Err(SyncError::SyncDisabled(id));
        }
        Ok(integration)
    }

    fn create_issue(
        &mut self,
        integration: &JiraIntegration,
        activity: &Activity,
    ) -> Result<MappingId, JiraError> {
        // Attach to the parent WBS element's Epic when it is mapped.
        let parent_epic = self
            .mappings
            .by_wbs(integration.id, activity.wbs_id)
            .map(|m| m.jira_issue_key);

        let description = issue_description(activity);
        let issue = self.client.create_issue(&CreateIssue {
            project_key: &integration.project_key,
            summary: &activity.name,
            issue_type: "Task",
            description: &description,
            epic_key: parent_epic.as_deref(),
            labels: vec!["evmsched".into(), format!("activity-{}", activity.code)],
        })?;

        let mapping = JiraMapping::for_activity(
            integration.id,
            activity.id,
            issue.key.clone(),
            issue.id.clone(),
            Utc::now(),
        )
        .jira_updated(issue.updated);
        let mapping_id = mapping.id;
        self.mappings.insert(mapping);

        info!(
            activity = %activity.code,
            issue = %issue.key,
            epic = parent_epic.as_deref().unwrap_or("-"),
            "issue created"
        );
        Ok(mapping_id)
    }

    fn update_issue(
        &mut self,
        integration_id: IntegrationId,
        activity: &Activity,
    ) -> Result<Option<MappingId>, JiraError> {
        let Some(mut mapping) = self.mappings.by_activity(integration_id, activity.id) else {
            return Ok(None);
        };
        let description = issue_description(activity);
        self.client
            .update_issue(&mapping.jira_issue_key, &activity.name, &description)?;

        mapping.last_synced_at = Utc::now();
        self.mappings.update(&mapping);
        info!(activity = %activity.code, issue = %mapping.jira_issue_key, "issue updated");
        Ok(Some(mapping.id))
    }

    fn pull_one(
        &mut self,
        mapping: &JiraMapping,
        activities: &mut BTreeMap<ActivityId, Activity>,
    ) -> Result<bool, JiraError> {
        let issue = self.client.get_issue(&mapping.jira_issue_key)?;

        // Last-write-wins on Jira's own timestamp.
        if let Some(last) = mapping.last_jira_updated {
            if issue.updated <= last {
                debug!(issue = %mapping.jira_issue_key, "pull skipped, no newer changes");
                return Ok(false);
            }
        }

        let Some(activity_id) = mapping.activity_id else {
            return Ok(false);
        };
        let Some(activity) = activities.get_mut(&activity_id) else {
            warn!(issue = %mapping.jira_issue_key, "mapped activity missing locally");
            return Ok(false);
        };

        activity.name = issue.summary.clone();
        if let Some(percent) = percent_for_status(&issue.status, activity.percent_complete) {
            activity.percent_complete = percent;
        }

        let mut updated = mapping.clone();
        updated.last_synced_at = Utc::now();
        updated.last_jira_updated = Some(issue.updated);
        self.mappings.update(&updated);

        info!(activity = %activity.code, issue = %mapping.jira_issue_key, "activity pulled");
        Ok(true)
    }

    fn sync_one_progress(
        &mut self,
        mapping: &JiraMapping,
        activity: &Activity,
    ) -> Result<(), JiraError> {
        let target = status_for_percent(activity.percent_complete);
        let issue = self.client.get_issue(&mapping.jira_issue_key)?;

        if !issue.status.eq_ignore_ascii_case(target) {
            match self.client.transition_issue(&mapping.jira_issue_key, target) {
                Ok(()) => {
                    info!(
                        issue = %mapping.jira_issue_key,
                        from = %issue.status,
                        to = target,
                        "issue transitioned"
                    );
                }
                Err(error) => {
                    // Transition availability depends on the Jira workflow;
                    // log and move on.
                    warn!(
                        issue = %mapping.jira_issue_key,
                        target,
                        %error,
                        "status transition failed"
                    );
                }
            }
        }

        let mut updated = mapping.clone();
        updated.last_synced_at = Utc::now();
        self.mappings.update(&updated);
        Ok(())
    }

    fn finish(
        &mut self,
        integration_id: IntegrationId,
        mut integration: JiraIntegration,
        sync_type: SyncType,
        report: &mut SyncReport,
        started: Instant,
    ) {
        report.duration_ms = started.elapsed().as_millis() as u64;
        let (success, status) = batch_status(report.items_synced, report.items_failed);
        report.success = success;

        let mut entry = SyncLogEntry::new(integration_id, sync_type, status, report.items_synced)
            .duration(report.duration_ms);
        if !report.errors.is_empty() {
            entry = entry.error(report.errors.join("; "));
        }
        self.log.append(entry);

        if report.items_synced > 0 {
            integration.last_sync_at = Some(Utc::now());
            self.integrations.upsert(integration);
        }
    }
}
