//! WBS element <-> Jira Epic synchronization.
//!
//! Only program-level structure syncs: elements at level <= 2. Deeper nodes
//! stay local. Push classifies each element as create / update / skip from
//! its mapping state; pull applies last-write-wins on Jira's `updated`.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use evmsched_core::{IntegrationId, MappingId, WbsElement, WbsId};
use tracing::{info, warn};

use crate::client::JiraClient;
use crate::log::{SyncLogEntry, SyncLogStore, SyncType};
use crate::report::{batch_status, SyncAction, SyncError, SyncReport};
use crate::store::{EntityKind, IntegrationStore, JiraIntegration, JiraMapping, MappingStore};

/// Deepest WBS level that syncs to Jira.
pub const MAX_SYNC_LEVEL: u32 = 2;

/// WBS <-> Epic sync operations over borrowed collaborators.
pub struct WbsSyncService<'a> {
    pub client: &'a dyn JiraClient,
    pub integrations: &'a mut dyn IntegrationStore,
    pub mappings: &'a mut dyn MappingStore,
    pub log: &'a mut dyn SyncLogStore,
}

impl WbsSyncService<'_> {
    /// Push WBS elements to Jira as Epics.
    pub fn push(
        &mut self,
        integration_id: IntegrationId,
        elements: &[WbsElement],
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let integration = self.integration(integration_id)?;
        let mut report = SyncReport::new();

        for element in elements {
            if element.level > MAX_SYNC_LEVEL || element.deleted_at.is_some() {
                continue;
            }
            let action = match self.mappings.by_wbs(integration_id, element.id) {
                None => SyncAction::Create,
                Some(mapping) if mapping.sync_direction.allows_push() => SyncAction::Update,
                Some(_) => SyncAction::Skip,
            };

            let outcome = match action {
                SyncAction::Create => self.create_epic(&integration, element).map(|id| {
                    report.created_mappings.push(id);
                }),
                SyncAction::Update => self.update_epic(integration_id, element).map(|id| {
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
                        .push(format!("WBS {}: {}", element.wbs_code, error));
                    warn!(wbs = %element.wbs_code, %error, "wbs push item failed");
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

    /// Pull Epic changes back onto local WBS elements.
    pub fn pull(
        &mut self,
        integration_id: IntegrationId,
        elements: &mut BTreeMap<WbsId, WbsElement>,
        mapping_ids: Option<&[MappingId]>,
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let integration = self.integration(integration_id)?;
        let mut report = SyncReport::new();

        let mappings: Vec<JiraMapping> = self
            .mappings
            .by_integration(integration_id, Some(EntityKind::Wbs))
            .into_iter()
            .filter(|m| m.sync_direction.allows_pull())
            .filter(|m| mapping_ids.map_or(true, |ids| ids.contains(&m.id)))
            .collect();

        for mapping in mappings {
            match self.pull_one(&mapping, elements) {
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
                        .push(format!("Epic {}: {}", mapping.jira_issue_key, error));
                    warn!(epic = %mapping.jira_issue_key, %error, "wbs pull item failed");
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

    fn create_epic(
        &mut self,
        integration: &JiraIntegration,
        element: &WbsElement,
    ) -> Result<MappingId, crate::client::JiraError> {
        let description = epic_description(element);
        let issue =
            self.client
                .create_epic(&integration.project_key, &element.name, &description)?;

        let mapping = JiraMapping::for_wbs(
            integration.id,
            element.id,
            issue.key.clone(),
            issue.id.clone(),
            Utc::now(),
        )
        .jira_updated(issue.updated);
        let mapping_id = mapping.id;
        self.mappings.insert(mapping);

        info!(wbs = %element.wbs_code, epic = %issue.key, "epic created");
        Ok(mapping_id)
    }

    fn update_epic(
        &mut self,
        integration_id: IntegrationId,
        element: &WbsElement,
    ) -> Result<Option<MappingId>, crate::client::JiraError> {
        let Some(mut mapping) = self.mappings.by_wbs(integration_id, element.id) else {
            return Ok(None);
        };
        let description = epic_description(element);
        self.client
            .update_issue(&mapping.jira_issue_key, &element.name, &description)?;

        mapping.last_synced_at = Utc::now();
        self.mappings.update(&mapping);
        info!(wbs = %element.wbs_code, epic = %mapping.jira_issue_key, "epic updated");
        Ok(Some(mapping.id))
    }

    fn pull_one(
        &mut self,
        mapping: &JiraMapping,
        elements: &mut BTreeMap<WbsId, WbsElement>,
    ) -> Result<bool, crate::client::JiraError> {
        let issue = self.client.get_issue(&mapping.jira_issue_key)?;

        // Last-write-wins on Jira's own timestamp.
        if let Some(last) = mapping.last_jira_updated {
            if issue.updated <= last {
                return Ok(false);
            }
        }

        let Some(wbs_id) = mapping.wbs_id else {
            return Ok(false);
        };
        let Some(element) = elements.get_mut(&wbs_id) else {
            warn!(epic = %mapping.jira_issue_key, "mapped WBS element missing locally");
            return Ok(false);
        };

        element.name = issue.summary.clone();
        if issue.description.is_some() {
            element.description = issue.description.clone();
        }

        let mut updated = mapping.clone();
        updated.last_synced_at = Utc::now();
        updated.last_jira_updated = Some(issue.updated);
        self.mappings.update(&updated);

        info!(wbs = %element.wbs_code, epic = %mapping.jira_issue_key, "wbs pulled from jira");
        Ok(true)
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

fn epic_description(element: &WbsElement) -> String {
    let mut lines = vec![format!("*WBS Code:* {}", element.wbs_code)];
    if element.is_control_account {
        lines.push("*Control Account*".into());
    }
    if let Some(description) = &element.description {
        lines.push(String::new());
        lines.push(description.clone());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CreateIssue, JiraError, JiraIssue};
    use crate::log::{InMemorySyncLog, SyncStatus};
    use crate::store::{InMemoryIntegrationStore, InMemoryMappingStore, SyncDirection};
    use chrono::{DateTime, Duration};
    use evmsched_core::ProgramId;
    use std::cell::RefCell;

    /// Scripted Jira double: records calls, serves canned issues, and can
    /// fail on demand.
    #[derive(Default)]
    struct FakeJira {
        created: RefCell<Vec<String>>,
        updated: RefCell<Vec<String>>,
        issues: RefCell<BTreeMap<String, JiraIssue>>,
        fail_on: RefCell<Option<String>>,
        counter: RefCell<u32>,
    }

    impl FakeJira {
        fn put_issue(&self, issue: JiraIssue) {
            self.issues.borrow_mut().insert(issue.key.clone(), issue);
        }

        fn fail_on(&self, summary: &str) {
            *self.fail_on.borrow_mut() = Some(summary.to_owned());
        }

        fn make_issue(&self, project_key: &str, summary: &str) -> JiraIssue {
            let mut counter = self.counter.borrow_mut();
            *counter += 1;
            JiraIssue {
                key: format!("{project_key}-{counter}"),
                id: format!("1000{counter}"),
                summary: summary.to_owned(),
                description: None,
                status: "To Do".into(),
                project_key: project_key.to_owned(),
                updated: Utc::now(),
            }
        }
    }

    impl JiraClient for FakeJira {
        fn create_epic(
            &self,
            project_key: &str,
            summary: &str,
            _description: &str,
        ) -> Result<JiraIssue, JiraError> {
            if self.fail_on.borrow().as_deref() == Some(summary) {
                return Err(JiraError::Transport("connection reset".into()));
            }
            let issue = self.make_issue(project_key, summary);
            self.created.borrow_mut().push(summary.to_owned());
            self.put_issue(issue.clone());
            Ok(issue)
        }

        fn create_issue(&self, request: &CreateIssue<'_>) -> Result<JiraIssue, JiraError> {
            let issue = self.make_issue(request.project_key, request.summary);
            self.created.borrow_mut().push(request.summary.to_owned());
            self.put_issue(issue.clone());
            Ok(issue)
        }

        fn update_issue(
            &self,
            issue_key: &str,
            summary: &str,
            _description: &str,
        ) -> Result<(), JiraError> {
            if self.fail_on.borrow().as_deref() == Some(summary) {
                return Err(JiraError::Transport("connection reset".into()));
            }
            self.updated.borrow_mut().push(issue_key.to_owned());
            Ok(())
        }

        fn get_issue(&self, issue_key: &str) -> Result<JiraIssue, JiraError> {
            self.issues
                .borrow()
                .get(issue_key)
                .cloned()
                .ok_or_else(|| JiraError::IssueNotFound(issue_key.to_owned()))
        }

        fn transition_issue(&self, _issue_key: &str, _target: &str) -> Result<(), JiraError> {
            Ok(())
        }
    }

    struct Fixture {
        jira: FakeJira,
        integrations: InMemoryIntegrationStore,
        mappings: InMemoryMappingStore,
        log: InMemorySyncLog,
        integration_id: IntegrationId,
        program: ProgramId,
    }

    impl Fixture {
        fn new() -> Self {
            let program = ProgramId::new();
            let integration = JiraIntegration::new(program, "DPM");
            let integration_id = integration.id;
            Self {
                jira: FakeJira::default(),
                integrations: InMemoryIntegrationStore::with(integration),
                mappings: InMemoryMappingStore::new(),
                log: InMemorySyncLog::new(),
                integration_id,
                program,
            }
        }

        fn service(&mut self) -> WbsSyncService<'_> {
            WbsSyncService {
                client: &self.jira,
                integrations: &mut self.integrations,
                mappings: &mut self.mappings,
                log: &mut self.log,
            }
        }

        fn tree(&self) -> Vec<WbsElement> {
            let root = WbsElement::root(self.program, "1", "Air Vehicle", "1");
            let child = WbsElement::child_of(&root, "1.1", "Airframe", "1");
            let deep = WbsElement::child_of(&child, "1.1.1", "Wing Box", "1");
            vec![root, child, deep]
        }
    }

    #[test]
    fn push_creates_epics_for_shallow_levels_only() {
        let mut fixture = Fixture::new();
        let elements = fixture.tree();
        let integration_id = fixture.integration_id;

        let report = fixture.service().push(integration_id, &elements).unwrap();

        assert!(report.success);
        assert_eq!(report.items_synced, 2);
        assert_eq!(report.created_mappings.len(), 2);
        // level-3 node stays local
        assert_eq!(fixture.mappings.len(), 2);
        assert_eq!(fixture.jira.created.borrow().len(), 2);
        assert_eq!(fixture.log.len(), 1);
        assert_eq!(fixture.log.entries()[0].status, SyncStatus::Success);
    }

    #[test]
    fn second_push_updates_instead_of_creating() {
        let mut fixture = Fixture::new();
        let elements = fixture.tree();
        let integration_id = fixture.integration_id;

        fixture.service().push(integration_id, &elements).unwrap();
        let report = fixture.service().push(integration_id, &elements).unwrap();

        assert!(report.success);
        assert_eq!(report.created_mappings.len(), 0);
        assert_eq!(report.updated_mappings.len(), 2);
        // still the same two epics
        assert_eq!(fixture.mappings.len(), 2);
        assert_eq!(fixture.jira.created.borrow().len(), 2);
        assert_eq!(fixture.jira.updated.borrow().len(), 2);
    }

    #[test]
    fn from_jira_mappings_are_skipped_on_push() {
        let mut fixture = Fixture::new();
        let elements = fixture.tree();
        let integration_id = fixture.integration_id;
        fixture.mappings.insert(
            JiraMapping::for_wbs(integration_id, elements[0].id, "DPM-77", "900", Utc::now())
                .direction(SyncDirection::FromJira),
        );

        let report = fixture.service().push(integration_id, &elements).unwrap();

        // only the level-2 child was created; the root was skipped
        assert_eq!(report.items_synced, 1);
        assert_eq!(report.created_mappings.len(), 1);
        assert!(fixture.jira.updated.borrow().is_empty());
    }

    #[test]
    fn item_failure_produces_partial_batch() {
        let mut fixture = Fixture::new();
        let elements = fixture.tree();
        let integration_id = fixture.integration_id;
        fixture.jira.fail_on("Air Vehicle");

        let report = fixture.service().push(integration_id, &elements).unwrap();

        assert!(report.success, "partial batches still succeed overall");
        assert_eq!(report.items_synced, 1);
        assert_eq!(report.items_failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(fixture.log.entries()[0].status, SyncStatus::Partial);
        assert!(fixture.log.entries()[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("WBS 1"));
    }

    #[test]
    fn disabled_integration_refuses_push() {
        let mut fixture = Fixture::new();
        let integration = fixture.integrations.get(fixture.integration_id).unwrap();
        fixture.integrations.upsert(integration.disabled());
        let elements = fixture.tree();
        let integration_id = fixture.integration_id;

        let err = fixture.service().push(integration_id, &elements).unwrap_err();
        assert!(matches!(err, SyncError::SyncDisabled(_)));
    }

    #[test]
    fn unknown_integration_errors() {
        let mut fixture = Fixture::new();
        let elements = fixture.tree();
        let err = fixture
            .service()
            .push(IntegrationId::new(), &elements)
            .unwrap_err();
        assert!(matches!(err, SyncError::IntegrationNotFound(_)));
    }

    fn dated(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    #[test]
    fn pull_applies_newer_jira_changes() {
        let mut fixture = Fixture::new();
        let elements = fixture.tree();
        let integration_id = fixture.integration_id;
        let root_id = elements[0].id;

        let mapping = JiraMapping::for_wbs(integration_id, root_id, "DPM-5", "905", Utc::now())
            .jira_updated(dated("2026-03-01T00:00:00Z"));
        fixture.mappings.insert(mapping);
        fixture.jira.put_issue(JiraIssue {
            key: "DPM-5".into(),
            id: "905".into(),
            summary: "Air Vehicle (revised)".into(),
            description: Some("Scope updated".into()),
            status: "In Progress".into(),
            project_key: "DPM".into(),
            updated: dated("2026-03-02T00:00:00Z"),
        });

        let mut local: BTreeMap<WbsId, WbsElement> =
            elements.into_iter().map(|e| (e.id, e)).collect();
        let report = fixture
            .service()
            .pull(integration_id, &mut local, None)
            .unwrap();

        assert!(report.success);
        assert_eq!(report.updated_mappings.len(), 1);
        assert_eq!(local[&root_id].name, "Air Vehicle (revised)");
        assert_eq!(local[&root_id].description.as_deref(), Some("Scope updated"));
        // mapping timestamp advanced to Jira's value
        let mapping = fixture.mappings.by_wbs(integration_id, root_id).unwrap();
        assert_eq!(
            mapping.last_jira_updated,
            Some(dated("2026-03-02T00:00:00Z"))
        );
    }

    #[test]
    fn pull_is_noop_when_jira_is_stale() {
        let mut fixture = Fixture::new();
        let elements = fixture.tree();
        let integration_id = fixture.integration_id;
        let root_id = elements[0].id;
        let original_name = elements[0].name.clone();

        fixture.mappings.insert(
            JiraMapping::for_wbs(integration_id, root_id, "DPM-5", "905", Utc::now())
                .jira_updated(dated("2026-03-02T00:00:00Z")),
        );
        fixture.jira.put_issue(JiraIssue {
            key: "DPM-5".into(),
            id: "905".into(),
            summary: "Old name".into(),
            description: None,
            status: "To Do".into(),
            project_key: "DPM".into(),
            updated: dated("2026-03-02T00:00:00Z") - Duration::hours(1),
        });

        let mut local: BTreeMap<WbsId, WbsElement> =
            elements.into_iter().map(|e| (e.id, e)).collect();
        let report = fixture
            .service()
            .pull(integration_id, &mut local, None)
            .unwrap();

        assert_eq!(report.updated_mappings.len(), 0);
        assert_eq!(report.items_synced, 1);
        assert_eq!(local[&root_id].name, original_name);
    }

    #[test]
    fn every_operation_writes_one_log_record() {
        let mut fixture = Fixture::new();
        let elements = fixture.tree();
        let integration_id = fixture.integration_id;

        fixture.service().push(integration_id, &elements).unwrap();
        let mut local: BTreeMap<WbsId, WbsElement> =
            elements.into_iter().map(|e| (e.id, e)).collect();
        fixture
            .service()
            .pull(integration_id, &mut local, None)
            .unwrap();

        let entries = fixture.log.by_integration(integration_id, None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sync_type, SyncType::Push);
        assert_eq!(entries[1].sync_type, SyncType::Pull);
    }
}
