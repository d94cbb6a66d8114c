//! Jira integrations, entity mappings, and their stores.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use evmsched_core::{ActivityId, DomainError, IntegrationId, MappingId, ProgramId, WbsId};
use serde::{Deserialize, Serialize};

/// Which local entity a mapping points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Wbs,
    Activity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    ToJira,
    FromJira,
    Bidirectional,
}

impl SyncDirection {
    /// May local changes be pushed to Jira?
    pub fn allows_push(self) -> bool {
        matches!(self, SyncDirection::ToJira | SyncDirection::Bidirectional)
    }

    /// May Jira changes be pulled into the local entity?
    pub fn allows_pull(self) -> bool {
        matches!(self, SyncDirection::FromJira | SyncDirection::Bidirectional)
    }
}

/// Connection between one program and one Jira project.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JiraIntegration {
    pub id: IntegrationId,
    pub program_id: ProgramId,
    pub project_key: String,
    pub sync_enabled: bool,
    /// Webhook HMAC secret; verification is bypassed when unset.
    pub webhook_secret: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl JiraIntegration {
    pub fn new(program_id: ProgramId, project_key: impl Into<String>) -> Self {
        Self {
            id: IntegrationId::new(),
            program_id,
            project_key: project_key.into(),
            sync_enabled: true,
            webhook_secret: None,
            last_sync_at: None,
        }
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.sync_enabled = false;
        self
    }
}

/// Mapping between one local entity and one Jira issue. Exactly one of
/// `wbs_id` / `activity_id` is set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JiraMapping {
    pub id: MappingId,
    pub integration_id: IntegrationId,
    pub entity_kind: EntityKind,
    pub wbs_id: Option<WbsId>,
    pub activity_id: Option<ActivityId>,
    pub jira_issue_key: String,
    pub jira_issue_id: String,
    pub sync_direction: SyncDirection,
    pub last_synced_at: DateTime<Utc>,
    /// Jira's `updated` at the last observed state; last-write-wins anchor.
    pub last_jira_updated: Option<DateTime<Utc>>,
}

impl JiraMapping {
    pub fn for_wbs(
        integration_id: IntegrationId,
        wbs_id: WbsId,
        issue_key: impl Into<String>,
        issue_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MappingId::new(),
            integration_id,
            entity_kind: EntityKind::Wbs,
            wbs_id: Some(wbs_id),
            activity_id: None,
            jira_issue_key: issue_key.into(),
            jira_issue_id: issue_id.into(),
            sync_direction: SyncDirection::Bidirectional,
            last_synced_at: now,
            last_jira_updated: None,
        }
    }

    pub fn for_activity(
        integration_id: IntegrationId,
        activity_id: ActivityId,
        issue_key: impl Into<String>,
        issue_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MappingId::new(),
            integration_id,
            entity_kind: EntityKind::Activity,
            wbs_id: None,
            activity_id: Some(activity_id),
            jira_issue_key: issue_key.into(),
            jira_issue_id: issue_id.into(),
            sync_direction: SyncDirection::Bidirectional,
            last_synced_at: now,
            last_jira_updated: None,
        }
    }

    pub fn direction(mut self, direction: SyncDirection) -> Self {
        self.sync_direction = direction;
        self
    }

    pub fn jira_updated(mut self, updated: DateTime<Utc>) -> Self {
        self.last_jira_updated = Some(updated);
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match (self.entity_kind, self.wbs_id.is_some(), self.activity_id.is_some()) {
            (EntityKind::Wbs, true, false) | (EntityKind::Activity, false, true) => Ok(()),
            _ => Err(DomainError::validation(
                "mapping must reference exactly one of wbs_id / activity_id",
            )),
        }
    }
}

/// Integration lookups.
pub trait IntegrationStore {
    fn get(&self, id: IntegrationId) -> Option<JiraIntegration>;
    fn by_project_key(&self, project_key: &str) -> Option<JiraIntegration>;
    fn upsert(&mut self, integration: JiraIntegration);
}

/// Mapping persistence. Mappings are hard-deleted when their Jira issue is
/// deleted; there is no soft-delete path.
pub trait MappingStore {
    fn insert(&mut self, mapping: JiraMapping);
    /// Replace by ID; false when absent.
    fn update(&mut self, mapping: &JiraMapping) -> bool;
    /// Hard delete; false when already absent (idempotent).
    fn remove_by_issue_key(&mut self, issue_key: &str) -> bool;
    fn by_wbs(&self, integration: IntegrationId, wbs: WbsId) -> Option<JiraMapping>;
    fn by_activity(&self, integration: IntegrationId, activity: ActivityId)
        -> Option<JiraMapping>;
    fn by_issue_key(&self, issue_key: &str) -> Option<JiraMapping>;
    fn by_integration(
        &self,
        integration: IntegrationId,
        kind: Option<EntityKind>,
    ) -> Vec<JiraMapping>;
}

/// In-memory integration store.
#[derive(Debug, Default)]
pub struct InMemoryIntegrationStore {
    integrations: BTreeMap<IntegrationId, JiraIntegration>,
}

impl InMemoryIntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(integration: JiraIntegration) -> Self {
        let mut store = Self::new();
        store.upsert(integration);
        store
    }
}

impl IntegrationStore for InMemoryIntegrationStore {
    fn get(&self, id: IntegrationId) -> Option<JiraIntegration> {
        self.integrations.get(&id).cloned()
    }

    fn by_project_key(&self, project_key: &str) -> Option<JiraIntegration> {
        self.integrations
            .values()
            .find(|integration| integration.project_key == project_key)
            .cloned()
    }

    fn upsert(&mut self, integration: JiraIntegration) {
        self.integrations.insert(integration.id, integration);
    }
}

/// In-memory mapping store.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    mappings: BTreeMap<MappingId, JiraMapping>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl MappingStore for InMemoryMappingStore {
    fn insert(&mut self, mapping: JiraMapping) {
        self.mappings.insert(mapping.id, mapping);
    }

    fn update(&mut self, mapping: &JiraMapping) -> bool {
        if self.mappings.contains_key(&mapping.id) {
            self.mappings.insert(mapping.id, mapping.clone());
            true
        } else {
            false
        }
    }

    fn remove_by_issue_key(&mut self, issue_key: &str) -> bool {
        let found = self
            .mappings
            .values()
            .find(|m| m.jira_issue_key == issue_key)
            .map(|m| m.id);
        match found {
            Some(id) => self.mappings.remove(&id).is_some(),
            None => false,
        }
    }

    fn by_wbs(&self, integration: IntegrationId, wbs: WbsId) -> Option<JiraMapping> {
        self.mappings
            .values()
            .find(|m| m.integration_id == integration && m.wbs_id == Some(wbs))
            .cloned()
    }

    fn by_activity(
        &self,
        integration: IntegrationId,
        activity: ActivityId,
    ) -> Option<JiraMapping> {
        self.mappings
            .values()
            .find(|m| m.integration_id == integration && m.activity_id == Some(activity))
            .cloned()
    }

    fn by_issue_key(&self, issue_key: &str) -> Option<JiraMapping> {
        self.mappings
            .values()
            .find(|m| m.jira_issue_key == issue_key)
            .cloned()
    }

    fn by_integration(
        &self,
        integration: IntegrationId,
        kind: Option<EntityKind>,
    ) -> Vec<JiraMapping> {
        self.mappings
            .values()
            .filter(|m| m.integration_id == integration)
            .filter(|m| kind.map_or(true, |k| m.entity_kind == k))
            .cloned()
            .collect()
    }
}
