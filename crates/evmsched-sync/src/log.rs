//! Append-only sync audit log.
//!
//! Every sync operation — push, pull, webhook, progress — emits exactly one
//! record, including the ignore paths. Records are never mutated or deleted;
//! a failed operation is captured, not suppressed.

use chrono::{DateTime, Utc};
use evmsched_core::{IntegrationId, MappingId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Push,
    Pull,
    Webhook,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Partial,
    Failed,
}

/// One audit record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: Uuid,
    pub integration_id: IntegrationId,
    pub mapping_id: Option<MappingId>,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub items_synced: u32,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl SyncLogEntry {
    pub fn new(
        integration_id: IntegrationId,
        sync_type: SyncType,
        status: SyncStatus,
        items_synced: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            integration_id,
            mapping_id: None,
            sync_type,
            status,
            items_synced,
            error_message: None,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn mapping(mut self, mapping_id: MappingId) -> Self {
        self.mapping_id = Some(mapping_id);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Append-only store; queries by integration/time-range and by mapping.
pub trait SyncLogStore {
    fn append(&mut self, entry: SyncLogEntry);

    fn by_integration(
        &self,
        integration: IntegrationId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Vec<SyncLogEntry>;

    fn by_mapping(&self, mapping: MappingId) -> Vec<SyncLogEntry>;
}

/// In-memory append-only log. Insertion order is preserved; a single
/// origin's sequence is never reordered.
#[derive(Debug, Default)]
pub struct InMemorySyncLog {
    entries: Vec<SyncLogEntry>,
}

impl InMemorySyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SyncLogEntry] {
        &self.entries
    }
}

impl SyncLogStore for InMemorySyncLog {
    fn append(&mut self, entry: SyncLogEntry) {
        self.entries.push(entry);
    }

    fn by_integration(
        &self,
        integration: IntegrationId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Vec<SyncLogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.integration_id == integration)
            .filter(|entry| {
                range.map_or(true, |(from, to)| {
                    entry.timestamp >= from && entry.timestamp <= to
                })
            })
            .cloned()
            .collect()
    }

    fn by_mapping(&self, mapping: MappingId) -> Vec<SyncLogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.mapping_id == Some(mapping))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn append_preserves_order() {
        let integration = IntegrationId::new();
        let mut log = InMemorySyncLog::new();
        for count in 0..4 {
            log.append(SyncLogEntry::new(
                integration,
                SyncType::Push,
                SyncStatus::Success,
                count,
            ));
        }
        let entries = log.by_integration(integration, None);
        let counts: Vec<u32> = entries.iter().map(|e| e.items_synced).collect();
        assert_eq!(counts, vec![0, 1, 2, 3]);
    }

    #[test]
    fn time_range_filters() {
        let integration = IntegrationId::new();
        let mut log = InMemorySyncLog::new();
        let mut old = SyncLogEntry::new(integration, SyncType::Pull, SyncStatus::Success, 1);
        old.timestamp = Utc::now() - Duration::days(30);
        log.append(old);
        log.append(SyncLogEntry::new(
            integration,
            SyncType::Pull,
            SyncStatus::Success,
            2,
        ));

        let recent = log.by_integration(
            integration,
            Some((Utc::now() - Duration::days(1), Utc::now() + Duration::days(1))),
        );
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].items_synced, 2);
    }

    #[test]
    fn by_mapping_selects_tagged_entries() {
        let integration = IntegrationId::new();
        let mapping = MappingId::new();
        let mut log = InMemorySyncLog::new();
        log.append(
            SyncLogEntry::new(integration, SyncType::Webhook, SyncStatus::Success, 1)
                .mapping(mapping),
        );
        log.append(SyncLogEntry::new(
            integration,
            SyncType::Webhook,
            SyncStatus::Failed,
            0,
        ));

        assert_eq!(log.by_mapping(mapping).len(), 1);
        assert_eq!(log.by_mapping(MappingId::new()).len(), 0);
    }

    #[test]
    fn failed_operations_are_recorded() {
        let integration = IntegrationId::new();
        let mut log = InMemorySyncLog::new();
        log.append(
            SyncLogEntry::new(integration, SyncType::Push, SyncStatus::Failed, 0)
                .error("transport timeout")
                .duration(125),
        );

        let entries = log.by_integration(integration, None);
        assert_eq!(entries[0].status, SyncStatus::Failed);
        assert_eq!(entries[0].error_message.as_deref(), Some("transport timeout"));
        assert_eq!(entries[0].duration_ms, 125);
    }
}
