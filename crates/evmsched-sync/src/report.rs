//! Shared sync result and error types.

use evmsched_core::{IntegrationId, MappingId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a sync item was classified against its mapping state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Skip,
}

/// Batch outcome. Item failures do not abort the batch: a mixed batch keeps
/// `success = true` with `items_failed > 0`; `success` is false only when
/// nothing succeeded.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub items_synced: u32,
    pub items_failed: u32,
    pub errors: Vec<String>,
    pub created_mappings: Vec<MappingId>,
    pub updated_mappings: Vec<MappingId>,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn new() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }
}

/// Batch-level failures; item-level failures live in the report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("integration {0} not found")]
    IntegrationNotFound(IntegrationId),

    #[error("sync is disabled for integration {0}")]
    SyncDisabled(IntegrationId),
}

/// Overall batch status from item counts: any failure with some success is
/// partial; all failures is failed.
pub(crate) fn batch_status(synced: u32, failed: u32) -> (bool, crate::log::SyncStatus) {
    if failed > 0 && synced > 0 {
        (true, crate::log::SyncStatus::Partial)
    } else if failed > 0 {
        (false, crate::log::SyncStatus::Failed)
    } else {
        (true, crate::log::SyncStatus::Success)
    }
}
