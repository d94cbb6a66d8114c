//! # evmsched-sync
//!
//! Bidirectional Jira synchronization: WBS elements map to Epics, activities
//! to Issues. Pushes classify each item as create/update/skip from its
//! mapping state; pulls apply last-write-wins using Jira's own `updated`
//! timestamp; inbound webhooks are HMAC-verified and processed through the
//! same pull logic. Every operation, including ignores, writes exactly one
//! append-only audit-log record.
//!
//! The Jira HTTP layer is out of scope: [`client::JiraClient`] is the seam,
//! and the stores are trait-backed with in-memory implementations.

pub mod activity;
pub mod client;
pub mod log;
pub mod store;
pub mod wbs;
pub mod webhook;

mod report;

pub use client::{CreateIssue, JiraClient, JiraError, JiraIssue};
pub use log::{InMemorySyncLog, SyncLogEntry, SyncLogStore, SyncStatus, SyncType};
pub use report::{SyncAction, SyncError, SyncReport};
pub use store::{
    EntityKind, InMemoryIntegrationStore, InMemoryMappingStore, IntegrationStore, JiraIntegration,
    JiraMapping, MappingStore, SyncDirection,
};
