//! # evmsched-core
//!
//! Core domain model for the evmsched program-management engine.
//!
//! This crate provides:
//! - Identifier newtypes ([`ProgramId`], [`ActivityId`], ...)
//! - Domain entities: [`Program`], [`WbsElement`], [`Activity`], [`Dependency`],
//!   [`Resource`], [`Assignment`]
//! - The working-day calendar ([`WorkCalendar`])
//! - EVMS reporting periods and the management-reserve log
//! - Shared error types
//!
//! All monetary values are fixed-point decimals (`rust_decimal::Decimal`),
//! all durations are non-negative whole working days, and all entities are
//! identified by opaque 128-bit identifiers.
//!
//! ## Example
//!
//! ```rust
//! use evmsched_core::{Activity, ConstraintKind, ProgramId, WbsId};
//!
//! let program = ProgramId::new();
//! let wbs = WbsId::new();
//! let design = Activity::new(program, wbs, "A-100", "Preliminary Design").duration(10);
//! let review = Activity::new(program, wbs, "A-110", "Design Review").milestone();
//!
//! assert_eq!(review.duration_days, 0);
//! assert_eq!(design.constraint, ConstraintKind::AsSoonAsPossible);
//! ```

pub mod calendar;
pub mod evms;

mod entities;
mod error;
mod ids;

pub use calendar::WorkCalendar;
pub use entities::{
    Activity, Assignment, ConstraintKind, Dependency, DependencyKind, Program, ProgramStatus,
    Resource, ResourceKind, WbsElement,
};
pub use error::DomainError;
pub use evms::{EvmsPeriod, MrLogEntry, PeriodData};
pub use ids::{
    ActivityId, AssignmentId, DependencyId, IntegrationId, MappingId, PeriodId, ProgramId,
    ResourceId, WbsId,
};

/// Convenience alias used throughout the workspace.
pub type DomainResult<T> = Result<T, DomainError>;
