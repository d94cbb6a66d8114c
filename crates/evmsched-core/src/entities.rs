//! Domain entities: programs, WBS elements, activities, dependencies,
//! resources, and assignments.
//!
//! Entities are created through builder-style constructors and mutated only by
//! their owning service. Soft deletion is modeled with `deleted_at`; cascading
//! delete follows program ownership and is the write path's responsibility.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{
    ActivityId, AssignmentId, DependencyId, ProgramId, ResourceId, WbsId,
};

// ============================================================================
// Program
// ============================================================================

/// Lifecycle status of a program.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    #[default]
    Planning,
    Active,
    Complete,
    OnHold,
}

/// A contract program: the root of ownership for WBS elements, activities,
/// dependencies, reporting periods, MR logs, and Jira mappings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    /// Opaque principal that owns the program (identity is external).
    pub owner: String,
    /// Contract code, e.g. `FA8750-26-C-0012`.
    pub code: String,
    pub name: String,
    pub status: ProgramStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Budget At Completion for the whole program.
    pub budget_at_completion: Decimal,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Program {
    pub fn new(
        owner: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: ProgramId::new(),
            owner: owner.into(),
            code: code.into(),
            name: name.into(),
            status: ProgramStatus::Planning,
            start_date,
            end_date,
            budget_at_completion: Decimal::ZERO,
            deleted_at: None,
        }
    }

    pub fn budget(mut self, bac: Decimal) -> Self {
        self.budget_at_completion = bac;
        self
    }

    pub fn status(mut self, status: ProgramStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// ============================================================================
// WBS
// ============================================================================

/// A node in the Work Breakdown Structure.
///
/// The hierarchy is carried both by `parent` and by the materialized `path`
/// (dot-delimited labels, e.g. `1.2.3`); `level` equals the path depth with
/// the root at 1. Paths are unique inside a program.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WbsElement {
    pub id: WbsId,
    pub program_id: ProgramId,
    pub parent: Option<WbsId>,
    pub wbs_code: String,
    pub name: String,
    pub description: Option<String>,
    /// Materialized path, e.g. `1.2.3`.
    pub path: String,
    /// Depth in the tree; root elements are level 1.
    pub level: u32,
    pub budget_at_completion: Decimal,
    pub is_control_account: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl WbsElement {
    /// Create a root element (level 1).
    pub fn root(
        program_id: ProgramId,
        wbs_code: impl Into<String>,
        name: impl Into<String>,
        path_label: impl Into<String>,
    ) -> Self {
        Self {
            id: WbsId::new(),
            program_id,
            parent: None,
            wbs_code: wbs_code.into(),
            name: name.into(),
            description: None,
            path: path_label.into(),
            level: 1,
            budget_at_completion: Decimal::ZERO,
            is_control_account: false,
            deleted_at: None,
        }
    }

    /// Create a child element under `parent`, extending its materialized path.
    pub fn child_of(
        parent: &WbsElement,
        wbs_code: impl Into<String>,
        name: impl Into<String>,
        path_label: impl Into<String>,
    ) -> Self {
        Self {
            id: WbsId::new(),
            program_id: parent.program_id,
            parent: Some(parent.id),
            wbs_code: wbs_code.into(),
            name: name.into(),
            description: None,
            path: format!("{}.{}", parent.path, path_label.into()),
            level: parent.level + 1,
            budget_at_completion: Decimal::ZERO,
            is_control_account: false,
            deleted_at: None,
        }
    }

    pub fn budget(mut self, bac: Decimal) -> Self {
        self.budget_at_completion = bac;
        self
    }

    pub fn control_account(mut self) -> Self {
        self.is_control_account = true;
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// True when `self` sits underneath `other` in the tree.
    pub fn is_descendant_of(&self, other: &WbsElement) -> bool {
        self.program_id == other.program_id
            && self.path.len() > other.path.len()
            && self.path.starts_with(&other.path)
            && self.path.as_bytes()[other.path.len()] == b'.'
    }

    /// Level must always equal the materialized path depth.
    pub fn validate(&self) -> Result<(), DomainError> {
        let depth = self.path.split('.').count() as u32;
        if depth != self.level {
            return Err(DomainError::validation(format!(
                "WBS {} level {} does not match path depth {}",
                self.wbs_code, self.level, depth
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Activity
// ============================================================================

/// Schedule constraint on an activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    #[default]
    #[serde(rename = "asap")]
    AsSoonAsPossible,
    #[serde(rename = "alap")]
    AsLateAsPossible,
    #[serde(rename = "snet")]
    StartNoEarlierThan,
    #[serde(rename = "snlt")]
    StartNoLaterThan,
    #[serde(rename = "fnet")]
    FinishNoEarlierThan,
    #[serde(rename = "fnlt")]
    FinishNoLaterThan,
}

impl ConstraintKind {
    /// Whether the constraint needs an accompanying date to mean anything.
    pub fn requires_date(self) -> bool {
        !matches!(
            self,
            ConstraintKind::AsSoonAsPossible | ConstraintKind::AsLateAsPossible
        )
    }
}

/// A schedulable unit of work inside one WBS element.
///
/// The CPM fields (`early_*`, `late_*`, floats, `is_critical`) are outputs of
/// the solver, written back by the scheduling service; they are `None` until
/// the first calculation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub program_id: ProgramId,
    pub wbs_id: WbsId,
    /// Unique per program.
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Duration in whole working days, >= 0. Milestones are always 0.
    pub duration_days: i64,
    pub planned_start: Option<NaiveDate>,
    pub planned_finish: Option<NaiveDate>,
    pub actual_start: Option<NaiveDate>,
    pub actual_finish: Option<NaiveDate>,
    pub early_start: Option<NaiveDate>,
    pub early_finish: Option<NaiveDate>,
    pub late_start: Option<NaiveDate>,
    pub late_finish: Option<NaiveDate>,
    pub total_float: Option<i64>,
    pub free_float: Option<i64>,
    pub is_critical: bool,
    /// 0..=100.
    pub percent_complete: Decimal,
    pub is_milestone: bool,
    /// Budgeted cost of this activity at completion (its BCWS ceiling).
    pub budget_at_completion: Decimal,
    /// Actual cost of work performed to date.
    pub acwp_to_date: Decimal,
    pub constraint: ConstraintKind,
    pub constraint_date: Option<NaiveDate>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Activity {
    pub fn new(
        program_id: ProgramId,
        wbs_id: WbsId,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: ActivityId::new(),
            program_id,
            wbs_id,
            code: code.into(),
            name: name.into(),
            description: None,
            duration_days: 0,
            planned_start: None,
            planned_finish: None,
            actual_start: None,
            actual_finish: None,
            early_start: None,
            early_finish: None,
            late_start: None,
            late_finish: None,
            total_float: None,
            free_float: None,
            is_critical: false,
            percent_complete: Decimal::ZERO,
            is_milestone: false,
            budget_at_completion: Decimal::ZERO,
            acwp_to_date: Decimal::ZERO,
            constraint: ConstraintKind::AsSoonAsPossible,
            constraint_date: None,
            deleted_at: None,
        }
    }

    pub fn duration(mut self, days: i64) -> Self {
        self.duration_days = days;
        self
    }

    /// Mark as a milestone; milestones always have zero duration.
    pub fn milestone(mut self) -> Self {
        self.is_milestone = true;
        self.duration_days = 0;
        self
    }

    pub fn budget(mut self, bac: Decimal) -> Self {
        self.budget_at_completion = bac;
        self
    }

    pub fn progress(mut self, percent: Decimal) -> Self {
        self.percent_complete = percent;
        self
    }

    pub fn constrained(mut self, kind: ConstraintKind, date: Option<NaiveDate>) -> Self {
        self.constraint = kind;
        self.constraint_date = date;
        self
    }

    pub fn planned(mut self, start: NaiveDate, finish: NaiveDate) -> Self {
        self.planned_start = Some(start);
        self.planned_finish = Some(finish);
        self
    }

    /// Validate the domain invariants the write path enforces.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.duration_days < 0 {
            return Err(DomainError::validation(format!(
                "activity {}: duration must be non-negative",
                self.code
            )));
        }
        if self.is_milestone && self.duration_days != 0 {
            return Err(DomainError::validation(format!(
                "activity {}: milestones must have zero duration",
                self.code
            )));
        }
        if self.percent_complete < Decimal::ZERO || self.percent_complete > Decimal::from(100) {
            return Err(DomainError::validation(format!(
                "activity {}: percent_complete must be within 0..=100",
                self.code
            )));
        }
        if let (Some(start), Some(finish)) = (self.planned_start, self.planned_finish) {
            if finish < start {
                return Err(DomainError::validation(format!(
                    "activity {}: planned finish precedes planned start",
                    self.code
                )));
            }
        }
        if self.constraint.requires_date() && self.constraint_date.is_none() {
            return Err(DomainError::validation(format!(
                "activity {}: constraint {:?} requires a date",
                self.code, self.constraint
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Dependency
// ============================================================================

/// The four precedence relation types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Finish-to-Start: successor starts after predecessor finishes.
    #[default]
    #[serde(rename = "FS")]
    FinishToStart,
    /// Start-to-Start: successor starts with/after predecessor starts.
    #[serde(rename = "SS")]
    StartToStart,
    /// Finish-to-Finish: successor finishes with/after predecessor finishes.
    #[serde(rename = "FF")]
    FinishToFinish,
    /// Start-to-Finish: successor finishes with/after predecessor starts.
    #[serde(rename = "SF")]
    StartToFinish,
}

impl DependencyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::FinishToStart => "FS",
            DependencyKind::StartToStart => "SS",
            DependencyKind::FinishToFinish => "FF",
            DependencyKind::StartToFinish => "SF",
        }
    }
}

/// A typed, lagged precedence edge between two activities of one program.
///
/// Negative lag is lead time. The write path must reject self-loops,
/// duplicate ordered pairs, and edges that would close a cycle; the solver
/// assumes acyclic input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,
    pub program_id: ProgramId,
    pub predecessor_id: ActivityId,
    pub successor_id: ActivityId,
    pub kind: DependencyKind,
    /// Working days; negative values are leads.
    pub lag_days: i64,
}

impl Dependency {
    pub fn new(
        program_id: ProgramId,
        predecessor_id: ActivityId,
        successor_id: ActivityId,
        kind: DependencyKind,
    ) -> Self {
        Self {
            id: DependencyId::new(),
            program_id,
            predecessor_id,
            successor_id,
            kind,
            lag_days: 0,
        }
    }

    pub fn lag(mut self, days: i64) -> Self {
        self.lag_days = days;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.predecessor_id == self.successor_id {
            return Err(DomainError::validation(
                "dependency cannot link an activity to itself",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Resource & Assignment
// ============================================================================

/// Resource category; materials consume inventory rather than daily capacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Labor,
    Equipment,
    Material,
}

/// A person, machine, or material pool assignable to activities.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub program_id: ProgramId,
    pub code: String,
    pub name: String,
    pub kind: ResourceKind,
    /// Hours per day for labor/equipment, quantity per day for material.
    pub capacity_per_day: Decimal,
    /// Cost per hour (labor/equipment).
    pub cost_rate: Decimal,
    /// Material inventory on hand.
    pub quantity_available: Option<Decimal>,
    pub quantity_unit: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn new(
        program_id: ProgramId,
        code: impl Into<String>,
        name: impl Into<String>,
        kind: ResourceKind,
    ) -> Self {
        Self {
            id: ResourceId::new(),
            program_id,
            code: code.into(),
            name: name.into(),
            kind,
            capacity_per_day: Decimal::from(8),
            cost_rate: Decimal::ZERO,
            quantity_available: None,
            quantity_unit: None,
            unit_cost: None,
            is_active: true,
            deleted_at: None,
        }
    }

    pub fn capacity(mut self, per_day: Decimal) -> Self {
        self.capacity_per_day = per_day;
        self
    }

    pub fn rate(mut self, per_hour: Decimal) -> Self {
        self.cost_rate = per_hour;
        self
    }

    pub fn inventory(mut self, available: Decimal, unit: impl Into<String>, unit_cost: Decimal) -> Self {
        self.quantity_available = Some(available);
        self.quantity_unit = Some(unit.into());
        self.unit_cost = Some(unit_cost);
        self
    }

    /// Material resources never contribute to daily capacity loading.
    pub fn loads_capacity(&self) -> bool {
        !matches!(self.kind, ResourceKind::Material)
    }
}

/// Links an activity to a resource.
///
/// For labor/equipment, `units` is the assigned fraction of the resource's
/// daily capacity (1.0 = full). For material, `quantity_assigned` and
/// `quantity_consumed` track inventory instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub activity_id: ActivityId,
    pub resource_id: ResourceId,
    pub units: Decimal,
    pub quantity_assigned: Option<Decimal>,
    pub quantity_consumed: Option<Decimal>,
    pub planned_hours: Option<Decimal>,
    pub actual_hours: Option<Decimal>,
    pub planned_cost: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
}

impl Assignment {
    pub fn new(activity_id: ActivityId, resource_id: ResourceId, units: Decimal) -> Self {
        Self {
            id: AssignmentId::new(),
            activity_id,
            resource_id,
            units,
            quantity_assigned: None,
            quantity_consumed: None,
            planned_hours: None,
            actual_hours: None,
            planned_cost: None,
            actual_cost: None,
        }
    }

    pub fn material(mut self, assigned: Decimal) -> Self {
        self.quantity_assigned = Some(assigned);
        self.quantity_consumed = Some(Decimal::ZERO);
        self
    }
}
