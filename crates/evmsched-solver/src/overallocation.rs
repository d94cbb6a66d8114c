//! Over-allocation detection and period merging.
//!
//! A working day is over-allocated when assigned hours exceed capacity *and*
//! at least two distinct activities contribute — a single over-assigned
//! activity is a data problem, not a leveling conflict. Consecutive
//! over-allocated working days coalesce into one period carrying the peak
//! excess, the date it occurred, and the union of contributing activities.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use evmsched_core::{ActivityId, ProgramId, ResourceId, WorkCalendar};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::loading::{resource_loading, DayLoading};
use crate::snapshot::ScheduleSnapshot;

/// Severity by peak excess hours: low <= 2h < medium <= 4h < high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

impl ConflictSeverity {
    pub fn from_excess(excess: Decimal) -> Self {
        if excess <= Decimal::from(2) {
            ConflictSeverity::Low
        } else if excess <= Decimal::from(4) {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::High
        }
    }
}

/// A merged run of over-allocated working days for one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallocationPeriod {
    pub resource_id: ResourceId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Max of (assigned - capacity) across the span.
    pub peak_excess: Decimal,
    /// Date where the peak occurred.
    pub peak_date: NaiveDate,
    /// Union of contributing activity IDs, ascending.
    pub affected_activities: Vec<ActivityId>,
    pub severity: ConflictSeverity,
}

/// Program-level over-allocation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallocationReport {
    pub program_id: ProgramId,
    pub periods: Vec<OverallocationPeriod>,
    pub total_periods: usize,
    /// True when any affected activity is on the critical path.
    pub critical_path_affected: bool,
    pub has_high_severity: bool,
}

/// Detect merged over-allocation periods for one resource.
pub fn detect_resource_overallocations(
    snapshot: &ScheduleSnapshot,
    calendar: &WorkCalendar,
    resource_id: ResourceId,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<OverallocationPeriod> {
    let loading = resource_loading(snapshot, calendar, resource_id, from, to);
    merge_periods(resource_id, calendar, &loading.days)
}

fn day_conflicts(day: &DayLoading) -> bool {
    if !day.is_overallocated() {
        return false;
    }
    let distinct: BTreeSet<ActivityId> = day.contributors.iter().map(|(id, _)| *id).collect();
    distinct.len() >= 2
}

fn merge_periods(
    resource_id: ResourceId,
    calendar: &WorkCalendar,
    days: &[DayLoading],
) -> Vec<OverallocationPeriod> {
    struct Open {
        start: NaiveDate,
        end: NaiveDate,
        peak_excess: Decimal,
        peak_date: NaiveDate,
        activities: BTreeSet<ActivityId>,
    }

    let mut periods = Vec::new();
    let mut open: Option<Open> = None;

    let close = |open: Option<Open>, periods: &mut Vec<OverallocationPeriod>| {
        if let Some(o) = open {
            periods.push(OverallocationPeriod {
                resource_id,
                start: o.start,
                end: o.end,
                peak_excess: o.peak_excess,
                peak_date: o.peak_date,
                affected_activities: o.activities.into_iter().collect(),
                severity: ConflictSeverity::from_excess(o.peak_excess),
            });
        }
    };

    for day in days {
        if !day_conflicts(day) {
            close(open.take(), &mut periods);
            continue;
        }

        let excess = day.excess();
        let contributing = day.contributors.iter().map(|(id, _)| *id);
        match &mut open {
            // Contiguous when this day is the next working day after the span.
            Some(o) if calendar.add_working_days(o.end, 1) == day.date => {
                o.end = day.date;
                if excess > o.peak_excess {
                    o.peak_excess = excess;
                    o.peak_date = day.date;
                }
                o.activities.extend(contributing);
            }
            _ => {
                close(open.take(), &mut periods);
                open = Some(Open {
                    start: day.date,
                    end: day.date,
                    peak_excess: excess,
                    peak_date: day.date,
                    activities: contributing.collect(),
                });
            }
        }
    }
    close(open, &mut periods);
    periods
}

/// Aggregate over-allocation periods for every capacity-loading resource of
/// the program (or the `targets` subset).
pub fn detect_program_overallocations(
    snapshot: &ScheduleSnapshot,
    calendar: &WorkCalendar,
    from: NaiveDate,
    to: NaiveDate,
    targets: Option<&BTreeSet<ResourceId>>,
) -> OverallocationReport {
    let mut periods = Vec::new();
    for resource in snapshot.resources.values() {
        if !resource.is_active || !resource.loads_capacity() {
            continue;
        }
        if let Some(targets) = targets {
            if !targets.contains(&resource.id) {
                continue;
            }
        }
        periods.extend(detect_resource_overallocations(
            snapshot,
            calendar,
            resource.id,
            from,
            to,
        ));
    }

    let critical_path_affected = periods.iter().any(|p| {
        p.affected_activities
            .iter()
            .any(|id| snapshot.activity(*id).is_some_and(|a| a.is_critical))
    });
    let has_high_severity = periods
        .iter()
        .any(|p| p.severity == ConflictSeverity::High);

    OverallocationReport {
        program_id: snapshot.program_id,
        total_periods: periods.len(),
        critical_path_affected,
        has_high_severity,
        periods,
    }
}
