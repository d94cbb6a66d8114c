//! Per-day resource loading: assigned versus available hours.
//!
//! The loading series walks each calendar day of a range, skipping weekends
//! and holidays, and sums `assignment.units x capacity_per_day` across every
//! assignment whose effective window contains the day. Material assignments
//! consume inventory, not capacity, and contribute nothing here.

use chrono::NaiveDate;
use evmsched_core::{ActivityId, ResourceId, WorkCalendar};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::snapshot::ScheduleSnapshot;

/// Loading of one resource on one working day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayLoading {
    pub date: NaiveDate,
    pub assigned_hours: Decimal,
    pub capacity_hours: Decimal,
    /// Contributing activities with their assigned hours.
    pub contributors: Vec<(ActivityId, Decimal)>,
}

impl DayLoading {
    pub fn is_overallocated(&self) -> bool {
        self.assigned_hours > self.capacity_hours
    }

    pub fn excess(&self) -> Decimal {
        (self.assigned_hours - self.capacity_hours).max(Decimal::ZERO)
    }
}

/// Working-day loading series for one resource over a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLoading {
    pub resource_id: ResourceId,
    pub capacity_per_day: Decimal,
    pub days: Vec<DayLoading>,
}

impl ResourceLoading {
    pub fn peak(&self) -> Decimal {
        self.days
            .iter()
            .map(|d| d.assigned_hours)
            .max()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Compute the loading series for `resource_id` across `[from, to]`.
///
/// Returns an empty series when the resource is unknown or is a material
/// resource.
pub fn resource_loading(
    snapshot: &ScheduleSnapshot,
    calendar: &WorkCalendar,
    resource_id: ResourceId,
    from: NaiveDate,
    to: NaiveDate,
) -> ResourceLoading {
    let Some(resource) = snapshot.resource(resource_id) else {
        return ResourceLoading {
            resource_id,
            capacity_per_day: Decimal::ZERO,
            days: Vec::new(),
        };
    };

    let capacity = resource.capacity_per_day;
    let mut days = Vec::new();

    if !resource.loads_capacity() {
        return ResourceLoading {
            resource_id,
            capacity_per_day: capacity,
            days,
        };
    }

    // Resolve each assignment's window once, not per day.
    let windows: Vec<(ActivityId, Decimal, NaiveDate, NaiveDate)> = snapshot
        .assignments_for_resource(resource_id)
        .filter_map(|assignment| {
            let (start, finish) = snapshot.effective_range(assignment.activity_id)?;
            Some((assignment.activity_id, assignment.units, start, finish))
        })
        .collect();

    for date in calendar.working_days_in(from, to) {
        let mut assigned = Decimal::ZERO;
        let mut contributors = Vec::new();
        for (activity_id, units, start, finish) in &windows {
            if *start <= date && date <= *finish {
                let hours = *units * capacity;
                assigned += hours;
                contributors.push((*activity_id, hours));
            }
        }
        days.push(DayLoading {
            date,
            assigned_hours: assigned,
            capacity_hours: capacity,
            contributors,
        });
    }

    ResourceLoading {
        resource_id,
        capacity_per_day: capacity,
        days,
    }
}
