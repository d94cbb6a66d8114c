//! Mapping CPM day-offsets onto calendar dates.
//!
//! Day 0 is the first working day on or after the program start. Start dates
//! map from ES/LS directly; finish dates are the last occupied working day,
//! so a 10-day activity with ES 0 starts on day 0 and finishes on day 9.
//! Milestones start and finish on the same day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use evmsched_core::{Activity, ActivityId, WorkCalendar};

use crate::cpm::CpmSchedule;

/// Calendar dates for one scheduled activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledDates {
    pub early_start: NaiveDate,
    pub early_finish: NaiveDate,
    pub late_start: NaiveDate,
    pub late_finish: NaiveDate,
}

/// Map every CPM result onto calendar dates.
pub fn schedule_dates(
    schedule: &CpmSchedule,
    program_start: NaiveDate,
    calendar: &WorkCalendar,
) -> BTreeMap<ActivityId, ScheduledDates> {
    let day_zero = calendar.next_working_day(program_start);
    let to_date = |day: i64| calendar.add_working_days(day_zero, day - schedule.project_start);
    let finish_day = |start: i64, finish: i64| {
        if finish > start {
            finish - 1
        } else {
            start
        }
    };

    schedule
        .results
        .iter()
        .map(|(id, result)| {
            (
                *id,
                ScheduledDates {
                    early_start: to_date(result.early_start),
                    early_finish: to_date(finish_day(result.early_start, result.early_finish)),
                    late_start: to_date(result.late_start),
                    late_finish: to_date(finish_day(result.late_start, result.late_finish)),
                },
            )
        })
        .collect()
}

/// Write CPM results (dates, floats, criticality) back onto activities.
///
/// This is the payload of the per-program CPM persistence transaction; the
/// caller owns commit/rollback.
pub fn apply_schedule(
    schedule: &CpmSchedule,
    dates: &BTreeMap<ActivityId, ScheduledDates>,
    activities: &mut BTreeMap<ActivityId, Activity>,
) {
    for (id, result) in &schedule.results {
        let Some(activity) = activities.get_mut(id) else {
            continue;
        };
        let Some(scheduled) = dates.get(id) else {
            continue;
        };
        activity.early_start = Some(scheduled.early_start);
        activity.early_finish = Some(scheduled.early_finish);
        activity.late_start = Some(scheduled.late_start);
        activity.late_finish = Some(scheduled.late_finish);
        activity.total_float = Some(result.total_float);
        activity.free_float = Some(result.free_float);
        activity.is_critical = result.is_critical;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpm::{CpmEngine, CpmOptions};
    use crate::network::ActivityNetwork;
    use evmsched_core::{Dependency, DependencyKind, ProgramId, WbsId};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn maps_chain_onto_working_days() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = Activity::new(program, wbs, "a", "a").duration(5);
        let b = Activity::new(program, wbs, "b", "b").duration(3);
        let dep = Dependency::new(program, a.id, b.id, DependencyKind::FinishToStart);
        let (a_id, b_id) = (a.id, b.id);

        let network = ActivityNetwork::from_activities(&[a, b], &[dep]).unwrap();
        let schedule = CpmEngine::new()
            .schedule(&network, &CpmOptions::default())
            .unwrap();

        // 2026-01-05 is a Monday
        let calendar = WorkCalendar::new();
        let dates = schedule_dates(&schedule, day(2026, 1, 5), &calendar);

        // a: days 0..=4 -> Mon..Fri of week one
        assert_eq!(dates[&a_id].early_start, day(2026, 1, 5));
        assert_eq!(dates[&a_id].early_finish, day(2026, 1, 9));
        // b: days 5..=7 -> Mon..Wed of week two
        assert_eq!(dates[&b_id].early_start, day(2026, 1, 12));
        assert_eq!(dates[&b_id].early_finish, day(2026, 1, 14));
    }

    #[test]
    fn milestone_maps_to_single_day() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = Activity::new(program, wbs, "a", "a").duration(5);
        let ms = Activity::new(program, wbs, "ms", "gate").milestone();
        let dep = Dependency::new(program, a.id, ms.id, DependencyKind::FinishToStart);
        let ms_id = ms.id;

        let network = ActivityNetwork::from_activities(&[a, ms], &[dep]).unwrap();
        let schedule = CpmEngine::new()
            .schedule(&network, &CpmOptions::default())
            .unwrap();
        let dates = schedule_dates(&schedule, day(2026, 1, 5), &WorkCalendar::new());

        // milestone on day 5 -> Monday of week two
        assert_eq!(dates[&ms_id].early_start, day(2026, 1, 12));
        assert_eq!(dates[&ms_id].early_finish, day(2026, 1, 12));
    }

    #[test]
    fn weekend_program_start_rolls_to_monday() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = Activity::new(program, wbs, "a", "a").duration(1);
        let a_id = a.id;

        let network = ActivityNetwork::from_activities(&[a], &[]).unwrap();
        let schedule = CpmEngine::new()
            .schedule(&network, &CpmOptions::default())
            .unwrap();
        // Saturday start
        let dates = schedule_dates(&schedule, day(2026, 1, 3), &WorkCalendar::new());

        assert_eq!(dates[&a_id].early_start, day(2026, 1, 5));
    }

    #[test]
    fn apply_schedule_writes_back() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = Activity::new(program, wbs, "a", "a").duration(5);
        let a_id = a.id;
        let mut activities: BTreeMap<ActivityId, Activity> = BTreeMap::new();
        activities.insert(a_id, a.clone());

        let network = ActivityNetwork::from_activities(&[a], &[]).unwrap();
        let schedule = CpmEngine::new()
            .schedule(&network, &CpmOptions::default())
            .unwrap();
        let dates = schedule_dates(&schedule, day(2026, 1, 5), &WorkCalendar::new());
        apply_schedule(&schedule, &dates, &mut activities);

        let updated = &activities[&a_id];
        assert_eq!(updated.early_start, Some(day(2026, 1, 5)));
        assert_eq!(updated.early_finish, Some(day(2026, 1, 9)));
        assert_eq!(updated.total_float, Some(0));
        assert!(updated.is_critical);
    }
}
