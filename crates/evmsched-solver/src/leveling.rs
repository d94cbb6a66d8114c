//! Serial resource leveling.
//!
//! Processes activities one at a time in priority order (early start, then
//! least total float, then ID), delaying over-allocated activities to the
//! next slot where their resource has capacity. Each applied delay propagates
//! to successors through the dependency network, then the sweep restarts,
//! which keeps progress monotonic.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration as ChronoDuration, NaiveDate};
use evmsched_core::{
    ActivityId, Assignment, Dependency, DependencyKind, ProgramId, ResourceId, WorkCalendar,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cancel::CancelFlag;
use crate::snapshot::ScheduleSnapshot;

/// Search horizon for free slots, in calendar days.
pub(crate) const MAX_SLOT_SEARCH_DAYS: i64 = 365;

/// Options controlling both leveling algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelingOptions {
    /// Never delay critical-path activities.
    pub preserve_critical_path: bool,
    /// Maximum leveling iterations before stopping.
    pub max_iterations: u32,
    /// Level only these resources (None = all).
    pub target_resources: Option<BTreeSet<ResourceId>>,
    /// Only delay activities within their total float.
    pub level_within_float: bool,
}

impl Default for LevelingOptions {
    fn default() -> Self {
        Self {
            preserve_critical_path: true,
            max_iterations: 100,
            target_resources: None,
            level_within_float: true,
        }
    }
}

/// One recorded activity delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityShift {
    pub activity_id: ActivityId,
    pub activity_code: String,
    pub original_start: NaiveDate,
    pub original_finish: NaiveDate,
    pub new_start: NaiveDate,
    pub new_finish: NaiveDate,
    pub delay_days: i64,
    /// Human-readable reason naming the over-allocated resource.
    pub reason: String,
}

/// Outcome of a leveling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelingResult {
    pub program_id: ProgramId,
    /// True when every over-allocation was resolved.
    pub success: bool,
    pub iterations_used: u32,
    /// Count of distinct activities that were delayed.
    pub activities_shifted: usize,
    pub shifts: Vec<ActivityShift>,
    pub remaining_overallocations: usize,
    pub new_project_finish: NaiveDate,
    pub original_project_finish: NaiveDate,
    pub schedule_extension_days: i64,
    pub warnings: Vec<String>,
}

/// Final planned-date change for one activity after leveling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedDateUpdate {
    pub activity_id: ActivityId,
    pub planned_start: NaiveDate,
    pub planned_finish: NaiveDate,
}

/// Collapse repeated shifts to the final shift per activity, ordered by ID.
pub fn collapse_shifts(shifts: &[ActivityShift]) -> Vec<PlannedDateUpdate> {
    let mut finals: BTreeMap<ActivityId, &ActivityShift> = BTreeMap::new();
    for shift in shifts {
        finals.insert(shift.activity_id, shift);
    }
    finals
        .into_values()
        .map(|shift| PlannedDateUpdate {
            activity_id: shift.activity_id,
            planned_start: shift.new_start,
            planned_finish: shift.new_finish,
        })
        .collect()
}

/// Apply a leveling result's shifts to the snapshot's planned dates.
///
/// This mirrors the leveling-apply transaction: all affected activities move
/// together. Returns the updates that were written.
pub fn apply_shifts(
    snapshot: &mut ScheduleSnapshot,
    shifts: &[ActivityShift],
) -> Vec<PlannedDateUpdate> {
    let updates = collapse_shifts(shifts);
    for update in &updates {
        if let Some(activity) = snapshot.activities.get_mut(&update.activity_id) {
            activity.planned_start = Some(update.planned_start);
            activity.planned_finish = Some(update.planned_finish);
        }
    }
    updates
}

// ============================================================================
// Shared leveling state
// ============================================================================

/// Working schedule state shared by the serial and parallel levelers.
///
/// Durations here are calendar-day spans between the working start/finish
/// pair; slot searches and day walks skip non-working days.
pub(crate) struct LevelState<'a> {
    pub snapshot: &'a ScheduleSnapshot,
    pub calendar: &'a WorkCalendar,
    pub working_dates: BTreeMap<ActivityId, (NaiveDate, NaiveDate)>,
    pub original_starts: BTreeMap<ActivityId, NaiveDate>,
    assignments_by_resource: BTreeMap<ResourceId, Vec<&'a Assignment>>,
    assignments_by_activity: BTreeMap<ActivityId, Vec<&'a Assignment>>,
    successors: BTreeMap<ActivityId, Vec<&'a Dependency>>,
}

impl<'a> LevelState<'a> {
    pub fn new(snapshot: &'a ScheduleSnapshot, calendar: &'a WorkCalendar) -> Self {
        let mut working_dates = BTreeMap::new();
        for activity in snapshot.activities.values() {
            let start = activity
                .early_start
                .or(activity.planned_start)
                .unwrap_or(snapshot.program_start);
            let finish = activity
                .early_finish
                .or(activity.planned_finish)
                .unwrap_or(snapshot.program_end);
            working_dates.insert(activity.id, (start, finish));
        }
        let original_starts = working_dates
            .iter()
            .map(|(id, (start, _))| (*id, *start))
            .collect();

        let mut assignments_by_resource: BTreeMap<ResourceId, Vec<&Assignment>> = BTreeMap::new();
        let mut assignments_by_activity: BTreeMap<ActivityId, Vec<&Assignment>> = BTreeMap::new();
        for assignment in &snapshot.assignments {
            assignments_by_resource
                .entry(assignment.resource_id)
                .or_default()
                .push(assignment);
            assignments_by_activity
                .entry(assignment.activity_id)
                .or_default()
                .push(assignment);
        }

        let mut successors: BTreeMap<ActivityId, Vec<&Dependency>> = BTreeMap::new();
        for dependency in &snapshot.dependencies {
            successors
                .entry(dependency.predecessor_id)
                .or_default()
                .push(dependency);
        }

        Self {
            snapshot,
            calendar,
            working_dates,
            original_starts,
            assignments_by_resource,
            assignments_by_activity,
            successors,
        }
    }

    pub fn assignments_of(&self, activity: ActivityId) -> &[&'a Assignment] {
        self.assignments_by_activity
            .get(&activity)
            .map_or(&[], Vec::as_slice)
    }

    fn capacity_of(&self, resource: ResourceId) -> Option<Decimal> {
        let resource = self.snapshot.resource(resource)?;
        resource.loads_capacity().then_some(resource.capacity_per_day)
    }

    /// Total assigned hours on `date` for `resource`, optionally excluding
    /// one activity. The caller is responsible for only asking about working
    /// days.
    pub fn load_on(
        &self,
        resource: ResourceId,
        date: NaiveDate,
        exclude: Option<ActivityId>,
    ) -> Decimal {
        let Some(capacity) = self.capacity_of(resource) else {
            return Decimal::ZERO;
        };
        let mut total = Decimal::ZERO;
        for assignment in self
            .assignments_by_resource
            .get(&resource)
            .map_or(&[][..], Vec::as_slice)
        {
            if Some(assignment.activity_id) == exclude {
                continue;
            }
            let Some((start, finish)) = self.working_dates.get(&assignment.activity_id) else {
                continue;
            };
            if *start <= date && date <= *finish {
                total += assignment.units * capacity;
            }
        }
        total
    }

    /// Distinct activities of `resource` active on `date`.
    pub fn activities_on(&self, resource: ResourceId, date: NaiveDate) -> Vec<ActivityId> {
        let mut ids = BTreeSet::new();
        for assignment in self
            .assignments_by_resource
            .get(&resource)
            .map_or(&[][..], Vec::as_slice)
        {
            if let Some((start, finish)) = self.working_dates.get(&assignment.activity_id) {
                if *start <= date && date <= *finish {
                    ids.insert(assignment.activity_id);
                }
            }
        }
        ids.into_iter().collect()
    }

    /// True when the resource exceeds capacity on any working day of the
    /// range.
    pub fn is_overallocated_between(
        &self,
        resource: ResourceId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> bool {
        let Some(capacity) = self.capacity_of(resource) else {
            return false;
        };
        let mut date = start;
        while date <= end {
            if self.calendar.is_working_day(date) && self.load_on(resource, date, None) > capacity {
                return true;
            }
            date = match date.succ_opt() {
                Some(d) => d,
                None => break,
            };
        }
        false
    }

    /// Earliest start from `earliest` where adding this activity's units
    /// keeps the resource within capacity for the whole duration. Bounded by
    /// [`MAX_SLOT_SEARCH_DAYS`].
    pub fn find_next_slot(
        &self,
        activity: ActivityId,
        resource: ResourceId,
        earliest: NaiveDate,
        duration_days: i64,
    ) -> NaiveDate {
        let Some(capacity) = self.capacity_of(resource) else {
            return earliest;
        };
        let Some(units) = self
            .assignments_of(activity)
            .iter()
            .find(|a| a.resource_id == resource)
            .map(|a| a.units)
        else {
            return earliest;
        };

        let mut candidate = earliest;
        for _ in 0..MAX_SLOT_SEARCH_DAYS {
            candidate = self.calendar.next_working_day(candidate);
            let candidate_finish = candidate + ChronoDuration::days(duration_days);

            let mut fits = true;
            let mut date = candidate;
            while date <= candidate_finish {
                if self.calendar.is_working_day(date)
                    && self.load_on(resource, date, Some(activity)) + units * capacity > capacity
                {
                    fits = false;
                    break;
                }
                date = match date.succ_opt() {
                    Some(d) => d,
                    None => break,
                };
            }
            if fits {
                return candidate;
            }
            candidate = candidate.succ_opt().unwrap_or(candidate);
        }

        earliest + ChronoDuration::days(MAX_SLOT_SEARCH_DAYS)
    }

    /// Push the delay through successors. Work-list form; the only update is
    /// "successor's start moves later", which is idempotent and monotonic,
    /// so repeated visits are safe.
    pub fn propagate_successors(&mut self, from: ActivityId) {
        let mut work = vec![from];
        while let Some(current) = work.pop() {
            let Some(&(pred_start, pred_finish)) = self.working_dates.get(&current) else {
                continue;
            };
            let edges = self
                .successors
                .get(&current)
                .map_or(&[][..], Vec::as_slice)
                .to_vec();
            for dependency in edges {
                let successor = dependency.successor_id;
                let Some(&(succ_start, succ_finish)) = self.working_dates.get(&successor) else {
                    continue;
                };
                let duration = (succ_finish - succ_start).num_days();
                let lag = ChronoDuration::days(dependency.lag_days);
                let span = ChronoDuration::days(duration);

                let new_earliest = match dependency.kind {
                    DependencyKind::FinishToStart => {
                        pred_finish + ChronoDuration::days(1) + lag
                    }
                    DependencyKind::StartToStart => pred_start + lag,
                    DependencyKind::FinishToFinish => pred_finish + lag - span,
                    DependencyKind::StartToFinish => pred_start + lag - span,
                };

                if new_earliest > succ_start {
                    self.working_dates
                        .insert(successor, (new_earliest, new_earliest + span));
                    work.push(successor);
                }
            }
        }
    }

    /// Count resources still over-allocated anywhere in the working window.
    pub fn remaining_overallocations(&self, targets: Option<&BTreeSet<ResourceId>>) -> usize {
        let Some((min_date, max_date)) = self.date_bounds() else {
            return 0;
        };
        let mut count = 0;
        for resource in self.snapshot.resources.values() {
            if !resource.is_active || !resource.loads_capacity() {
                continue;
            }
            if let Some(targets) = targets {
                if !targets.contains(&resource.id) {
                    continue;
                }
            }
            if self.is_overallocated_between(resource.id, min_date, max_date) {
                count += 1;
            }
        }
        count
    }

    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.working_dates.values().map(|(s, _)| *s).min()?;
        let max = self.working_dates.values().map(|(_, f)| *f).max()?;
        Some((min, max))
    }

    pub fn project_finish(&self, fallback: NaiveDate) -> NaiveDate {
        self.working_dates
            .values()
            .map(|(_, finish)| *finish)
            .max()
            .unwrap_or(fallback)
    }

    pub fn resource_code(&self, resource: ResourceId) -> String {
        self.snapshot
            .resource(resource)
            .map_or_else(|| resource.to_string(), |r| r.code.clone())
    }
}

pub(crate) fn can_delay(
    activity: &evmsched_core::Activity,
    delay_days: i64,
    options: &LevelingOptions,
) -> bool {
    if delay_days <= 0 {
        return false;
    }
    if options.preserve_critical_path && activity.is_critical {
        return false;
    }
    if options.level_within_float {
        let total_float = activity.total_float.unwrap_or(0);
        if delay_days > total_float {
            return false;
        }
    }
    true
}

// ============================================================================
// Serial algorithm
// ============================================================================

/// Level the program serially: sweep activities in priority order, shift the
/// first over-allocated one, propagate, restart. Terminates when a full sweep
/// makes no change or `max_iterations` is reached.
pub fn level_serial(
    snapshot: &ScheduleSnapshot,
    calendar: &WorkCalendar,
    options: &LevelingOptions,
    cancel: &CancelFlag,
) -> LevelingResult {
    let mut state = LevelState::new(snapshot, calendar);
    let original_finish = state.project_finish(snapshot.program_end);

    if snapshot.activities.is_empty() {
        return empty_result(snapshot.program_id, original_finish);
    }

    // Priority: early start asc, total float asc, id asc. Sorted once from
    // the initial working dates.
    let mut order: Vec<ActivityId> = snapshot.activities.keys().copied().collect();
    order.sort_by_key(|id| {
        let start = state.working_dates[id].0;
        let float = snapshot
            .activity(*id)
            .and_then(|a| a.total_float)
            .unwrap_or(9999);
        (start, float, *id)
    });

    let mut shifts: Vec<ActivityShift> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut iteration = 0u32;

    while iteration < options.max_iterations {
        if cancel.is_cancelled() {
            warnings.push("leveling cancelled before completion".into());
            break;
        }
        iteration += 1;
        let mut made_change = false;

        'sweep: for activity_id in &order {
            let (current_start, current_finish) = state.working_dates[activity_id];
            let resources: Vec<ResourceId> = state
                .assignments_of(*activity_id)
                .iter()
                .map(|a| a.resource_id)
                .collect();

            for resource_id in resources {
                if let Some(targets) = &options.target_resources {
                    if !targets.contains(&resource_id) {
                        continue;
                    }
                }
                if !state.is_overallocated_between(resource_id, current_start, current_finish) {
                    continue;
                }

                let duration = (current_finish - current_start).num_days();
                let new_start =
                    state.find_next_slot(*activity_id, resource_id, current_start, duration);
                let delay_days = (new_start - current_start).num_days();
                if delay_days <= 0 {
                    continue;
                }

                let activity = state
                    .snapshot
                    .activity(*activity_id)
                    .expect("activity in snapshot");
                if !can_delay(activity, delay_days, options) {
                    if options.preserve_critical_path && activity.is_critical {
                        warnings.push(format!(
                            "Cannot delay critical activity {}",
                            activity.code
                        ));
                    }
                    continue;
                }

                let new_finish = new_start + (current_finish - current_start);
                let reason = format!(
                    "Resource {} overallocated",
                    state.resource_code(resource_id)
                );
                debug!(
                    activity = %activity.code,
                    delay_days,
                    %reason,
                    "serial leveling shift"
                );
                shifts.push(ActivityShift {
                    activity_id: *activity_id,
                    activity_code: activity.code.clone(),
                    original_start: current_start,
                    original_finish: current_finish,
                    new_start,
                    new_finish,
                    delay_days,
                    reason,
                });

                state
                    .working_dates
                    .insert(*activity_id, (new_start, new_finish));
                state.propagate_successors(*activity_id);
                made_change = true;
                break 'sweep;
            }
        }

        if !made_change {
            break;
        }
    }

    let remaining = state.remaining_overallocations(options.target_resources.as_ref());
    let new_finish = state.project_finish(original_finish).max(original_finish);
    let extension = (new_finish - original_finish).num_days().max(0);
    let distinct: BTreeSet<ActivityId> = shifts.iter().map(|s| s.activity_id).collect();

    info!(
        program = %snapshot.program_id,
        iterations = iteration,
        shifted = distinct.len(),
        remaining,
        "serial leveling finished"
    );

    LevelingResult {
        program_id: snapshot.program_id,
        success: remaining == 0,
        iterations_used: iteration,
        activities_shifted: distinct.len(),
        shifts,
        remaining_overallocations: remaining,
        new_project_finish: new_finish,
        original_project_finish: original_finish,
        schedule_extension_days: extension,
        warnings,
    }
}

fn empty_result(program_id: ProgramId, finish: NaiveDate) -> LevelingResult {
    LevelingResult {
        program_id,
        success: true,
        iterations_used: 0,
        activities_shifted: 0,
        shifts: Vec::new(),
        remaining_overallocations: 0,
        new_project_finish: finish,
        original_project_finish: finish,
        schedule_extension_days: 0,
        warnings: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmsched_core::{Activity, Resource, ResourceKind, WbsId};
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Two full-time activities on one resource, overlapping completely.
    fn conflicted_snapshot() -> (ScheduleSnapshot, ResourceId, ActivityId, ActivityId) {
        let program = ProgramId::new();
        let wbs = WbsId::new();

        let mut a = Activity::new(program, wbs, "A-1", "Machine housings").duration(5);
        a.early_start = Some(day(2026, 1, 5));
        a.early_finish = Some(day(2026, 1, 9));
        a.total_float = Some(0);
        a.is_critical = true;

        let mut b = Activity::new(program, wbs, "A-2", "Machine brackets").duration(5);
        b.early_start = Some(day(2026, 1, 5));
        b.early_finish = Some(day(2026, 1, 9));
        b.total_float = Some(30);

        let resource = Resource::new(program, "R-1", "CNC Mill", ResourceKind::Equipment);
        let resource_id = resource.id;
        let (a_id, b_id) = (a.id, b.id);
        let assignments = vec![
            Assignment::new(a_id, resource_id, dec!(1.0)),
            Assignment::new(b_id, resource_id, dec!(1.0)),
        ];

        let snapshot = ScheduleSnapshot::new(program, day(2026, 1, 5), day(2026, 3, 31))
            .with_activities([a, b])
            .with_resources([resource])
            .with_assignments(assignments);
        (snapshot, resource_id, a_id, b_id)
    }

    #[test]
    fn resolves_simple_conflict_by_delaying_noncritical() {
        let (snapshot, _, a_id, b_id) = conflicted_snapshot();
        let result = level_serial(
            &snapshot,
            &WorkCalendar::new(),
            &LevelingOptions::default(),
            &CancelFlag::new(),
        );

        assert!(result.success, "warnings: {:?}", result.warnings);
        assert_eq!(result.remaining_overallocations, 0);
        assert_eq!(result.activities_shifted, 1);
        // the critical activity stays put
        assert!(result.shifts.iter().all(|s| s.activity_id != a_id));
        assert!(result.shifts.iter().any(|s| s.activity_id == b_id));
        assert!(result.new_project_finish > result.original_project_finish);
        assert!(result.schedule_extension_days > 0);
    }

    #[test]
    fn shift_reason_names_the_resource() {
        let (snapshot, _, _, _) = conflicted_snapshot();
        let result = level_serial(
            &snapshot,
            &WorkCalendar::new(),
            &LevelingOptions::default(),
            &CancelFlag::new(),
        );
        assert!(result.shifts[0].reason.contains("R-1"));
        assert!(result.shifts[0].reason.contains("overallocated"));
    }

    #[test]
    fn preserve_critical_path_blocks_critical_shift() {
        let (mut snapshot, _, a_id, b_id) = conflicted_snapshot();
        // make both critical: nothing can move
        snapshot.activities.get_mut(&b_id).unwrap().is_critical = true;
        snapshot.activities.get_mut(&b_id).unwrap().total_float = Some(0);

        let result = level_serial(
            &snapshot,
            &WorkCalendar::new(),
            &LevelingOptions::default(),
            &CancelFlag::new(),
        );

        assert!(!result.success);
        assert!(result.shifts.is_empty());
        assert_eq!(result.remaining_overallocations, 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Cannot delay critical activity")));
        let _ = a_id;
    }

    #[test]
    fn level_within_float_blocks_large_delays() {
        let (mut snapshot, _, _, b_id) = conflicted_snapshot();
        // b has only 1 day of float; a 5-day delay is out of bounds
        snapshot.activities.get_mut(&b_id).unwrap().total_float = Some(1);

        let result = level_serial(
            &snapshot,
            &WorkCalendar::new(),
            &LevelingOptions::default(),
            &CancelFlag::new(),
        );

        assert!(!result.success);
        assert!(result.shifts.is_empty());
    }

    #[test]
    fn disabling_float_limit_allows_the_shift() {
        let (mut snapshot, _, _, b_id) = conflicted_snapshot();
        snapshot.activities.get_mut(&b_id).unwrap().total_float = Some(1);

        let options = LevelingOptions {
            level_within_float: false,
            ..LevelingOptions::default()
        };
        let result = level_serial(&snapshot, &WorkCalendar::new(), &options, &CancelFlag::new());
        assert!(result.success);
        assert_eq!(result.activities_shifted, 1);
    }

    #[test]
    fn target_resources_limits_scope() {
        let (snapshot, _, _, _) = conflicted_snapshot();
        let unrelated: BTreeSet<ResourceId> = [ResourceId::new()].into_iter().collect();
        let options = LevelingOptions {
            target_resources: Some(unrelated),
            ..LevelingOptions::default()
        };
        let result = level_serial(&snapshot, &WorkCalendar::new(), &options, &CancelFlag::new());

        // nothing to level among the targets; conflict not counted either
        assert!(result.shifts.is_empty());
        assert_eq!(result.remaining_overallocations, 0);
        assert!(result.success);
    }

    #[test]
    fn propagation_pushes_fs_successor() {
        let (mut snapshot, resource_id, _, b_id) = conflicted_snapshot();
        let program = snapshot.program_id;
        let wbs = snapshot.activities.values().next().unwrap().wbs_id;

        let mut c = Activity::new(program, wbs, "A-3", "Paint brackets").duration(3);
        c.early_start = Some(day(2026, 1, 12));
        c.early_finish = Some(day(2026, 1, 14));
        c.total_float = Some(30);
        let c_id = c.id;
        snapshot.activities.insert(c_id, c);
        snapshot.dependencies.push(
            Dependency::new(program, b_id, c_id, DependencyKind::FinishToStart),
        );
        let _ = resource_id;

        let result = level_serial(
            &snapshot,
            &WorkCalendar::new(),
            &LevelingOptions::default(),
            &CancelFlag::new(),
        );
        assert!(result.success);

        // b moved past a's finish; c must start after b's new finish
        let b_shift = result
            .shifts
            .iter()
            .find(|s| s.activity_id == b_id)
            .expect("b shifted");
        assert!(result.new_project_finish >= b_shift.new_finish);
    }

    #[test]
    fn cancellation_stops_early() {
        let (snapshot, _, _, _) = conflicted_snapshot();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = level_serial(
            &snapshot,
            &WorkCalendar::new(),
            &LevelingOptions::default(),
            &cancel,
        );
        assert!(result.shifts.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("cancelled")));
    }

    #[test]
    fn collapse_shifts_keeps_last_per_activity() {
        let id = ActivityId::new();
        let shift = |start: NaiveDate| ActivityShift {
            activity_id: id,
            activity_code: "A-1".into(),
            original_start: day(2026, 1, 5),
            original_finish: day(2026, 1, 9),
            new_start: start,
            new_finish: start + ChronoDuration::days(4),
            delay_days: 1,
            reason: "Resource R-1 overallocated".into(),
        };
        let shifts = vec![shift(day(2026, 1, 6)), shift(day(2026, 1, 8))];
        let updates = collapse_shifts(&shifts);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].planned_start, day(2026, 1, 8));
    }

    #[test]
    fn apply_shifts_writes_planned_dates() {
        let (mut snapshot, _, _, b_id) = conflicted_snapshot();
        let result = level_serial(
            &snapshot,
            &WorkCalendar::new(),
            &LevelingOptions::default(),
            &CancelFlag::new(),
        );
        let updates = apply_shifts(&mut snapshot, &result.shifts);
        assert_eq!(updates.len(), 1);

        let b = snapshot.activity(b_id).unwrap();
        assert_eq!(b.planned_start, Some(updates[0].planned_start));
        assert_eq!(b.planned_finish, Some(updates[0].planned_finish));
    }

    #[test]
    fn no_conflict_means_no_shifts() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let mut a = Activity::new(program, wbs, "A-1", "Solo task").duration(5);
        a.early_start = Some(day(2026, 1, 5));
        a.early_finish = Some(day(2026, 1, 9));
        let resource = Resource::new(program, "R-1", "Welder", ResourceKind::Labor);
        let assignment = Assignment::new(a.id, resource.id, dec!(1.0));
        let snapshot = ScheduleSnapshot::new(program, day(2026, 1, 5), day(2026, 3, 31))
            .with_activities([a])
            .with_resources([resource])
            .with_assignments([assignment]);

        let result = level_serial(
            &snapshot,
            &WorkCalendar::new(),
            &LevelingOptions::default(),
            &CancelFlag::new(),
        );
        assert!(result.success);
        assert!(result.shifts.is_empty());
        assert_eq!(result.schedule_extension_days, 0);
    }
}
