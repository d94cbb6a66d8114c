//! Parallel resource leveling.
//!
//! Instead of per-activity sweeps, this algorithm builds a heap of every
//! (resource, day) conflict ordered by date then severity, repeatedly pops
//! the most urgent one, delays the most flexible contributing activity just
//! far enough to clear it, propagates to successors, and rebuilds the heap
//! from the updated dates. The rebuild is O(resources x days) per iteration,
//! acceptable at typical program sizes; incremental repair is a possible
//! future change.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, BTreeSet};

use chrono::{Duration as ChronoDuration, NaiveDate};
use evmsched_core::{ActivityId, ProgramId, ResourceId, WorkCalendar};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cancel::CancelFlag;
use crate::leveling::{ActivityShift, LevelState, LevelingOptions, MAX_SLOT_SEARCH_DAYS};
use crate::snapshot::ScheduleSnapshot;

/// One over-allocated (resource, day) cell with its contributors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConflict {
    pub resource_id: ResourceId,
    pub conflict_date: NaiveDate,
    /// Hours over capacity on that day.
    pub excess_hours: Decimal,
    /// Activities competing for the resource that day, ascending by ID.
    pub activities: Vec<ActivityId>,
}

/// Urgency order for the max-heap: earliest date first, then largest excess.
impl Ord for ResourceConflict {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .conflict_date
            .cmp(&self.conflict_date)
            .then_with(|| self.excess_hours.cmp(&other.excess_hours))
            .then_with(|| other.resource_id.cmp(&self.resource_id))
            .then_with(|| self.activities.cmp(&other.activities))
    }
}

impl PartialOrd for ResourceConflict {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority score of a contributing activity. Lower scores are more
/// protected; the candidate with the highest score gets delayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityPriority {
    pub activity_id: ActivityId,
    pub early_start: NaiveDate,
    pub total_float: i64,
    pub is_critical: bool,
    pub resource_count: usize,
}

impl ActivityPriority {
    /// (critical first, earlier start, less float, more resources) — all of
    /// which make an activity harder to move.
    pub fn score(&self) -> (u8, NaiveDate, i64, i64) {
        (
            u8::from(!self.is_critical),
            self.early_start,
            self.total_float,
            -(self.resource_count as i64),
        )
    }
}

/// Result of a parallel leveling run; the shared fields match
/// [`crate::leveling::LevelingResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelLevelingResult {
    pub program_id: ProgramId,
    pub success: bool,
    pub iterations_used: u32,
    pub activities_shifted: usize,
    pub shifts: Vec<ActivityShift>,
    pub remaining_overallocations: usize,
    pub new_project_finish: NaiveDate,
    pub original_project_finish: NaiveDate,
    pub schedule_extension_days: i64,
    pub warnings: Vec<String>,
    /// Initial conflict count minus conflicts still open at the end.
    pub conflicts_resolved: usize,
    /// Distinct resources that appeared in a popped conflict.
    pub resources_processed: usize,
}

/// Level the program with the conflict-queue algorithm.
pub fn level_parallel(
    snapshot: &ScheduleSnapshot,
    calendar: &WorkCalendar,
    options: &LevelingOptions,
    cancel: &CancelFlag,
) -> ParallelLevelingResult {
    let mut state = LevelState::new(snapshot, calendar);
    let original_finish = state.project_finish(snapshot.program_end);

    if snapshot.activities.is_empty() {
        return empty_result(snapshot.program_id, original_finish);
    }

    let priorities = build_priorities(&state);
    let mut conflicts = build_conflicts(&state, options);
    let initial_conflict_count = conflicts.len();

    let mut shifts: Vec<ActivityShift> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut popped_resources: BTreeSet<ResourceId> = BTreeSet::new();
    // Conflicts popped without a resolution since the last rebuild; the
    // rebuild re-discovers any that are still open, so this resets with it.
    let mut unresolved: BTreeSet<(ResourceId, NaiveDate)> = BTreeSet::new();
    let mut iteration = 0u32;

    while !conflicts.is_empty() && iteration < options.max_iterations {
        if cancel.is_cancelled() {
            warnings.push("leveling cancelled before completion".into());
            break;
        }
        iteration += 1;

        let conflict = conflicts.pop().expect("heap not empty");
        popped_resources.insert(conflict.resource_id);

        // Candidates in most-flexible-first order; take the first whose
        // minimum delay the options allow. Keeping the total shift within
        // the activity's float is checked against the original start, so
        // repeated delays cannot creep past it.
        let candidates = rank_candidates(&conflict, &priorities, options);
        let mut chosen: Option<(ActivityId, i64)> = None;
        for activity_id in candidates {
            let delay =
                minimum_delay(&state, activity_id, conflict.resource_id, conflict.conflict_date);
            if delay <= 0 {
                continue;
            }
            if options.level_within_float {
                let priority = &priorities[&activity_id];
                let original_start = state.original_starts[&activity_id];
                let current_start = state.working_dates[&activity_id].0;
                let total_shift = (current_start - original_start).num_days() + delay;
                if total_shift > priority.total_float {
                    continue;
                }
            }
            chosen = Some((activity_id, delay));
            break;
        }

        let Some((chosen, delay_days)) = chosen else {
            unresolved.insert((conflict.resource_id, conflict.conflict_date));
            warnings.push(format!(
                "Could not resolve conflict on {} for resource {}",
                conflict.conflict_date,
                state.resource_code(conflict.resource_id)
            ));
            continue;
        };

        let (old_start, old_finish) = state.working_dates[&chosen];
        let new_start = old_start + ChronoDuration::days(delay_days);
        let new_finish = old_finish + ChronoDuration::days(delay_days);
        state.working_dates.insert(chosen, (new_start, new_finish));

        let activity = state.snapshot.activity(chosen).expect("activity in snapshot");
        let reason = format!(
            "Resource {} conflict on {}",
            state.resource_code(conflict.resource_id),
            conflict.conflict_date
        );
        debug!(activity = %activity.code, delay_days, %reason, "parallel leveling shift");
        shifts.push(ActivityShift {
            activity_id: chosen,
            activity_code: activity.code.clone(),
            original_start: old_start,
            original_finish: old_finish,
            new_start,
            new_finish,
            delay_days,
            reason,
        });

        state.propagate_successors(chosen);

        // Rebuild rather than repair: delays can create or clear conflicts
        // anywhere downstream.
        conflicts = build_conflicts(&state, options);
        unresolved.clear();
    }

    // Unresolvable popped conflicts still count as open.
    let remaining = conflicts.len() + unresolved.len();
    let new_finish = state.project_finish(original_finish).max(original_finish);
    let extension = (new_finish - original_finish).num_days().max(0);
    let distinct: BTreeSet<ActivityId> = shifts.iter().map(|s| s.activity_id).collect();

    info!(
        program = %snapshot.program_id,
        iterations = iteration,
        conflicts_resolved = initial_conflict_count.saturating_sub(remaining),
        resources_processed = popped_resources.len(),
        "parallel leveling finished"
    );

    ParallelLevelingResult {
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
        conflicts_resolved: initial_conflict_count.saturating_sub(remaining),
        resources_processed: popped_resources.len(),
    }
}

fn empty_result(program_id: ProgramId, finish: NaiveDate) -> ParallelLevelingResult {
    ParallelLevelingResult {
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
        conflicts_resolved: 0,
        resources_processed: 0,
    }
}

fn build_priorities(state: &LevelState<'_>) -> std::collections::BTreeMap<ActivityId, ActivityPriority> {
    state
        .snapshot
        .activities
        .values()
        .map(|activity| {
            (
                activity.id,
                ActivityPriority {
                    activity_id: activity.id,
                    early_start: activity
                        .early_start
                        .or(activity.planned_start)
                        .unwrap_or(state.snapshot.program_start),
                    total_float: activity.total_float.unwrap_or(9999),
                    is_critical: activity.is_critical,
                    resource_count: state.assignments_of(activity.id).len(),
                },
            )
        })
        .collect()
}

/// Scan the working window for over-allocated days with at least two
/// competing activities; one conflict per (resource, day).
fn build_conflicts(
    state: &LevelState<'_>,
    options: &LevelingOptions,
) -> BinaryHeap<ResourceConflict> {
    let mut conflicts = BinaryHeap::new();
    let Some((min_date, max_date)) = state.date_bounds() else {
        return conflicts;
    };

    for resource in state.snapshot.resources.values() {
        if !resource.is_active || !resource.loads_capacity() {
            continue;
        }
        if let Some(targets) = &options.target_resources {
            if !targets.contains(&resource.id) {
                continue;
            }
        }

        let capacity = resource.capacity_per_day;
        let mut date = min_date;
        while date <= max_date {
            if state.calendar.is_working_day(date) {
                let load = state.load_on(resource.id, date, None);
                if load > capacity {
                    let activities = state.activities_on(resource.id, date);
                    if activities.len() > 1 {
                        conflicts.push(ResourceConflict {
                            resource_id: resource.id,
                            conflict_date: date,
                            excess_hours: load - capacity,
                            activities,
                        });
                    }
                }
            }
            date = match date.succ_opt() {
                Some(d) => d,
                None => break,
            };
        }
    }
    conflicts
}

/// Contributors the options allow us to touch, most flexible first.
fn rank_candidates(
    conflict: &ResourceConflict,
    priorities: &std::collections::BTreeMap<ActivityId, ActivityPriority>,
    options: &LevelingOptions,
) -> Vec<ActivityId> {
    let mut candidates: Vec<((u8, NaiveDate, i64, i64), ActivityId)> = conflict
        .activities
        .iter()
        .filter_map(|activity_id| {
            let priority = priorities.get(activity_id)?;
            if options.preserve_critical_path && priority.is_critical {
                return None;
            }
            Some((priority.score(), *activity_id))
        })
        .collect();

    candidates.sort();
    candidates.reverse();
    candidates.into_iter().map(|(_, id)| id).collect()
}

/// Minimum delay so the activity's full window fits within capacity,
/// searching forward from the day after the conflict.
fn minimum_delay(
    state: &LevelState<'_>,
    activity: ActivityId,
    resource: ResourceId,
    conflict_date: NaiveDate,
) -> i64 {
    let (current_start, current_finish) = state.working_dates[&activity];
    let duration = (current_finish - current_start).num_days();
    let slot = state.find_next_slot(
        activity,
        resource,
        conflict_date + ChronoDuration::days(1),
        duration,
    );
    let delay = (slot - current_start).num_days();
    delay.min(MAX_SLOT_SEARCH_DAYS)
}
