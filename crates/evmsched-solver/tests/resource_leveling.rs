//! Leveling end to end: the two-conflict network, apply semantics, and the
//! critical-path / float guarantees.

use chrono::NaiveDate;
use evmsched_core::{
    Activity, ActivityId, Assignment, ProgramId, Resource, ResourceId, ResourceKind, WbsId,
    WorkCalendar,
};
use evmsched_solver::cancel::CancelFlag;
use evmsched_solver::compare::{compare_leveling, LevelingAlgorithm};
use evmsched_solver::leveling::{apply_shifts, level_serial, LevelingOptions};
use evmsched_solver::parallel::level_parallel;
use evmsched_solver::snapshot::ScheduleSnapshot;
use rust_decimal_macros::dec;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn scheduled_activity(
    program: ProgramId,
    wbs: WbsId,
    code: &str,
    start: NaiveDate,
    finish: NaiveDate,
    total_float: i64,
    critical: bool,
) -> Activity {
    let mut activity = Activity::new(program, wbs, code, code)
        .duration((finish - start).num_days() + 1);
    activity.early_start = Some(start);
    activity.early_finish = Some(finish);
    activity.total_float = Some(total_float);
    activity.is_critical = critical;
    activity
}

/// Resource R at 8 h/day; A (10 days) and B (20 days) both full-time from
/// day 15, C (5 days) full-time from day 17. B carries the critical path.
fn two_conflict_network() -> (ScheduleSnapshot, ResourceId, [ActivityId; 3]) {
    let program = ProgramId::new();
    let wbs = WbsId::new();

    let a = scheduled_activity(
        program,
        wbs,
        "A",
        day(2026, 1, 15),
        day(2026, 1, 24),
        60,
        false,
    );
    let b = scheduled_activity(
        program,
        wbs,
        "B",
        day(2026, 1, 15),
        day(2026, 2, 3),
        0,
        true,
    );
    let c = scheduled_activity(
        program,
        wbs,
        "C",
        day(2026, 1, 17),
        day(2026, 1, 21),
        60,
        false,
    );

    let resource = Resource::new(program, "R", "Integration Lab", ResourceKind::Equipment);
    let resource_id = resource.id;
    let ids = [a.id, b.id, c.id];
    let assignments = vec![
        Assignment::new(ids[0], resource_id, dec!(1.0)),
        Assignment::new(ids[1], resource_id, dec!(1.0)),
        Assignment::new(ids[2], resource_id, dec!(1.0)),
    ];

    let snapshot = ScheduleSnapshot::new(program, day(2026, 1, 5), day(2026, 6, 30))
        .with_activities([a, b, c])
        .with_resources([resource])
        .with_assignments(assignments);
    (snapshot, resource_id, ids)
}

#[test]
fn parallel_leveling_resolves_two_conflict_network() {
    init_tracing();
    let (snapshot, _, [a, b, c]) = two_conflict_network();
    let result = level_parallel(
        &snapshot,
        &WorkCalendar::new(),
        &LevelingOptions::default(),
        &CancelFlag::new(),
    );

    // heap drains to empty
    assert!(result.success, "warnings: {:?}", result.warnings);
    assert_eq!(result.remaining_overallocations, 0);
    assert!(result.conflicts_resolved >= 1);
    assert_eq!(result.resources_processed, 1);

    // the critical activity stays; a non-critical one moved at least 2 days
    assert!(result.shifts.iter().all(|s| s.activity_id != b));
    assert!(result
        .shifts
        .iter()
        .any(|s| (s.activity_id == a || s.activity_id == c) && s.delay_days >= 2));
    assert!(result.new_project_finish >= result.original_project_finish);
}

#[test]
fn serial_leveling_resolves_two_conflict_network() {
    init_tracing();
    let (snapshot, _, [_, b, _]) = two_conflict_network();
    let result = level_serial(
        &snapshot,
        &WorkCalendar::new(),
        &LevelingOptions::default(),
        &CancelFlag::new(),
    );

    assert!(result.success, "warnings: {:?}", result.warnings);
    assert_eq!(result.remaining_overallocations, 0);
    assert!(result.shifts.iter().all(|s| s.activity_id != b));
    assert!(result.new_project_finish >= result.original_project_finish);
}

#[test]
fn apply_preserves_critical_planned_start() {
    let (mut snapshot, _, [_, b, _]) = two_conflict_network();
    let before = snapshot.activity(b).unwrap().planned_start;

    let result = level_serial(
        &snapshot,
        &WorkCalendar::new(),
        &LevelingOptions::default(),
        &CancelFlag::new(),
    );
    apply_shifts(&mut snapshot, &result.shifts);

    // a critical activity never moves under preserve_critical_path
    assert_eq!(snapshot.activity(b).unwrap().planned_start, before);
}

#[test]
fn apply_keeps_shifts_within_pre_leveling_float() {
    let (mut snapshot, _, ids) = two_conflict_network();
    let float_before: Vec<(ActivityId, i64)> = ids
        .iter()
        .map(|id| (*id, snapshot.activity(*id).unwrap().total_float.unwrap()))
        .collect();
    let start_before: Vec<(ActivityId, NaiveDate)> = ids
        .iter()
        .map(|id| (*id, snapshot.activity(*id).unwrap().early_start.unwrap()))
        .collect();

    let result = level_parallel(
        &snapshot,
        &WorkCalendar::new(),
        &LevelingOptions::default(),
        &CancelFlag::new(),
    );
    let updates = apply_shifts(&mut snapshot, &result.shifts);

    for update in updates {
        let float = float_before
            .iter()
            .find(|(id, _)| *id == update.activity_id)
            .map(|(_, f)| *f)
            .unwrap();
        let original = start_before
            .iter()
            .find(|(id, _)| *id == update.activity_id)
            .map(|(_, s)| *s)
            .unwrap();
        assert!(
            (update.planned_start - original).num_days() <= float,
            "shift exceeds pre-leveling float"
        );
    }
}

#[test]
fn comparison_recommends_an_algorithm_with_reason() {
    let (snapshot, _, _) = two_conflict_network();
    let comparison = compare_leveling(
        &snapshot,
        &WorkCalendar::new(),
        &LevelingOptions::default(),
        &CancelFlag::new(),
    );

    assert!(matches!(
        comparison.recommended,
        LevelingAlgorithm::Serial | LevelingAlgorithm::Parallel
    ));
    assert!(!comparison.reason.is_empty());

    // the recommendation rule: on dual success, extension decides
    if comparison.serial.success && comparison.parallel.success {
        let serial_ext = comparison.serial.schedule_extension_days;
        let parallel_ext = comparison.parallel.schedule_extension_days;
        match comparison.recommended {
            LevelingAlgorithm::Parallel => assert!(parallel_ext <= serial_ext),
            LevelingAlgorithm::Serial => assert!(serial_ext <= parallel_ext),
        }
    }
}

#[test]
fn leveled_schedule_has_no_overlapping_full_time_work() {
    let (snapshot, resource_id, ids) = two_conflict_network();
    let result = level_parallel(
        &snapshot,
        &WorkCalendar::new(),
        &LevelingOptions::default(),
        &CancelFlag::new(),
    );
    assert!(result.success);

    // reconstruct final windows
    let mut windows: Vec<(ActivityId, NaiveDate, NaiveDate)> = ids
        .iter()
        .map(|id| {
            let activity = snapshot.activity(*id).unwrap();
            (
                *id,
                activity.early_start.unwrap(),
                activity.early_finish.unwrap(),
            )
        })
        .collect();
    for shift in &result.shifts {
        for window in &mut windows {
            if window.0 == shift.activity_id {
                window.1 = shift.new_start;
                window.2 = shift.new_finish;
            }
        }
    }

    // full-time activities on one 8h resource must not overlap pairwise
    for i in 0..windows.len() {
        for j in (i + 1)..windows.len() {
            let (_, s1, f1) = windows[i];
            let (_, s2, f2) = windows[j];
            assert!(
                f1 < s2 || f2 < s1,
                "activities still overlap after leveling: {s1}..{f1} vs {s2}..{f2}"
            );
        }
    }
    let _ = resource_id;
}
