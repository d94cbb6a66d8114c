//! Side-by-side leveling comparison.
//!
//! Runs the serial and parallel levelers with identical options and
//! recommends one: on full success, the shorter schedule extension wins
//! (ties go to fewer shifts); otherwise, fewer remaining conflicts wins
//! (ties go to the shorter extension). Serial breaks any final tie as the
//! more predictable algorithm.

use evmsched_core::WorkCalendar;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelFlag;
use crate::leveling::{level_serial, LevelingOptions, LevelingResult};
use crate::parallel::{level_parallel, ParallelLevelingResult};
use crate::snapshot::ScheduleSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelingAlgorithm {
    Serial,
    Parallel,
}

/// Both results plus the rule-based recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelingComparison {
    pub serial: LevelingResult,
    pub parallel: ParallelLevelingResult,
    pub recommended: LevelingAlgorithm,
    pub reason: String,
}

/// Run both algorithms on the same snapshot and recommend one.
pub fn compare_leveling(
    snapshot: &ScheduleSnapshot,
    calendar: &WorkCalendar,
    options: &LevelingOptions,
    cancel: &CancelFlag,
) -> LevelingComparison {
    let serial = level_serial(snapshot, calendar, options, cancel);
    let parallel = level_parallel(snapshot, calendar, options, cancel);

    let (recommended, reason) = recommend(&serial, &parallel);
    LevelingComparison {
        serial,
        parallel,
        recommended,
        reason,
    }
}

fn recommend(
    serial: &LevelingResult,
    parallel: &ParallelLevelingResult,
) -> (LevelingAlgorithm, String) {
    if serial.success && parallel.success {
        if parallel.schedule_extension_days < serial.schedule_extension_days {
            return (
                LevelingAlgorithm::Parallel,
                format!(
                    "both succeeded; parallel extends the schedule by {} days vs {}",
                    parallel.schedule_extension_days, serial.schedule_extension_days
                ),
            );
        }
        if serial.schedule_extension_days < parallel.schedule_extension_days {
            return (
                LevelingAlgorithm::Serial,
                format!(
                    "both succeeded; serial extends the schedule by {} days vs {}",
                    serial.schedule_extension_days, parallel.schedule_extension_days
                ),
            );
        }
        if parallel.shifts.len() < serial.shifts.len() {
            return (
                LevelingAlgorithm::Parallel,
                format!(
                    "equal extension; parallel needed {} shifts vs {}",
                    parallel.shifts.len(),
                    serial.shifts.len()
                ),
            );
        }
        return (
            LevelingAlgorithm::Serial,
            "equal extension and shift count; serial is more predictable".into(),
        );
    }

    if parallel.remaining_overallocations < serial.remaining_overallocations {
        return (
            LevelingAlgorithm::Parallel,
            format!(
                "parallel left {} conflicts vs {}",
                parallel.remaining_overallocations, serial.remaining_overallocations
            ),
        );
    }
    if serial.remaining_overallocations < parallel.remaining_overallocations {
        return (
            LevelingAlgorithm::Serial,
            format!(
                "serial left {} conflicts vs {}",
                serial.remaining_overallocations, parallel.remaining_overallocations
            ),
        );
    }
    if parallel.schedule_extension_days < serial.schedule_extension_days {
        return (
            LevelingAlgorithm::Parallel,
            "equal remaining conflicts; parallel extends the schedule less".into(),
        );
    }
    (
        LevelingAlgorithm::Serial,
        "equal remaining conflicts; serial extends the schedule no more than parallel".into(),
    )
}
