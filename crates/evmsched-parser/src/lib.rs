//! # evmsched-parser
//!
//! MS Project MSPDI (XML) import.
//!
//! Consumes the `Project/Tasks/Task` document shape and produces domain
//! entities: summary tasks become WBS elements, leaf tasks become
//! activities, and `PredecessorLink` records become typed dependencies.
//!
//! MSPDI conventions handled here:
//! - `Duration` is ISO-8601 time (`PT40H0M0S`); working days = hours / 8,
//!   rounded up.
//! - `PredecessorLink/Type` codes: 0 = FF, 1 = FS, 2 = SF, 3 = SS.
//! - `LinkLag` is in tenths of minutes; 4800 tenths = one 8-hour day.
//! - `ConstraintType` codes 0..=7; Must-Start-On / Must-Finish-On (2/3) have
//!   no direct counterpart and import as SNET / FNLT with the date kept.

use chrono::NaiveDate;
use evmsched_core::{
    Activity, ActivityId, ConstraintKind, Dependency, DependencyKind, Program, WbsElement, WbsId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("malformed MSPDI document: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    #[error("document contains no tasks")]
    EmptyDocument,

    #[error("invalid duration literal '{0}'")]
    InvalidDuration(String),

    #[error("invalid date literal '{0}'")]
    InvalidDate(String),
}

/// Result of an MSPDI import.
#[derive(Debug, Clone)]
pub struct ImportedProgram {
    pub program: Program,
    pub wbs_elements: Vec<WbsElement>,
    pub activities: Vec<Activity>,
    pub dependencies: Vec<Dependency>,
}

// ============================================================================
// Raw document shape
// ============================================================================

#[derive(Debug, Deserialize)]
struct XmlProject {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Tasks")]
    tasks: Option<XmlTasks>,
}

#[derive(Debug, Deserialize)]
struct XmlTasks {
    #[serde(rename = "Task", default)]
    tasks: Vec<XmlTask>,
}

#[derive(Debug, Deserialize)]
struct XmlTask {
    #[serde(rename = "UID")]
    uid: i64,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "WBS")]
    wbs: Option<String>,
    #[serde(rename = "OutlineLevel")]
    outline_level: Option<u32>,
    #[serde(rename = "Duration")]
    duration: Option<String>,
    #[serde(rename = "Start")]
    start: Option<String>,
    #[serde(rename = "Finish")]
    finish: Option<String>,
    #[serde(rename = "Milestone")]
    milestone: Option<u8>,
    #[serde(rename = "Summary")]
    summary: Option<u8>,
    #[serde(rename = "PercentComplete")]
    percent_complete: Option<i64>,
    #[serde(rename = "ConstraintType")]
    constraint_type: Option<u8>,
    #[serde(rename = "ConstraintDate")]
    constraint_date: Option<String>,
    #[serde(rename = "PredecessorLink", default)]
    predecessor_links: Vec<XmlPredecessorLink>,
}

#[derive(Debug, Deserialize)]
struct XmlPredecessorLink {
    #[serde(rename = "PredecessorUID")]
    predecessor_uid: i64,
    #[serde(rename = "Type")]
    link_type: Option<u8>,
    #[serde(rename = "LinkLag")]
    link_lag: Option<i64>,
}

// ============================================================================
// Conversion
// ============================================================================

/// Tenths of minutes in one 8-hour working day.
const LAG_UNITS_PER_DAY: i64 = 4800;

/// Import an MSPDI document into domain entities owned by `owner`.
pub fn import_mspdi(xml: &str, owner: &str) -> Result<ImportedProgram, ImportError> {
    let document: XmlProject = quick_xml::de::from_str(xml)?;
    let tasks = document.tasks.map(|t| t.tasks).unwrap_or_default();
    if tasks.is_empty() {
        return Err(ImportError::EmptyDocument);
    }

    // Program window from the task dates.
    let mut starts: Vec<NaiveDate> = Vec::new();
    let mut finishes: Vec<NaiveDate> = Vec::new();
    for task in &tasks {
        if let Some(start) = &task.start {
            starts.push(parse_date(start)?);
        }
        if let Some(finish) = &task.finish {
            finishes.push(parse_date(finish)?);
        }
    }
    let program_start = starts.iter().min().copied().ok_or(ImportError::EmptyDocument)?;
    let program_end = finishes
        .iter()
        .max()
        .copied()
        .unwrap_or(program_start);

    let name = document.name.unwrap_or_else(|| "Imported Program".to_owned());
    let program = Program::new(owner, "IMPORT", name, program_start, program_end);

    // Walk tasks in document order, tracking the WBS ancestry by outline
    // level. Summary tasks become WBS elements, leaves become activities.
    let mut wbs_elements: Vec<WbsElement> = Vec::new();
    let mut activities: Vec<Activity> = Vec::new();
    let mut uid_to_activity: std::collections::BTreeMap<i64, ActivityId> =
        std::collections::BTreeMap::new();
    let mut wbs_stack: Vec<(u32, WbsId)> = Vec::new();

    let root = WbsElement::root(program.id, "0", program.name.clone(), "0");
    let root_id = root.id;
    wbs_elements.push(root);

    for task in &tasks {
        let level = task.outline_level.unwrap_or(1);
        while let Some((top_level, _)) = wbs_stack.last() {
            if *top_level >= level {
                wbs_stack.pop();
            } else {
                break;
            }
        }
        let parent_wbs = wbs_stack.last().map_or(root_id, |(_, id)| *id);

        let task_name = task
            .name
            .clone()
            .unwrap_or_else(|| format!("Task {}", task.uid));
        let wbs_code = task
            .wbs
            .clone()
            .unwrap_or_else(|| task.uid.to_string());

        if task.summary == Some(1) {
            let parent = wbs_elements
                .iter()
                .find(|w| w.id == parent_wbs)
                .expect("parent on stack exists");
            let element =
                WbsElement::child_of(parent, wbs_code, task_name, task.uid.to_string());
            wbs_stack.push((level, element.id));
            wbs_elements.push(element);
            continue;
        }

        let duration_days = match &task.duration {
            Some(literal) => parse_duration_days(literal)?,
            None => 0,
        };

        let mut activity = Activity::new(
            program.id,
            parent_wbs,
            format!("T-{}", task.uid),
            task_name,
        )
        .duration(duration_days);

        if task.milestone == Some(1) {
            activity = activity.milestone();
        }
        if let Some(start) = &task.start {
            activity.planned_start = Some(parse_date(start)?);
        }
        if let Some(finish) = &task.finish {
            activity.planned_finish = Some(parse_date(finish)?);
        }
        if let Some(percent) = task.percent_complete {
            activity.percent_complete = Decimal::from(percent.clamp(0, 100));
        }
        let (constraint, needs_date) = constraint_from_code(task.constraint_type.unwrap_or(0));
        activity.constraint = constraint;
        if needs_date {
            match &task.constraint_date {
                Some(date) => activity.constraint_date = Some(parse_date(date)?),
                None => {
                    warn!(uid = task.uid, "constraint without date, falling back to ASAP");
                    activity.constraint = ConstraintKind::AsSoonAsPossible;
                }
            }
        }

        uid_to_activity.insert(task.uid, activity.id);
        activities.push(activity);
    }

    // Second pass: dependencies between imported leaf activities.
    let mut dependencies: Vec<Dependency> = Vec::new();
    for task in &tasks {
        let Some(successor) = uid_to_activity.get(&task.uid) else {
            continue;
        };
        for link in &task.predecessor_links {
            let Some(predecessor) = uid_to_activity.get(&link.predecessor_uid) else {
                debug!(
                    uid = task.uid,
                    predecessor = link.predecessor_uid,
                    "predecessor link to non-leaf task dropped"
                );
                continue;
            };
            let kind = dependency_from_code(link.link_type.unwrap_or(1));
            let lag_days = link.link_lag.unwrap_or(0) / LAG_UNITS_PER_DAY;
            dependencies.push(
                Dependency::new(program.id, *predecessor, *successor, kind).lag(lag_days),
            );
        }
    }

    Ok(ImportedProgram {
        program,
        wbs_elements,
        activities,
        dependencies,
    })
}

/// MS Project link-type codes.
fn dependency_from_code(code: u8) -> DependencyKind {
    match code {
        0 => DependencyKind::FinishToFinish,
        2 => DependencyKind::StartToFinish,
        3 => DependencyKind::StartToStart,
        _ => DependencyKind::FinishToStart,
    }
}

/// MS Project constraint codes; returns whether a date is required.
fn constraint_from_code(code: u8) -> (ConstraintKind, bool) {
    match code {
        1 => (ConstraintKind::AsLateAsPossible, false),
        2 | 4 => (ConstraintKind::StartNoEarlierThan, true),
        5 => (ConstraintKind::StartNoLaterThan, true),
        6 => (ConstraintKind::FinishNoEarlierThan, true),
        3 | 7 => (ConstraintKind::FinishNoLaterThan, true),
        _ => (ConstraintKind::AsSoonAsPossible, false),
    }
}

/// Parse an MSPDI ISO-8601 duration (`PT40H0M0S`, optionally with a day
/// component) into whole working days, 8 hours per day, rounded up.
fn parse_duration_days(literal: &str) -> Result<i64, ImportError> {
    let bad = || ImportError::InvalidDuration(literal.to_owned());
    let rest = literal.strip_prefix('P').ok_or_else(bad)?;
    let (day_part, time_part) = match rest.split_once('T') {
        Some((days, time)) => (days, time),
        None => (rest, ""),
    };

    let mut total_minutes: i64 = 0;
    if !day_part.is_empty() {
        let days = day_part.strip_suffix('D').ok_or_else(bad)?;
        total_minutes += days.parse::<i64>().map_err(|_| bad())? * 8 * 60;
    }

    let mut number = String::new();
    for ch in time_part.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let value: i64 = number.parse().map_err(|_| bad())?;
        number.clear();
        match ch {
            'H' => total_minutes += value * 60,
            'M' => total_minutes += value,
            'S' => total_minutes += value / 60,
            _ => return Err(bad()),
        }
    }
    if !number.is_empty() {
        return Err(bad());
    }

    // round up to whole working days
    Ok((total_minutes + 8 * 60 - 1) / (8 * 60))
}

/// MSPDI dates are `YYYY-MM-DDTHH:MM:SS`; the date part is enough.
fn parse_date(literal: &str) -> Result<NaiveDate, ImportError> {
    let date_part = literal.get(..10).unwrap_or(literal);
    date_part
        .parse()
        .map_err(|_| ImportError::InvalidDate(literal.to_owned()))
}
