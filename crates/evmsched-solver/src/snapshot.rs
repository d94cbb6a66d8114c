//! In-memory program snapshot consumed by the solver algorithms.
//!
//! Callers load one program's activities, dependencies, resources, and
//! assignments into a snapshot; all algorithms then run without touching
//! storage. Writes happen after the fact, in the caller's transaction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use evmsched_core::{Activity, ActivityId, Assignment, Dependency, ProgramId, Resource, ResourceId};

/// One program's schedule state, frozen for computation.
#[derive(Clone, Debug)]
pub struct ScheduleSnapshot {
    pub program_id: ProgramId,
    pub program_start: NaiveDate,
    pub program_end: NaiveDate,
    pub activities: BTreeMap<ActivityId, Activity>,
    pub resources: BTreeMap<ResourceId, Resource>,
    pub assignments: Vec<Assignment>,
    pub dependencies: Vec<Dependency>,
}

impl ScheduleSnapshot {
    pub fn new(
        program_id: ProgramId,
        program_start: NaiveDate,
        program_end: NaiveDate,
    ) -> Self {
        Self {
            program_id,
            program_start,
            program_end,
            activities: BTreeMap::new(),
            resources: BTreeMap::new(),
            assignments: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_activities(mut self, activities: impl IntoIterator<Item = Activity>) -> Self {
        for activity in activities {
            self.activities.insert(activity.id, activity);
        }
        self
    }

    pub fn with_resources(mut self, resources: impl IntoIterator<Item = Resource>) -> Self {
        for resource in resources {
            self.resources.insert(resource.id, resource);
        }
        self
    }

    pub fn with_assignments(mut self, assignments: impl IntoIterator<Item = Assignment>) -> Self {
        self.assignments.extend(assignments);
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = Dependency>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn activity(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.get(&id)
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    pub fn assignments_for_activity(&self, id: ActivityId) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.activity_id == id)
    }

    pub fn assignments_for_resource(&self, id: ResourceId) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.resource_id == id)
    }

    /// The date window an assignment's activity occupies: planned dates when
    /// present, otherwise the CPM early dates.
    pub fn effective_range(&self, activity_id: ActivityId) -> Option<(NaiveDate, NaiveDate)> {
        let activity = self.activity(activity_id)?;
        match (activity.planned_start, activity.planned_finish) {
            (Some(start), Some(finish)) => Some((start, finish)),
            _ => match (activity.early_start, activity.early_finish) {
                (Some(start), Some(finish)) => Some((start, finish)),
                _ => None,
            },
        }
    }

    /// Latest known finish across all activities.
    pub fn project_finish(&self) -> Option<NaiveDate> {
        self.activities
            .keys()
            .filter_map(|id| self.effective_range(*id))
            .map(|(_, finish)| finish)
            .max()
    }
}
