//! Activity-dependency network construction and validation.
//!
//! The network is the flat, schedulable view of one program: activities keyed
//! by ID plus forward and reverse adjacency indices over typed, lagged
//! dependency edges. The CPM engine assumes acyclic input; Kahn's algorithm
//! here fails with [`NetworkError::CyclicNetwork`] when that assumption is
//! violated. Cycle *prevention* belongs to the write path, which should call
//! [`ActivityNetwork::would_create_cycle`] before inserting an edge.

use std::collections::{BTreeMap, BTreeSet};

use evmsched_core::{
    Activity, ActivityId, ConstraintKind, Dependency, DependencyKind, WorkCalendar,
};
use thiserror::Error;

use crate::snapshot::ScheduleSnapshot;

/// Errors during network construction and ordering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The dependency graph contains a cycle; payload lists the activities
    /// that could not be ordered.
    #[error("dependency cycle detected; unordered activities: {0:?}")]
    CyclicNetwork(Vec<ActivityId>),

    #[error("dependency references unknown activity {0}")]
    UnknownActivity(ActivityId),

    #[error("duplicate dependency edge {predecessor} -> {successor}")]
    DuplicateEdge {
        predecessor: ActivityId,
        successor: ActivityId,
    },

    #[error("activity {0} cannot depend on itself")]
    SelfLoop(ActivityId),
}

/// A node in the scheduling network.
#[derive(Debug, Clone)]
pub struct NetworkNode {
    pub id: ActivityId,
    /// Whole working days, >= 0. Milestones are 0.
    pub duration_days: i64,
    pub is_milestone: bool,
    pub constraint: ConstraintKind,
    /// Constraint date as a working-day offset from project start.
    pub constraint_day: Option<i64>,
}

/// A typed edge in the dependency graph.
#[derive(Debug, Clone)]
pub struct NetworkEdge {
    pub predecessor: ActivityId,
    pub successor: ActivityId,
    pub kind: DependencyKind,
    pub lag_days: i64,
}

/// Flat activity graph with adjacency indices.
///
/// All maps are `BTreeMap` and edge lists are sorted, so every iteration
/// order is deterministic by activity ID — CPM tie-breaks reproduce exactly.
#[derive(Debug, Clone)]
pub struct ActivityNetwork {
    nodes: BTreeMap<ActivityId, NetworkNode>,
    successors: BTreeMap<ActivityId, Vec<NetworkEdge>>,
    predecessors: BTreeMap<ActivityId, Vec<NetworkEdge>>,
}

impl ActivityNetwork {
    /// Build a network from explicit nodes and edges.
    pub fn new(
        nodes: Vec<NetworkNode>,
        edges: Vec<NetworkEdge>,
    ) -> Result<Self, NetworkError> {
        let mut node_map = BTreeMap::new();
        for node in nodes {
            node_map.insert(node.id, node);
        }

        let mut successors: BTreeMap<ActivityId, Vec<NetworkEdge>> = node_map
            .keys()
            .map(|id| (*id, Vec::new()))
            .collect();
        let mut predecessors: BTreeMap<ActivityId, Vec<NetworkEdge>> = node_map
            .keys()
            .map(|id| (*id, Vec::new()))
            .collect();

        let mut seen_pairs: BTreeSet<(ActivityId, ActivityId)> = BTreeSet::new();
        for edge in edges {
            if edge.predecessor == edge.successor {
                return Err(NetworkError::SelfLoop(edge.predecessor));
            }
            if !node_map.contains_key(&edge.predecessor) {
                return Err(NetworkError::UnknownActivity(edge.predecessor));
            }
            if !node_map.contains_key(&edge.successor) {
                return Err(NetworkError::UnknownActivity(edge.successor));
            }
            if !seen_pairs.insert((edge.predecessor, edge.successor)) {
                return Err(NetworkError::DuplicateEdge {
                    predecessor: edge.predecessor,
                    successor: edge.successor,
                });
            }
            successors
                .get_mut(&edge.predecessor)
                .expect("initialized above")
                .push(edge.clone());
            predecessors
                .get_mut(&edge.successor)
                .expect("initialized above")
                .push(edge);
        }

        for edges in successors.values_mut() {
            edges.sort_by_key(|e| e.successor);
        }
        for edges in predecessors.values_mut() {
            edges.sort_by_key(|e| e.predecessor);
        }

        Ok(Self {
            nodes: node_map,
            successors,
            predecessors,
        })
    }

    /// Build a network from domain activities and dependencies. Constraint
    /// dates stay unresolved (no calendar available); use
    /// [`ActivityNetwork::from_snapshot`] when constraint handling matters.
    pub fn from_activities(
        activities: &[Activity],
        dependencies: &[Dependency],
    ) -> Result<Self, NetworkError> {
        let nodes = activities
            .iter()
            .map(|a| NetworkNode {
                id: a.id,
                duration_days: a.duration_days,
                is_milestone: a.is_milestone,
                constraint: a.constraint,
                constraint_day: None,
            })
            .collect();
        let edges = dependencies.iter().map(edge_from_dependency).collect();
        Self::new(nodes, edges)
    }

    /// Build a network from a snapshot, resolving constraint dates to
    /// working-day offsets from the program start.
    pub fn from_snapshot(
        snapshot: &ScheduleSnapshot,
        calendar: &WorkCalendar,
    ) -> Result<Self, NetworkError> {
        let day_zero = calendar.next_working_day(snapshot.program_start);
        let nodes = snapshot
            .activities
            .values()
            .map(|a| NetworkNode {
                id: a.id,
                duration_days: a.duration_days,
                is_milestone: a.is_milestone,
                constraint: a.constraint,
                constraint_day: a.constraint_date.map(|date| {
                    if date >= day_zero {
                        calendar.count_working_days(day_zero, date)
                    } else {
                        -calendar.count_working_days(date, day_zero)
                    }
                }),
            })
            .collect();
        let edges = snapshot.dependencies.iter().map(edge_from_dependency).collect();
        Self::new(nodes, edges)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: ActivityId) -> Option<&NetworkNode> {
        self.nodes.get(&id)
    }

    /// Nodes in ascending ID order.
    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.nodes.values()
    }

    pub fn activity_ids(&self) -> impl Iterator<Item = ActivityId> + '_ {
        self.nodes.keys().copied()
    }

    /// Outgoing edges of `id`, sorted by successor.
    pub fn successors(&self, id: ActivityId) -> &[NetworkEdge] {
        self.successors.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Incoming edges of `id`, sorted by predecessor.
    pub fn predecessors(&self, id: ActivityId) -> &[NetworkEdge] {
        self.predecessors.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Kahn's algorithm. The ready set is a `BTreeSet`, so ties emit in
    /// ascending ID order. Fails with `CyclicNetwork` listing any activity
    /// left unemitted.
    pub fn topological_order(&self) -> Result<Vec<ActivityId>, NetworkError> {
        let mut in_degree: BTreeMap<ActivityId, usize> =
            self.nodes.keys().map(|id| (*id, 0)).collect();
        for edges in self.successors.values() {
            for edge in edges {
                *in_degree.get_mut(&edge.successor).expect("known node") += 1;
            }
        }

        let mut ready: BTreeSet<ActivityId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.iter().next().copied() {
            ready.remove(&id);
            order.push(id);
            for edge in self.successors(id) {
                let degree = in_degree.get_mut(&edge.successor).expect("known node");
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(edge.successor);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let ordered: BTreeSet<ActivityId> = order.into_iter().collect();
            let remaining = self
                .nodes
                .keys()
                .filter(|id| !ordered.contains(id))
                .copied()
                .collect();
            return Err(NetworkError::CyclicNetwork(remaining));
        }
        Ok(order)
    }

    /// Would inserting `predecessor -> successor` close a cycle?
    ///
    /// Depth-first search from the successor through existing forward edges;
    /// reaching the predecessor means the new edge completes a loop. The
    /// write path calls this before persisting a dependency.
    pub fn would_create_cycle(&self, predecessor: ActivityId, successor: ActivityId) -> bool {
        if predecessor == successor {
            return true;
        }
        let mut stack = vec![successor];
        let mut visited = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == predecessor {
                return true;
            }
            if visited.insert(current) {
                for edge in self.successors(current) {
                    stack.push(edge.successor);
                }
            }
        }
        false
    }
}

fn edge_from_dependency(dep: &Dependency) -> NetworkEdge {
    NetworkEdge {
        predecessor: dep.predecessor_id,
        successor: dep.successor_id,
        kind: dep.kind,
        lag_days: dep.lag_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evmsched_core::{ProgramId, WbsId};

    fn activity(program: ProgramId, wbs: WbsId, code: &str, days: i64) -> Activity {
        Activity::new(program, wbs, code, code).duration(days)
    }

    fn fs(program: ProgramId, pred: &Activity, succ: &Activity) -> Dependency {
        Dependency::new(program, pred.id, succ.id, DependencyKind::FinishToStart)
    }

    #[test]
    fn builds_adjacency_both_ways() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = activity(program, wbs, "a", 5);
        let b = activity(program, wbs, "b", 3);
        let dep = fs(program, &a, &b);
        let (a_id, b_id) = (a.id, b.id);

        let network = ActivityNetwork::from_activities(&[a, b], &[dep]).unwrap();

        assert_eq!(network.len(), 2);
        assert_eq!(network.successors(a_id).len(), 1);
        assert_eq!(network.successors(a_id)[0].successor, b_id);
        assert_eq!(network.predecessors(b_id).len(), 1);
        assert_eq!(network.predecessors(b_id)[0].predecessor, a_id);
        assert!(network.successors(b_id).is_empty());
    }

    #[test]
    fn topological_order_respects_edges() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = activity(program, wbs, "a", 5);
        let b = activity(program, wbs, "b", 3);
        let c = activity(program, wbs, "c", 2);
        let deps = vec![fs(program, &a, &b), fs(program, &b, &c)];
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);

        let network = ActivityNetwork::from_activities(&[c.clone(), a, b], &deps).unwrap();
        let order = network.topological_order().unwrap();

        let pos = |id| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(a_id) < pos(b_id));
        assert!(pos(b_id) < pos(c_id));
    }

    #[test]
    fn cycle_fails_topological_order() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = activity(program, wbs, "a", 5);
        let b = activity(program, wbs, "b", 3);
        let deps = vec![fs(program, &a, &b), fs(program, &b, &a)];

        let network = ActivityNetwork::from_activities(&[a, b], &deps).unwrap();
        let err = network.topological_order().unwrap_err();
        assert!(matches!(err, NetworkError::CyclicNetwork(ids) if ids.len() == 2));
    }

    #[test]
    fn would_create_cycle_detects_back_edge() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = activity(program, wbs, "a", 5);
        let b = activity(program, wbs, "b", 3);
        let c = activity(program, wbs, "c", 2);
        let deps = vec![fs(program, &a, &b), fs(program, &b, &c)];
        let (a_id, c_id) = (a.id, c.id);

        let network = ActivityNetwork::from_activities(&[a, b, c], &deps).unwrap();

        assert!(network.would_create_cycle(c_id, a_id));
        assert!(network.would_create_cycle(a_id, a_id));
        assert!(!network.would_create_cycle(a_id, c_id));
    }

    #[test]
    fn duplicate_edge_rejected() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = activity(program, wbs, "a", 5);
        let b = activity(program, wbs, "b", 3);
        let deps = vec![fs(program, &a, &b), fs(program, &a, &b)];

        let err = ActivityNetwork::from_activities(&[a, b], &deps).unwrap_err();
        assert!(matches!(err, NetworkError::DuplicateEdge { .. }));
    }

    #[test]
    fn self_loop_rejected() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = activity(program, wbs, "a", 5);
        let dep = Dependency::new(program, a.id, a.id, DependencyKind::FinishToStart);

        let err = ActivityNetwork::from_activities(&[a], &[dep]).unwrap_err();
        assert!(matches!(err, NetworkError::SelfLoop(_)));
    }

    #[test]
    fn unknown_endpoint_rejected() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let a = activity(program, wbs, "a", 5);
        let ghost = activity(program, wbs, "ghost", 1);
        let dep = fs(program, &a, &ghost);

        let err = ActivityNetwork::from_activities(&[a], &[dep]).unwrap_err();
        assert!(matches!(err, NetworkError::UnknownActivity(_)));
    }

    #[test]
    fn milestones_are_first_class_nodes() {
        let program = ProgramId::new();
        let wbs = WbsId::new();
        let gate = Activity::new(program, wbs, "ms", "Gate Review").milestone();
        let id = gate.id;

        let network = ActivityNetwork::from_activities(&[gate], &[]).unwrap();
        let node = network.node(id).unwrap();
        assert!(node.is_milestone);
        assert_eq!(node.duration_days, 0);
    }
}
