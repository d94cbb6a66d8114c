//! Critical Path Method over the activity network.
//!
//! References:
//!   - Kelley & Walker (1959) "Critical-Path Planning and Scheduling"
//!   - PMI PMBOK Guide, Chapter 6
//!
//! # Algorithm
//!
//! 1. Topological sort (network.rs)
//! 2. Forward pass: Early Start / Early Finish per relation type and lag
//! 3. Backward pass: Late Start / Late Finish
//! 4. Floats: total = LS - ES, free = min slack toward successors
//! 5. Critical: total float == 0
//!
//! Start-No-Earlier-Than constraints push the forward pass; the
//! no-later-than constraints are evaluated and flagged when the natural
//! dates overrun them but are not pulled backward here (see DESIGN.md —
//! flagged for review).

use std::collections::BTreeMap;

use evmsched_core::{ActivityId, ConstraintKind, DependencyKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::{ActivityNetwork, NetworkEdge, NetworkError};

/// Errors during CPM scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpmError {
    #[error("cannot schedule an empty network")]
    EmptyNetwork,

    /// Total float must never be negative in an unconstrained backward pass.
    #[error("CPM invariant violated: activity {activity} has negative float {float}")]
    NegativeFloat { activity: ActivityId, float: i64 },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Scheduling options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CpmOptions {
    /// Day offset the project starts on (default 0).
    pub project_start_day: i64,
}

impl Default for CpmOptions {
    fn default() -> Self {
        Self {
            project_start_day: 0,
        }
    }
}

/// CPM output for a single activity, in working-day offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpmActivity {
    pub activity_id: ActivityId,
    pub early_start: i64,
    pub early_finish: i64,
    pub late_start: i64,
    pub late_finish: i64,
    pub total_float: i64,
    pub free_float: i64,
    pub is_critical: bool,
    pub duration: i64,
    /// True when a no-later-than constraint is overrun by the natural dates.
    pub constraint_violated: bool,
}

/// Complete CPM schedule for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpmSchedule {
    pub results: BTreeMap<ActivityId, CpmActivity>,
    /// Zero-float activities with non-zero duration, in topological order.
    pub critical_path: Vec<ActivityId>,
    pub project_start: i64,
    /// Max early finish across the network.
    pub project_finish: i64,
    pub project_duration: i64,
}

/// The CPM engine. Pure and synchronous; one call computes one schedule.
#[derive(Debug, Default)]
pub struct CpmEngine;

impl CpmEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn schedule(
        &self,
        network: &ActivityNetwork,
        options: &CpmOptions,
    ) -> Result<CpmSchedule, CpmError> {
        if network.is_empty() {
            return Err(CpmError::EmptyNetwork);
        }

        let topo_order = network.topological_order()?;
        let project_start = options.project_start_day;

        let mut es: BTreeMap<ActivityId, i64> = BTreeMap::new();
        let mut ef: BTreeMap<ActivityId, i64> = BTreeMap::new();
        let mut violated: BTreeMap<ActivityId, bool> = BTreeMap::new();

        // Forward pass: ES = max over predecessor contributions, then
        // constraints. Iteration is deterministic by activity ID.
        for id in &topo_order {
            let node = network.node(*id).expect("topo order node");
            let duration = node.duration_days;

            let natural = network
                .predecessors(*id)
                .iter()
                .map(|edge| successor_es(edge, es[&edge.predecessor], ef[&edge.predecessor], duration))
                .max()
                .unwrap_or(project_start)
                .max(project_start);

            let mut early_start = natural;
            let mut bound = false;
            if let Some(day) = node.constraint_day {
                match node.constraint {
                    ConstraintKind::StartNoEarlierThan => {
                        early_start = early_start.max(day);
                    }
                    ConstraintKind::FinishNoEarlierThan => {
                        early_start = early_start.max(day - duration);
                    }
                    ConstraintKind::StartNoLaterThan => {
                        bound = early_start > day;
                    }
                    ConstraintKind::FinishNoLaterThan => {
                        bound = early_start + duration > day;
                    }
                    ConstraintKind::AsSoonAsPossible | ConstraintKind::AsLateAsPossible => {}
                }
            }

            es.insert(*id, early_start);
            ef.insert(*id, early_start + duration);
            violated.insert(*id, bound);
        }

        let project_finish = ef.values().copied().max().unwrap_or(project_start);

        // Backward pass: LF = min over successor contributions; sinks close
        // at the project finish.
        let mut ls: BTreeMap<ActivityId, i64> = BTreeMap::new();
        let mut lf: BTreeMap<ActivityId, i64> = BTreeMap::new();

        for id in topo_order.iter().rev() {
            let node = network.node(*id).expect("topo order node");
            let duration = node.duration_days;

            let late_finish = network
                .successors(*id)
                .iter()
                .map(|edge| predecessor_lf(edge, ls[&edge.successor], lf[&edge.successor], duration))
                .min()
                .unwrap_or(project_finish);

            lf.insert(*id, late_finish);
            ls.insert(*id, late_finish - duration);
        }

        // Floats and the critical path.
        let mut results = BTreeMap::new();
        let mut critical_path = Vec::new();

        for id in &topo_order {
            let node = network.node(*id).expect("topo order node");
            let duration = node.duration_days;
            let total_float = ls[id] - es[id];
            if total_float < 0 {
                return Err(CpmError::NegativeFloat {
                    activity: *id,
                    float: total_float,
                });
            }

            let successors = network.successors(*id);
            let free_float = if successors.is_empty() {
                total_float
            } else {
                successors
                    .iter()
                    .map(|edge| forward_slack(edge, es[id], ef[id], es[&edge.successor], ef[&edge.successor]))
                    .min()
                    .unwrap_or(total_float)
                    .max(0)
            };

            let is_critical = total_float == 0;
            if is_critical && duration > 0 {
                critical_path.push(*id);
            }

            results.insert(
                *id,
                CpmActivity {
                    activity_id: *id,
                    early_start: es[id],
                    early_finish: ef[id],
                    late_start: ls[id],
                    late_finish: lf[id],
                    total_float,
                    free_float: free_float.min(total_float),
                    is_critical,
                    duration,
                    constraint_violated: violated[id],
                },
            );
        }

        Ok(CpmSchedule {
            results,
            critical_path,
            project_start,
            project_finish,
            project_duration: project_finish - project_start,
        })
    }
}

/// ES contribution the edge imposes on its successor.
///
/// FS and SS constrain the successor's start directly; FF and SF constrain
/// its finish, so the successor duration is subtracted out.
fn successor_es(edge: &NetworkEdge, pred_es: i64, pred_ef: i64, succ_duration: i64) -> i64 {
    let lag = edge.lag_days;
    match edge.kind {
        // ES(S) >= EF(P) + lag
        DependencyKind::FinishToStart => pred_ef + lag,
        // ES(S) >= ES(P) + lag
        DependencyKind::StartToStart => pred_es + lag,
        // EF(S) >= EF(P) + lag  =>  ES(S) >= EF(P) + lag - dur(S)
        DependencyKind::FinishToFinish => pred_ef + lag - succ_duration,
        // EF(S) >= ES(P) + lag  =>  ES(S) >= ES(P) + lag - dur(S)
        DependencyKind::StartToFinish => pred_es + lag - succ_duration,
    }
}

/// LF contribution the edge imposes on its predecessor.
fn predecessor_lf(edge: &NetworkEdge, succ_ls: i64, succ_lf: i64, pred_duration: i64) -> i64 {
    let lag = edge.lag_days;
    match edge.kind {
        // LF(P) <= LS(S) - lag
        DependencyKind::FinishToStart => succ_ls - lag,
        // LS(P) <= LS(S) - lag  =>  LF(P) <= LS(S) - lag + dur(P)
        DependencyKind::StartToStart => succ_ls - lag + pred_duration,
        // LF(P) <= LF(S) - lag
        DependencyKind::FinishToFinish => succ_lf - lag,
        // LS(P) <= LF(S) - lag  =>  LF(P) <= LF(S) - lag + dur(P)
        DependencyKind::StartToFinish => succ_lf - lag + pred_duration,
    }
}

/// Slack between an edge's requirement and the successor's early dates; the
/// minimum over successors is the predecessor's free float.
fn forward_slack(
    edge: &NetworkEdge,
    pred_es: i64,
    pred_ef: i64,
    succ_es: i64,
    succ_ef: i64,
) -> i64 {
    let lag = edge.lag_days;
    match edge.kind {
        DependencyKind::FinishToStart => succ_es - lag - pred_ef,
        DependencyKind::StartToStart => succ_es - lag - pred_es,
        DependencyKind::FinishToFinish => succ_ef - lag - pred_ef,
        DependencyKind::StartToFinish => succ_ef - lag - pred_es,
    }
}
