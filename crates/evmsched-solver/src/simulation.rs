//! Monte Carlo schedule simulation.
//!
//! Each iteration samples every configured activity's duration from its
//! distribution and recomputes the network duration. Quick mode runs only
//! the forward pass; network mode adds the backward pass per iteration to
//! produce a criticality index (fraction of iterations on the critical path)
//! and sensitivity (Pearson correlation between an activity's sampled
//! duration and the total duration).
//!
//! One PRNG per run, seeded from the config or OS entropy; results are
//! deterministic given the same (seed, config).

use std::collections::BTreeMap;

use evmsched_core::{ActivityId, ProgramId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::cancel::CancelFlag;
use crate::network::{ActivityNetwork, NetworkError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("iterations must be greater than zero")]
    InvalidIterations,

    #[error("cannot simulate an empty network")]
    EmptyNetwork,

    #[error("invalid distribution for activity {activity}: {reason}")]
    InvalidDistribution {
        activity: ActivityId,
        reason: String,
    },

    #[error("simulation cancelled after {completed} iterations")]
    Cancelled { completed: u32 },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Duration distribution for one activity, in days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DurationDistribution {
    /// Inverse-CDF sampling.
    Triangular { min: f64, mode: f64, max: f64 },
    /// Beta(alpha, beta) with alpha = 1 + 4(mode-min)/(max-min),
    /// beta = 1 + 4(max-mode)/(max-min), scaled to [min, max].
    Pert { min: f64, mode: f64, max: f64 },
    /// Box-Muller, clamped to >= 1 day.
    Normal { mean: f64, std_dev: f64 },
    Uniform { min: f64, max: f64 },
}

impl DurationDistribution {
    fn validate(&self, activity: ActivityId) -> Result<(), SimulationError> {
        let bad = |reason: &str| SimulationError::InvalidDistribution {
            activity,
            reason: reason.to_owned(),
        };
        match *self {
            DurationDistribution::Triangular { min, mode, max }
            | DurationDistribution::Pert { min, mode, max } => {
                if !(min <= mode && mode <= max) {
                    return Err(bad("expected min <= mode <= max"));
                }
                if min < 0.0 {
                    return Err(bad("durations cannot be negative"));
                }
                Ok(())
            }
            DurationDistribution::Normal { std_dev, .. } => {
                if std_dev < 0.0 {
                    return Err(bad("standard deviation cannot be negative"));
                }
                Ok(())
            }
            DurationDistribution::Uniform { min, max } => {
                if min > max {
                    return Err(bad("expected min <= max"));
                }
                if min < 0.0 {
                    return Err(bad("durations cannot be negative"));
                }
                Ok(())
            }
        }
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        match *self {
            DurationDistribution::Triangular { min, mode, max } => {
                if max <= min {
                    return min;
                }
                let u: f64 = rng.gen();
                let cut = (mode - min) / (max - min);
                if u < cut {
                    min + (u * (max - min) * (mode - min)).sqrt()
                } else {
                    max - ((1.0 - u) * (max - min) * (max - mode)).sqrt()
                }
            }
            DurationDistribution::Pert { min, mode, max } => {
                if max <= min {
                    return min;
                }
                let alpha = 1.0 + 4.0 * (mode - min) / (max - min);
                let beta = 1.0 + 4.0 * (max - mode) / (max - min);
                match Beta::new(alpha, beta) {
                    Ok(dist) => min + dist.sample(rng) * (max - min),
                    Err(_) => mode,
                }
            }
            DurationDistribution::Normal { mean, std_dev } => {
                // Box-Muller transform
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                (mean + std_dev * z).max(1.0)
            }
            DurationDistribution::Uniform { min, max } => {
                if max <= min {
                    min
                } else {
                    rng.gen_range(min..=max)
                }
            }
        }
    }
}

/// Simulation request: per-activity distributions plus run parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub program_id: ProgramId,
    pub iterations: u32,
    /// Fixed seed for reproducibility; a cryptographically strong seed is
    /// drawn when absent.
    pub seed: Option<u64>,
    pub distributions: BTreeMap<ActivityId, DurationDistribution>,
}

impl SimulationConfig {
    pub fn new(program_id: ProgramId, iterations: u32) -> Self {
        Self {
            program_id,
            iterations,
            seed: None,
            distributions: BTreeMap::new(),
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn distribution(mut self, activity: ActivityId, dist: DurationDistribution) -> Self {
        self.distributions.insert(activity, dist);
        self
    }

    /// Cache key over the whole config; `BTreeMap` iteration keeps it
    /// canonical.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.program_id.to_string().as_bytes());
        hasher.update(self.iterations.to_le_bytes());
        if let Some(seed) = self.seed {
            hasher.update(seed.to_le_bytes());
        }
        for (id, dist) in &self.distributions {
            hasher.update(format!("|{}:{:?}", id, dist).as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Total-duration percentiles, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationPercentiles {
    pub p10: i64,
    pub p50: i64,
    pub p80: i64,
    pub p90: i64,
    pub p95: i64,
}

/// Per-activity statistics from network mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityStatistics {
    /// Fraction of iterations on the critical path, 0..=1.
    pub criticality_index: f64,
    /// Pearson correlation between sampled duration and total duration.
    pub sensitivity: f64,
}

/// Simulation output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub program_id: ProgramId,
    pub iterations_run: u32,
    /// The seed actually used; echoes the config or records the drawn one.
    pub seed: u64,
    pub mean_duration: f64,
    pub std_dev: f64,
    pub minimum: i64,
    pub maximum: i64,
    pub percentiles: DurationPercentiles,
    /// Empty in quick mode.
    pub activity_stats: BTreeMap<ActivityId, ActivityStatistics>,
}

/// The Monte Carlo engine.
#[derive(Debug, Default)]
pub struct MonteCarloEngine;

impl MonteCarloEngine {
    pub fn new() -> Self {
        Self
    }

    /// Quick mode: forward pass only, duration percentiles.
    pub fn run_quick(
        &self,
        network: &ActivityNetwork,
        config: &SimulationConfig,
        cancel: &CancelFlag,
    ) -> Result<SimulationResult, SimulationError> {
        self.run(network, config, cancel, false)
    }

    /// Network mode: full CPM per iteration, adds criticality and
    /// sensitivity.
    pub fn run_network(
        &self,
        network: &ActivityNetwork,
        config: &SimulationConfig,
        cancel: &CancelFlag,
    ) -> Result<SimulationResult, SimulationError> {
        self.run(network, config, cancel, true)
    }

    fn run(
        &self,
        network: &ActivityNetwork,
        config: &SimulationConfig,
        cancel: &CancelFlag,
        with_stats: bool,
    ) -> Result<SimulationResult, SimulationError> {
        if config.iterations == 0 {
            return Err(SimulationError::InvalidIterations);
        }
        if network.is_empty() {
            return Err(SimulationError::EmptyNetwork);
        }
        for (activity, dist) in &config.distributions {
            dist.validate(*activity)?;
        }

        let topo_order = network.topological_order()?;
        let seed = config.seed.unwrap_or_else(|| rand::rngs::OsRng.gen());
        let mut rng = StdRng::seed_from_u64(seed);

        let ids: Vec<ActivityId> = network.activity_ids().collect();
        let mut totals: Vec<f64> = Vec::with_capacity(config.iterations as usize);
        let mut critical_counts: BTreeMap<ActivityId, u32> =
            ids.iter().map(|id| (*id, 0)).collect();
        let mut sampled_series: BTreeMap<ActivityId, Vec<f64>> = if with_stats {
            ids.iter()
                .map(|id| (*id, Vec::with_capacity(config.iterations as usize)))
                .collect()
        } else {
            BTreeMap::new()
        };

        for completed in 0..config.iterations {
            if cancel.is_cancelled() {
                return Err(SimulationError::Cancelled { completed });
            }

            // Sample this iteration's durations.
            let mut durations: BTreeMap<ActivityId, i64> = BTreeMap::new();
            for id in &ids {
                let node = network.node(*id).expect("known node");
                let days = match config.distributions.get(id) {
                    Some(dist) => dist.sample(&mut rng).round().max(0.0) as i64,
                    None => node.duration_days,
                };
                if with_stats {
                    sampled_series
                        .get_mut(id)
                        .expect("series initialized")
                        .push(days as f64);
                }
                durations.insert(*id, days);
            }

            let (es, _ef, total) = forward_pass(network, &topo_order, &durations);
            totals.push(total as f64);

            if with_stats {
                let (ls, _lf) = backward_pass(network, &topo_order, &durations, total);
                for id in &ids {
                    if ls[id] - es[id] == 0 {
                        *critical_counts.get_mut(id).expect("known id") += 1;
                    }
                }
            }
        }

        let mut sorted = totals.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("durations are finite"));
        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;

        let activity_stats = if with_stats {
            ids.iter()
                .map(|id| {
                    (
                        *id,
                        ActivityStatistics {
                            criticality_index: f64::from(critical_counts[id])
                                / f64::from(config.iterations),
                            sensitivity: pearson(&sampled_series[id], &totals),
                        },
                    )
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        info!(
            program = %config.program_id,
            iterations = config.iterations,
            seed,
            mean,
            "monte carlo run complete"
        );

        Ok(SimulationResult {
            program_id: config.program_id,
            iterations_run: config.iterations,
            seed,
            mean_duration: mean,
            std_dev: variance.sqrt(),
            minimum: sorted.first().copied().unwrap_or(0.0) as i64,
            maximum: sorted.last().copied().unwrap_or(0.0) as i64,
            percentiles: DurationPercentiles {
                p10: nearest_rank(&sorted, 10.0),
                p50: nearest_rank(&sorted, 50.0),
                p80: nearest_rank(&sorted, 80.0),
                p90: nearest_rank(&sorted, 90.0),
                p95: nearest_rank(&sorted, 95.0),
            },
            activity_stats,
        })
    }
}

type DayMap = BTreeMap<ActivityId, i64>;

fn forward_pass(
    network: &ActivityNetwork,
    topo_order: &[ActivityId],
    durations: &DayMap,
) -> (DayMap, DayMap, i64) {
    use evmsched_core::DependencyKind;

    let mut es: DayMap = BTreeMap::new();
    let mut ef: DayMap = BTreeMap::new();
    for id in topo_order {
        let duration = durations[id];
        let start = network
            .predecessors(*id)
            .iter()
            .map(|edge| {
                let lag = edge.lag_days;
                match edge.kind {
                    DependencyKind::FinishToStart => ef[&edge.predecessor] + lag,
                    DependencyKind::StartToStart => es[&edge.predecessor] + lag,
                    DependencyKind::FinishToFinish => ef[&edge.predecessor] + lag - duration,
                    DependencyKind::StartToFinish => es[&edge.predecessor] + lag - duration,
                }
            })
            .max()
            .unwrap_or(0)
            .max(0);
        es.insert(*id, start);
        ef.insert(*id, start + duration);
    }
    let total = ef.values().copied().max().unwrap_or(0);
    (es, ef, total)
}

fn backward_pass(
    network: &ActivityNetwork,
    topo_order: &[ActivityId],
    durations: &DayMap,
    project_finish: i64,
) -> (DayMap, DayMap) {
    use evmsched_core::DependencyKind;

    let mut ls: DayMap = BTreeMap::new();
    let mut lf: DayMap = BTreeMap::new();
    for id in topo_order.iter().rev() {
        let duration = durations[id];
        let finish = network
            .successors(*id)
            .iter()
            .map(|edge| {
                let lag = edge.lag_days;
                match edge.kind {
                    DependencyKind::FinishToStart => ls[&edge.successor] - lag,
                    DependencyKind::StartToStart => ls[&edge.successor] - lag + duration,
                    DependencyKind::FinishToFinish => lf[&edge.successor] - lag,
                    DependencyKind::StartToFinish => lf[&edge.successor] - lag + duration,
                }
            })
            .min()
            .unwrap_or(project_finish);
        lf.insert(*id, finish);
        ls.insert(*id, finish - duration);
    }
    (ls, lf)
}

/// Nearest-rank percentile over an ascending sample.
fn nearest_rank(sorted: &[f64], percentile: f64) -> i64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    let index = rank.clamp(1, sorted.len()) - 1;
    sorted[index].round() as i64
}

/// Pearson correlation; 0 when either side has no variance.
fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.is_empty() {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}
