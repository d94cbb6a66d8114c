//! # evmsched-solver
//!
//! Scheduling engine for evmsched: the activity-dependency network, the CPM
//! forward/backward passes, resource loading and over-allocation detection,
//! serial and parallel resource leveling, Monte Carlo schedule simulation,
//! and the content-addressed schedule cache.
//!
//! Every algorithm in this crate is pure, synchronous, and single-threaded
//! per call: it takes an in-memory [`ScheduleSnapshot`] (or an
//! [`ActivityNetwork`] derived from one) and produces a result. Concurrency
//! lives with the callers; the only shared structure is [`cache::ComputeCache`],
//! which serializes writers per fingerprint.
//!
//! ## Example
//!
//! ```rust
//! use evmsched_core::{Activity, Dependency, DependencyKind, ProgramId, WbsId};
//! use evmsched_solver::cpm::{CpmEngine, CpmOptions};
//! use evmsched_solver::network::ActivityNetwork;
//!
//! let program = ProgramId::new();
//! let wbs = WbsId::new();
//! let design = Activity::new(program, wbs, "A-100", "Design").duration(10);
//! let build = Activity::new(program, wbs, "A-200", "Build").duration(15);
//! let dep = Dependency::new(program, design.id, build.id, DependencyKind::FinishToStart);
//!
//! let network = ActivityNetwork::from_activities(&[design, build], &[dep]).unwrap();
//! let schedule = CpmEngine::new().schedule(&network, &CpmOptions::default()).unwrap();
//! assert_eq!(schedule.project_duration, 25);
//! ```

pub mod cache;
pub mod cancel;
pub mod compare;
pub mod cpm;
pub mod dates;
pub mod leveling;
pub mod loading;
pub mod network;
pub mod overallocation;
pub mod parallel;
pub mod simulation;
pub mod snapshot;

pub use cancel::CancelFlag;
pub use snapshot::ScheduleSnapshot;
