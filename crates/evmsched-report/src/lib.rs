//! # evmsched-report
//!
//! Earned-value reporting for evmsched: the scalar EVMS calculator, the CPR
//! Format 1 (WBS rollup), Format 3 (time-phased), and Format 5 (EAC/MR/
//! variance) generators, and the variance analyzer.
//!
//! All generators are pure: they take period and WBS data that the caller
//! already loaded and emit serializable report structures. Monetary values
//! round half-up to two places; performance indices to three.

pub mod format1;
pub mod format3;
pub mod format5;
pub mod metrics;
pub mod variance;

pub use metrics::EvmsInputs;
