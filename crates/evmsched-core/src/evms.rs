//! EVMS reporting periods, per-WBS period data, and the management-reserve
//! log.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{PeriodId, ProgramId, WbsId};

/// A reporting window with cumulative program-level EVMS values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvmsPeriod {
    pub id: PeriodId,
    pub program_id: ProgramId,
    /// Display label, e.g. `January 2026`.
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Cumulative Budgeted Cost of Work Scheduled through period end.
    pub cumulative_bcws: Decimal,
    /// Cumulative Budgeted Cost of Work Performed through period end.
    pub cumulative_bcwp: Decimal,
    /// Cumulative Actual Cost of Work Performed through period end.
    pub cumulative_acwp: Decimal,
}

impl EvmsPeriod {
    pub fn new(
        program_id: ProgramId,
        label: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            id: PeriodId::new(),
            program_id,
            label: label.into(),
            start,
            end,
            cumulative_bcws: Decimal::ZERO,
            cumulative_bcwp: Decimal::ZERO,
            cumulative_acwp: Decimal::ZERO,
        }
    }

    pub fn cumulative(mut self, bcws: Decimal, bcwp: Decimal, acwp: Decimal) -> Self {
        self.cumulative_bcws = bcws;
        self.cumulative_bcwp = bcwp;
        self.cumulative_acwp = acwp;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.end < self.start {
            return Err(DomainError::validation(format!(
                "period {}: end precedes start",
                self.label
            )));
        }
        Ok(())
    }
}

/// Per-WBS incremental EVMS values for one period.
///
/// Invariant (enforced by the write path, checkable via
/// [`validate_period_rollup`]): the leaf-WBS ACWP values for a period sum to
/// the period's incremental ACWP.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeriodData {
    pub period_id: PeriodId,
    pub wbs_id: WbsId,
    pub bcws: Decimal,
    pub bcwp: Decimal,
    pub acwp: Decimal,
}

impl PeriodData {
    pub fn new(period_id: PeriodId, wbs_id: WbsId) -> Self {
        Self {
            period_id,
            wbs_id,
            bcws: Decimal::ZERO,
            bcwp: Decimal::ZERO,
            acwp: Decimal::ZERO,
        }
    }

    pub fn values(mut self, bcws: Decimal, bcwp: Decimal, acwp: Decimal) -> Self {
        self.bcws = bcws;
        self.bcwp = bcwp;
        self.acwp = acwp;
        self
    }
}

/// Check that leaf period data sums to the period's incremental ACWP.
///
/// `previous_cumulative_acwp` is the prior period's cumulative ACWP (zero for
/// the first period).
pub fn validate_period_rollup(
    period: &EvmsPeriod,
    previous_cumulative_acwp: Decimal,
    leaf_data: &[PeriodData],
) -> Result<(), DomainError> {
    let leaf_sum: Decimal = leaf_data
        .iter()
        .filter(|d| d.period_id == period.id)
        .map(|d| d.acwp)
        .sum();
    let incremental = period.cumulative_acwp - previous_cumulative_acwp;
    if leaf_sum != incremental {
        return Err(DomainError::validation(format!(
            "period {}: leaf ACWP sum {} does not equal incremental ACWP {}",
            period.label, leaf_sum, incremental
        )));
    }
    Ok(())
}

/// One entry in the management-reserve log.
///
/// Entries form an ordered chain: each row's ending MR carries into the next
/// row's beginning MR, and MR never goes negative.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MrLogEntry {
    pub beginning_mr: Decimal,
    pub changes_in: Decimal,
    pub changes_out: Decimal,
    pub ending_mr: Decimal,
    pub reason: String,
    pub period_label: Option<String>,
}

impl MrLogEntry {
    pub fn new(
        beginning_mr: Decimal,
        changes_in: Decimal,
        changes_out: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            beginning_mr,
            changes_in,
            changes_out,
            ending_mr: beginning_mr + changes_in - changes_out,
            reason: reason.into(),
            period_label: None,
        }
    }

    pub fn period(mut self, label: impl Into<String>) -> Self {
        self.period_label = Some(label.into());
        self
    }
}

/// Validate the MR-log chain invariants over an ordered sequence of entries.
pub fn validate_mr_chain(entries: &[MrLogEntry]) -> Result<(), DomainError> {
    for (index, entry) in entries.iter().enumerate() {
        let expected = entry.beginning_mr + entry.changes_in - entry.changes_out;
        if entry.ending_mr != expected {
            return Err(DomainError::validation(format!(
                "MR entry {}: ending {} != beginning {} + in {} - out {}",
                index, entry.ending_mr, entry.beginning_mr, entry.changes_in, entry.changes_out
            )));
        }
        if entry.ending_mr < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "MR entry {}: ending MR is negative",
                index
            )));
        }
        if index > 0 {
            let prior = &entries[index - 1];
            if entry.beginning_mr != prior.ending_mr {
                return Err(DomainError::validation(format!(
                    "MR entry {}: beginning {} does not carry prior ending {}",
                    index, entry.beginning_mr, prior.ending_mr
                )));
            }
        }
    }
    Ok(())
}
