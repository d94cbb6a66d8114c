//! CPR Format 3: time-phased baseline versus performance.
//!
//! One row per reporting period in chronological order. Period values are
//! differenced from the cumulatives the periods carry; indices are reported
//! to three decimals and are absent when their denominator is zero.

use chrono::{Duration as ChronoDuration, NaiveDate};
use evmsched_core::{EvmsPeriod, Program, ProgramId};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::{round_index, round_money};

/// Baseline context the report is phased against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineInfo {
    pub name: String,
    pub version: u32,
    pub scheduled_start: NaiveDate,
    pub scheduled_finish: NaiveDate,
    pub duration_days: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Format3Options {
    /// Keep only the last N periods (None = all).
    pub periods_to_include: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format3Row {
    pub period_name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Incremental values for this period.
    pub bcws: Decimal,
    pub bcwp: Decimal,
    pub acwp: Decimal,
    pub cumulative_bcws: Decimal,
    pub cumulative_bcwp: Decimal,
    pub cumulative_acwp: Decimal,
    /// Period schedule/cost variance from the incremental values.
    pub sv: Decimal,
    pub cv: Decimal,
    pub spi: Option<Decimal>,
    pub cpi: Option<Decimal>,
    pub cumulative_spi: Option<Decimal>,
    pub cumulative_cpi: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format3Report {
    pub program_id: ProgramId,
    pub program_code: String,
    pub baseline_name: String,
    pub baseline_version: u32,
    pub bac: Decimal,
    pub period_rows: Vec<Format3Row>,
    pub baseline_finish_date: NaiveDate,
    /// Baseline start + duration / SPI_cum, when SPI_cum is defined and
    /// positive.
    pub forecast_finish_date: Option<NaiveDate>,
    /// Signed days; negative means ahead of baseline.
    pub schedule_variance_days: Option<i64>,
    /// green / yellow / red.
    pub status_color: String,
}

/// Generate the Format 3 time-phased report. `periods` must be in
/// chronological order with monotone cumulatives.
pub fn generate(
    program: &Program,
    baseline: &BaselineInfo,
    periods: &[EvmsPeriod],
    options: &Format3Options,
) -> Format3Report {
    let mut rows = Vec::with_capacity(periods.len());
    let mut previous = (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);

    for period in periods {
        let bcws = period.cumulative_bcws - previous.0;
        let bcwp = period.cumulative_bcwp - previous.1;
        let acwp = period.cumulative_acwp - previous.2;
        previous = (
            period.cumulative_bcws,
            period.cumulative_bcwp,
            period.cumulative_acwp,
        );

        let ratio = |numerator: Decimal, denominator: Decimal| {
            (denominator != Decimal::ZERO).then(|| round_index(numerator / denominator))
        };

        rows.push(Format3Row {
            period_name: period.label.clone(),
            period_start: period.start,
            period_end: period.end,
            bcws,
            bcwp,
            acwp,
            cumulative_bcws: period.cumulative_bcws,
            cumulative_bcwp: period.cumulative_bcwp,
            cumulative_acwp: period.cumulative_acwp,
            sv: round_money(bcwp - bcws),
            cv: round_money(bcwp - acwp),
            spi: ratio(bcwp, bcws),
            cpi: ratio(bcwp, acwp),
            cumulative_spi: ratio(period.cumulative_bcwp, period.cumulative_bcws),
            cumulative_cpi: ratio(period.cumulative_bcwp, period.cumulative_acwp),
        });
    }

    if let Some(keep) = options.periods_to_include {
        if rows.len() > keep {
            rows.drain(..rows.len() - keep);
        }
    }

    let last = rows.last();
    let spi_cum = last.and_then(|row| row.cumulative_spi);
    let cpi_cum = last.and_then(|row| row.cumulative_cpi);

    let forecast_finish_date = spi_cum.and_then(|spi| {
        if spi <= Decimal::ZERO {
            return None;
        }
        let forecast_days = (Decimal::from(baseline.duration_days) / spi)
            .round()
            .to_i64()?;
        Some(baseline.scheduled_start + ChronoDuration::days(forecast_days))
    });
    let schedule_variance_days =
        forecast_finish_date.map(|forecast| (forecast - baseline.scheduled_finish).num_days());

    Format3Report {
        program_id: program.id,
        program_code: program.code.clone(),
        baseline_name: baseline.name.clone(),
        baseline_version: baseline.version,
        bac: program.budget_at_completion,
        period_rows: rows,
        baseline_finish_date: baseline.scheduled_finish,
        forecast_finish_date,
        schedule_variance_days,
        status_color: status_color(spi_cum, cpi_cum),
    }
}

/// green when both indices hold >= 0.9, yellow when exactly one slips, red
/// when both do. An undefined index is not counted against the program.
fn status_color(spi: Option<Decimal>, cpi: Option<Decimal>) -> String {
    let threshold = Decimal::new(9, 1);
    let below = [spi, cpi]
        .iter()
        .filter(|index| index.is_some_and(|value| value < threshold))
        .count();
    match below {
        0 => "green",
        1 => "yellow",
        _ => "red",
    }
    .to_owned()
}
