//! CPR Format 5: EAC analysis, management-reserve tracking, and variance
//! explanations (per DFARS guideline 27).

use chrono::NaiveDate;
use evmsched_core::{EvmsPeriod, MrLogEntry, Program, ProgramId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::{round_money, EvmsInputs};
use crate::variance::variance_percent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format5Options {
    pub include_mr_rows: bool,
    pub include_variance_explanations: bool,
    /// |variance_percent| at or above this is reported.
    pub variance_threshold_percent: Decimal,
    /// Management's own estimate-to-complete, if provided.
    pub manager_etc: Option<Decimal>,
}

impl Default for Format5Options {
    fn default() -> Self {
        Self {
            include_mr_rows: true,
            include_variance_explanations: true,
            variance_threshold_percent: Decimal::from(10),
            manager_etc: None,
        }
    }
}

/// All six EAC methods plus the DFARS selection and range statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EacAnalysis {
    pub eac_cpi: Option<Decimal>,
    pub eac_spi: Option<Decimal>,
    pub eac_composite: Option<Decimal>,
    pub eac_typical: Decimal,
    pub eac_atypical: Option<Decimal>,
    pub eac_management: Option<Decimal>,
    pub eac_selected: Option<Decimal>,
    /// Which method the selection rule picked: cpi | atypical | composite.
    pub selection_method: String,
    pub eac_range_low: Option<Decimal>,
    pub eac_range_high: Option<Decimal>,
    pub eac_average: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format5PeriodRow {
    pub period_name: String,
    pub cumulative_bcws: Decimal,
    pub cumulative_bcwp: Decimal,
    pub cumulative_acwp: Decimal,
    pub cumulative_sv: Decimal,
    pub cumulative_cv: Decimal,
    /// Signed, versus cumulative BCWS.
    pub sv_percent: Option<Decimal>,
    pub cv_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MrRow {
    pub period_name: String,
    pub beginning_mr: Decimal,
    pub changes_in: Decimal,
    pub changes_out: Decimal,
    pub ending_mr: Decimal,
    pub reason: String,
}

/// Candidate variance row supplied by the caller; the generator filters and
/// orders them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceExplanation {
    pub wbs_code: String,
    pub wbs_name: String,
    /// schedule | cost.
    pub variance_type: String,
    pub variance_amount: Decimal,
    pub variance_percent: Decimal,
    pub explanation: Option<String>,
    pub corrective_action: Option<String>,
    pub expected_resolution_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format5Report {
    pub program_id: ProgramId,
    pub program_code: String,
    pub bac: Decimal,
    pub cumulative_bcws: Decimal,
    pub cumulative_bcwp: Decimal,
    pub cumulative_acwp: Decimal,
    pub cv: Decimal,
    pub sv: Decimal,
    pub cpi: Option<Decimal>,
    pub spi: Option<Decimal>,
    pub vac: Option<Decimal>,
    pub tcpi: Option<Decimal>,
    pub eac_analysis: EacAnalysis,
    pub period_rows: Vec<Format5PeriodRow>,
    pub mr_rows: Vec<MrRow>,
    /// Ending MR of the latest log entry.
    pub current_mr: Option<Decimal>,
    pub variance_explanations: Vec<VarianceExplanation>,
    pub variance_threshold_percent: Decimal,
}

/// Generate the Format 5 report. `periods` chronological; `mr_log` in entry
/// order; `variance_candidates` unfiltered.
pub fn generate(
    program: &Program,
    periods: &[EvmsPeriod],
    mr_log: &[MrLogEntry],
    variance_candidates: &[VarianceExplanation],
    options: &Format5Options,
) -> Format5Report {
    let latest = periods.last();
    let inputs = EvmsInputs::new(
        program.budget_at_completion,
        latest.map_or(Decimal::ZERO, |p| p.cumulative_bcws),
        latest.map_or(Decimal::ZERO, |p| p.cumulative_bcwp),
        latest.map_or(Decimal::ZERO, |p| p.cumulative_acwp),
    );

    let eac_analysis = eac_analysis(&inputs, options.manager_etc);
    let vac = inputs.vac(eac_analysis.eac_selected);

    let period_rows = periods
        .iter()
        .map(|period| {
            let sv = round_money(period.cumulative_bcwp - period.cumulative_bcws);
            let cv = round_money(period.cumulative_bcwp - period.cumulative_acwp);
            Format5PeriodRow {
                period_name: period.label.clone(),
                cumulative_bcws: period.cumulative_bcws,
                cumulative_bcwp: period.cumulative_bcwp,
                cumulative_acwp: period.cumulative_acwp,
                cumulative_sv: sv,
                cumulative_cv: cv,
                sv_percent: variance_percent(sv, period.cumulative_bcws),
                cv_percent: variance_percent(cv, period.cumulative_bcws),
            }
        })
        .collect();

    let mr_rows = if options.include_mr_rows {
        mr_log
            .iter()
            .map(|entry| MrRow {
                period_name: entry.period_label.clone().unwrap_or_default(),
                beginning_mr: entry.beginning_mr,
                changes_in: entry.changes_in,
                changes_out: entry.changes_out,
                ending_mr: entry.ending_mr,
                reason: entry.reason.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let variance_explanations = if options.include_variance_explanations {
        let mut rows: Vec<VarianceExplanation> = variance_candidates
            .iter()
            .filter(|row| row.variance_percent.abs() >= options.variance_threshold_percent)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.variance_percent.abs().cmp(&a.variance_percent.abs()));
        rows
    } else {
        Vec::new()
    };

    Format5Report {
        program_id: program.id,
        program_code: program.code.clone(),
        bac: program.budget_at_completion,
        cumulative_bcws: inputs.bcws,
        cumulative_bcwp: inputs.bcwp,
        cumulative_acwp: inputs.acwp,
        cv: inputs.cv(),
        sv: inputs.sv(),
        cpi: inputs.cpi(),
        spi: inputs.spi(),
        vac,
        tcpi: inputs.tcpi_bac(),
        eac_analysis,
        period_rows,
        mr_rows,
        current_mr: mr_log.last().map(|entry| entry.ending_mr),
        variance_explanations,
        variance_threshold_percent: options.variance_threshold_percent,
    }
}

/// Selection rule: CPI < 0.90 and SPI < 0.90 -> composite; CPI < 0.90 ->
/// atypical; otherwise the CPI method.
fn eac_analysis(inputs: &EvmsInputs, manager_etc: Option<Decimal>) -> EacAnalysis {
    let threshold = Decimal::new(9, 1);

    let eac_cpi = inputs.eac_cpi();
    let eac_spi = inputs.eac_spi();
    let eac_composite = inputs.eac_composite();
    let eac_typical = inputs.eac_typical();
    let eac_atypical = inputs.eac_atypical();
    let eac_management = inputs.eac_management(manager_etc);

    let cpi_low = inputs.cpi().is_some_and(|cpi| cpi < threshold);
    let spi_low = inputs.spi().is_some_and(|spi| spi < threshold);
    let (eac_selected, selection_method) = if cpi_low && spi_low {
        (eac_composite, "composite")
    } else if cpi_low {
        (eac_atypical, "atypical")
    } else {
        (eac_cpi, "cpi")
    };

    let defined: Vec<Decimal> = [
        eac_cpi,
        eac_spi,
        eac_composite,
        Some(eac_typical),
        eac_atypical,
        eac_management,
    ]
    .into_iter()
    .flatten()
    .collect();

    let (low, high, average) = if defined.is_empty() {
        (None, None, None)
    } else {
        let low = defined.iter().copied().min();
        let high = defined.iter().copied().max();
        let sum: Decimal = defined.iter().copied().sum();
        let average = round_money(sum / Decimal::from(defined.len() as i64));
        (low, high, Some(average))
    };

    EacAnalysis {
        eac_cpi,
        eac_spi,
        eac_composite,
        eac_typical,
        eac_atypical,
        eac_management,
        eac_selected,
        selection_method: selection_method.to_owned(),
        eac_range_low: low,
        eac_range_high: high,
        eac_average: average,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn program() -> Program {
        Program::new(
            "usr-1",
            "FA8750",
            "LRIP Lot 4",
            day(2026, 1, 1),
            day(2026, 12, 31),
        )
        .budget(dec!(1000000))
    }

    fn period(label: &str, month: u32, bcws: Decimal, bcwp: Decimal, acwp: Decimal) -> EvmsPeriod {
        EvmsPeriod::new(
            ProgramId::new(),
            label,
            day(2026, month, 1),
            day(2026, month, 28),
        )
        .cumulative(bcws, bcwp, acwp)
    }

    /// CPI ~0.909, SPI 0.8: troubled on schedule, not on cost.
    fn reference_periods() -> Vec<EvmsPeriod> {
        vec![
            period("January 2026", 1, dec!(120000), dec!(100000), dec!(105000)),
            period("February 2026", 2, dec!(250000), dec!(200000), dec!(220000)),
        ]
    }

    #[test]
    fn all_eac_methods_present() {
        let report = generate(
            &program(),
            &reference_periods(),
            &[],
            &[],
            &Format5Options {
                manager_etc: Some(dec!(850000)),
                ..Format5Options::default()
            },
        );

        let eac = &report.eac_analysis;
        assert_eq!(eac.eac_cpi, Some(dec!(1100000.00)));
        assert_eq!(eac.eac_spi, Some(dec!(1250000.00)));
        assert!(eac.eac_composite.is_some());
        assert_eq!(eac.eac_typical, dec!(1020000.00));
        assert_eq!(eac.eac_atypical, Some(dec!(1100000.00)));
        assert_eq!(eac.eac_management, Some(dec!(1070000.00)));
    }

    #[test]
    fn eac_range_statistics() {
        let report = generate(
            &program(),
            &reference_periods(),
            &[],
            &[],
            &Format5Options::default(),
        );

        let eac = &report.eac_analysis;
        let defined = [
            eac.eac_cpi,
            eac.eac_spi,
            eac.eac_composite,
            Some(eac.eac_typical),
            eac.eac_atypical,
        ];
        let values: Vec<Decimal> = defined.into_iter().flatten().collect();
        assert_eq!(eac.eac_range_low, values.iter().copied().min());
        assert_eq!(eac.eac_range_high, values.iter().copied().max());
        let expected_avg =
            round_money(values.iter().copied().sum::<Decimal>() / Decimal::from(values.len() as i64));
        assert_eq!(eac.eac_average, Some(expected_avg));
    }

    #[test]
    fn selection_prefers_cpi_when_healthy() {
        let healthy = vec![period("P", 1, dec!(100000), dec!(98000), dec!(99000))];
        let report = generate(&program(), &healthy, &[], &[], &Format5Options::default());
        assert_eq!(report.eac_analysis.selection_method, "cpi");
        assert_eq!(
            report.eac_analysis.eac_selected,
            report.eac_analysis.eac_cpi
        );
    }

    #[test]
    fn selection_uses_atypical_for_cost_trouble_only() {
        // CPI 0.8, SPI 1.0
        let periods = vec![period("P", 1, dec!(100000), dec!(100000), dec!(125000))];
        let report = generate(&program(), &periods, &[], &[], &Format5Options::default());
        assert_eq!(report.eac_analysis.selection_method, "atypical");
        assert_eq!(
            report.eac_analysis.eac_selected,
            report.eac_analysis.eac_atypical
        );
    }

    #[test]
    fn selection_uses_composite_for_troubled_program() {
        // CPI 0.8, SPI 0.8
        let periods = vec![period("P", 1, dec!(125000), dec!(100000), dec!(125000))];
        let report = generate(&program(), &periods, &[], &[], &Format5Options::default());
        assert_eq!(report.eac_analysis.selection_method, "composite");
        assert_eq!(
            report.eac_analysis.eac_selected,
            report.eac_analysis.eac_composite
        );
    }

    #[test]
    fn summary_metrics_match_reference() {
        let report = generate(
            &program(),
            &reference_periods(),
            &[],
            &[],
            &Format5Options::default(),
        );
        assert_eq!(report.bac, dec!(1000000));
        assert_eq!(report.cv, dec!(-20000.00));
        assert_eq!(report.sv, dec!(-50000.00));
        assert_eq!(report.cpi, Some(dec!(0.909)));
        assert_eq!(report.spi, Some(dec!(0.800)));
        assert_eq!(report.tcpi, Some(dec!(1.026)));
        // selection is "cpi" (cpi 0.909 >= 0.9): VAC = BAC - EAC(CPI)
        assert_eq!(report.vac, Some(dec!(-100000.00)));
    }

    #[test]
    fn period_rows_carry_signed_percentages() {
        let report = generate(
            &program(),
            &reference_periods(),
            &[],
            &[],
            &Format5Options::default(),
        );
        let feb = &report.period_rows[1];
        assert_eq!(feb.cumulative_sv, dec!(-50000.00));
        assert_eq!(feb.cumulative_cv, dec!(-20000.00));
        assert_eq!(feb.sv_percent, Some(dec!(-20.00)));
        assert_eq!(feb.cv_percent, Some(dec!(-8.00)));
    }

    #[test]
    fn mr_rows_track_the_log() {
        let mr_log = vec![
            MrLogEntry::new(dec!(100000), dec!(0), dec!(20000), "Risk retirement")
                .period("January 2026"),
            MrLogEntry::new(dec!(80000), dec!(0), dec!(5000), "Scope transfer")
                .period("February 2026"),
        ];
        let report = generate(
            &program(),
            &reference_periods(),
            &mr_log,
            &[],
            &Format5Options::default(),
        );

        assert_eq!(report.mr_rows.len(), 2);
        let first = &report.mr_rows[0];
        assert_eq!(first.period_name, "January 2026");
        assert_eq!(first.beginning_mr, dec!(100000));
        assert_eq!(first.changes_out, dec!(20000));
        assert_eq!(first.ending_mr, dec!(80000));
        assert_eq!(report.current_mr, Some(dec!(75000)));
    }

    #[test]
    fn mr_rows_can_be_excluded() {
        let mr_log = vec![MrLogEntry::new(dec!(100000), dec!(0), dec!(0), "Opening")];
        let report = generate(
            &program(),
            &reference_periods(),
            &mr_log,
            &[],
            &Format5Options {
                include_mr_rows: false,
                ..Format5Options::default()
            },
        );
        assert!(report.mr_rows.is_empty());
        // current MR still reported from the log
        assert_eq!(report.current_mr, Some(dec!(100000)));
    }

    fn candidate(code: &str, pct: Decimal) -> VarianceExplanation {
        VarianceExplanation {
            wbs_code: code.into(),
            wbs_name: format!("Element {code}"),
            variance_type: "schedule".into(),
            variance_amount: dec!(-15000),
            variance_percent: pct,
            explanation: Some("Late vendor delivery".into()),
            corrective_action: Some("Expedite procurement".into()),
            expected_resolution_date: Some(day(2026, 3, 31)),
        }
    }

    #[test]
    fn variance_explanations_filter_and_sort() {
        let candidates = vec![
            candidate("1.1", dec!(-15.00)),
            candidate("1.2", dec!(8.00)),
            candidate("1.3", dec!(22.00)),
            candidate("1.4", dec!(-11.00)),
        ];
        let report = generate(
            &program(),
            &reference_periods(),
            &[],
            &candidates,
            &Format5Options::default(),
        );

        let codes: Vec<&str> = report
            .variance_explanations
            .iter()
            .map(|v| v.wbs_code.as_str())
            .collect();
        // 8% filtered out; remainder sorted by |percent| descending
        assert_eq!(codes, vec!["1.3", "1.1", "1.4"]);
        assert_eq!(report.variance_explanations[1].wbs_name, "Element 1.1");
        assert_eq!(
            report.variance_explanations[1].expected_resolution_date,
            Some(day(2026, 3, 31))
        );
    }

    #[test]
    fn variance_explanations_can_be_disabled() {
        let candidates = vec![candidate("1.1", dec!(-15.00))];
        let report = generate(
            &program(),
            &reference_periods(),
            &[],
            &candidates,
            &Format5Options {
                include_variance_explanations: false,
                ..Format5Options::default()
            },
        );
        assert!(report.variance_explanations.is_empty());
    }
}
