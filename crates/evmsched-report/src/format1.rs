//! CPR Format 1: Work Breakdown Structure rollup.
//!
//! One row per WBS element at every level. Leaf values come from the
//! caller's period data; parents roll up their subtree, so the totals row
//! equals both the column sums of the leaves and the sum of the top-level
//! rows.

use std::collections::BTreeMap;

use evmsched_core::{Program, ProgramId, WbsElement, WbsId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::metrics::EvmsInputs;
use crate::variance::variance_percent;

/// Cumulative EVMS values for one leaf WBS element.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WbsCumulative {
    pub bcws: Decimal,
    pub bcwp: Decimal,
    pub acwp: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format1Options {
    /// |SV%| or |CV%| at or above this emits a variance note.
    pub variance_threshold_percent: Decimal,
}

impl Default for Format1Options {
    fn default() -> Self {
        Self {
            variance_threshold_percent: Decimal::from(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format1Row {
    pub wbs_id: WbsId,
    pub wbs_code: String,
    pub name: String,
    pub level: u32,
    pub is_control_account: bool,
    pub bac: Decimal,
    pub bcws: Decimal,
    pub bcwp: Decimal,
    pub acwp: Decimal,
    pub cv: Decimal,
    pub sv: Decimal,
    pub cpi: Option<Decimal>,
    pub spi: Option<Decimal>,
    /// EAC by the CPI method.
    pub eac: Option<Decimal>,
    pub vac: Option<Decimal>,
}

impl Format1Row {
    /// Name indented two spaces per level below the root.
    pub fn indented_name(&self) -> String {
        let indent = "  ".repeat(self.level.saturating_sub(1) as usize);
        format!("{indent}{}", self.name)
    }
}

/// Column totals with the same derived metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format1Totals {
    pub bac: Decimal,
    pub bcws: Decimal,
    pub bcwp: Decimal,
    pub acwp: Decimal,
    pub cv: Decimal,
    pub sv: Decimal,
    pub cpi: Option<Decimal>,
    pub spi: Option<Decimal>,
    pub eac: Option<Decimal>,
    pub vac: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceNote {
    pub wbs_code: String,
    pub name: String,
    pub sv_percent: Option<Decimal>,
    pub cv_percent: Option<Decimal>,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Format1Report {
    pub program_id: ProgramId,
    pub program_code: String,
    pub rows: Vec<Format1Row>,
    pub totals: Format1Totals,
    pub variance_notes: Vec<VarianceNote>,
    pub variance_threshold_percent: Decimal,
}

/// Generate the Format 1 rollup.
pub fn generate(
    program: &Program,
    elements: &[WbsElement],
    leaf_data: &BTreeMap<WbsId, WbsCumulative>,
    options: &Format1Options,
) -> Format1Report {
    let mut children: BTreeMap<WbsId, Vec<&WbsElement>> = BTreeMap::new();
    let mut roots: Vec<&WbsElement> = Vec::new();
    for element in elements {
        match element.parent {
            Some(parent) => children.entry(parent).or_default().push(element),
            None => roots.push(element),
        }
    }

    // Rolled-up (bac, values) per element, computed leaf-to-root.
    let mut rolled: BTreeMap<WbsId, (Decimal, WbsCumulative)> = BTreeMap::new();
    fn roll(
        element: &WbsElement,
        children: &BTreeMap<WbsId, Vec<&WbsElement>>,
        leaf_data: &BTreeMap<WbsId, WbsCumulative>,
        rolled: &mut BTreeMap<WbsId, (Decimal, WbsCumulative)>,
    ) -> (Decimal, WbsCumulative) {
        let value = match children.get(&element.id) {
            Some(kids) if !kids.is_empty() => {
                let mut bac = Decimal::ZERO;
                let mut sum = WbsCumulative::default();
                for kid in kids {
                    let (kid_bac, kid_sum) = roll(kid, children, leaf_data, rolled);
                    bac += kid_bac;
                    sum.bcws += kid_sum.bcws;
                    sum.bcwp += kid_sum.bcwp;
                    sum.acwp += kid_sum.acwp;
                }
                (bac, sum)
            }
            _ => (
                element.budget_at_completion,
                leaf_data.get(&element.id).copied().unwrap_or_default(),
            ),
        };
        rolled.insert(element.id, value);
        value
    }
    for root in &roots {
        roll(root, &children, leaf_data, &mut rolled);
    }

    // Rows in tree order, depth first.
    let mut ordered: Vec<&WbsElement> = Vec::new();
    fn walk<'a>(
        element: &'a WbsElement,
        children: &BTreeMap<WbsId, Vec<&'a WbsElement>>,
        out: &mut Vec<&'a WbsElement>,
    ) {
        out.push(element);
        if let Some(kids) = children.get(&element.id) {
            let mut kids = kids.clone();
            kids.sort_by(|a, b| path_order(&a.path, &b.path));
            for kid in kids {
                walk(kid, children, out);
            }
        }
    }
    roots.sort_by(|a, b| path_order(&a.path, &b.path));
    for root in &roots {
        walk(root, &children, &mut ordered);
    }

    let mut rows = Vec::with_capacity(ordered.len());
    let mut variance_notes = Vec::new();
    for element in ordered {
        let (bac, sums) = rolled[&element.id];
        let inputs = EvmsInputs::new(bac, sums.bcws, sums.bcwp, sums.acwp);
        let eac = inputs.eac_cpi();
        let row = Format1Row {
            wbs_id: element.id,
            wbs_code: element.wbs_code.clone(),
            name: element.name.clone(),
            level: element.level,
            is_control_account: element.is_control_account,
            bac,
            bcws: sums.bcws,
            bcwp: sums.bcwp,
            acwp: sums.acwp,
            cv: inputs.cv(),
            sv: inputs.sv(),
            cpi: inputs.cpi(),
            spi: inputs.spi(),
            eac,
            vac: inputs.vac(eac),
        };

        let sv_percent = variance_percent(row.sv, row.bcws);
        let cv_percent = variance_percent(row.cv, row.bcws);
        let exceeds = |pct: Option<Decimal>| {
            pct.is_some_and(|p| p.abs() >= options.variance_threshold_percent)
        };
        if exceeds(sv_percent) || exceeds(cv_percent) {
            variance_notes.push(VarianceNote {
                wbs_code: row.wbs_code.clone(),
                name: row.name.clone(),
                sv_percent,
                cv_percent,
                note: format!(
                    "WBS {} variance exceeds {}% threshold",
                    row.wbs_code, options.variance_threshold_percent
                ),
            });
        }
        rows.push(row);
    }

    // Totals from top-level rows; equals the leaf column sums by
    // construction.
    let mut totals_bac = Decimal::ZERO;
    let mut totals_sum = WbsCumulative::default();
    for row in rows.iter().filter(|r| r.level == 1) {
        totals_bac += row.bac;
        totals_sum.bcws += row.bcws;
        totals_sum.bcwp += row.bcwp;
        totals_sum.acwp += row.acwp;
    }
    let totals_inputs =
        EvmsInputs::new(totals_bac, totals_sum.bcws, totals_sum.bcwp, totals_sum.acwp);
    let totals_eac = totals_inputs.eac_cpi();
    let totals = Format1Totals {
        bac: totals_bac,
        bcws: totals_sum.bcws,
        bcwp: totals_sum.bcwp,
        acwp: totals_sum.acwp,
        cv: totals_inputs.cv(),
        sv: totals_inputs.sv(),
        cpi: totals_inputs.cpi(),
        spi: totals_inputs.spi(),
        eac: totals_eac,
        vac: totals_inputs.vac(totals_eac),
    };

    Format1Report {
        program_id: program.id,
        program_code: program.code.clone(),
        rows,
        totals,
        variance_notes,
        variance_threshold_percent: options.variance_threshold_percent,
    }
}

/// Dot-path ordering with numeric-aware segments, so `1.2` sorts before
/// `1.10`.
fn path_order(a: &str, b: &str) -> std::cmp::Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return std::cmp::Ordering::Equal,
            (None, Some(_)) => return std::cmp::Ordering::Less,
            (Some(_), None) => return std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(m), Ok(n)) => m.cmp(&n),
                    _ => x.cmp(y),
                };
                if ordering != std::cmp::Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}
