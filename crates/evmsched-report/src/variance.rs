//! Variance analysis: severity classification, explanation thresholds, and
//! historical trend direction.

use evmsched_core::WbsId;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceType {
    Schedule,
    Cost,
}

/// Severity by |percent|: minor < 5 <= moderate < 10 <= significant < 15 <=
/// critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceSeverity {
    Minor,
    Moderate,
    Significant,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Worsening,
}

/// Classification thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceThresholds {
    pub minor_threshold: Decimal,
    pub moderate_threshold: Decimal,
    pub significant_threshold: Decimal,
    pub explanation_required_threshold: Decimal,
}

impl Default for VarianceThresholds {
    fn default() -> Self {
        Self {
            minor_threshold: Decimal::from(5),
            moderate_threshold: Decimal::from(10),
            significant_threshold: Decimal::from(15),
            explanation_required_threshold: Decimal::from(10),
        }
    }
}

impl VarianceThresholds {
    pub fn classify(&self, percent: Decimal) -> VarianceSeverity {
        let magnitude = percent.abs();
        if magnitude < self.minor_threshold {
            VarianceSeverity::Minor
        } else if magnitude < self.moderate_threshold {
            VarianceSeverity::Moderate
        } else if magnitude < self.significant_threshold {
            VarianceSeverity::Significant
        } else {
            VarianceSeverity::Critical
        }
    }

    pub fn requires_explanation(&self, percent: Decimal) -> bool {
        percent.abs() >= self.explanation_required_threshold
    }
}

/// One WBS/period variance exceeding notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceAlert {
    pub wbs_id: WbsId,
    pub wbs_code: String,
    pub period_label: String,
    pub variance_type: VarianceType,
    pub variance_amount: Decimal,
    pub variance_percent: Decimal,
    pub severity: VarianceSeverity,
    pub explanation_required: bool,
    pub trend: Option<TrendDirection>,
}

/// Per-(WBS, period) input: cumulative BCWS plus the two variances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceObservation {
    pub wbs_id: WbsId,
    pub wbs_code: String,
    pub period_label: String,
    pub cumulative_bcws: Decimal,
    pub sv: Decimal,
    pub cv: Decimal,
    /// Prior-period percentage history, oldest first, per variance type.
    pub sv_history: Vec<Decimal>,
    pub cv_history: Vec<Decimal>,
}

/// Program-level aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceAnalysis {
    pub alerts: Vec<VarianceAlert>,
    pub critical_count: usize,
    pub significant_count: usize,
    pub moderate_count: usize,
    pub minor_count: usize,
    pub schedule_count: usize,
    pub cost_count: usize,
}

/// Trend window default.
pub const DEFAULT_TREND_WINDOW: usize = 4;

/// Percent variance vs cumulative BCWS; `None` when BCWS is zero.
pub fn variance_percent(variance: Decimal, cumulative_bcws: Decimal) -> Option<Decimal> {
    if cumulative_bcws == Decimal::ZERO {
        return None;
    }
    Some(
        (variance / cumulative_bcws * Decimal::from(100))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
    )
}

/// Slope sign of the last `window` percentage magnitudes: strictly
/// decreasing means improving, strictly increasing means worsening, anything
/// else is stable. Fewer than two points is stable.
pub fn trend_direction(history: &[Decimal], window: usize) -> TrendDirection {
    let window = window.max(2);
    let start = history.len().saturating_sub(window);
    let recent: Vec<Decimal> = history[start..].iter().map(|p| p.abs()).collect();
    if recent.len() < 2 {
        return TrendDirection::Stable;
    }
    let decreasing = recent.windows(2).all(|pair| pair[1] < pair[0]);
    let increasing = recent.windows(2).all(|pair| pair[1] > pair[0]);
    if decreasing {
        TrendDirection::Improving
    } else if increasing {
        TrendDirection::Worsening
    } else {
        TrendDirection::Stable
    }
}

/// Analyze a set of observations into sorted alerts and counts.
///
/// Observations with zero cumulative BCWS are skipped. Alerts sort by
/// severity descending, then |percent| descending.
pub fn analyze(
    observations: &[VarianceObservation],
    thresholds: &VarianceThresholds,
    trend_window: usize,
) -> VarianceAnalysis {
    let mut alerts = Vec::new();

    for observation in observations {
        let pairs = [
            (VarianceType::Schedule, observation.sv, &observation.sv_history),
            (VarianceType::Cost, observation.cv, &observation.cv_history),
        ];
        for (variance_type, amount, history) in pairs {
            let Some(percent) = variance_percent(amount, observation.cumulative_bcws) else {
                continue;
            };
            let trend = if history.is_empty() {
                None
            } else {
                let mut series = history.clone();
                series.push(percent);
                Some(trend_direction(&series, trend_window))
            };
            alerts.push(VarianceAlert {
                wbs_id: observation.wbs_id,
                wbs_code: observation.wbs_code.clone(),
                period_label: observation.period_label.clone(),
                variance_type,
                variance_amount: amount,
                variance_percent: percent,
                severity: thresholds.classify(percent),
                explanation_required: thresholds.requires_explanation(percent),
                trend,
            });
        }
    }

    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.variance_percent.abs().cmp(&a.variance_percent.abs()))
    });

    let count = |severity: VarianceSeverity| alerts.iter().filter(|a| a.severity == severity).count();
    VarianceAnalysis {
        critical_count: count(VarianceSeverity::Critical),
        significant_count: count(VarianceSeverity::Significant),
        moderate_count: count(VarianceSeverity::Moderate),
        minor_count: count(VarianceSeverity::Minor),
        schedule_count: alerts
            .iter()
            .filter(|a| a.variance_type == VarianceType::Schedule)
            .count(),
        cost_count: alerts
            .iter()
            .filter(|a| a.variance_type == VarianceType::Cost)
            .count(),
        alerts,
    }
}
