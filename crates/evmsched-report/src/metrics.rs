//! Scalar EVMS formulas.
//!
//! Pure arithmetic on fixed-point decimals. Every metric that divides is
//! undefined when its denominator is zero; undefined surfaces as `None`,
//! never as a sentinel. EAC variants are computed from unrounded indices so
//! that, e.g., EAC(CPI) = BAC x ACWP / BCWP exactly; only the final value is
//! rounded.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round money half-up to 2 fractional digits.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a performance index half-up to 3 fractional digits.
pub fn round_index(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
}

/// Inputs to the EVMS formula set, all cumulative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmsInputs {
    /// Budget At Completion.
    pub bac: Decimal,
    /// Budgeted Cost of Work Scheduled (planned value).
    pub bcws: Decimal,
    /// Budgeted Cost of Work Performed (earned value).
    pub bcwp: Decimal,
    /// Actual Cost of Work Performed.
    pub acwp: Decimal,
}

impl EvmsInputs {
    pub fn new(bac: Decimal, bcws: Decimal, bcwp: Decimal, acwp: Decimal) -> Self {
        Self {
            bac,
            bcws,
            bcwp,
            acwp,
        }
    }

    /// Cost Variance = BCWP - ACWP.
    pub fn cv(&self) -> Decimal {
        round_money(self.bcwp - self.acwp)
    }

    /// Schedule Variance = BCWP - BCWS.
    pub fn sv(&self) -> Decimal {
        round_money(self.bcwp - self.bcws)
    }

    /// Cost Performance Index = BCWP / ACWP; undefined when ACWP = 0.
    pub fn cpi(&self) -> Option<Decimal> {
        (self.acwp != Decimal::ZERO).then(|| round_index(self.bcwp / self.acwp))
    }

    /// Schedule Performance Index = BCWP / BCWS; undefined when BCWS = 0.
    pub fn spi(&self) -> Option<Decimal> {
        (self.bcws != Decimal::ZERO).then(|| round_index(self.bcwp / self.bcws))
    }

    /// EAC = BAC / CPI.
    pub fn eac_cpi(&self) -> Option<Decimal> {
        if self.acwp == Decimal::ZERO || self.bcwp == Decimal::ZERO {
            return None;
        }
        Some(round_money(self.bac * self.acwp / self.bcwp))
    }

    /// EAC = BAC / SPI.
    pub fn eac_spi(&self) -> Option<Decimal> {
        if self.bcws == Decimal::ZERO || self.bcwp == Decimal::ZERO {
            return None;
        }
        Some(round_money(self.bac * self.bcws / self.bcwp))
    }

    /// EAC = ACWP + (BAC - BCWP) / (CPI x SPI).
    pub fn eac_composite(&self) -> Option<Decimal> {
        if self.acwp == Decimal::ZERO
            || self.bcws == Decimal::ZERO
            || self.bcwp == Decimal::ZERO
        {
            return None;
        }
        let cpi = self.bcwp / self.acwp;
        let spi = self.bcwp / self.bcws;
        let index = cpi * spi;
        if index == Decimal::ZERO {
            return None;
        }
        Some(round_money(self.acwp + (self.bac - self.bcwp) / index))
    }

    /// EAC = ACWP + (BAC - BCWP): remaining work at budgeted rates.
    pub fn eac_typical(&self) -> Decimal {
        round_money(self.acwp + (self.bac - self.bcwp))
    }

    /// EAC = ACWP + (BAC - BCWP) / CPI: current cost trend continues.
    pub fn eac_atypical(&self) -> Option<Decimal> {
        if self.acwp == Decimal::ZERO || self.bcwp == Decimal::ZERO {
            return None;
        }
        let cpi = self.bcwp / self.acwp;
        Some(round_money(self.acwp + (self.bac - self.bcwp) / cpi))
    }

    /// EAC = ACWP + management's own ETC.
    pub fn eac_management(&self, manager_etc: Option<Decimal>) -> Option<Decimal> {
        manager_etc.map(|etc| round_money(self.acwp + etc))
    }

    /// ETC = EAC - ACWP for any defined EAC.
    pub fn etc(&self, eac: Option<Decimal>) -> Option<Decimal> {
        eac.map(|eac| round_money(eac - self.acwp))
    }

    /// VAC = BAC - EAC for any defined EAC.
    pub fn vac(&self, eac: Option<Decimal>) -> Option<Decimal> {
        eac.map(|eac| round_money(self.bac - eac))
    }

    /// TCPI against BAC = (BAC - BCWP) / (BAC - ACWP).
    ///
    /// Zero-division policy: zero denominator with zero numerator is 0
    /// (nothing left to perform), otherwise undefined.
    pub fn tcpi_bac(&self) -> Option<Decimal> {
        let numerator = self.bac - self.bcwp;
        let denominator = self.bac - self.acwp;
        if denominator == Decimal::ZERO {
            return (numerator == Decimal::ZERO).then_some(Decimal::ZERO);
        }
        Some(round_index(numerator / denominator))
    }
}
