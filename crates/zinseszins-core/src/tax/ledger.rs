use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Money, Year};

/// Per-year consumption of an annual allowance. Each distinct year starts
/// with its full allowance; same-year tax events draw it down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowanceLedger {
    used: BTreeMap<Year, Money>,
}

impl AllowanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn used(&self, year: Year) -> Money {
        self.used.get(&year).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn remaining(&self, year: Year, allowance: Money) -> Money {
        (allowance - self.used(year)).max(Decimal::ZERO)
    }

    /// Draw up to `amount` from the year's allowance and return what was drawn.
    pub fn consume(&mut self, year: Year, allowance: Money, amount: Money) -> Money {
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let drawn = amount.min(self.remaining(year, allowance));
        if drawn > Decimal::ZERO {
            *self.used.entry(year).or_insert(Decimal::ZERO) += drawn;
        }
        drawn
    }
}

/// Mutable tax state threaded through all tax events of one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub freibetrag: AllowanceLedger,
    pub grundfreibetrag: AllowanceLedger,
    /// Other taxable income per year (pensions, salary) that already uses
    /// part of the Grundfreibetrag.
    #[serde(default)]
    pub other_income: BTreeMap<Year, Money>,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn other_income(&self, year: Year) -> Money {
        self.other_income.get(&year).copied().unwrap_or(Decimal::ZERO)
    }
}
