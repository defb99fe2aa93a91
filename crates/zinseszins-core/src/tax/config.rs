use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ValidationIssue;
use crate::types::{Money, Rate, Year};

/// Abgeltungsteuer (25%) including Solidaritätszuschlag (5.5% of it).
pub const DEFAULT_CAPITAL_GAINS_TAX_RATE: Rate = dec!(0.26375);
/// Teilfreistellung for equity funds (Aktienfonds).
pub const DEFAULT_TEILFREISTELLUNGSQUOTE: Rate = dec!(0.30);
/// Sparerpauschbetrag for jointly assessed couples since 2023.
pub const DEFAULT_FREIBETRAG: Money = dec!(2000);
/// Grundfreibetrag 2025.
pub const DEFAULT_GRUNDFREIBETRAG: Money = dec!(12096);

fn default_true() -> bool {
    true
}

/// Tax rules applied by both simulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxConfig {
    pub capital_gains_tax_rate: Rate,
    /// Share of gains exempt from tax, as a fraction (0.30 = 30%).
    pub teilfreistellungsquote: Rate,
    /// Sparerpauschbetrag per year. Years without an entry use the latest
    /// earlier entry.
    #[serde(default)]
    pub freibetrag_per_year: BTreeMap<Year, Money>,
    #[serde(default)]
    pub grundfreibetrag_active: bool,
    #[serde(default)]
    pub grundfreibetrag_amount: Money,
    #[serde(default)]
    pub guenstiger_pruefung_active: bool,
    /// Personal marginal income tax rate used by the Günstigerprüfung.
    #[serde(default)]
    pub personal_tax_rate: Rate,
    #[serde(default)]
    pub kirchensteuer_active: bool,
    /// Church tax as a surcharge on the flat capital gains tax (0.09 = 9%).
    #[serde(default)]
    pub kirchensteuersatz: Rate,
    /// Tax reduces capital in the accumulation phase; otherwise it is settled
    /// from an outside account and only reported.
    #[serde(default = "default_true")]
    pub steuer_reduziert_endkapital_sparphase: bool,
    #[serde(default = "default_true")]
    pub steuer_reduziert_endkapital_entsparphase: bool,
}

impl Default for TaxConfig {
    fn default() -> Self {
        let mut freibetrag_per_year = BTreeMap::new();
        freibetrag_per_year.insert(2023, DEFAULT_FREIBETRAG);
        Self {
            capital_gains_tax_rate: DEFAULT_CAPITAL_GAINS_TAX_RATE,
            teilfreistellungsquote: DEFAULT_TEILFREISTELLUNGSQUOTE,
            freibetrag_per_year,
            grundfreibetrag_active: false,
            grundfreibetrag_amount: DEFAULT_GRUNDFREIBETRAG,
            guenstiger_pruefung_active: false,
            personal_tax_rate: Decimal::ZERO,
            kirchensteuer_active: false,
            kirchensteuersatz: dec!(0.09),
            steuer_reduziert_endkapital_sparphase: true,
            steuer_reduziert_endkapital_entsparphase: true,
        }
    }
}

impl TaxConfig {
    /// Annual allowance for `year`: exact entry, else the latest earlier
    /// entry, else the earliest entry, else zero.
    pub fn freibetrag_for_year(&self, year: Year) -> Money {
        if let Some((_, amount)) = self.freibetrag_per_year.range(..=year).next_back() {
            return *amount;
        }
        self.freibetrag_per_year
            .values()
            .next()
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Same config with a different personal rate (withdrawal segments carry
    /// their own income tax rate).
    pub fn with_personal_rate(&self, rate: Option<Rate>) -> TaxConfig {
        match rate {
            Some(r) => TaxConfig {
                personal_tax_rate: r,
                ..self.clone()
            },
            None => self.clone(),
        }
    }

    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut check_fraction = |value: Rate, field: &str| {
            if value < Decimal::ZERO || value > Decimal::ONE {
                issues.push(ValidationIssue::new(
                    format!("tax.{field}"),
                    "Wert muss zwischen 0 und 1 liegen.",
                ));
            }
        };
        check_fraction(self.capital_gains_tax_rate, "capital_gains_tax_rate");
        check_fraction(self.teilfreistellungsquote, "teilfreistellungsquote");
        check_fraction(self.personal_tax_rate, "personal_tax_rate");
        check_fraction(self.kirchensteuersatz, "kirchensteuersatz");

        for (year, amount) in &self.freibetrag_per_year {
            if *amount < Decimal::ZERO {
                issues.push(ValidationIssue::new(
                    format!("tax.freibetrag_per_year.{year}"),
                    "Freibetrag darf nicht negativ sein.",
                ));
            }
        }
        if self.grundfreibetrag_active && self.grundfreibetrag_amount < Decimal::ZERO {
            issues.push(ValidationIssue::new(
                "tax.grundfreibetrag_amount",
                "Grundfreibetrag darf nicht negativ sein.",
            ));
        }
        issues
    }
}
