use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::config::TaxConfig;
use super::ledger::AccountState;
use crate::types::{format_percent, Money, Rate, Year};

/// Which rate the Günstigerprüfung settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedRate {
    Flat,
    Personal,
}

/// Breakdown of one tax event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxComputation {
    pub year: Year,
    pub gross_gain: Money,
    pub teilfreistellung: Money,
    /// Gain after Teilfreistellung, before allowances.
    pub taxable_gain: Money,
    pub freibetrag_used: Money,
    pub freibetrag_remaining: Money,
    pub grundfreibetrag_used: Money,
    /// Base the rate is applied to.
    pub tax_base: Money,
    pub flat_tax: Money,
    pub kirchensteuer: Money,
    pub personal_tax: Option<Money>,
    pub tax_owed: Money,
    pub is_favorable: AppliedRate,
    pub explanation: String,
}

/// Tax owed on a realized (or deemed, for Vorabpauschale) gain.
///
/// Order of deductions: Teilfreistellung, Sparerpauschbetrag (per-year
/// ledger), Grundfreibetrag room (if active). The remaining base is taxed at
/// the flat rate plus Kirchensteuer surcharge, or at the personal rate when
/// the Günstigerprüfung is active and that is cheaper. Never negative.
pub fn compute_tax(
    gross_gain: Money,
    year: Year,
    config: &TaxConfig,
    state: &mut AccountState,
) -> TaxComputation {
    let allowance = config.freibetrag_for_year(year);

    if gross_gain <= Decimal::ZERO {
        return TaxComputation {
            year,
            gross_gain,
            teilfreistellung: Decimal::ZERO,
            taxable_gain: Decimal::ZERO,
            freibetrag_used: Decimal::ZERO,
            freibetrag_remaining: state.freibetrag.remaining(year, allowance),
            grundfreibetrag_used: Decimal::ZERO,
            tax_base: Decimal::ZERO,
            flat_tax: Decimal::ZERO,
            kirchensteuer: Decimal::ZERO,
            personal_tax: None,
            tax_owed: Decimal::ZERO,
            is_favorable: AppliedRate::Flat,
            explanation: "Kein steuerpflichtiger Gewinn".into(),
        };
    }

    let teilfreistellung = gross_gain * config.teilfreistellungsquote;
    let taxable_gain = (gross_gain - teilfreistellung).max(Decimal::ZERO);

    let freibetrag_used = state.freibetrag.consume(year, allowance, taxable_gain);
    let mut tax_base = taxable_gain - freibetrag_used;

    let mut grundfreibetrag_used = Decimal::ZERO;
    if config.grundfreibetrag_active {
        let room = (config.grundfreibetrag_amount - state.other_income(year)).max(Decimal::ZERO);
        grundfreibetrag_used = state.grundfreibetrag.consume(year, room, tax_base);
        tax_base -= grundfreibetrag_used;
    }

    let flat_tax = tax_base * config.capital_gains_tax_rate;
    let kirchensteuer = if config.kirchensteuer_active {
        flat_tax * config.kirchensteuersatz
    } else {
        Decimal::ZERO
    };
    let flat_total = flat_tax + kirchensteuer;

    let personal_tax = config
        .guenstiger_pruefung_active
        .then(|| tax_base * config.personal_tax_rate);

    let (tax_owed, is_favorable) = match personal_tax {
        Some(personal) if personal < flat_total => (personal, AppliedRate::Personal),
        _ => (flat_total, AppliedRate::Flat),
    };
    let tax_owed = tax_owed.max(Decimal::ZERO);

    let explanation = explain(
        config,
        freibetrag_used,
        grundfreibetrag_used,
        is_favorable,
        personal_tax.is_some(),
    );

    TaxComputation {
        year,
        gross_gain,
        teilfreistellung,
        taxable_gain,
        freibetrag_used,
        freibetrag_remaining: state.freibetrag.remaining(year, allowance),
        grundfreibetrag_used,
        tax_base,
        flat_tax,
        kirchensteuer,
        personal_tax,
        tax_owed,
        is_favorable,
        explanation,
    }
}

fn explain(
    config: &TaxConfig,
    freibetrag_used: Money,
    grundfreibetrag_used: Money,
    applied: AppliedRate,
    compared: bool,
) -> String {
    let mut parts = vec![format!(
        "Teilfreistellung {}",
        format_percent(config.teilfreistellungsquote)
    )];
    if freibetrag_used > Decimal::ZERO {
        parts.push(format!("Freibetrag genutzt: {} €", freibetrag_used.round_dp(2)));
    }
    if grundfreibetrag_used > Decimal::ZERO {
        parts.push(format!(
            "Grundfreibetrag genutzt: {} €",
            grundfreibetrag_used.round_dp(2)
        ));
    }
    let rate_note = match (applied, compared) {
        (AppliedRate::Personal, _) => format!(
            "Günstigerprüfung: persönlicher Steuersatz {} ist günstiger",
            format_percent(config.personal_tax_rate)
        ),
        (AppliedRate::Flat, true) => format!(
            "Günstigerprüfung: Abgeltungsteuer {} ist günstiger",
            format_percent(effective_flat_rate(config))
        ),
        (AppliedRate::Flat, false) => {
            format!("Abgeltungsteuer {}", format_percent(effective_flat_rate(config)))
        }
    };
    parts.push(rate_note);
    parts.join(", ")
}

/// Flat capital gains rate including the church tax surcharge.
pub fn effective_flat_rate(config: &TaxConfig) -> Rate {
    if config.kirchensteuer_active {
        config.capital_gains_tax_rate * (Decimal::ONE + config.kirchensteuersatz)
    } else {
        config.capital_gains_tax_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> TaxConfig {
        TaxConfig::default()
    }

    #[test]
    fn test_teilfreistellung_then_freibetrag() {
        let mut state = AccountState::new();
        let result = compute_tax(dec!(10_000), 2025, &config(), &mut state);
        assert_eq!(result.teilfreistellung, dec!(3000));
        assert_eq!(result.taxable_gain, dec!(7000));
        assert_eq!(result.freibetrag_used, dec!(2000));
        assert_eq!(result.tax_base, dec!(5000));
        assert_eq!(result.tax_owed, dec!(5000) * dec!(0.26375));
        assert_eq!(result.freibetrag_remaining, Decimal::ZERO);
        assert_eq!(result.is_favorable, AppliedRate::Flat);
    }

    #[test]
    fn test_freibetrag_shared_across_same_year_events() {
        let mut state = AccountState::new();
        let first = compute_tax(dec!(2000), 2025, &config(), &mut state);
        assert_eq!(first.tax_owed, Decimal::ZERO);
        assert_eq!(first.freibetrag_remaining, dec!(600));

        let second = compute_tax(dec!(2000), 2025, &config(), &mut state);
        assert_eq!(second.freibetrag_used, dec!(600));
        assert_eq!(second.tax_base, dec!(800));

        let next_year = compute_tax(dec!(2000), 2026, &config(), &mut state);
        assert_eq!(next_year.tax_owed, Decimal::ZERO);
    }

    #[test]
    fn test_loss_is_never_taxed() {
        let mut state = AccountState::new();
        let result = compute_tax(dec!(-5000), 2025, &config(), &mut state);
        assert_eq!(result.tax_owed, Decimal::ZERO);
        assert_eq!(result.freibetrag_remaining, dec!(2000));
    }

    #[test]
    fn test_grundfreibetrag_room_reduces_base() {
        let cfg = TaxConfig {
            grundfreibetrag_active: true,
            grundfreibetrag_amount: dec!(12_000),
            ..config()
        };
        let mut state = AccountState::new();
        state.other_income.insert(2025, dec!(10_000));
        let result = compute_tax(dec!(10_000), 2025, &cfg, &mut state);
        // 7000 taxable - 2000 Freibetrag - 2000 Grundfreibetrag room
        assert_eq!(result.grundfreibetrag_used, dec!(2000));
        assert_eq!(result.tax_base, dec!(3000));
    }

    #[test]
    fn test_grundfreibetrag_can_zero_tax() {
        let cfg = TaxConfig {
            grundfreibetrag_active: true,
            grundfreibetrag_amount: dec!(12_096),
            ..config()
        };
        let mut state = AccountState::new();
        let result = compute_tax(dec!(10_000), 2025, &cfg, &mut state);
        assert_eq!(result.tax_owed, Decimal::ZERO);
        assert_eq!(result.tax_base, Decimal::ZERO);
    }

    #[test]
    fn test_kirchensteuer_surcharge_on_flat_tax() {
        let cfg = TaxConfig {
            kirchensteuer_active: true,
            kirchensteuersatz: dec!(0.09),
            freibetrag_per_year: Default::default(),
            ..config()
        };
        let mut state = AccountState::new();
        let result = compute_tax(dec!(1000), 2025, &cfg, &mut state);
        let flat = dec!(700) * dec!(0.26375);
        assert_eq!(result.flat_tax, flat);
        assert_eq!(result.kirchensteuer, flat * dec!(0.09));
        assert_eq!(result.tax_owed, flat * dec!(1.09));
    }

    #[test]
    fn test_guenstigerpruefung_picks_personal_rate() {
        let cfg = TaxConfig {
            guenstiger_pruefung_active: true,
            personal_tax_rate: dec!(0.15),
            freibetrag_per_year: Default::default(),
            ..config()
        };
        let mut state = AccountState::new();
        let result = compute_tax(dec!(1000), 2025, &cfg, &mut state);
        assert_eq!(result.is_favorable, AppliedRate::Personal);
        assert_eq!(result.tax_owed, dec!(700) * dec!(0.15));
        assert!(result.explanation.contains("persönlicher Steuersatz"));
    }

    #[test]
    fn test_guenstigerpruefung_keeps_flat_when_cheaper() {
        let cfg = TaxConfig {
            guenstiger_pruefung_active: true,
            personal_tax_rate: dec!(0.42),
            freibetrag_per_year: Default::default(),
            ..config()
        };
        let mut state = AccountState::new();
        let result = compute_tax(dec!(1000), 2025, &cfg, &mut state);
        assert_eq!(result.is_favorable, AppliedRate::Flat);
        assert_eq!(result.personal_tax, Some(dec!(700) * dec!(0.42)));
        assert_eq!(result.tax_owed, dec!(700) * dec!(0.26375));
    }

    #[test]
    fn test_church_tax_ignored_for_personal_rate() {
        let cfg = TaxConfig {
            guenstiger_pruefung_active: true,
            personal_tax_rate: dec!(0.20),
            kirchensteuer_active: true,
            kirchensteuersatz: dec!(0.09),
            freibetrag_per_year: Default::default(),
            ..config()
        };
        let mut state = AccountState::new();
        let result = compute_tax(dec!(1000), 2025, &cfg, &mut state);
        assert_eq!(result.is_favorable, AppliedRate::Personal);
        assert_eq!(result.tax_owed, dec!(140));
    }

    #[test]
    fn test_tax_never_negative_for_many_inputs() {
        let cfg = TaxConfig {
            grundfreibetrag_active: true,
            guenstiger_pruefung_active: true,
            personal_tax_rate: dec!(0.1),
            ..config()
        };
        let mut state = AccountState::new();
        for gain in [dec!(-100), dec!(0), dec!(1), dec!(500), dec!(50_000), dec!(1_000_000)] {
            let result = compute_tax(gain, 2030, &cfg, &mut state);
            assert!(result.tax_owed >= Decimal::ZERO, "gain={gain}");
            assert!(result.tax_base >= Decimal::ZERO, "gain={gain}");
        }
    }
}
