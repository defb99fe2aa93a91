use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::capital_gains::compute_tax;
use super::config::TaxConfig;
use super::ledger::AccountState;
use crate::types::{Money, Rate, Year};

/// Share of the Basiszins-yield that is taxed (§ 18 InvStG).
pub const BASISERTRAG_FACTOR: Rate = dec!(0.7);

/// Per-year Vorabpauschale breakdown attached to each simulation result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VorabpauschaleDetails {
    pub basiszins: Rate,
    pub basisertrag: Money,
    /// Appreciation of the holding over the year.
    pub actual_gain: Money,
    pub vorabpauschale: Money,
    pub tax_owed: Money,
    pub freibetrag_used: Money,
    pub months_held: u32,
}

/// Deemed income of an accumulating fund for one year.
///
/// `basisertrag = start_value * basiszins * 0.7 * months / 12`, zero when the
/// Basiszins is not positive; the Vorabpauschale is the Basisertrag capped at
/// the actual gain and never negative. The amount is taxed like a realized
/// gain through the shared ledger.
pub fn calculate_vorabpauschale(
    start_value: Money,
    end_value: Money,
    basiszins: Rate,
    months_held: u32,
    year: Year,
    config: &TaxConfig,
    state: &mut AccountState,
) -> VorabpauschaleDetails {
    let months = months_held.min(12);
    let basisertrag = if basiszins <= Decimal::ZERO || start_value <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        start_value * basiszins * BASISERTRAG_FACTOR * Decimal::from(months) / dec!(12)
    };
    let actual_gain = end_value - start_value;
    let vorabpauschale = basisertrag.min(actual_gain.max(Decimal::ZERO));

    let (tax_owed, freibetrag_used) = if vorabpauschale > Decimal::ZERO {
        let tax = compute_tax(vorabpauschale, year, config, state);
        (tax.tax_owed, tax.freibetrag_used)
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    VorabpauschaleDetails {
        basiszins,
        basisertrag,
        actual_gain,
        vorabpauschale,
        tax_owed,
        freibetrag_used,
        months_held: months,
    }
}
