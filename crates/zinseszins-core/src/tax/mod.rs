pub mod basiszins;
pub mod calculator;
pub mod capital_gains;
pub mod config;
pub mod ledger;
pub mod vorabpauschale;

pub use basiszins::{BasiszinsEntry, BasiszinsSource, BasiszinsTable};
pub use calculator::{calculate_tax, compute_vorabpauschale, TaxInput, VorabpauschaleInput};
pub use capital_gains::{compute_tax, effective_flat_rate, AppliedRate, TaxComputation};
pub use config::TaxConfig;
pub use ledger::{AccountState, AllowanceLedger};
pub use vorabpauschale::{calculate_vorabpauschale, VorabpauschaleDetails};
