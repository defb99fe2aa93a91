#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;
#[cfg(feature = "risk")]
pub mod risk;
#[cfg(feature = "stress_test")]
pub mod stress;
#[cfg(feature = "tax_deferral")]
pub mod tax_deferral;
