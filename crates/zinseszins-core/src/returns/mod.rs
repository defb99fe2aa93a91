pub mod historical;
pub mod model;
pub mod scenarios;

pub use model::{generate_returns, generate_returns_with_rng, MissingRatePolicy, ReturnConfig, ReturnSequence};
