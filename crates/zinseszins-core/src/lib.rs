pub mod accumulation;
pub mod costs;
pub mod engine;
pub mod error;
pub mod math;
pub mod results;
pub mod returns;
pub mod tax;
pub mod types;
pub mod withdrawal;

#[cfg(any(
    feature = "risk",
    feature = "stress_test",
    feature = "monte_carlo",
    feature = "tax_deferral"
))]
pub mod analytics;

pub use engine::{simulate_plan, EngineConfig, PlanOutput, SimulationSummary};
pub use error::{EngineError, ValidationIssue};
pub use results::SimulationResult;
pub use types::*;

/// Standard result type for all engine operations
pub type EngineResult<T> = Result<T, EngineError>;
