pub mod plans;
pub mod simulate;

pub use plans::{expand_plans, SavingsPlan, SimulationElement};
pub use simulate::{run_accumulation, simulate_accumulation, AccumulationInput, AccumulationOutput};
