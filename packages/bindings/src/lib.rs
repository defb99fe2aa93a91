use napi::Result as NapiResult;
use napi_derive::napi;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[napi]
pub fn simulate_plan(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::engine::EngineConfig =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = zinseszins_core::engine::simulate_plan(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Validation issues of a plan configuration as a JSON array; empty when
/// the plan can be simulated.
#[napi]
pub fn validate_plan(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::engine::EngineConfig =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let issues = zinseszins_core::engine::validate_engine_config(&input);
    serde_json::to_string(&issues).map_err(to_napi_error)
}

#[napi]
pub fn simulate_accumulation(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::accumulation::AccumulationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        zinseszins_core::accumulation::simulate_accumulation(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn simulate_withdrawal(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::withdrawal::WithdrawalInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = zinseszins_core::withdrawal::simulate_withdrawal(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn simulate_segmented_withdrawal(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::withdrawal::SegmentedWithdrawalInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        zinseszins_core::withdrawal::simulate_segmented_withdrawal(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn compare_strategies(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::withdrawal::ComparisonInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = zinseszins_core::withdrawal::compare_strategies(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

#[napi]
pub fn create_scenarios(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::returns::scenarios::ScenarioInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let scenarios = zinseszins_core::returns::scenarios::create_scenarios(&input);
    serde_json::to_string(&scenarios).map_err(to_napi_error)
}

#[napi]
pub fn black_swan_events() -> NapiResult<String> {
    let events = zinseszins_core::returns::historical::black_swan_events();
    serde_json::to_string(&events).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Tax
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_tax(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::tax::TaxInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = zinseszins_core::tax::calculate_tax(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_vorabpauschale(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::tax::VorabpauschaleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = zinseszins_core::tax::compute_vorabpauschale(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn default_basiszins_table() -> NapiResult<String> {
    serde_json::to_string(&zinseszins_core::tax::BasiszinsTable::default()).map_err(to_napi_error)
}

#[napi]
pub fn analyze_tax_deferral(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::analytics::tax_deferral::TaxDeferralInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        zinseszins_core::analytics::tax_deferral::analyze_tax_deferral(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Costs
// ---------------------------------------------------------------------------

#[napi]
pub fn simulate_care_costs(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::costs::CareCostInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = zinseszins_core::costs::simulate_care_costs(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_risk_metrics(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::analytics::risk::RiskInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        zinseszins_core::analytics::risk::calculate_risk_metrics(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn run_stress_test(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::analytics::stress::StressTestInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        zinseszins_core::analytics::stress::run_stress_test(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn run_monte_carlo(input_json: String) -> NapiResult<String> {
    let input: zinseszins_core::analytics::monte_carlo::MonteCarloInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        zinseszins_core::analytics::monte_carlo::run_monte_carlo(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
