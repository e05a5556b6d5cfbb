use serde::Serialize;

/// Realized draws for a single trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParams {
    pub mortgage_rate: f64,
    pub property_price: f64,
    pub annual_inflation: Vec<f64>,
    pub annual_stock_market_return: Vec<f64>,
    pub annual_housing_market_return: Vec<f64>,
    pub annual_homeowner_cost: Vec<f64>,
    /// `n_years + 1` values; the rental cost resets to it on every move.
    pub annual_rental_market_price: Vec<f64>,
    pub annual_rental_market_price_growth_rate: Option<Vec<f64>>,
    pub annual_rental_cost: Vec<f64>,
    pub annual_rental_cost_growth_rate: Option<Vec<f64>>,
    pub amortized_annual_moving_cost: Vec<f64>,
    pub amortized_annual_moving_saving: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeownerProjection {
    pub end_property_value: f64,
    pub annual_total_costs: Vec<f64>,
    pub remaining_mortgage_balance: f64,
    pub annual_mortgage_payment: f64,
    pub annual_income: f64,
    pub equity_balance: f64,
    /// Years in which costs exceeded spendable income.
    pub shortfall_years: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenterProjection {
    pub annual_total_costs: Vec<f64>,
    pub equity_balance: f64,
    pub shortfall_years: Vec<u32>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorth {
    pub homeowner: f64,
    pub renter: f64,
}

/// Present-value result of one trial.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialOutcome {
    pub homeowner_net_worth: f64,
    pub renter_net_worth: f64,
    pub purchase_price: f64,
    pub end_property_value: f64,
    pub homeowner_equity: f64,
    pub renter_equity: f64,
    pub annual_income: f64,
    pub had_shortfall: bool,
}

/// Everything a trial sampled and derived, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialTrace {
    pub trial_id: u32,
    pub params: SimulationParams,
    pub homeowner: HomeownerProjection,
    pub renter: RenterProjection,
    pub nominal_net_worth: NetWorth,
    pub present_value_net_worth: NetWorth,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub simulations: u32,
    pub n_years: u32,
    pub seed: u64,
    pub homeowner_win_rate: f64,
    pub mean_homeowner_net_worth: f64,
    pub mean_renter_net_worth: f64,
    pub median_homeowner_net_worth: f64,
    pub median_renter_net_worth: f64,
    pub p10_homeowner_net_worth: f64,
    pub p10_renter_net_worth: f64,
    pub p90_homeowner_net_worth: f64,
    pub p90_renter_net_worth: f64,
    pub mean_homeowner_advantage: f64,
    pub mean_purchase_price: f64,
    pub mean_end_property_value: f64,
    pub mean_homeowner_equity: f64,
    pub mean_renter_equity: f64,
    pub mean_annual_income: f64,
    pub infeasible_trials: u32,
}
