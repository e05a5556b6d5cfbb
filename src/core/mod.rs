mod config;
mod engine;
mod liquidation;
mod mortgage;
mod projection;
mod sampler;
mod types;

pub use config::{
    ConfigError, DistributionEntry, DistributionSpec, DistributionTable, FixedParams,
    MAX_LOAN_TERM_YEARS, Overrides, Scenario, Variable, VariableKind,
};
pub use engine::{Simulation, aggregate, run_model};
pub use liquidation::{HorizonAssets, liquidate, present_value};
pub use mortgage::{MortgageTerms, monthly_payment, remaining_balance};
pub use projection::{project_homeowner, project_renter};
pub use sampler::Sampler;
pub use types::{
    AggregateReport, HomeownerProjection, NetWorth, RenterProjection, SimulationParams,
    TrialOutcome, TrialTrace,
};
