use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Substring that marks a variable as varying year to year.
const YEARLY_MARKER: &str = "annual";
const GROWTH_RATE_SUFFIX: &str = "_growth_rate";
/// Longest loan the amortization math accepts.
pub const MAX_LOAN_TERM_YEARS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("missing distribution for `{0}`")]
    MissingDistribution(String),
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("invalid distribution for `{name}`: {reason}")]
    InvalidDistribution { name: String, reason: String },
    #[error("`{0}` must set both growthRateMean and growthRateStdDev")]
    IncompleteGrowthRate(String),
    #[error("`{0}` is given both inline and as a separate entry")]
    DuplicateGrowthRate(String),
    #[error("invalid distribution table: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: &str) -> Self {
        ConfigError::InvalidField {
            field,
            reason: reason.to_string(),
        }
    }
}

/// Every stochastic input a trial knows how to consume.
///
/// The rental market price anchor is listed before the rental cost series
/// because the latter resets to it on every move.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Variable {
    MortgageRate,
    PropertyPrice,
    AnnualInflation,
    AnnualStockMarketReturn,
    AnnualHousingMarketReturn,
    AnnualHomeownerCost,
    AnnualRentalMarketPrice,
    AnnualRentalMarketPriceGrowthRate,
    AnnualRentalCost,
    AnnualRentalCostGrowthRate,
    AmortizedAnnualMovingCost,
    AmortizedAnnualMovingSaving,
}

pub const VARIABLE_COUNT: usize = 12;

impl Variable {
    pub const ALL: [Variable; VARIABLE_COUNT] = [
        Variable::MortgageRate,
        Variable::PropertyPrice,
        Variable::AnnualInflation,
        Variable::AnnualStockMarketReturn,
        Variable::AnnualHousingMarketReturn,
        Variable::AnnualHomeownerCost,
        Variable::AnnualRentalMarketPrice,
        Variable::AnnualRentalMarketPriceGrowthRate,
        Variable::AnnualRentalCost,
        Variable::AnnualRentalCostGrowthRate,
        Variable::AmortizedAnnualMovingCost,
        Variable::AmortizedAnnualMovingSaving,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variable::MortgageRate => "mortgage_rate",
            Variable::PropertyPrice => "property_price",
            Variable::AnnualInflation => "annual_inflation",
            Variable::AnnualStockMarketReturn => "annual_stock_market_return",
            Variable::AnnualHousingMarketReturn => "annual_housing_market_return",
            Variable::AnnualHomeownerCost => "annual_homeowner_cost",
            Variable::AnnualRentalMarketPrice => "annual_rental_market_price",
            Variable::AnnualRentalMarketPriceGrowthRate => "annual_rental_market_price_growth_rate",
            Variable::AnnualRentalCost => "annual_rental_cost",
            Variable::AnnualRentalCostGrowthRate => "annual_rental_cost_growth_rate",
            Variable::AmortizedAnnualMovingCost => "amortized_annual_moving_cost",
            Variable::AmortizedAnnualMovingSaving => "amortized_annual_moving_saving",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }

    /// The `<name>_growth_rate` companion, if the registry has one.
    pub fn growth_rate(self) -> Option<Variable> {
        Self::from_name(&format!("{}{GROWTH_RATE_SUFFIX}", self.name()))
    }

    /// The variable this one is the growth rate of.
    pub fn growth_rate_owner(self) -> Option<Variable> {
        self.name()
            .strip_suffix(GROWTH_RATE_SUFFIX)
            .and_then(Self::from_name)
    }

    fn is_yearly(self) -> bool {
        self.name().contains(YEARLY_MARKER)
    }

    fn is_required(self) -> bool {
        self.growth_rate_owner().is_none()
    }

    /// Number of yearly values a sequence-valued variable carries.
    pub fn series_len(self, n_years: usize) -> usize {
        match self.growth_rate_owner() {
            Some(owner) => owner.series_len(n_years).saturating_sub(1),
            None if self == Variable::AnnualRentalMarketPrice => n_years + 1,
            None => n_years,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSpec {
    pub mean: f64,
    #[serde(alias = "std_dev")]
    pub std_dev: f64,
}

impl DistributionSpec {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }
}

/// One entry of a user-supplied distribution table.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionEntry {
    pub mean: f64,
    #[serde(alias = "std_dev")]
    pub std_dev: f64,
    #[serde(default, alias = "growth_rate_mean")]
    pub growth_rate_mean: Option<f64>,
    #[serde(default, alias = "growth_rate_std_dev")]
    pub growth_rate_std_dev: Option<f64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VariableKind {
    /// One draw, constant across the horizon.
    Scalar,
    /// An independent draw for every year.
    PerYearIndependent,
    /// One seed draw compounded forward by the paired growth-rate series.
    GrowthLinked { rate: Variable },
}

/// Read-only distribution table with every variable's kind resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct DistributionTable {
    specs: [Option<DistributionSpec>; VARIABLE_COUNT],
    kinds: [VariableKind; VARIABLE_COUNT],
}

impl DistributionTable {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let entries = serde_json::from_str::<BTreeMap<String, DistributionEntry>>(json)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_entries(&entries)
    }

    pub fn from_entries(entries: &BTreeMap<String, DistributionEntry>) -> Result<Self, ConfigError> {
        let mut specs = [None; VARIABLE_COUNT];

        for (name, entry) in entries {
            let variable = Variable::from_name(name)
                .ok_or_else(|| ConfigError::UnknownVariable(name.clone()))?;
            set_spec(
                &mut specs,
                variable,
                DistributionSpec::new(entry.mean, entry.std_dev),
            )?;

            let inline_rate = match (entry.growth_rate_mean, entry.growth_rate_std_dev) {
                (Some(mean), Some(std_dev)) => Some(DistributionSpec::new(mean, std_dev)),
                (None, None) => None,
                _ => return Err(ConfigError::IncompleteGrowthRate(name.clone())),
            };
            if let Some(spec) = inline_rate {
                let rate = variable
                    .growth_rate()
                    .ok_or_else(|| ConfigError::UnknownVariable(format!("{name}{GROWTH_RATE_SUFFIX}")))?;
                set_spec(&mut specs, rate, spec)?;
            }
        }

        for variable in Variable::ALL {
            let present = specs[variable.index()].is_some();
            if variable.is_required() && !present {
                return Err(ConfigError::MissingDistribution(variable.name().to_string()));
            }
            if let Some(owner) = variable.growth_rate_owner() {
                if present && specs[owner.index()].is_none() {
                    return Err(ConfigError::MissingDistribution(owner.name().to_string()));
                }
            }
        }

        Ok(Self::resolve(specs))
    }

    fn resolve(specs: [Option<DistributionSpec>; VARIABLE_COUNT]) -> Self {
        let mut kinds = [VariableKind::Scalar; VARIABLE_COUNT];
        for variable in Variable::ALL {
            let paired_rate = variable
                .growth_rate()
                .filter(|rate| specs[rate.index()].is_some());
            kinds[variable.index()] = match paired_rate {
                Some(rate) if variable.is_yearly() => VariableKind::GrowthLinked { rate },
                _ if variable.is_yearly() => VariableKind::PerYearIndependent,
                _ => VariableKind::Scalar,
            };
        }
        Self { specs, kinds }
    }

    pub fn spec(&self, variable: Variable) -> Option<DistributionSpec> {
        self.specs[variable.index()]
    }

    pub fn kind(&self, variable: Variable) -> VariableKind {
        self.kinds[variable.index()]
    }

    pub fn with_spec(mut self, variable: Variable, spec: DistributionSpec) -> Self {
        self.specs[variable.index()] = Some(spec);
        Self::resolve(self.specs)
    }

    /// Copy of the table with every standard deviation set to zero.
    pub fn without_variance(&self) -> Self {
        let mut specs = self.specs;
        for spec in specs.iter_mut().flatten() {
            spec.std_dev = 0.0;
        }
        Self::resolve(specs)
    }
}

fn set_spec(
    specs: &mut [Option<DistributionSpec>; VARIABLE_COUNT],
    variable: Variable,
    spec: DistributionSpec,
) -> Result<(), ConfigError> {
    if !spec.mean.is_finite() || !spec.std_dev.is_finite() {
        return Err(ConfigError::InvalidDistribution {
            name: variable.name().to_string(),
            reason: "mean and std_dev must be finite".to_string(),
        });
    }
    if spec.std_dev < 0.0 {
        return Err(ConfigError::InvalidDistribution {
            name: variable.name().to_string(),
            reason: "std_dev must be >= 0".to_string(),
        });
    }
    let slot = &mut specs[variable.index()];
    if slot.is_some() {
        return Err(ConfigError::DuplicateGrowthRate(variable.name().to_string()));
    }
    *slot = Some(spec);
    Ok(())
}

impl Default for DistributionTable {
    fn default() -> Self {
        let mut specs = [None; VARIABLE_COUNT];
        let mut put = |variable: Variable, mean: f64, std_dev: f64| {
            specs[variable.index()] = Some(DistributionSpec::new(mean, std_dev));
        };
        put(Variable::MortgageRate, 0.06459, 0.0040);
        put(Variable::PropertyPrice, 750_000.0, 50_000.0);
        put(Variable::AnnualInflation, 0.0239, 0.0123);
        put(Variable::AnnualStockMarketReturn, 0.09, 0.15);
        put(Variable::AnnualHousingMarketReturn, 0.038, 0.03);
        // HOA, insurance, property tax and repairs
        put(Variable::AnnualHomeownerCost, 17_000.0, 1_500.0);
        put(Variable::AnnualRentalMarketPrice, 3_095.0 * 12.0, 175.0 * 12.0);
        put(Variable::AnnualRentalMarketPriceGrowthRate, 0.035, 0.02);
        put(Variable::AnnualRentalCost, 3_095.0 * 12.0, 175.0 * 12.0);
        put(Variable::AnnualRentalCostGrowthRate, 0.06, 0.03);
        put(Variable::AmortizedAnnualMovingCost, 400.0, 100.0);
        put(Variable::AmortizedAnnualMovingSaving, 1_000.0, 200.0);
        Self::resolve(specs)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub assume_good_loan_found: bool,
    pub assume_great_loan_found: bool,
    pub assume_good_housing_growth: bool,
    pub assume_great_housing_growth: bool,
}

impl Scenario {
    /// Mean after the optimistic-scenario shift; "great" wins over "good".
    pub fn shifted_mean(&self, variable: Variable, spec: DistributionSpec) -> f64 {
        let steps = |good: bool, great: bool| {
            if great {
                2.0
            } else if good {
                1.0
            } else {
                0.0
            }
        };
        match variable {
            Variable::MortgageRate => {
                spec.mean
                    - spec.std_dev * steps(self.assume_good_loan_found, self.assume_great_loan_found)
            }
            Variable::AnnualHousingMarketReturn => {
                spec.mean
                    + spec.std_dev
                        * steps(
                            self.assume_good_housing_growth,
                            self.assume_great_housing_growth,
                        )
            }
            _ => spec.mean,
        }
    }
}

/// User-fixed values that replace the sampled draw in every trial.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    pub annual_income: Option<f64>,
    pub initial_net_worth: Option<f64>,
    pub mortgage_rate: Option<f64>,
    pub property_price: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedParams {
    pub n_years: u32,
    pub n_simulations: u32,
    pub loan_term_years: u32,
    pub down_payment: f64,
    pub mortgage_to_income_ratio: f64,
    /// Taxes and non-housing cost of living, as a fraction of income.
    pub living_cost_ratio: f64,
    pub n_years_rental_move: u32,
    pub married_at_horizon: bool,
    pub scenario: Scenario,
    pub overrides: Overrides,
    pub seed: Option<u64>,
}

impl Default for FixedParams {
    fn default() -> Self {
        Self {
            n_years: 10,
            n_simulations: 1_000,
            loan_term_years: 15,
            down_payment: 0.2,
            mortgage_to_income_ratio: 0.28,
            living_cost_ratio: 0.0,
            n_years_rental_move: 3,
            married_at_horizon: false,
            scenario: Scenario::default(),
            overrides: Overrides::default(),
            seed: None,
        }
    }
}

impl FixedParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_years == 0 {
            return Err(ConfigError::invalid("n_years", "must be > 0"));
        }
        if self.n_simulations == 0 {
            return Err(ConfigError::invalid("n_simulations", "must be > 0"));
        }
        if self.loan_term_years == 0 {
            return Err(ConfigError::invalid("loan_term_years", "must be > 0"));
        }
        if self.loan_term_years > MAX_LOAN_TERM_YEARS {
            return Err(ConfigError::InvalidField {
                field: "loan_term_years",
                reason: format!("must be <= {MAX_LOAN_TERM_YEARS}"),
            });
        }
        if self.n_years_rental_move == 0 {
            return Err(ConfigError::invalid("n_years_rental_move", "must be > 0"));
        }
        if !(0.0..1.0).contains(&self.down_payment) {
            return Err(ConfigError::invalid("down_payment", "must be in [0, 1)"));
        }
        if !self.mortgage_to_income_ratio.is_finite() || self.mortgage_to_income_ratio <= 0.0 {
            return Err(ConfigError::invalid("mortgage_to_income_ratio", "must be > 0"));
        }
        if !(0.0..1.0).contains(&self.living_cost_ratio) {
            return Err(ConfigError::invalid("living_cost_ratio", "must be in [0, 1)"));
        }

        let overrides = &self.overrides;
        if let Some(income) = overrides.annual_income {
            if !income.is_finite() || income < 0.0 {
                return Err(ConfigError::invalid("annual_income", "must be >= 0"));
            }
        }
        if let Some(net_worth) = overrides.initial_net_worth {
            if !net_worth.is_finite() {
                return Err(ConfigError::invalid("initial_net_worth", "must be finite"));
            }
        }
        if let Some(rate) = overrides.mortgage_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(ConfigError::invalid("mortgage_rate", "must be >= 0"));
            }
        }
        if let Some(price) = overrides.property_price {
            if !price.is_finite() || price <= 0.0 {
                return Err(ConfigError::invalid("property_price", "must be > 0"));
            }
        }
        Ok(())
    }
}
