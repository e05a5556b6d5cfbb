use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::config::{ConfigError, DistributionTable, FixedParams, Variable, VariableKind};
use super::types::SimulationParams;

#[derive(Clone, Copy, Debug)]
enum ScalarSource {
    Fixed(f64),
    Drawn(Normal<f64>),
}

impl ScalarSource {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            ScalarSource::Fixed(value) => *value,
            ScalarSource::Drawn(normal) => normal.sample(rng),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum SeriesSource {
    Independent {
        normal: Normal<f64>,
        len: usize,
    },
    GrowthLinked {
        seed: Normal<f64>,
        growth_rate: Normal<f64>,
        growth_rate_len: usize,
    },
}

/// First-pass draw: the full series, or a seed plus its growth rates.
struct SeriesDraw {
    values: Vec<f64>,
    growth_rates: Option<Vec<f64>>,
}

impl SeriesSource {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> SeriesDraw {
        match *self {
            SeriesSource::Independent { normal, len } => SeriesDraw {
                values: draw_many(normal, len, rng),
                growth_rates: None,
            },
            SeriesSource::GrowthLinked {
                seed,
                growth_rate,
                growth_rate_len,
            } => SeriesDraw {
                values: vec![seed.sample(rng)],
                growth_rates: Some(draw_many(growth_rate, growth_rate_len, rng)),
            },
        }
    }
}

fn draw_many<R: Rng + ?Sized>(normal: Normal<f64>, len: usize, rng: &mut R) -> Vec<f64> {
    (0..len).map(|_| normal.sample(rng)).collect()
}

/// Draws every stochastic input of a trial.
///
/// Variable kinds, scenario shifts and overrides are resolved once here, so
/// sampling itself cannot fail.
#[derive(Clone, Debug)]
pub struct Sampler {
    mortgage_rate: ScalarSource,
    property_price: ScalarSource,
    annual_inflation: SeriesSource,
    annual_stock_market_return: SeriesSource,
    annual_housing_market_return: SeriesSource,
    annual_homeowner_cost: SeriesSource,
    annual_rental_market_price: SeriesSource,
    annual_rental_cost: SeriesSource,
    amortized_annual_moving_cost: SeriesSource,
    amortized_annual_moving_saving: SeriesSource,
    rental_move_interval: usize,
}

impl Sampler {
    pub fn new(table: &DistributionTable, fixed: &FixedParams) -> Result<Self, ConfigError> {
        fixed.validate()?;
        let n_years = fixed.n_years as usize;
        let scalar = |variable, fixed_value| scalar_source(table, fixed, variable, fixed_value);
        let series = |variable| series_source(table, fixed, variable, n_years);

        Ok(Self {
            mortgage_rate: scalar(Variable::MortgageRate, fixed.overrides.mortgage_rate)?,
            property_price: scalar(Variable::PropertyPrice, fixed.overrides.property_price)?,
            annual_inflation: series(Variable::AnnualInflation)?,
            annual_stock_market_return: series(Variable::AnnualStockMarketReturn)?,
            annual_housing_market_return: series(Variable::AnnualHousingMarketReturn)?,
            annual_homeowner_cost: series(Variable::AnnualHomeownerCost)?,
            annual_rental_market_price: series(Variable::AnnualRentalMarketPrice)?,
            annual_rental_cost: series(Variable::AnnualRentalCost)?,
            amortized_annual_moving_cost: series(Variable::AmortizedAnnualMovingCost)?,
            amortized_annual_moving_saving: series(Variable::AmortizedAnnualMovingSaving)?,
            rental_move_interval: fixed.n_years_rental_move as usize,
        })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SimulationParams {
        let mortgage_rate = self.mortgage_rate.draw(rng);
        let property_price = self.property_price.draw(rng);
        let annual_inflation = self.annual_inflation.draw(rng);
        let annual_stock_market_return = self.annual_stock_market_return.draw(rng);
        let annual_housing_market_return = self.annual_housing_market_return.draw(rng);
        let annual_homeowner_cost = self.annual_homeowner_cost.draw(rng);
        let market_price = self.annual_rental_market_price.draw(rng);
        let rental_cost = self.annual_rental_cost.draw(rng);
        let amortized_annual_moving_cost = self.amortized_annual_moving_cost.draw(rng);
        let amortized_annual_moving_saving = self.amortized_annual_moving_saving.draw(rng);

        let annual_rental_market_price = expand(&market_price, None);
        let annual_rental_cost = expand(
            &rental_cost,
            Some(MoveReset {
                anchor: &annual_rental_market_price,
                interval: self.rental_move_interval,
            }),
        );

        SimulationParams {
            mortgage_rate,
            property_price,
            annual_inflation: annual_inflation.values,
            annual_stock_market_return: annual_stock_market_return.values,
            annual_housing_market_return: annual_housing_market_return.values,
            annual_homeowner_cost: annual_homeowner_cost.values,
            annual_rental_market_price,
            annual_rental_market_price_growth_rate: market_price.growth_rates,
            annual_rental_cost,
            annual_rental_cost_growth_rate: rental_cost.growth_rates,
            amortized_annual_moving_cost: amortized_annual_moving_cost.values,
            amortized_annual_moving_saving: amortized_annual_moving_saving.values,
        }
    }
}

fn normal_for(
    table: &DistributionTable,
    fixed: &FixedParams,
    variable: Variable,
) -> Result<Normal<f64>, ConfigError> {
    let spec = table
        .spec(variable)
        .ok_or_else(|| ConfigError::MissingDistribution(variable.name().to_string()))?;
    let mean = fixed.scenario.shifted_mean(variable, spec);
    Normal::new(mean, spec.std_dev).map_err(|e| ConfigError::InvalidDistribution {
        name: variable.name().to_string(),
        reason: e.to_string(),
    })
}

fn scalar_source(
    table: &DistributionTable,
    fixed: &FixedParams,
    variable: Variable,
    fixed_value: Option<f64>,
) -> Result<ScalarSource, ConfigError> {
    if let Some(value) = fixed_value {
        return Ok(ScalarSource::Fixed(value));
    }
    match table.kind(variable) {
        VariableKind::Scalar => Ok(ScalarSource::Drawn(normal_for(table, fixed, variable)?)),
        _ => Err(ConfigError::InvalidDistribution {
            name: variable.name().to_string(),
            reason: "must be constant across years".to_string(),
        }),
    }
}

fn series_source(
    table: &DistributionTable,
    fixed: &FixedParams,
    variable: Variable,
    n_years: usize,
) -> Result<SeriesSource, ConfigError> {
    let len = variable.series_len(n_years);
    match table.kind(variable) {
        VariableKind::PerYearIndependent => Ok(SeriesSource::Independent {
            normal: normal_for(table, fixed, variable)?,
            len,
        }),
        VariableKind::GrowthLinked { rate } => Ok(SeriesSource::GrowthLinked {
            seed: normal_for(table, fixed, variable)?,
            growth_rate: normal_for(table, fixed, rate)?,
            growth_rate_len: rate.series_len(n_years),
        }),
        VariableKind::Scalar => Err(ConfigError::InvalidDistribution {
            name: variable.name().to_string(),
            reason: "must vary by year".to_string(),
        }),
    }
}

/// A tenant moving every `interval` years pays the fresh market price.
#[derive(Clone, Copy)]
struct MoveReset<'a> {
    anchor: &'a [f64],
    interval: usize,
}

fn expand(draw: &SeriesDraw, reset: Option<MoveReset<'_>>) -> Vec<f64> {
    match &draw.growth_rates {
        None => draw.values.clone(),
        Some(rates) => compound_series(draw.values[0], rates, reset),
    }
}

/// `value[t + 1] = value[t] * (1 + rate[t])`, except on move years, where the
/// value is the anchor's price for that year. The anchor must cover every year.
fn compound_series(seed: f64, growth_rates: &[f64], reset: Option<MoveReset<'_>>) -> Vec<f64> {
    let mut values = Vec::with_capacity(growth_rates.len() + 1);
    let mut current = seed;
    values.push(current);
    for (i, rate) in growth_rates.iter().enumerate() {
        let year = i + 1;
        current = match reset {
            Some(MoveReset { anchor, interval }) if (values.len() + 1) % interval == 0 => anchor[year],
            _ => current * (1.0 + rate),
        };
        values.push(current);
    }
    values
}
