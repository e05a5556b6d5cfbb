use tracing::debug;

use super::config::FixedParams;
use super::mortgage::{MONTHS_PER_YEAR, monthly_payment, remaining_balance};
use super::types::{HomeownerProjection, RenterProjection, SimulationParams};

pub fn project_homeowner(fixed: &FixedParams, params: &SimulationParams) -> HomeownerProjection {
    let n_years = fixed.n_years as usize;
    let terms = monthly_payment(
        params.property_price,
        params.mortgage_rate,
        fixed.loan_term_years,
        fixed.down_payment,
    );
    let annual_mortgage_payment = terms.annual_payment();
    let annual_income = fixed
        .overrides
        .annual_income
        .unwrap_or(annual_mortgage_payment / fixed.mortgage_to_income_ratio);

    let end_property_value = params
        .annual_housing_market_return
        .iter()
        .fold(params.property_price, |value, r| value * (1.0 + r));

    let mut annual_total_costs = params.annual_homeowner_cost[..n_years]
        .iter()
        .enumerate()
        .map(|(year, &carrying)| {
            // no principal or interest once the loan is paid off
            if (year as u32) < fixed.loan_term_years {
                carrying + annual_mortgage_payment
            } else {
                carrying
            }
        })
        .collect::<Vec<_>>();
    if let Some(first) = annual_total_costs.first_mut() {
        *first += params.property_price * fixed.down_payment;
    }

    let remaining_mortgage_balance = if fixed.n_years < fixed.loan_term_years {
        remaining_balance(
            terms.principal,
            terms.monthly_rate,
            terms.n_payments,
            fixed.n_years * MONTHS_PER_YEAR,
        )
    } else {
        0.0
    };

    let spendable = spendable_income(fixed, annual_income);
    let surpluses = with_initial_net_worth(
        fixed,
        annual_total_costs.iter().map(|cost| spendable - cost),
    );
    let growth = invest_surpluses("homeowner", &surpluses, &params.annual_stock_market_return);

    HomeownerProjection {
        end_property_value,
        annual_total_costs,
        remaining_mortgage_balance,
        annual_mortgage_payment,
        annual_income,
        equity_balance: growth.balance,
        shortfall_years: growth.shortfall_years,
    }
}

/// The renter earns the homeowner's income, so its surplus equals the
/// homeowner's surplus plus the housing cost it avoids, i.e. spendable income
/// less its own costs.
pub fn project_renter(
    fixed: &FixedParams,
    params: &SimulationParams,
    homeowner: &HomeownerProjection,
) -> RenterProjection {
    let n_years = fixed.n_years as usize;
    let annual_total_costs = (0..n_years)
        .map(|year| {
            params.annual_rental_cost[year] + params.amortized_annual_moving_cost[year]
                - params.amortized_annual_moving_saving[year]
        })
        .collect::<Vec<_>>();

    let spendable = spendable_income(fixed, homeowner.annual_income);
    let surpluses = with_initial_net_worth(
        fixed,
        annual_total_costs.iter().map(|rent_cost| spendable - rent_cost),
    );
    let growth = invest_surpluses("renter", &surpluses, &params.annual_stock_market_return);

    RenterProjection {
        annual_total_costs,
        equity_balance: growth.balance,
        shortfall_years: growth.shortfall_years,
    }
}

fn spendable_income(fixed: &FixedParams, annual_income: f64) -> f64 {
    annual_income * (1.0 - fixed.living_cost_ratio)
}

fn with_initial_net_worth(fixed: &FixedParams, surpluses: impl Iterator<Item = f64>) -> Vec<f64> {
    let initial = fixed.overrides.initial_net_worth.unwrap_or(0.0);
    surpluses
        .enumerate()
        .map(|(year, surplus)| if year == 0 { surplus + initial } else { surplus })
        .collect()
}

struct EquityGrowth {
    balance: f64,
    shortfall_years: Vec<u32>,
}

/// Invests each year's surplus up front, then applies that year's return.
fn invest_surpluses(path: &'static str, surpluses: &[f64], market_returns: &[f64]) -> EquityGrowth {
    let mut balance = 0.0;
    let mut shortfall_years = Vec::new();
    for (year, (&surplus, &market_return)) in surpluses.iter().zip(market_returns).enumerate() {
        if surplus > 0.0 {
            balance += surplus;
        } else if surplus < 0.0 {
            debug!(path, year, shortfall = -surplus, "annual costs exceed annual income");
            shortfall_years.push(year as u32);
        }
        balance *= 1.0 + market_return;
    }
    EquityGrowth {
        balance,
        shortfall_years,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn flat_params(n_years: usize) -> SimulationParams {
        SimulationParams {
            mortgage_rate: 0.0,
            property_price: 100_000.0,
            annual_inflation: vec![0.0; n_years],
            annual_stock_market_return: vec![0.0; n_years],
            annual_housing_market_return: vec![0.0; n_years],
            annual_homeowner_cost: vec![1_000.0; n_years],
            annual_rental_market_price: vec![6_000.0; n_years + 1],
            annual_rental_market_price_growth_rate: None,
            annual_rental_cost: vec![6_000.0; n_years],
            annual_rental_cost_growth_rate: None,
            amortized_annual_moving_cost: vec![300.0; n_years],
            amortized_annual_moving_saving: vec![100.0; n_years],
        }
    }

    fn fixed(n_years: u32, loan_term_years: u32) -> FixedParams {
        FixedParams {
            n_years,
            loan_term_years,
            down_payment: 0.2,
            mortgage_to_income_ratio: 0.5,
            ..FixedParams::default()
        }
    }

    #[test]
    fn property_compounds_through_housing_returns() {
        let mut params = flat_params(2);
        params.annual_housing_market_return = vec![0.1, -0.05];
        let projection = project_homeowner(&fixed(2, 10), &params);
        assert_approx(projection.end_property_value, 100_000.0 * 1.1 * 0.95);
    }

    #[test]
    fn homeowner_costs_include_down_payment_and_stop_after_term() {
        let params = flat_params(4);
        let projection = project_homeowner(&fixed(4, 2), &params);
        // 80k over 24 months, interest free
        let annual_payment = 80_000.0 / 24.0 * 12.0;
        assert_approx(projection.annual_mortgage_payment, annual_payment);
        assert_eq!(projection.annual_total_costs.len(), 4);
        assert_approx(
            projection.annual_total_costs[0],
            1_000.0 + annual_payment + 20_000.0,
        );
        assert_approx(projection.annual_total_costs[1], 1_000.0 + annual_payment);
        assert_approx(projection.annual_total_costs[2], 1_000.0);
        assert_approx(projection.annual_total_costs[3], 1_000.0);
        assert_eq!(projection.remaining_mortgage_balance, 0.0);
    }

    #[test]
    fn income_derived_from_payment_ratio_unless_fixed() {
        let params = flat_params(2);
        let projection = project_homeowner(&fixed(2, 10), &params);
        assert_approx(projection.annual_income, 8_000.0 / 0.5);

        let mut with_income = fixed(2, 10);
        with_income.overrides.annual_income = Some(123_456.0);
        let projection = project_homeowner(&with_income, &params);
        assert_approx(projection.annual_income, 123_456.0);
    }

    #[test]
    fn balance_owed_when_horizon_ends_before_term() {
        let params = flat_params(5);
        let projection = project_homeowner(&fixed(5, 10), &params);
        assert_approx(projection.remaining_mortgage_balance, 40_000.0);
    }

    #[test]
    fn surplus_is_invested_and_compounded() {
        let mut params = flat_params(2);
        params.annual_stock_market_return = vec![0.1, 0.2];
        let mut fixed = fixed(2, 10);
        fixed.overrides.annual_income = Some(40_000.0);
        fixed.overrides.initial_net_worth = Some(5_000.0);
        let projection = project_homeowner(&fixed, &params);

        // year 0: 40k - (1k + 8k + 20k) + 5k = 16k; year 1: 40k - 9k = 31k
        let expected = (16_000.0 * 1.1 + 31_000.0) * 1.2;
        assert_approx(projection.equity_balance, expected);
        assert!(projection.shortfall_years.is_empty());
    }

    #[test]
    fn negative_surplus_contributes_nothing_and_is_reported() {
        let mut params = flat_params(3);
        params.annual_stock_market_return = vec![0.5, 0.5, 0.5];
        let mut fixed = fixed(3, 10);
        fixed.overrides.annual_income = Some(10_000.0);
        let projection = project_homeowner(&fixed, &params);

        // year 0 misses by the down payment, later years save 1k each
        assert_eq!(projection.shortfall_years, vec![0]);
        assert_approx(projection.equity_balance, 1_000.0 * 1.5 * 1.5 + 1_000.0 * 1.5);
    }

    #[test]
    fn renter_invests_income_less_rent() {
        let mut params = flat_params(2);
        params.annual_stock_market_return = vec![0.1, 0.0];
        let mut fixed = fixed(2, 10);
        fixed.overrides.annual_income = Some(30_000.0);
        fixed.overrides.initial_net_worth = Some(2_000.0);
        let homeowner = project_homeowner(&fixed, &params);
        let renter = project_renter(&fixed, &params, &homeowner);

        assert_eq!(renter.annual_total_costs, vec![6_200.0, 6_200.0]);
        let expected = (30_000.0 - 6_200.0 + 2_000.0) * 1.1 + (30_000.0 - 6_200.0);
        assert_approx(renter.equity_balance, expected);
        assert!(renter.shortfall_years.is_empty());
    }

    #[test]
    fn renter_surplus_is_independent_of_owner_cost_magnitude() {
        let params = flat_params(1);
        let mut fixed = fixed(1, 10);
        fixed.overrides.annual_income = Some(30_000.1);
        let mut homeowner = project_homeowner(&fixed, &params);
        homeowner.annual_total_costs = vec![1.0e18];
        let renter = project_renter(&fixed, &params, &homeowner);
        assert_eq!(renter.equity_balance, 30_000.1 - 6_200.0);
    }

    #[test]
    fn living_costs_reduce_spendable_income() {
        let params = flat_params(1);
        let mut fixed = fixed(1, 10);
        fixed.overrides.annual_income = Some(20_000.0);
        fixed.living_cost_ratio = 0.25;
        let homeowner = project_homeowner(&fixed, &params);
        let renter = project_renter(&fixed, &params, &homeowner);
        assert_approx(renter.equity_balance, 15_000.0 - 6_200.0);
    }

    #[test]
    fn renter_shortfall_uses_same_handling() {
        let mut params = flat_params(2);
        params.annual_rental_cost = vec![50_000.0, 1_000.0];
        let mut fixed = fixed(2, 10);
        fixed.overrides.annual_income = Some(10_000.0);
        let homeowner = project_homeowner(&fixed, &params);
        let renter = project_renter(&fixed, &params, &homeowner);
        assert_eq!(renter.shortfall_years, vec![0]);
        assert_approx(renter.equity_balance, 10_000.0 - 1_200.0);
    }
}
