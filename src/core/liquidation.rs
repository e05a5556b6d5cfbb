use super::types::NetWorth;

/// Long-term capital gains rate applied to property gains and all equity.
pub const CAPITAL_GAINS_TAX_RATE: f64 = 0.15;
/// Primary-residence gain exclusion.
pub const SINGLE_EXEMPTION: f64 = 250_000.0;
pub const MARRIED_EXEMPTION: f64 = 500_000.0;
/// Agent commission and closing fees as a fraction of the sale price.
pub const SELLING_COST_RATE: f64 = 0.075;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HorizonAssets {
    pub purchase_price: f64,
    pub end_property_value: f64,
    pub remaining_mortgage_balance: f64,
    pub homeowner_equity: f64,
    pub renter_equity: f64,
}

/// Sells everything at the horizon and returns what each household keeps.
pub fn liquidate(assets: &HorizonAssets, married: bool) -> NetWorth {
    let exemption = if married {
        MARRIED_EXEMPTION
    } else {
        SINGLE_EXEMPTION
    };
    let property_gain = assets.end_property_value - assets.purchase_price;
    let taxable_gain = (property_gain - exemption).max(0.0);
    let property_tax = taxable_gain * CAPITAL_GAINS_TAX_RATE;
    let selling_cost = assets.end_property_value * SELLING_COST_RATE;

    let homeowner = assets.end_property_value
        - assets.remaining_mortgage_balance
        - selling_cost
        - property_tax
        + after_tax_equity(assets.homeowner_equity);
    let renter = after_tax_equity(assets.renter_equity);

    NetWorth { homeowner, renter }
}

fn after_tax_equity(balance: f64) -> f64 {
    balance * (1.0 - CAPITAL_GAINS_TAX_RATE)
}

/// Rewinds a horizon amount through realized inflation into year-0 dollars.
pub fn present_value(amount: f64, annual_inflation: &[f64]) -> f64 {
    annual_inflation
        .iter()
        .rev()
        .fold(amount, |current, inflation| current / (1.0 + inflation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn future_value(amount: f64, annual_inflation: &[f64]) -> f64 {
        annual_inflation
            .iter()
            .fold(amount, |current, inflation| current * (1.0 + inflation))
    }

    fn assets(end_property_value: f64) -> HorizonAssets {
        HorizonAssets {
            purchase_price: 500_000.0,
            end_property_value,
            remaining_mortgage_balance: 100_000.0,
            homeowner_equity: 20_000.0,
            renter_equity: 200_000.0,
        }
    }

    #[test]
    fn gain_below_exemption_is_untaxed() {
        let net = liquidate(&assets(700_000.0), false);
        let expected = 700_000.0 - 100_000.0 - 700_000.0 * 0.075 + 20_000.0 * 0.85;
        assert_approx(net.homeowner, expected);
        assert_approx(net.renter, 170_000.0);
    }

    #[test]
    fn gain_above_exemption_taxed_at_long_term_rate() {
        let single = liquidate(&assets(1_000_000.0), false);
        let married = liquidate(&assets(1_000_000.0), true);
        let before_tax = 1_000_000.0 - 100_000.0 - 75_000.0 + 17_000.0;
        assert_approx(single.homeowner, before_tax - 250_000.0 * 0.15);
        assert_approx(married.homeowner, before_tax);
        assert_approx(single.renter, married.renter);
    }

    #[test]
    fn loss_on_sale_is_not_a_tax_credit() {
        let net = liquidate(&assets(400_000.0), false);
        assert_approx(
            net.homeowner,
            400_000.0 - 100_000.0 - 30_000.0 + 17_000.0,
        );
    }

    #[test]
    fn deflation_divides_year_by_year() {
        assert_approx(present_value(1_102.5, &[0.05, 0.05]), 1_000.0);
        assert_eq!(present_value(1_000.0, &[]), 1_000.0);
    }

    proptest! {
        #[test]
        fn deflation_round_trips(
            amount in -1.0e7_f64..1.0e7,
            inflation in vec(-0.05_f64..0.2, 1..40),
        ) {
            let pv = present_value(amount, &inflation);
            let back = future_value(pv, &inflation);
            prop_assert!((back - amount).abs() <= 1e-9 * amount.abs().max(1.0));
        }
    }
}
