pub const MONTHS_PER_YEAR: u32 = 12;

/// Level-payment loan derived from a purchase.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MortgageTerms {
    pub monthly_payment: f64,
    pub principal: f64,
    pub monthly_rate: f64,
    pub n_payments: u32,
}

impl MortgageTerms {
    pub fn annual_payment(&self) -> f64 {
        self.monthly_payment * MONTHS_PER_YEAR as f64
    }
}

/// `M = P * i * (1 + i)^n / ((1 + i)^n - 1)` on the financed part of `price`.
pub fn monthly_payment(price: f64, rate: f64, term_years: u32, down_payment: f64) -> MortgageTerms {
    let principal = price * (1.0 - down_payment);
    let monthly_rate = rate / MONTHS_PER_YEAR as f64;
    let n_payments = term_years.saturating_mul(MONTHS_PER_YEAR);

    let monthly_payment = if n_payments == 0 {
        principal
    } else {
        let growth_less_one = compound_growth_less_one(monthly_rate, n_payments);
        if growth_less_one == 0.0 {
            principal / n_payments as f64
        } else {
            // (1 + g) / g, written so an overflowing g leaves interest only
            principal * monthly_rate * (1.0 + 1.0 / growth_less_one)
        }
    };

    MortgageTerms {
        monthly_payment,
        principal,
        monthly_rate,
        n_payments,
    }
}

/// Balance still owed after `n_elapsed` of `n_total` payments.
pub fn remaining_balance(principal: f64, monthly_rate: f64, n_total: u32, n_elapsed: u32) -> f64 {
    if n_total == 0 || n_elapsed >= n_total {
        return 0.0;
    }
    let total = compound_growth_less_one(monthly_rate, n_total);
    if total == 0.0 {
        return principal * (1.0 - n_elapsed as f64 / n_total as f64);
    }
    let elapsed = compound_growth_less_one(monthly_rate, n_elapsed);
    principal * (1.0 - elapsed / total)
}

/// `(1 + i)^n - 1` without cancellation for rates near zero.
fn compound_growth_less_one(monthly_rate: f64, n_payments: u32) -> f64 {
    (n_payments as f64 * monthly_rate.ln_1p()).exp_m1()
}
