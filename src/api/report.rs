use crate::core::AggregateReport;

/// `$1,234.56`, with the sign after the dollar sign for losses.
pub fn fmt_dollars(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("${sign}{grouped}.{cents}")
}

/// Percent rounded to two places, keeping at least one decimal (`50.0%`).
fn fmt_percent(fraction: f64) -> String {
    let percent = (fraction * 10_000.0).round() / 100.0;
    if percent.fract() == 0.0 {
        format!("{percent:.1}%")
    } else {
        format!("{percent}%")
    }
}

pub fn render_text(report: &AggregateReport) -> String {
    let mut lines = vec![
        format!(
            "Results across {} simulations extended {} years into the future:",
            report.simulations, report.n_years
        ),
        format!(
            "Being a homeowner beats being a renter (in net worth) in {} of simulations",
            fmt_percent(report.homeowner_win_rate)
        ),
        format!(
            "Homeowner average net worth at simulation end in today's dollars: {}",
            fmt_dollars(report.mean_homeowner_net_worth)
        ),
        format!(
            "Renter average net worth at simulation end in today's dollars: {}",
            fmt_dollars(report.mean_renter_net_worth)
        ),
        String::new(),
        format!(
            "Homeowner net worth p10 / median / p90: {} / {} / {}",
            fmt_dollars(report.p10_homeowner_net_worth),
            fmt_dollars(report.median_homeowner_net_worth),
            fmt_dollars(report.p90_homeowner_net_worth)
        ),
        format!(
            "Renter net worth p10 / median / p90: {} / {} / {}",
            fmt_dollars(report.p10_renter_net_worth),
            fmt_dollars(report.median_renter_net_worth),
            fmt_dollars(report.p90_renter_net_worth)
        ),
        format!(
            "Average homeowner advantage: {}",
            fmt_dollars(report.mean_homeowner_advantage)
        ),
        format!(
            "Average purchase price: {}; average end property value in today's dollars: {}",
            fmt_dollars(report.mean_purchase_price),
            fmt_dollars(report.mean_end_property_value)
        ),
        format!(
            "Average stock holdings in today's dollars: homeowner {}, renter {}",
            fmt_dollars(report.mean_homeowner_equity),
            fmt_dollars(report.mean_renter_equity)
        ),
        format!(
            "Average annual income: {}",
            fmt_dollars(report.mean_annual_income)
        ),
    ];
    if report.infeasible_trials > 0 {
        lines.push(format!(
            "WARNING: annual costs exceeded annual income in {} of {} simulations",
            report.infeasible_trials, report.simulations
        ));
    }
    lines.push(format!("Seed: {}", report.seed));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
