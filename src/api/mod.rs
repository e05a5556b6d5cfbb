mod report;

use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    AggregateReport, DistributionEntry, DistributionTable, FixedParams, MAX_LOAN_TERM_YEARS,
    Overrides, Scenario, Simulation, TrialTrace, run_model,
};

pub use report::{fmt_dollars, render_text};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    n_years: Option<u32>,
    simulations: Option<u32>,
    seed: Option<u64>,

    loan_term_years: Option<u32>,
    down_payment: Option<f64>,
    mortgage_to_income_ratio: Option<f64>,
    living_cost_ratio: Option<f64>,
    rental_move_years: Option<u32>,
    married: Option<bool>,

    #[serde(alias = "assumeGoodLoanFound")]
    good_loan: Option<bool>,
    #[serde(alias = "assumeGreatLoanFound")]
    great_loan: Option<bool>,
    #[serde(alias = "assumeGoodHousingGrowth")]
    good_housing_growth: Option<bool>,
    #[serde(alias = "assumeGreatHousingGrowth")]
    great_housing_growth: Option<bool>,

    annual_income: Option<f64>,
    initial_net_worth: Option<f64>,
    mortgage_rate: Option<f64>,
    property_price: Option<f64>,

    distributions: Option<BTreeMap<String, DistributionEntry>>,
    include_trace: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "rentbuy",
    about = "Monte Carlo estimator comparing buying a home against renting and investing"
)]
pub struct Cli {
    #[arg(long, default_value_t = 10, help = "Years to project into the future")]
    n_years: u32,
    #[arg(long, default_value_t = 1000)]
    simulations: u32,
    #[arg(long, help = "Base seed; a random one is drawn and reported when omitted")]
    seed: Option<u64>,
    #[arg(long, default_value_t = 15)]
    loan_term_years: u32,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Down payment in percent of the purchase price"
    )]
    down_payment: f64,
    #[arg(
        long,
        default_value_t = 28.0,
        help = "Annual mortgage payment as a percent of income, used to infer income"
    )]
    mortgage_to_income_ratio: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Taxes and non-housing living costs in percent of income"
    )]
    living_cost_ratio: f64,
    #[arg(long, default_value_t = 3, help = "Renter moves every this many years")]
    rental_move_years: u32,
    #[arg(long, help = "Married at the horizon (doubles the home sale exemption)")]
    married: bool,
    #[arg(long, help = "Mortgage rate one standard deviation below the mean")]
    good_loan: bool,
    #[arg(long, help = "Mortgage rate two standard deviations below the mean")]
    great_loan: bool,
    #[arg(long, help = "Housing return one standard deviation above the mean")]
    good_housing_growth: bool,
    #[arg(long, help = "Housing return two standard deviations above the mean")]
    great_housing_growth: bool,
    #[arg(long, help = "Fixed annual gross income instead of the inferred one")]
    annual_income: Option<f64>,
    #[arg(long, help = "Net worth invested in the first year")]
    initial_net_worth: Option<f64>,
    #[arg(long, help = "Fixed mortgage rate in percent, e.g. 6.78")]
    mortgage_rate: Option<f64>,
    #[arg(long, help = "Fixed purchase price")]
    property_price: Option<f64>,
    #[arg(long, help = "JSON distribution table replacing the built-in one")]
    config: Option<PathBuf>,
    #[arg(short, long, help = "Prompt for income, net worth, mortgage rate and price")]
    interactive: bool,
    #[arg(long, help = "Print the report as JSON")]
    json: bool,
    #[arg(long, help = "Log every trial's sampled parameters and projections")]
    pub debug: bool,
}

#[derive(Debug)]
struct ApiRequest {
    table: DistributionTable,
    fixed: FixedParams,
    include_trace: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    #[serde(flatten)]
    report: AggregateReport,
    fixed_params: FixedParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<TrialTrace>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn run_cli(mut cli: Cli) -> Result<(), String> {
    if cli.interactive {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        prompt_overrides(&mut cli, &mut stdin.lock(), &mut stdout)?;
    }

    let table = load_table(cli.config.as_deref())?;
    let as_json = cli.json;
    let fixed = build_inputs(cli)?;
    let report = run_model(&table, fixed).map_err(|e| e.to_string())?;

    if as_json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("failed to serialize report: {e}"))?;
        println!("{json}");
    } else {
        print!("{}", render_text(&report));
    }
    Ok(())
}

fn load_table(path: Option<&Path>) -> Result<DistributionTable, String> {
    let Some(path) = path else {
        return Ok(DistributionTable::default());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("--config: failed to read {}: {e}", path.display()))?;
    DistributionTable::from_json(&json).map_err(|e| format!("--config: {e}"))
}

/// Asks for the four user-fixable values; blank answers keep the sampled defaults.
fn prompt_overrides<R: BufRead, W: Write>(
    cli: &mut Cli,
    input: &mut R,
    output: &mut W,
) -> Result<(), String> {
    writeln!(
        output,
        "Running interactive mode. Please answer the questions. If any information is left out, we'll use simulated defaults."
    )
    .map_err(|e| e.to_string())?;

    let questions: [(&str, &str, &mut Option<f64>); 4] = [
        (
            "What is your annual gross income? E.g. 123456.78.",
            "--annual-income",
            &mut cli.annual_income,
        ),
        (
            "What is your net worth?",
            "--initial-net-worth",
            &mut cli.initial_net_worth,
        ),
        (
            "What is your mortgage rate percentage? E.g. 6.78.",
            "--mortgage-rate",
            &mut cli.mortgage_rate,
        ),
        (
            "What is your home's purchase price?",
            "--property-price",
            &mut cli.property_price,
        ),
    ];

    for (question, flag, slot) in questions {
        writeln!(output, "{question}").map_err(|e| e.to_string())?;
        output.flush().map_err(|e| e.to_string())?;

        let mut line = String::new();
        input.read_line(&mut line).map_err(|e| e.to_string())?;
        let answer = line.trim().trim_start_matches('$').replace(',', "");
        if answer.is_empty() {
            continue;
        }
        let value = answer
            .parse::<f64>()
            .map_err(|_| format!("{flag} must be a number, got `{}`", line.trim()))?;
        *slot = Some(value);
    }
    Ok(())
}

fn build_inputs(cli: Cli) -> Result<FixedParams, String> {
    if cli.n_years == 0 {
        return Err("--n-years must be > 0".to_string());
    }

    if cli.simulations == 0 {
        return Err("--simulations must be > 0".to_string());
    }

    if cli.loan_term_years == 0 {
        return Err("--loan-term-years must be > 0".to_string());
    }

    if cli.loan_term_years > MAX_LOAN_TERM_YEARS {
        return Err(format!("--loan-term-years must be <= {MAX_LOAN_TERM_YEARS}"));
    }

    if cli.rental_move_years == 0 {
        return Err("--rental-move-years must be > 0".to_string());
    }

    if !(0.0..100.0).contains(&cli.down_payment) {
        return Err("--down-payment must be >= 0 and < 100".to_string());
    }

    if !cli.mortgage_to_income_ratio.is_finite() || cli.mortgage_to_income_ratio <= 0.0 {
        return Err("--mortgage-to-income-ratio must be > 0".to_string());
    }

    if !(0.0..100.0).contains(&cli.living_cost_ratio) {
        return Err("--living-cost-ratio must be >= 0 and < 100".to_string());
    }

    if let Some(income) = cli.annual_income {
        if !income.is_finite() || income < 0.0 {
            return Err("--annual-income must be >= 0".to_string());
        }
    }

    if let Some(net_worth) = cli.initial_net_worth {
        if !net_worth.is_finite() {
            return Err("--initial-net-worth must be a finite amount".to_string());
        }
    }

    if let Some(rate) = cli.mortgage_rate {
        if !rate.is_finite() || rate < 0.0 {
            return Err("--mortgage-rate must be >= 0".to_string());
        }
    }

    if let Some(price) = cli.property_price {
        if !price.is_finite() || price <= 0.0 {
            return Err("--property-price must be > 0".to_string());
        }
    }

    let fixed = FixedParams {
        n_years: cli.n_years,
        n_simulations: cli.simulations,
        loan_term_years: cli.loan_term_years,
        down_payment: cli.down_payment / 100.0,
        mortgage_to_income_ratio: cli.mortgage_to_income_ratio / 100.0,
        living_cost_ratio: cli.living_cost_ratio / 100.0,
        n_years_rental_move: cli.rental_move_years,
        married_at_horizon: cli.married,
        scenario: Scenario {
            assume_good_loan_found: cli.good_loan,
            assume_great_loan_found: cli.great_loan,
            assume_good_housing_growth: cli.good_housing_growth,
            assume_great_housing_growth: cli.great_housing_growth,
        },
        overrides: Overrides {
            annual_income: cli.annual_income,
            initial_net_worth: cli.initial_net_worth,
            mortgage_rate: cli.mortgage_rate.map(|rate| rate / 100.0),
            property_price: cli.property_price,
        },
        seed: cli.seed,
    };
    fixed.validate().map_err(|e| e.to_string())?;
    Ok(fixed)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "rent-vs-buy HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    // trials saturate the rayon pool; keep them off the async workers
    match tokio::task::spawn_blocking(move || build_simulate_response(request)).await {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(msg)) => error_response(StatusCode::BAD_REQUEST, &msg),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("simulation task failed: {e}"),
        ),
    }
}

fn build_simulate_response(request: ApiRequest) -> Result<SimulateResponse, String> {
    let simulation = Simulation::new(&request.table, request.fixed).map_err(|e| e.to_string())?;
    let trace = request.include_trace.then(|| simulation.run_trial(0));
    let report = simulation.run();
    Ok(SimulateResponse {
        report,
        fixed_params: simulation.fixed().clone(),
        trace,
    })
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.n_years {
        cli.n_years = v;
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = Some(v);
    }

    if let Some(v) = payload.loan_term_years {
        cli.loan_term_years = v;
    }
    if let Some(v) = payload.down_payment {
        cli.down_payment = v;
    }
    if let Some(v) = payload.mortgage_to_income_ratio {
        cli.mortgage_to_income_ratio = v;
    }
    if let Some(v) = payload.living_cost_ratio {
        cli.living_cost_ratio = v;
    }
    if let Some(v) = payload.rental_move_years {
        cli.rental_move_years = v;
    }
    if let Some(v) = payload.married {
        cli.married = v;
    }

    if let Some(v) = payload.good_loan {
        cli.good_loan = v;
    }
    if let Some(v) = payload.great_loan {
        cli.great_loan = v;
    }
    if let Some(v) = payload.good_housing_growth {
        cli.good_housing_growth = v;
    }
    if let Some(v) = payload.great_housing_growth {
        cli.great_housing_growth = v;
    }

    if let Some(v) = payload.annual_income {
        cli.annual_income = Some(v);
    }
    if let Some(v) = payload.initial_net_worth {
        cli.initial_net_worth = Some(v);
    }
    if let Some(v) = payload.mortgage_rate {
        cli.mortgage_rate = Some(v);
    }
    if let Some(v) = payload.property_price {
        cli.property_price = Some(v);
    }

    let table = match &payload.distributions {
        Some(entries) => {
            DistributionTable::from_entries(entries).map_err(|e| format!("distributions: {e}"))?
        }
        None => DistributionTable::default(),
    };
    let fixed = build_inputs(cli)?;

    Ok(ApiRequest {
        table,
        fixed,
        include_trace: payload.include_trace.unwrap_or(false),
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        n_years: 10,
        simulations: 1_000,
        seed: None,
        loan_term_years: 15,
        down_payment: 20.0,
        mortgage_to_income_ratio: 28.0,
        living_cost_ratio: 0.0,
        rental_move_years: 3,
        married: false,
        good_loan: false,
        great_loan: false,
        good_housing_growth: false,
        great_housing_growth: false,
        annual_income: None,
        initial_net_worth: None,
        mortgage_rate: None,
        property_price: None,
        config: None,
        interactive: false,
        json: false,
        debug: false,
    }
}
