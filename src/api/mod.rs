use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    AnalysisError, AnalysisRequest, AnalysisResult, BreakEvenConfig, BuyScenario,
    CapitalGainsTax, CommonParams, RentScenario, RoomRental, analyze_request,
    solve_break_even_appreciation,
};

#[derive(Parser, Debug)]
#[command(
    name = "rentbuy",
    about = "Year-by-year rent vs buy comparison with NPV-based recommendation"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API over HTTP
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Run a single analysis and print the result as JSON
    Analyze(ScenarioArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ScenarioArgs {
    #[arg(long, default_value_t = 300_000.0)]
    pub property_value: f64,
    #[arg(long, help = "Apply the additional-dwelling stamp duty surcharge")]
    pub second_home: bool,
    #[arg(long, default_value_t = 60_000.0, help = "Deposit amount")]
    pub deposit: f64,
    #[arg(
        long,
        help = "Deposit as percent of property value; overrides --deposit when set"
    )]
    pub deposit_percent: Option<f64>,
    #[arg(long, default_value_t = 4.5, help = "Annual mortgage rate in percent")]
    pub mortgage_rate: f64,
    #[arg(long, default_value_t = 25, help = "Mortgage term in years")]
    pub loan_term: u32,
    #[arg(long, default_value_t = 1_500.0)]
    pub conveyancing_fees: f64,
    #[arg(
        long,
        default_value_t = 1.5,
        help = "Selling agent fee in percent of sale price"
    )]
    pub selling_agent_fees: f64,
    #[arg(long, default_value_t = 300.0, help = "Annual home insurance")]
    pub home_insurance: f64,
    #[arg(long, default_value_t = 5_000.0)]
    pub upfront_renovation: f64,
    #[arg(long, default_value_t = 3_000.0)]
    pub upfront_furniture: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Annual home appreciation in percent"
    )]
    pub home_appreciation: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Annual investment return in percent; also the NPV discount rate"
    )]
    pub investment_return: f64,
    #[arg(long, help = "Let a room once the resident has moved out")]
    pub room_rental: bool,
    #[arg(long, default_value_t = 500.0, help = "Monthly room rent")]
    pub room_rent: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Annual room rent increase in percent"
    )]
    pub room_rent_increase: f64,
    #[arg(long, default_value_t = 9)]
    pub months_rented: u32,
    #[arg(long, default_value_t = 1_200.0, help = "Monthly rent when renting")]
    pub monthly_rent: f64,
    #[arg(long, default_value_t = 3.0, help = "Annual rent increase in percent")]
    pub rent_increase: f64,
    #[arg(long, default_value_t = 0.0, help = "Deposit lodged with the landlord")]
    pub rent_deposit: f64,
    #[arg(long, default_value_t = 150.0, help = "Monthly utilities, either scenario")]
    pub utilities: f64,
    #[arg(long, default_value_t = 5, help = "Years until the property is sold")]
    pub sell_after: u32,
    #[arg(
        long,
        default_value_t = 3,
        help = "Years the resident occupies the room before it can be let"
    )]
    pub daughter_years: u32,
    #[arg(
        long,
        help = "Capital gains tax rate in percent on a second-home sale; off when unset"
    )]
    pub cgt_rate: Option<f64>,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Share of mortgage interest deductible from the gain, in percent"
    )]
    pub cgt_interest_relief: f64,
}

impl Default for ScenarioArgs {
    fn default() -> Self {
        ScenarioArgs::parse_from(["rentbuy"])
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnalyzePayload {
    #[serde(alias = "property_value")]
    property_value: Option<f64>,
    #[serde(alias = "is_second_home", alias = "isSecondHome")]
    second_home: Option<bool>,
    deposit: Option<f64>,
    #[serde(alias = "deposit_percent")]
    deposit_percent: Option<f64>,
    #[serde(alias = "mortgage_rate")]
    mortgage_rate: Option<f64>,
    #[serde(alias = "loan_term")]
    loan_term: Option<u32>,
    #[serde(alias = "conveyancing_fees")]
    conveyancing_fees: Option<f64>,
    #[serde(alias = "selling_agent_fees")]
    selling_agent_fees: Option<f64>,
    #[serde(alias = "home_insurance")]
    home_insurance: Option<f64>,
    #[serde(alias = "upfront_renovation")]
    upfront_renovation: Option<f64>,
    #[serde(alias = "upfront_furniture")]
    upfront_furniture: Option<f64>,
    #[serde(alias = "home_appreciation")]
    home_appreciation: Option<f64>,
    #[serde(alias = "investment_return")]
    investment_return: Option<f64>,
    #[serde(alias = "include_rental", alias = "includeRental")]
    room_rental: Option<bool>,
    #[serde(alias = "room_rent")]
    room_rent: Option<f64>,
    #[serde(alias = "room_rent_increase")]
    room_rent_increase: Option<f64>,
    #[serde(alias = "months_rented")]
    months_rented: Option<u32>,
    #[serde(alias = "monthly_rent")]
    monthly_rent: Option<f64>,
    #[serde(alias = "rent_increase")]
    rent_increase: Option<f64>,
    #[serde(alias = "rent_deposit")]
    rent_deposit: Option<f64>,
    utilities: Option<f64>,
    #[serde(alias = "sell_after")]
    sell_after: Option<u32>,
    #[serde(alias = "daughter_years", alias = "childYears", alias = "child_years")]
    daughter_years: Option<u32>,
    #[serde(alias = "cgt_rate")]
    cgt_rate: Option<f64>,
    #[serde(alias = "cgt_interest_relief")]
    cgt_interest_relief: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BreakEvenPayload {
    scenario: AnalyzePayload,
    #[serde(alias = "search_min")]
    search_min: Option<f64>,
    #[serde(alias = "search_max")]
    search_max: Option<f64>,
    tolerance: Option<f64>,
    #[serde(alias = "max_iterations")]
    max_iterations: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct ServiceBanner {
    message: &'static str,
}

pub fn build_request(args: ScenarioArgs) -> Result<AnalysisRequest, String> {
    if !args.property_value.is_finite() || args.property_value <= 0.0 {
        return Err("--property-value must be > 0".to_string());
    }

    let deposit = match args.deposit_percent {
        Some(pct) => {
            if !(0.0..100.0).contains(&pct) {
                return Err("--deposit-percent must be >= 0 and < 100".to_string());
            }
            args.property_value * pct / 100.0
        }
        None => args.deposit,
    };
    if !deposit.is_finite() || deposit < 0.0 {
        return Err("--deposit must be >= 0".to_string());
    }
    if deposit >= args.property_value {
        return Err("--deposit must be < --property-value".to_string());
    }

    if !(0.0..=20.0).contains(&args.mortgage_rate) {
        return Err("--mortgage-rate must be between 0 and 20".to_string());
    }
    if !(1..=40).contains(&args.loan_term) {
        return Err("--loan-term must be between 1 and 40".to_string());
    }
    if !(1..=50).contains(&args.sell_after) {
        return Err("--sell-after must be between 1 and 50".to_string());
    }
    if !(0.0..=10.0).contains(&args.selling_agent_fees) {
        return Err("--selling-agent-fees must be between 0 and 10".to_string());
    }

    for (name, amount) in [
        ("--conveyancing-fees", args.conveyancing_fees),
        ("--home-insurance", args.home_insurance),
        ("--upfront-renovation", args.upfront_renovation),
        ("--upfront-furniture", args.upfront_furniture),
        ("--monthly-rent", args.monthly_rent),
        ("--rent-deposit", args.rent_deposit),
        ("--utilities", args.utilities),
    ] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    for (name, rate) in [
        ("--home-appreciation", args.home_appreciation),
        ("--investment-return", args.investment_return),
        ("--rent-increase", args.rent_increase),
    ] {
        if !(-50.0..=50.0).contains(&rate) {
            return Err(format!("{name} must be between -50 and 50"));
        }
    }

    let room_rental = if args.room_rental {
        if !args.room_rent.is_finite() || args.room_rent < 0.0 {
            return Err("--room-rent must be >= 0".to_string());
        }
        if !(-50.0..=50.0).contains(&args.room_rent_increase) {
            return Err("--room-rent-increase must be between -50 and 50".to_string());
        }
        if !(1..=12).contains(&args.months_rented) {
            return Err("--months-rented must be between 1 and 12".to_string());
        }
        RoomRental::Enabled {
            monthly_rent: args.room_rent,
            annual_increase: args.room_rent_increase / 100.0,
            months_per_year: args.months_rented,
        }
    } else {
        RoomRental::Disabled
    };

    let capital_gains = match args.cgt_rate {
        Some(rate) => {
            if !(0.0..=100.0).contains(&rate) {
                return Err("--cgt-rate must be between 0 and 100".to_string());
            }
            if !(0.0..=100.0).contains(&args.cgt_interest_relief) {
                return Err("--cgt-interest-relief must be between 0 and 100".to_string());
            }
            Some(CapitalGainsTax {
                rate: rate / 100.0,
                interest_relief: args.cgt_interest_relief / 100.0,
            })
        }
        None => None,
    };

    Ok(AnalysisRequest {
        buy: BuyScenario {
            mortgage_rate: args.mortgage_rate / 100.0,
            loan_term: args.loan_term,
            deposit,
            conveyancing_fees: args.conveyancing_fees,
            property_value: args.property_value,
            selling_agent_fees_percent: args.selling_agent_fees / 100.0,
            home_appreciation_rate: args.home_appreciation / 100.0,
            investment_return_rate: args.investment_return / 100.0,
            upfront_renovation_cost: args.upfront_renovation,
            upfront_furniture_cost: args.upfront_furniture,
            home_insurance: args.home_insurance,
            room_rental,
            is_second_home: args.second_home,
            capital_gains,
        },
        rent: RentScenario {
            rent_per_month: args.monthly_rent,
            rent_annual_increase: args.rent_increase / 100.0,
            security_deposit: args.rent_deposit,
        },
        common: CommonParams {
            utilities_per_month: args.utilities,
            sell_after_years: args.sell_after,
            daughter_living_years: args.daughter_years,
        },
    })
}

pub fn render_analysis(args: ScenarioArgs) -> Result<String, String> {
    let request = build_request(args)?;
    let result = analyze_request(&request).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&result).map_err(|e| format!("Failed to encode result: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route(
            "/api/analyze",
            get(analyze_get_handler).post(analyze_post_handler),
        )
        .route("/api/break-even", post(break_even_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "rent vs buy HTTP API listening");
    info!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> Response {
    json_response(
        StatusCode::OK,
        ServiceBanner {
            message: "Rent vs buy analysis API",
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn analyze_get_handler(Query(payload): Query<AnalyzePayload>) -> Response {
    analyze_handler_impl(payload).await
}

async fn analyze_post_handler(Json(payload): Json<AnalyzePayload>) -> Response {
    analyze_handler_impl(payload).await
}

async fn analyze_handler_impl(payload: AnalyzePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected analysis request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match analyze_request(&request) {
        Ok(result) => {
            log_result(&result);
            json_response(StatusCode::OK, result)
        }
        Err(err) => analysis_error_response(err),
    }
}

async fn break_even_post_handler(Json(payload): Json<BreakEvenPayload>) -> Response {
    break_even_handler_impl(payload).await
}

async fn break_even_handler_impl(payload: BreakEvenPayload) -> Response {
    let mut config = BreakEvenConfig::default();
    if let Some(v) = payload.search_min {
        config.search_min = v / 100.0;
    }
    if let Some(v) = payload.search_max {
        config.search_max = v / 100.0;
    }
    if let Some(v) = payload.tolerance {
        config.tolerance = v / 100.0;
    }
    if let Some(v) = payload.max_iterations {
        config.max_iterations = v;
    }

    let request = match api_request_from_payload(payload.scenario) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected break-even request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    match solve_break_even_appreciation(&request, config) {
        Ok(solved) => {
            info!(
                break_even_rate = ?solved.break_even_rate,
                iterations = solved.iterations.len(),
                converged = solved.converged,
                "break-even solved"
            );
            json_response(StatusCode::OK, solved)
        }
        Err(err) => analysis_error_response(err),
    }
}

fn log_result(result: &AnalysisResult) {
    info!(
        recommendation = ?result.recommendation,
        buy_npv = result.npv.buy,
        rent_npv = result.npv.rent,
        years = result.sell_after_years,
        "analysis served"
    );
}

fn analysis_error_response(err: AnalysisError) -> Response {
    let status = match err {
        AnalysisError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AnalysisError::ComputationOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    warn!(error = %err, "analysis failed");
    error_response(status, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
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
fn api_request_from_json(json: &str) -> Result<AnalysisRequest, String> {
    let payload = serde_json::from_str::<AnalyzePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: AnalyzePayload) -> Result<AnalysisRequest, String> {
    let mut args = ScenarioArgs::default();

    if let Some(v) = payload.property_value {
        args.property_value = v;
    }
    if let Some(v) = payload.second_home {
        args.second_home = v;
    }
    if let Some(v) = payload.deposit {
        args.deposit = v;
    }
    if let Some(v) = payload.deposit_percent {
        args.deposit_percent = Some(v);
    }
    if let Some(v) = payload.mortgage_rate {
        args.mortgage_rate = v;
    }
    if let Some(v) = payload.loan_term {
        args.loan_term = v;
    }
    if let Some(v) = payload.conveyancing_fees {
        args.conveyancing_fees = v;
    }
    if let Some(v) = payload.selling_agent_fees {
        args.selling_agent_fees = v;
    }
    if let Some(v) = payload.home_insurance {
        args.home_insurance = v;
    }
    if let Some(v) = payload.upfront_renovation {
        args.upfront_renovation = v;
    }
    if let Some(v) = payload.upfront_furniture {
        args.upfront_furniture = v;
    }
    if let Some(v) = payload.home_appreciation {
        args.home_appreciation = v;
    }
    if let Some(v) = payload.investment_return {
        args.investment_return = v;
    }

    if let Some(v) = payload.room_rental {
        args.room_rental = v;
    }
    if let Some(v) = payload.room_rent {
        args.room_rent = v;
    }
    if let Some(v) = payload.room_rent_increase {
        args.room_rent_increase = v;
    }
    if let Some(v) = payload.months_rented {
        args.months_rented = v;
    }

    if let Some(v) = payload.monthly_rent {
        args.monthly_rent = v;
    }
    if let Some(v) = payload.rent_increase {
        args.rent_increase = v;
    }
    if let Some(v) = payload.rent_deposit {
        args.rent_deposit = v;
    }

    if let Some(v) = payload.utilities {
        args.utilities = v;
    }
    if let Some(v) = payload.sell_after {
        args.sell_after = v;
    }
    if let Some(v) = payload.daughter_years {
        args.daughter_years = v;
    }

    if let Some(v) = payload.cgt_rate {
        args.cgt_rate = Some(v);
    }
    if let Some(v) = payload.cgt_interest_relief {
        args.cgt_interest_relief = v;
    }

    build_request(args)
}
