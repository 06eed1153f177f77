use serde::Serialize;

use super::engine::analyze;
use super::error::{AnalysisError, Result};
use super::types::AnalysisRequest;

pub const MAX_ITERATIONS_LIMIT: u32 = 200;
pub const MIN_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakEvenConfig {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for BreakEvenConfig {
    fn default() -> Self {
        Self {
            search_min: -0.10,
            search_max: 0.20,
            tolerance: 1e-6,
            max_iterations: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakEvenIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_rate: f64,
    pub npv_gap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakEvenResult {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub break_even_rate: Option<f64>,
    pub iterations: Vec<BreakEvenIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Finds the home appreciation rate at which buying and renting have the
/// same present cost. The buy-minus-rent gap falls as appreciation rises,
/// so the root is bracketed by bisection.
pub fn solve_break_even_appreciation(
    request: &AnalysisRequest,
    config: BreakEvenConfig,
) -> Result<BreakEvenResult> {
    validate_config(config)?;

    let gap_at = |rate: f64| -> Result<f64> {
        let mut buy = request.buy.clone();
        buy.home_appreciation_rate = rate;
        let result = analyze(&buy, &request.rent, &request.common)?;
        Ok(result.npv.buy - result.npv.rent)
    };

    let low_gap = gap_at(config.search_min)?;
    let high_gap = gap_at(config.search_max)?;

    let mut iterations = Vec::new();
    let mut break_even_rate = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_gap <= 0.0 {
        break_even_rate = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Buying already matches renting at the lower appreciation bound.".to_string();
    } else if high_gap > 0.0 {
        feasible = false;
        message = "Renting stays cheaper even at the upper appreciation bound.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let gap = gap_at(mid)?;
            iterations.push(BreakEvenIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_rate: mid,
                npv_gap: gap,
            });

            if gap > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        break_even_rate = Some(hi);
        feasible = true;
        message = if converged {
            "Solved break-even appreciation rate.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    Ok(BreakEvenResult {
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        break_even_rate,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn validate_config(config: BreakEvenConfig) -> Result<()> {
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(AnalysisError::InvalidInput(
            "search bounds must be finite".to_string(),
        ));
    }
    if config.search_min <= -1.0 {
        return Err(AnalysisError::InvalidInput(
            "search_min must be > -100%".to_string(),
        ));
    }
    if config.search_max <= config.search_min {
        return Err(AnalysisError::InvalidInput(
            "search_max must be > search_min".to_string(),
        ));
    }
    if config.tolerance.is_nan() || config.tolerance < MIN_TOLERANCE {
        return Err(AnalysisError::InvalidInput(format!(
            "tolerance must be >= {MIN_TOLERANCE:e}"
        )));
    }
    if config.max_iterations == 0 || config.max_iterations > MAX_ITERATIONS_LIMIT {
        return Err(AnalysisError::InvalidInput(format!(
            "max_iterations must be between 1 and {MAX_ITERATIONS_LIMIT}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BuyScenario, CommonParams, RentScenario, RoomRental};

    fn sample_request() -> AnalysisRequest {
        AnalysisRequest {
            buy: BuyScenario {
                mortgage_rate: 0.045,
                loan_term: 25,
                deposit: 60_000.0,
                conveyancing_fees: 1_500.0,
                property_value: 300_000.0,
                selling_agent_fees_percent: 0.015,
                home_appreciation_rate: 0.03,
                investment_return_rate: 0.07,
                upfront_renovation_cost: 5_000.0,
                upfront_furniture_cost: 3_000.0,
                home_insurance: 300.0,
                room_rental: RoomRental::Disabled,
                is_second_home: false,
                capital_gains: None,
            },
            rent: RentScenario {
                rent_per_month: 1_200.0,
                rent_annual_increase: 0.03,
                security_deposit: 0.0,
            },
            common: CommonParams {
                utilities_per_month: 150.0,
                sell_after_years: 5,
                daughter_living_years: 3,
            },
        }
    }

    #[test]
    fn break_even_rate_equalises_present_costs() {
        let request = sample_request();
        let solved = solve_break_even_appreciation(&request, BreakEvenConfig::default())
            .expect("valid config");
        assert!(solved.feasible);
        assert!(solved.converged);
        let rate = solved.break_even_rate.expect("rate within bounds");

        let mut buy = request.buy.clone();
        buy.home_appreciation_rate = rate;
        let result = analyze(&buy, &request.rent, &request.common).expect("valid scenario");
        // One tolerance step of appreciation moves the discounted sale price by about a pound.
        assert!(
            (result.npv.buy - result.npv.rent).abs() < 5.0,
            "gap {} at rate {rate}",
            result.npv.buy - result.npv.rent
        );
        assert!(solved.iterations.len() <= 60);
    }

    #[test]
    fn reports_infeasible_when_rent_always_cheaper() {
        let mut request = sample_request();
        request.rent.rent_per_month = 1.0;
        let config = BreakEvenConfig {
            search_min: 0.0,
            search_max: 0.01,
            ..BreakEvenConfig::default()
        };
        let solved = solve_break_even_appreciation(&request, config).expect("valid config");
        assert!(!solved.feasible);
        assert_eq!(solved.break_even_rate, None);
        assert!(solved.iterations.is_empty());
    }

    #[test]
    fn returns_lower_bound_when_buying_already_wins() {
        let mut request = sample_request();
        request.rent.rent_per_month = 10_000.0;
        let config = BreakEvenConfig {
            search_min: 0.0,
            ..BreakEvenConfig::default()
        };
        let solved = solve_break_even_appreciation(&request, config).expect("valid config");
        assert!(solved.feasible);
        assert_eq!(solved.break_even_rate, Some(0.0));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let config = BreakEvenConfig {
            search_min: 0.2,
            search_max: 0.1,
            ..BreakEvenConfig::default()
        };
        let err = solve_break_even_appreciation(&sample_request(), config)
            .expect_err("inverted bounds");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("search_max")));
    }

    #[test]
    fn rejects_unbounded_iteration_budget() {
        let config = BreakEvenConfig {
            max_iterations: u32::MAX,
            ..BreakEvenConfig::default()
        };
        let err = solve_break_even_appreciation(&sample_request(), config)
            .expect_err("iteration budget too large");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("max_iterations")));

        let at_limit = BreakEvenConfig {
            max_iterations: MAX_ITERATIONS_LIMIT,
            ..BreakEvenConfig::default()
        };
        solve_break_even_appreciation(&sample_request(), at_limit).expect("limit is accepted");
    }

    #[test]
    fn rejects_tolerance_below_float_resolution() {
        let config = BreakEvenConfig {
            tolerance: 1e-300,
            ..BreakEvenConfig::default()
        };
        let err = solve_break_even_appreciation(&sample_request(), config)
            .expect_err("tolerance too small");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("tolerance")));
    }
}
