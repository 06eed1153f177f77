use tracing::debug;

use super::buy::{BuyProjection, project_buy};
use super::comparison::{
    ExplanationInputs, buy_cost_breakdown, decide, explain, npv, rent_cost_breakdown, total_cost,
};
use super::error::{AnalysisError, Result};
use super::mortgage::amortize;
use super::rent::{RentProjection, initial_investment, project_rent};
use super::stamp_duty::stamp_duty;
use super::types::{
    AnalysisRequest, AnalysisResult, BuyScenario, CashFlows, CommonParams, CostBreakdown,
    CostComponent, RentScenario, RoomRental, ScenarioPair, bank_balance, cash_flows,
    component_total,
};

pub fn analyze(
    buy: &BuyScenario,
    rent: &RentScenario,
    common: &CommonParams,
) -> Result<AnalysisResult> {
    validate(buy, rent, common)?;

    let duty = stamp_duty(buy.property_value, buy.is_second_home);
    let schedule = amortize(buy.loan_amount(), buy.mortgage_rate, buy.loan_term);
    debug!(
        stamp_duty = duty,
        loan_amount = schedule.principal,
        monthly_payment = schedule.monthly_payment,
        "derived purchase figures"
    );

    let buy_projection = project_buy(buy, common, &schedule, duty);
    let upfront = buy.upfront_outlay(duty);
    let rent_projection = project_rent(
        rent,
        common,
        initial_investment(upfront, rent),
        buy.investment_return_rate,
    );

    let result = assemble(buy, common, duty, buy_projection, rent_projection);
    ensure_finite(&result)?;
    debug!(
        buy_npv = result.npv.buy,
        rent_npv = result.npv.rent,
        recommendation = ?result.recommendation,
        "comparison complete"
    );
    Ok(result)
}

pub fn analyze_request(request: &AnalysisRequest) -> Result<AnalysisResult> {
    analyze(&request.buy, &request.rent, &request.common)
}

pub const MAX_LOAN_TERM_YEARS: u32 = 100;
pub const MAX_HORIZON_YEARS: u32 = 200;

fn validate(buy: &BuyScenario, rent: &RentScenario, common: &CommonParams) -> Result<()> {
    if common.sell_after_years == 0 || common.sell_after_years > MAX_HORIZON_YEARS {
        return Err(invalid(&format!(
            "sell_after_years must be between 1 and {MAX_HORIZON_YEARS}"
        )));
    }
    if buy.loan_term == 0 || buy.loan_term > MAX_LOAN_TERM_YEARS {
        return Err(invalid(&format!(
            "loan_term must be between 1 and {MAX_LOAN_TERM_YEARS}"
        )));
    }

    let mut fields = vec![
        ("mortgage_rate", buy.mortgage_rate),
        ("deposit", buy.deposit),
        ("conveyancing_fees", buy.conveyancing_fees),
        ("property_value", buy.property_value),
        ("selling_agent_fees_percent", buy.selling_agent_fees_percent),
        ("home_appreciation_rate", buy.home_appreciation_rate),
        ("investment_return_rate", buy.investment_return_rate),
        ("upfront_renovation_cost", buy.upfront_renovation_cost),
        ("upfront_furniture_cost", buy.upfront_furniture_cost),
        ("home_insurance", buy.home_insurance),
        ("rent_per_month", rent.rent_per_month),
        ("rent_annual_increase", rent.rent_annual_increase),
        ("security_deposit", rent.security_deposit),
        ("utilities_per_month", common.utilities_per_month),
    ];
    if let RoomRental::Enabled {
        monthly_rent,
        annual_increase,
        ..
    } = buy.room_rental
    {
        fields.push(("room_rent", monthly_rent));
        fields.push(("room_rent_increase", annual_increase));
    }
    if let Some(cgt) = buy.capital_gains {
        fields.push(("cgt_rate", cgt.rate));
        fields.push(("cgt_interest_relief", cgt.interest_relief));
    }
    if let Some((name, _)) = fields.iter().find(|(_, value)| !value.is_finite()) {
        return Err(invalid(&format!("{name} must be a finite number")));
    }

    let mut non_negative = vec![
        ("mortgage_rate", buy.mortgage_rate),
        ("deposit", buy.deposit),
        ("conveyancing_fees", buy.conveyancing_fees),
        ("selling_agent_fees_percent", buy.selling_agent_fees_percent),
        ("upfront_renovation_cost", buy.upfront_renovation_cost),
        ("upfront_furniture_cost", buy.upfront_furniture_cost),
        ("home_insurance", buy.home_insurance),
        ("rent_per_month", rent.rent_per_month),
        ("security_deposit", rent.security_deposit),
        ("utilities_per_month", common.utilities_per_month),
    ];
    let mut growth_rates = vec![
        ("home_appreciation_rate", buy.home_appreciation_rate),
        ("investment_return_rate", buy.investment_return_rate),
        ("rent_annual_increase", rent.rent_annual_increase),
    ];
    if let RoomRental::Enabled {
        monthly_rent,
        annual_increase,
        ..
    } = buy.room_rental
    {
        non_negative.push(("room_rent", monthly_rent));
        growth_rates.push(("room_rent_increase", annual_increase));
    }
    if let Some((name, _)) = non_negative.iter().find(|(_, value)| *value < 0.0) {
        return Err(invalid(&format!("{name} must be >= 0")));
    }
    if let Some((name, _)) = growth_rates.iter().find(|(_, value)| *value <= -1.0) {
        return Err(invalid(&format!("{name} must be > -100%")));
    }

    if buy.selling_agent_fees_percent > 1.0 {
        return Err(invalid("selling_agent_fees_percent must be <= 100%"));
    }
    if buy.capital_gains.is_some_and(|cgt| {
        !(0.0..=1.0).contains(&cgt.rate) || !(0.0..=1.0).contains(&cgt.interest_relief)
    }) {
        return Err(invalid("capital gains rate and relief must be within 0..=100%"));
    }
    if buy.property_value <= buy.deposit {
        return Err(invalid("property_value must be > deposit"));
    }
    Ok(())
}

fn invalid(msg: &str) -> AnalysisError {
    AnalysisError::InvalidInput(msg.to_string())
}

fn assemble(
    buy: &BuyScenario,
    common: &CommonParams,
    duty: f64,
    buy_projection: BuyProjection,
    rent_projection: RentProjection,
) -> AnalysisResult {
    let horizon = common.sell_after_years;
    let last = horizon as usize;

    let buy_cash_flow = cash_flows(&buy_projection.records);
    let rent_cash_flow = cash_flows(&rent_projection.records);
    let buy_bank_balance = bank_balance(&buy_projection.records);
    let rent_bank_balance = bank_balance(&rent_projection.records);

    let npv = ScenarioPair {
        buy: npv(buy.investment_return_rate, &buy_cash_flow),
        rent: npv(buy.investment_return_rate, &rent_cash_flow),
    };
    let recommendation = decide(npv);

    let buy_breakdown = buy_cost_breakdown(&buy_projection.records);
    let investment_gain =
        rent_projection.investment_balance[last] - rent_projection.initial_investment;

    let explanation = explain(&ExplanationInputs {
        npv,
        recommendation,
        horizon_years: horizon,
        stamp_duty: duty,
        upfront_outlay: buy.upfront_outlay(duty),
        appreciation_gain: buy_projection.property_value[last] - buy.property_value,
        home_appreciation_rate: buy.home_appreciation_rate,
        investment_gain,
        initial_investment: rent_projection.initial_investment,
        investment_return_rate: buy.investment_return_rate,
        mortgage_interest: buy_projection.mortgage_interest.iter().sum(),
        room_rent_income: -component_total(&buy_projection.records, CostComponent::RoomRentIncome),
        rent_paid: component_total(&rent_projection.records, CostComponent::RentPayments),
        selling_costs: buy_projection.sale.agent_fees + buy_projection.sale.capital_gains_tax,
    });

    AnalysisResult {
        stamp_duty: duty,
        total_costs: ScenarioPair {
            buy: total_cost(&buy_cash_flow),
            rent: total_cost(&rent_cash_flow),
        },
        final_position: ScenarioPair {
            buy: buy_bank_balance[last],
            rent: rent_bank_balance[last] + investment_gain,
        },
        npv,
        cost_breakdown: CostBreakdown {
            buy: buy_breakdown,
            rent: rent_cost_breakdown(&rent_projection.records),
        },
        recommendation,
        explanation,
        sell_after_years: horizon,
        cash_flows: CashFlows {
            years: (0..=horizon).collect(),
            buy_cash_flow,
            rent_cash_flow,
            property_value: buy_projection.property_value,
            mortgage_balance: buy_projection.mortgage_balance,
            mortgage_interest: buy_projection.mortgage_interest,
            mortgage_principal: buy_projection.mortgage_principal,
            investment_balance: rent_projection.investment_balance,
            buy_breakdown: buy_projection.records,
            rent_breakdown: rent_projection.records,
            buy_balance_sheet: buy_projection.balance_sheet,
            rent_balance_sheet: rent_projection.balance_sheet,
            buy_bank_balance,
            rent_bank_balance,
        },
    }
}

fn ensure_finite(result: &AnalysisResult) -> Result<()> {
    let flows = &result.cash_flows;
    let series: [(&str, &[f64]); 8] = [
        ("buy cash flow", flows.buy_cash_flow.as_slice()),
        ("rent cash flow", flows.rent_cash_flow.as_slice()),
        ("property value", flows.property_value.as_slice()),
        ("mortgage balance", flows.mortgage_balance.as_slice()),
        ("mortgage interest", flows.mortgage_interest.as_slice()),
        ("investment balance", flows.investment_balance.as_slice()),
        ("buy bank balance", flows.buy_bank_balance.as_slice()),
        ("rent bank balance", flows.rent_bank_balance.as_slice()),
    ];
    for (name, values) in series {
        if let Some(year) = values.iter().position(|v| !v.is_finite()) {
            return Err(AnalysisError::ComputationOverflow(format!(
                "{name} is not finite in year {year}"
            )));
        }
    }

    let summary = [
        ("stamp duty", result.stamp_duty),
        ("buy NPV", result.npv.buy),
        ("rent NPV", result.npv.rent),
        ("buy total cost", result.total_costs.buy),
        ("rent total cost", result.total_costs.rent),
    ];
    if let Some((name, _)) = summary.iter().find(|(_, v)| !v.is_finite()) {
        return Err(AnalysisError::ComputationOverflow(format!(
            "{name} is not finite"
        )));
    }

    let sheets = flows
        .buy_balance_sheet
        .iter()
        .chain(&flows.rent_balance_sheet);
    for entry in sheets {
        if !entry.net_worth.is_finite() {
            return Err(AnalysisError::ComputationOverflow(format!(
                "net worth is not finite in year {}",
                entry.year
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CapitalGainsTax, Recommendation};
    use proptest::prelude::{any, prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn scenario_a() -> (BuyScenario, RentScenario, CommonParams) {
        (
            BuyScenario {
                mortgage_rate: 0.05,
                loan_term: 25,
                deposit: 50_000.0,
                conveyancing_fees: 1_500.0,
                property_value: 250_000.0,
                selling_agent_fees_percent: 0.015,
                home_appreciation_rate: 0.03,
                investment_return_rate: 0.07,
                upfront_renovation_cost: 0.0,
                upfront_furniture_cost: 0.0,
                home_insurance: 300.0,
                room_rental: RoomRental::Disabled,
                is_second_home: false,
                capital_gains: None,
            },
            RentScenario {
                rent_per_month: 800.0,
                rent_annual_increase: 0.03,
                security_deposit: 0.0,
            },
            CommonParams {
                utilities_per_month: 200.0,
                sell_after_years: 5,
                daughter_living_years: 0,
            },
        )
    }

    #[test]
    fn scenario_a_standard_purchase() {
        let (buy, rent, common) = scenario_a();
        let result = analyze(&buy, &rent, &common).expect("valid scenario");

        assert_approx(result.stamp_duty, 0.0);
        assert_eq!(result.cash_flows.years, vec![0, 1, 2, 3, 4, 5]);
        assert_approx(result.cash_flows.buy_cash_flow[0], 51_500.0);
        assert!(result.cash_flows.buy_cash_flow[0] > 0.0);
        assert_eq!(result.sell_after_years, 5);

        let expected = if result.npv.buy < result.npv.rent {
            Recommendation::Buy
        } else {
            Recommendation::Rent
        };
        assert_eq!(result.recommendation, expected);

        let gap = crate::core::comparison::format_gbp((result.npv.buy - result.npv.rent).abs());
        assert!(result.explanation.contains(&gap), "{}", result.explanation);
    }

    #[test]
    fn scenario_b_second_home_pays_more_stamp_duty() {
        let (buy, rent, common) = scenario_a();
        let mut second = buy.clone();
        second.is_second_home = true;
        let a = analyze(&buy, &rent, &common).expect("valid scenario");
        let b = analyze(&second, &rent, &common).expect("valid scenario");
        assert!(b.stamp_duty > a.stamp_duty);
        assert_approx(b.stamp_duty, 12_500.0);
        assert!(b.npv.buy > a.npv.buy);
    }

    #[test]
    fn scenario_c_room_rental_lowers_buy_cost_by_discounted_income() {
        let (buy, rent, common) = scenario_a();
        let mut rented = buy.clone();
        rented.room_rental = RoomRental::Enabled {
            monthly_rent: 500.0,
            annual_increase: 0.0,
            months_per_year: 9,
        };
        let without = analyze(&buy, &rent, &common).expect("valid scenario");
        let with = analyze(&rented, &rent, &common).expect("valid scenario");

        for year in 1..=5 {
            assert!(with.cash_flows.buy_cash_flow[year] < without.cash_flows.buy_cash_flow[year]);
        }
        let discounted_income: f64 = (1..=5).map(|y| 4_500.0 / 1.07f64.powi(y)).sum();
        assert_approx(without.npv.buy - with.npv.buy, discounted_income);
        assert_approx(with.npv.rent, without.npv.rent);
    }

    #[test]
    fn one_year_horizon_sells_against_first_year_balance() {
        let (buy, rent, mut common) = scenario_a();
        common.sell_after_years = 1;
        let result = analyze(&buy, &rent, &common).expect("valid scenario");
        let balance = result.cash_flows.mortgage_balance[1];
        assert!(balance < 200_000.0 && balance > 195_000.0);

        let sale = &result.cash_flows.buy_breakdown[1];
        assert_approx(sale.component(CostComponent::PropertySale), -257_500.0);
        assert_approx(sale.component(CostComponent::MortgageRepayment), balance);
    }

    #[test]
    fn rent_pool_is_buyer_upfront_outlay() {
        let (mut buy, mut rent, common) = scenario_a();
        buy.upfront_renovation_cost = 5_000.0;
        buy.upfront_furniture_cost = 3_000.0;
        rent.security_deposit = 1_000.0;
        let result = analyze(&buy, &rent, &common).expect("valid scenario");
        assert_approx(result.cash_flows.investment_balance[0], 58_500.0);
        assert_approx(
            result.cash_flows.investment_balance[5],
            58_500.0 * 1.07f64.powi(5),
        );
    }

    #[test]
    fn bank_balance_tracks_negated_cumulative_cash_flow() {
        let (buy, rent, common) = scenario_a();
        let result = analyze(&buy, &rent, &common).expect("valid scenario");
        let flows = &result.cash_flows;
        let mut running = 0.0;
        for (cash_flow, bank) in flows.buy_cash_flow.iter().zip(&flows.buy_bank_balance) {
            running -= cash_flow;
            assert_approx_tol(*bank, running, 1e-6);
        }
        assert_approx(result.final_position.buy, flows.buy_bank_balance[5]);
    }

    #[test]
    fn cost_breakdown_sums_to_total_cost() {
        let (mut buy, rent, common) = scenario_a();
        buy.room_rental = RoomRental::Enabled {
            monthly_rent: 500.0,
            annual_increase: 0.03,
            months_per_year: 9,
        };
        let result = analyze(&buy, &rent, &common).expect("valid scenario");
        let b = &result.cost_breakdown.buy;
        let summed: f64 = b
            .initial_costs
            .values()
            .chain(b.ongoing_costs.values())
            .chain(b.selling_costs.values())
            .sum();
        assert_approx_tol(summed, result.total_costs.buy, 1e-6);

        let r = &result.cost_breakdown.rent;
        assert_approx_tol(r.rent_payments + r.utilities, result.total_costs.rent, 1e-6);
        assert_approx(r.utilities, 2_400.0 * 5.0);
    }

    #[test]
    fn second_home_capital_gains_tax_raises_buy_cost() {
        let (mut buy, rent, common) = scenario_a();
        buy.is_second_home = true;
        buy.home_appreciation_rate = 0.08;
        let without = analyze(&buy, &rent, &common).expect("valid scenario");
        buy.capital_gains = Some(CapitalGainsTax {
            rate: 0.28,
            interest_relief: 0.20,
        });
        let with = analyze(&buy, &rent, &common).expect("valid scenario");
        let cgt = with.cash_flows.buy_breakdown[5].component(CostComponent::CapitalGainsTax);
        assert!(cgt > 0.0);
        assert_approx_tol(with.npv.buy - without.npv.buy, cgt / 1.07f64.powi(5), 1e-6);
    }

    #[test]
    fn rejects_invalid_inputs() {
        let (buy, rent, common) = scenario_a();

        let mut zero_horizon = common.clone();
        zero_horizon.sell_after_years = 0;
        let err = analyze(&buy, &rent, &zero_horizon).expect_err("zero horizon");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("sell_after_years")));

        let mut zero_term = buy.clone();
        zero_term.loan_term = 0;
        let err = analyze(&zero_term, &rent, &common).expect_err("zero term");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("loan_term")));

        let mut all_cash = buy.clone();
        all_cash.deposit = all_cash.property_value;
        let err = analyze(&all_cash, &rent, &common).expect_err("deposit equals value");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("property_value")));

        let mut nan_rate = buy.clone();
        nan_rate.mortgage_rate = f64::NAN;
        let err = analyze(&nan_rate, &rent, &common).expect_err("nan rate");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("mortgage_rate")));

        let mut endless_term = buy.clone();
        endless_term.loan_term = 400_000_000;
        let err = analyze(&endless_term, &rent, &common).expect_err("huge term");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("loan_term")));

        let mut endless_horizon = common.clone();
        endless_horizon.sell_after_years = u32::MAX;
        let err = analyze(&buy, &rent, &endless_horizon).expect_err("huge horizon");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("sell_after_years")));

        let mut negative_rate = buy.clone();
        negative_rate.mortgage_rate = -0.01;
        let err = analyze(&negative_rate, &rent, &common).expect_err("negative rate");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("mortgage_rate")));

        let mut negative_fees = buy.clone();
        negative_fees.conveyancing_fees = -1.0;
        let err = analyze(&negative_fees, &rent, &common).expect_err("negative fees");
        assert!(matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("conveyancing_fees")));

        let mut collapsing = buy.clone();
        collapsing.investment_return_rate = -1.0;
        let err = analyze(&collapsing, &rent, &common).expect_err("rate at -100%");
        assert!(
            matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("investment_return_rate"))
        );

        let mut negative_utilities = common.clone();
        negative_utilities.utilities_per_month = -5.0;
        let err = analyze(&buy, &rent, &negative_utilities).expect_err("negative utilities");
        assert!(
            matches!(err, AnalysisError::InvalidInput(ref m) if m.contains("utilities_per_month"))
        );
    }

    #[test]
    fn pathological_rates_surface_overflow() {
        let (mut buy, rent, mut common) = scenario_a();
        buy.home_appreciation_rate = 1e300;
        common.sell_after_years = 3;
        let err = analyze(&buy, &rent, &common).expect_err("overflowing appreciation");
        assert!(matches!(err, AnalysisError::ComputationOverflow(_)));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_analysis_is_idempotent_and_balance_sheets_balance(
            property_value in 80_000u32..1_500_000,
            deposit_pct in 5u32..95,
            rate_bp in 0u32..1000,
            term in 5u32..36,
            horizon in 1u32..31,
            appreciation_bp in -300i32..900,
            return_bp in 0u32..1200,
            rent in 0u32..4000,
            daughter_years in 0u32..10,
            second_home in any::<bool>(),
            room_rental in any::<bool>()
        ) {
            let (mut buy, mut rent_scenario, mut common) = scenario_a();
            buy.property_value = property_value as f64;
            buy.deposit = buy.property_value * deposit_pct as f64 / 100.0;
            buy.mortgage_rate = rate_bp as f64 / 10_000.0;
            buy.loan_term = term;
            buy.home_appreciation_rate = appreciation_bp as f64 / 10_000.0;
            buy.investment_return_rate = return_bp as f64 / 10_000.0;
            buy.is_second_home = second_home;
            if room_rental {
                buy.room_rental = RoomRental::Enabled {
                    monthly_rent: 450.0,
                    annual_increase: 0.02,
                    months_per_year: 10,
                };
            }
            rent_scenario.rent_per_month = rent as f64;
            common.sell_after_years = horizon;
            common.daughter_living_years = daughter_years;

            let first = analyze(&buy, &rent_scenario, &common).expect("valid scenario");
            let second = analyze(&buy, &rent_scenario, &common).expect("valid scenario");
            prop_assert_eq!(&first, &second);

            prop_assert_eq!(first.cash_flows.years.len(), horizon as usize + 1);
            for entry in first
                .cash_flows
                .buy_balance_sheet
                .iter()
                .chain(&first.cash_flows.rent_balance_sheet)
            {
                prop_assert_eq!(
                    entry.net_worth,
                    entry.assets.total_assets - entry.liabilities.total_liabilities
                );
            }
            for record in &first.cash_flows.buy_breakdown {
                let summed: f64 = record.components.values().sum();
                prop_assert_eq!(summed, record.total);
            }
            prop_assert!(first.npv.buy.is_finite() && first.npv.rent.is_finite());
        }
    }
}
