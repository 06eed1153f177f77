use std::collections::BTreeMap;

use super::types::{
    BuyCostBreakdown, CostComponent, CostPhase, Recommendation, RentCostBreakdown, ScenarioPair,
    YearlyRecord, component_total,
};

/// Relative band inside which the two present costs count as equal.
pub const NPV_TIE_TOLERANCE: f64 = 1e-9;

pub fn npv(discount_rate: f64, cash_flows: &[f64]) -> f64 {
    let factor = 1.0 + discount_rate;
    cash_flows
        .iter()
        .enumerate()
        .map(|(year, cash_flow)| cash_flow / factor.powi(year as i32))
        .sum()
}

pub fn total_cost(cash_flows: &[f64]) -> f64 {
    cash_flows.iter().sum()
}

/// Lower present cost wins; a tie goes to renting.
pub fn decide(npv: ScenarioPair) -> Recommendation {
    let scale = npv.buy.abs().max(npv.rent.abs()).max(1.0);
    if npv.buy < npv.rent - NPV_TIE_TOLERANCE * scale {
        Recommendation::Buy
    } else {
        Recommendation::Rent
    }
}

pub fn is_tie(npv: ScenarioPair) -> bool {
    let scale = npv.buy.abs().max(npv.rent.abs()).max(1.0);
    (npv.buy - npv.rent).abs() <= NPV_TIE_TOLERANCE * scale
}

pub fn buy_cost_breakdown(records: &[YearlyRecord]) -> BuyCostBreakdown {
    let mut breakdown = BuyCostBreakdown {
        initial_costs: BTreeMap::new(),
        ongoing_costs: BTreeMap::new(),
        selling_costs: BTreeMap::new(),
    };
    for record in records {
        for (&component, &amount) in &record.components {
            let bucket = match component.phase() {
                CostPhase::Initial => &mut breakdown.initial_costs,
                CostPhase::Ongoing => &mut breakdown.ongoing_costs,
                CostPhase::Selling => &mut breakdown.selling_costs,
            };
            *bucket.entry(component).or_insert(0.0) += amount;
        }
    }
    breakdown
}

pub fn rent_cost_breakdown(records: &[YearlyRecord]) -> RentCostBreakdown {
    RentCostBreakdown {
        rent_payments: component_total(records, CostComponent::RentPayments),
        utilities: component_total(records, CostComponent::Utilities),
    }
}

/// Figures the explanation draws its drivers from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplanationInputs {
    pub npv: ScenarioPair,
    pub recommendation: Recommendation,
    pub horizon_years: u32,
    pub stamp_duty: f64,
    pub upfront_outlay: f64,
    pub appreciation_gain: f64,
    pub home_appreciation_rate: f64,
    pub investment_gain: f64,
    pub initial_investment: f64,
    pub investment_return_rate: f64,
    pub mortgage_interest: f64,
    pub room_rent_income: f64,
    pub rent_paid: f64,
    pub selling_costs: f64,
}

struct Driver {
    weight: f64,
    text: String,
}

pub fn explain(inputs: &ExplanationInputs) -> String {
    let mut lines = Vec::new();
    let gap = (inputs.npv.buy - inputs.npv.rent).abs();

    if is_tie(inputs.npv) {
        lines.push(format!(
            "Rent is recommended: buying and renting have the same present cost ({}), and renting commits less capital.",
            format_gbp(inputs.npv.rent)
        ));
    } else {
        let (winner, cheaper, dearer) = match inputs.recommendation {
            Recommendation::Buy => ("Buy", inputs.npv.buy, inputs.npv.rent),
            Recommendation::Rent => ("Rent", inputs.npv.rent, inputs.npv.buy),
        };
        lines.push(format!(
            "{winner} is recommended: its present cost over {} years is {} against {}, a gap of {}.",
            inputs.horizon_years,
            format_gbp(cheaper),
            format_gbp(dearer),
            format_gbp(gap)
        ));
    }

    let mut drivers = vec![
        Driver {
            weight: inputs.upfront_outlay,
            text: format!(
                "Buying ties up {} at the start, including {} of stamp duty.",
                format_gbp(inputs.upfront_outlay),
                format_gbp(inputs.stamp_duty)
            ),
        },
        Driver {
            weight: inputs.appreciation_gain.abs(),
            text: format!(
                "The property changes in value by {} at {:.2}% a year.",
                format_gbp(inputs.appreciation_gain),
                inputs.home_appreciation_rate * 100.0
            ),
        },
        Driver {
            weight: inputs.investment_gain.abs(),
            text: format!(
                "Renting keeps {} invested, growing by {} at {:.2}% a year.",
                format_gbp(inputs.initial_investment),
                format_gbp(inputs.investment_gain),
                inputs.investment_return_rate * 100.0
            ),
        },
        Driver {
            weight: inputs.mortgage_interest,
            text: format!(
                "Mortgage interest paid before the sale totals {}.",
                format_gbp(inputs.mortgage_interest)
            ),
        },
        Driver {
            weight: inputs.rent_paid,
            text: format!("Rent paid over the period totals {}.", format_gbp(inputs.rent_paid)),
        },
        Driver {
            weight: inputs.selling_costs,
            text: format!(
                "Selling costs and taxes on sale come to {}.",
                format_gbp(inputs.selling_costs)
            ),
        },
    ];
    if inputs.room_rent_income > 0.0 {
        drivers.push(Driver {
            weight: inputs.room_rent_income,
            text: format!(
                "Room rental brings in {}, offsetting the buyer's running costs.",
                format_gbp(inputs.room_rent_income)
            ),
        });
    }

    drivers.retain(|d| d.weight > 0.0);
    drivers.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    for (rank, driver) in drivers.iter().take(4).enumerate() {
        lines.push(format!("{}. {}", rank + 1, driver.text));
    }

    lines.join("\n")
}

pub fn format_gbp(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, pence) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && formatted != "0.00" {
        "-"
    } else {
        ""
    };
    format!("{sign}£{grouped}.{pence}")
}
