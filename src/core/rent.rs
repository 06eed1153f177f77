use std::collections::BTreeMap;

use super::types::{
    Assets, BalanceSheetEntry, CommonParams, CostComponent, Liabilities, RentScenario,
    YearlyRecord,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RentProjection {
    pub records: Vec<YearlyRecord>,
    pub initial_investment: f64,
    pub investment_balance: Vec<f64>,
    pub balance_sheet: Vec<BalanceSheetEntry>,
}

/// The renter keeps invested whatever the buyer spends up front, less the
/// rent-side deposit they have to lodge themselves.
pub fn initial_investment(buy_upfront_outlay: f64, rent: &RentScenario) -> f64 {
    (buy_upfront_outlay - rent.security_deposit).max(0.0)
}

pub fn annual_rent(rent: &RentScenario, year: u32) -> f64 {
    if year == 0 {
        return 0.0;
    }
    rent.rent_per_month * 12.0 * (1.0 + rent.rent_annual_increase).powi(year as i32 - 1)
}

/// Only the opening lump sum compounds; the yearly rent bill is paid from
/// income and never tops up or draws down the invested pool.
pub fn project_rent(
    rent: &RentScenario,
    common: &CommonParams,
    initial_investment: f64,
    investment_return_rate: f64,
) -> RentProjection {
    let horizon = common.sell_after_years;
    let capacity = horizon as usize + 1;

    let mut records = Vec::with_capacity(capacity);
    let mut investment_balance = Vec::with_capacity(capacity);
    let mut balance_sheet = Vec::with_capacity(capacity);

    let mut invested = initial_investment;
    for year in 0..=horizon {
        let mut components = BTreeMap::new();
        if year == 0 {
            if rent.security_deposit > 0.0 {
                components.insert(CostComponent::SecurityDeposit, rent.security_deposit);
            }
        } else {
            invested *= 1.0 + investment_return_rate;
            components.insert(CostComponent::RentPayments, annual_rent(rent, year));
            components.insert(CostComponent::Utilities, common.annual_utilities());
        }

        let deposit_held = if year == horizon {
            if rent.security_deposit > 0.0 {
                components.insert(CostComponent::SecurityDepositRefund, -rent.security_deposit);
            }
            0.0
        } else {
            rent.security_deposit
        };

        records.push(YearlyRecord::from_components(year, components));
        investment_balance.push(invested);
        balance_sheet.push(BalanceSheetEntry::new(
            year,
            Assets::new(0.0, 0.0, invested, deposit_held),
            Liabilities::new(0.0),
        ));
    }

    RentProjection {
        records,
        initial_investment,
        investment_balance,
        balance_sheet,
    }
}
