use std::collections::BTreeMap;

use serde::Serialize;

use super::mortgage::AmortizationSchedule;
use super::types::{
    Assets, BalanceSheetEntry, BuyScenario, CommonParams, CostComponent, Liabilities, RoomRental,
    YearlyRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SaleSettlement {
    pub year: u32,
    pub sale_price: f64,
    pub agent_fees: f64,
    pub mortgage_repayment: f64,
    pub capital_gains_tax: f64,
    pub net_proceeds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyProjection {
    pub records: Vec<YearlyRecord>,
    pub property_value: Vec<f64>,
    pub mortgage_balance: Vec<f64>,
    pub mortgage_interest: Vec<f64>,
    pub mortgage_principal: Vec<f64>,
    pub balance_sheet: Vec<BalanceSheetEntry>,
    pub sale: SaleSettlement,
}

pub fn property_value_at(buy: &BuyScenario, year: u32) -> f64 {
    buy.property_value * (1.0 + buy.home_appreciation_rate).powi(year as i32)
}

/// Room income for `year`. Rental starts once the resident has moved out
/// (never before year 1) and the rent compounds from that first rented year.
pub fn room_rent_income(rental: &RoomRental, daughter_living_years: u32, year: u32) -> f64 {
    match *rental {
        RoomRental::Disabled => 0.0,
        RoomRental::Enabled {
            monthly_rent,
            annual_increase,
            months_per_year,
        } => {
            let activation_year = daughter_living_years.max(1);
            if year < activation_year {
                return 0.0;
            }
            let elapsed = (year - activation_year) as i32;
            monthly_rent * (1.0 + annual_increase).powi(elapsed) * months_per_year as f64
        }
    }
}

fn settle_sale(
    buy: &BuyScenario,
    schedule: &AmortizationSchedule,
    stamp_duty: f64,
    year: u32,
) -> SaleSettlement {
    let sale_price = property_value_at(buy, year);
    let agent_fees = sale_price * buy.selling_agent_fees_percent;
    let mortgage_repayment = schedule.year(year).balance;

    let capital_gains_tax = match buy.capital_gains {
        Some(cgt) if buy.is_second_home => {
            let acquisition_cost = buy.property_value + buy.conveyancing_fees + stamp_duty;
            let relief = schedule.interest_through(year) * cgt.interest_relief;
            let taxable_gain = (sale_price - acquisition_cost - relief).max(0.0);
            taxable_gain * cgt.rate
        }
        _ => 0.0,
    };

    SaleSettlement {
        year,
        sale_price,
        agent_fees,
        mortgage_repayment,
        capital_gains_tax,
        net_proceeds: sale_price - agent_fees - mortgage_repayment - capital_gains_tax,
    }
}

pub fn project_buy(
    buy: &BuyScenario,
    common: &CommonParams,
    schedule: &AmortizationSchedule,
    stamp_duty: f64,
) -> BuyProjection {
    let horizon = common.sell_after_years;
    let capacity = horizon as usize + 1;
    let sale = settle_sale(buy, schedule, stamp_duty, horizon);

    let mut records = Vec::with_capacity(capacity);
    let mut property_value = Vec::with_capacity(capacity);
    let mut mortgage_balance = Vec::with_capacity(capacity);
    let mut mortgage_interest = Vec::with_capacity(capacity);
    let mut mortgage_principal = Vec::with_capacity(capacity);
    let mut balance_sheet = Vec::with_capacity(capacity);

    let mut equity = buy.deposit;
    for year in 0..=horizon {
        let value = property_value_at(buy, year);
        let loan = schedule.year(year);
        let mut components = BTreeMap::new();

        if year == 0 {
            components.insert(CostComponent::Deposit, buy.deposit);
            components.insert(CostComponent::ConveyancingFees, buy.conveyancing_fees);
            components.insert(CostComponent::StampDuty, stamp_duty);
            components.insert(CostComponent::UpfrontRenovation, buy.upfront_renovation_cost);
            components.insert(CostComponent::UpfrontFurniture, buy.upfront_furniture_cost);
        } else {
            components.insert(CostComponent::MortgagePayment, loan.payment());
            components.insert(CostComponent::HomeInsurance, buy.home_insurance);
            components.insert(CostComponent::Utilities, common.annual_utilities());
            if matches!(buy.room_rental, RoomRental::Enabled { .. })
                && year >= common.daughter_living_years
            {
                let income =
                    room_rent_income(&buy.room_rental, common.daughter_living_years, year);
                components.insert(CostComponent::RoomRentIncome, -income);
            }
            equity += loan.principal_paid;
        }

        let entry = if year == horizon {
            components.insert(CostComponent::PropertySale, -sale.sale_price);
            components.insert(CostComponent::AgentFees, sale.agent_fees);
            components.insert(CostComponent::MortgageRepayment, sale.mortgage_repayment);
            if sale.capital_gains_tax > 0.0 {
                components.insert(CostComponent::CapitalGainsTax, sale.capital_gains_tax);
            }
            BalanceSheetEntry::new(
                year,
                Assets::new(0.0, sale.net_proceeds, 0.0, 0.0),
                Liabilities::new(0.0),
            )
        } else {
            BalanceSheetEntry::new(
                year,
                Assets::new(value, 0.0, 0.0, 0.0),
                Liabilities::new(loan.balance),
            )
        };

        records.push(YearlyRecord::from_components(year, components));
        property_value.push(value);
        mortgage_balance.push(loan.balance);
        mortgage_interest.push(loan.interest_paid);
        mortgage_principal.push(loan.principal_paid);
        balance_sheet.push(entry.with_equity(equity));
    }

    BuyProjection {
        records,
        property_value,
        mortgage_balance,
        mortgage_interest,
        mortgage_principal,
        balance_sheet,
        sale,
    }
}
