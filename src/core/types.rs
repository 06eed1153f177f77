use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RoomRental {
    Disabled,
    Enabled {
        monthly_rent: f64,
        annual_increase: f64,
        months_per_year: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CapitalGainsTax {
    pub rate: f64,
    /// Share of total mortgage interest paid that may be deducted from the gain.
    pub interest_relief: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyScenario {
    pub mortgage_rate: f64,
    pub loan_term: u32,
    pub deposit: f64,
    pub conveyancing_fees: f64,
    pub property_value: f64,
    pub selling_agent_fees_percent: f64,
    pub home_appreciation_rate: f64,
    pub investment_return_rate: f64,
    pub upfront_renovation_cost: f64,
    pub upfront_furniture_cost: f64,
    pub home_insurance: f64,
    pub room_rental: RoomRental,
    pub is_second_home: bool,
    pub capital_gains: Option<CapitalGainsTax>,
}

impl BuyScenario {
    pub fn loan_amount(&self) -> f64 {
        (self.property_value - self.deposit).max(0.0)
    }

    /// Cash the buyer parts with in year 0, stamp duty included.
    pub fn upfront_outlay(&self, stamp_duty: f64) -> f64 {
        self.deposit
            + self.conveyancing_fees
            + stamp_duty
            + self.upfront_renovation_cost
            + self.upfront_furniture_cost
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RentScenario {
    pub rent_per_month: f64,
    pub rent_annual_increase: f64,
    pub security_deposit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommonParams {
    pub utilities_per_month: f64,
    pub sell_after_years: u32,
    pub daughter_living_years: u32,
}

impl CommonParams {
    pub fn annual_utilities(&self) -> f64 {
        self.utilities_per_month * 12.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub buy: BuyScenario,
    pub rent: RentScenario,
    pub common: CommonParams,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostComponent {
    Deposit,
    ConveyancingFees,
    StampDuty,
    UpfrontRenovation,
    UpfrontFurniture,
    SecurityDeposit,
    MortgagePayment,
    HomeInsurance,
    Utilities,
    RoomRentIncome,
    RentPayments,
    PropertySale,
    AgentFees,
    MortgageRepayment,
    CapitalGainsTax,
    SecurityDepositRefund,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CostPhase {
    Initial,
    Ongoing,
    Selling,
}

impl CostComponent {
    pub fn phase(self) -> CostPhase {
        match self {
            CostComponent::Deposit
            | CostComponent::ConveyancingFees
            | CostComponent::StampDuty
            | CostComponent::UpfrontRenovation
            | CostComponent::UpfrontFurniture
            | CostComponent::SecurityDeposit => CostPhase::Initial,
            CostComponent::MortgagePayment
            | CostComponent::HomeInsurance
            | CostComponent::Utilities
            | CostComponent::RoomRentIncome
            | CostComponent::RentPayments => CostPhase::Ongoing,
            CostComponent::PropertySale
            | CostComponent::AgentFees
            | CostComponent::MortgageRepayment
            | CostComponent::CapitalGainsTax
            | CostComponent::SecurityDepositRefund => CostPhase::Selling,
        }
    }
}

/// One year of a scenario's cash flow. Amounts are outflow-positive: money
/// leaving the household is positive, income and sale proceeds are negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyRecord {
    pub year: u32,
    pub total: f64,
    pub components: BTreeMap<CostComponent, f64>,
}

impl YearlyRecord {
    pub fn from_components(year: u32, components: BTreeMap<CostComponent, f64>) -> Self {
        let total = components.values().sum();
        Self {
            year,
            total,
            components,
        }
    }

    pub fn component(&self, component: CostComponent) -> f64 {
        self.components.get(&component).copied().unwrap_or(0.0)
    }
}

pub fn cash_flows(records: &[YearlyRecord]) -> Vec<f64> {
    records.iter().map(|r| r.total).collect()
}

pub fn cumulative_totals(records: &[YearlyRecord]) -> Vec<f64> {
    records
        .iter()
        .scan(0.0, |running, record| {
            *running += record.total;
            Some(*running)
        })
        .collect()
}

/// Running bank balance: every outflow reduces it, every inflow raises it.
pub fn bank_balance(records: &[YearlyRecord]) -> Vec<f64> {
    cumulative_totals(records).into_iter().map(|c| -c).collect()
}

pub fn component_total(records: &[YearlyRecord], component: CostComponent) -> f64 {
    records.iter().map(|r| r.component(component)).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assets {
    pub property_value: f64,
    pub cash: f64,
    pub investment_balance: f64,
    pub deposit_held: f64,
    pub total_assets: f64,
}

impl Assets {
    pub fn new(property_value: f64, cash: f64, investment_balance: f64, deposit_held: f64) -> Self {
        Self {
            property_value,
            cash,
            investment_balance,
            deposit_held,
            total_assets: property_value + cash + investment_balance + deposit_held,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Liabilities {
    pub mortgage_balance: f64,
    pub total_liabilities: f64,
}

impl Liabilities {
    pub fn new(mortgage_balance: f64) -> Self {
        Self {
            mortgage_balance,
            total_liabilities: mortgage_balance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceSheetEntry {
    pub year: u32,
    pub assets: Assets,
    pub liabilities: Liabilities,
    pub net_worth: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity: Option<f64>,
}

impl BalanceSheetEntry {
    pub fn new(year: u32, assets: Assets, liabilities: Liabilities) -> Self {
        Self {
            year,
            assets,
            liabilities,
            net_worth: assets.total_assets - liabilities.total_liabilities,
            equity: None,
        }
    }

    pub fn with_equity(mut self, equity: f64) -> Self {
        self.equity = Some(equity);
        self
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Recommendation {
    Buy,
    Rent,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioPair {
    pub buy: f64,
    pub rent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlows {
    pub years: Vec<u32>,
    pub buy_cash_flow: Vec<f64>,
    pub rent_cash_flow: Vec<f64>,
    pub property_value: Vec<f64>,
    pub mortgage_balance: Vec<f64>,
    pub mortgage_interest: Vec<f64>,
    pub mortgage_principal: Vec<f64>,
    pub investment_balance: Vec<f64>,
    pub buy_breakdown: Vec<YearlyRecord>,
    pub rent_breakdown: Vec<YearlyRecord>,
    pub buy_balance_sheet: Vec<BalanceSheetEntry>,
    pub rent_balance_sheet: Vec<BalanceSheetEntry>,
    pub buy_bank_balance: Vec<f64>,
    pub rent_bank_balance: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyCostBreakdown {
    pub initial_costs: BTreeMap<CostComponent, f64>,
    pub ongoing_costs: BTreeMap<CostComponent, f64>,
    pub selling_costs: BTreeMap<CostComponent, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RentCostBreakdown {
    pub rent_payments: f64,
    pub utilities: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub buy: BuyCostBreakdown,
    pub rent: RentCostBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub cash_flows: CashFlows,
    pub stamp_duty: f64,
    pub npv: ScenarioPair,
    pub total_costs: ScenarioPair,
    pub final_position: ScenarioPair,
    pub cost_breakdown: CostBreakdown,
    pub recommendation: Recommendation,
    pub explanation: String,
    pub sell_after_years: u32,
}
