mod buy;
mod comparison;
mod engine;
mod error;
mod mortgage;
mod rent;
mod solver;
mod stamp_duty;
mod types;

pub use buy::{BuyProjection, SaleSettlement, project_buy, property_value_at, room_rent_income};
pub use comparison::{decide, format_gbp, npv, total_cost};
pub use engine::{MAX_HORIZON_YEARS, MAX_LOAN_TERM_YEARS, analyze, analyze_request};
pub use error::{AnalysisError, Result};
pub use mortgage::{AmortizationSchedule, AmortizationYear, amortize, monthly_payment};
pub use rent::{RentProjection, annual_rent, initial_investment, project_rent};
pub use solver::{
    BreakEvenConfig, BreakEvenIteration, BreakEvenResult, MAX_ITERATIONS_LIMIT, MIN_TOLERANCE,
    solve_break_even_appreciation,
};
pub use stamp_duty::{SECOND_HOME_SURCHARGE, stamp_duty};
pub use types::{
    AnalysisRequest, AnalysisResult, Assets, BalanceSheetEntry, BuyCostBreakdown, BuyScenario,
    CapitalGainsTax, CashFlows, CommonParams, CostBreakdown, CostComponent, CostPhase,
    Liabilities, Recommendation, RentCostBreakdown, RentScenario, RoomRental, ScenarioPair,
    YearlyRecord,
};
