mod engine;
mod format;
mod types;

pub use engine::{BudgetEngine, health_score, to_monthly_amount};
pub use format::{format_currency, format_percentage};
pub use types::{
    BudgetAnalytics, BudgetSnapshot, ExpenseCategory, ExpenseType, Frequency, IncomeCategory,
    IncomeSource, MonthlyData, MonthlyHistoryPoint, MonthlySavings, Settings,
};
