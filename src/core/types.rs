use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Cadence at which a monetary amount recurs. A closed set: anything else is
/// rejected at the deserialization boundary instead of falling through to a
/// monthly multiplier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Monthly,
    Weekly,
    Biweekly,
    Yearly,
    #[serde(alias = "oneTime", alias = "one_time")]
    OneTime,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseType {
    Fixed,
    Variable,
    Occasional,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeCategory {
    Salary,
    Freelancing,
    Investments,
    Rental,
    Business,
    Other,
}

/// One income stream. `amount` is nominal at the given `frequency`.
/// A missing `start_date` marks a legacy record; a missing `end_date` means
/// the stream is open-ended.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSource {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub category: IncomeCategory,
    pub is_recurring: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl IncomeSource {
    /// Whether this stream is in effect on the given day. Both interval
    /// boundaries are inclusive. Legacy records without a start date count as
    /// active when they are recurring or anything other than one-time.
    pub fn is_active_on(&self, on: NaiveDate) -> bool {
        match self.start_date {
            Some(start) => start <= on && self.end_date.map_or(true, |end| end >= on),
            None => self.is_recurring || self.frequency != Frequency::OneTime,
        }
    }
}

/// One expense category. `budget` is the planned nominal amount at
/// `frequency`; `spent`, `color`, and `subcategories` are carried for the
/// presentation layer and never read by the analytics formulas.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseCategory {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ExpenseType,
    pub budget: f64,
    #[serde(default)]
    pub spent: f64,
    pub frequency: Frequency,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub subcategories: Option<Vec<String>>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl ExpenseCategory {
    /// Undated expense categories are always active.
    pub fn is_active_on(&self, on: NaiveDate) -> bool {
        match self.start_date {
            Some(start) => start <= on && self.end_date.map_or(true, |end| end >= on),
            None => true,
        }
    }
}

/// One recorded savings deposit for a calendar month (`YYYY-MM`). Multiple
/// entries for the same month are summed, not deduplicated.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySavings {
    pub id: String,
    pub month: String,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
}

/// One month of recorded spending history: `YYYY-MM` key plus actual spend
/// per expense-category id. This is the input series for the volatility
/// index.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyHistoryPoint {
    pub month: String,
    #[serde(default)]
    pub categories: BTreeMap<String, f64>,
}

/// Global parameters read by the engine. `inflation_rate` is percent per
/// year; `emergency_fund_target` is in months of fixed expenses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub currency: String,
    pub inflation_rate: f64,
    pub emergency_fund_target: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            inflation_rate: 3.5,
            emergency_fund_target: 6.0,
        }
    }
}

/// Immutable record-set snapshot the engine is constructed from. The engine
/// never mutates it; persistence is the caller's concern.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BudgetSnapshot {
    pub incomes: Vec<IncomeSource>,
    pub expenses: Vec<ExpenseCategory>,
    pub monthly_savings: Vec<MonthlySavings>,
    pub monthly_history: Vec<MonthlyHistoryPoint>,
    pub settings: Settings,
}

/// Snapshot-in-time scalar bundle produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAnalytics {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_income: f64,
    pub savings_rate: f64,
    pub break_even_point: f64,
    pub expense_volatility_index: f64,
    pub cash_flow_cushion: f64,
    pub sustainability_months: f64,
    pub stable_income: f64,
    pub total_savings: f64,
    pub average_monthly_savings: f64,
}

/// One projected calendar month. `savings` is that month's surplus; the
/// running cumulative total is exposed under `categories["savings"]` for
/// downstream charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyData {
    pub month: String,
    pub income: f64,
    pub expenses: f64,
    pub surplus: f64,
    pub savings: f64,
    pub categories: BTreeMap<String, f64>,
}
