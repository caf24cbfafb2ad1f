use std::collections::BTreeMap;

use chrono::{Datelike, Local, Months, NaiveDate};

use super::types::{
    BudgetAnalytics, BudgetSnapshot, ExpenseType, Frequency, MonthlyData,
};

// Flat multipliers rather than calendar-exact counts, so a weekly amount
// converts identically in every month.
const WEEKS_PER_MONTH: f64 = 4.33;
const BIWEEKS_PER_MONTH: f64 = 2.17;

// Type-based volatility heuristic, in percent, used when a category has
// fewer than two recorded months of history.
const FIXED_FALLBACK_VOLATILITY: f64 = 5.0;
const VARIABLE_FALLBACK_VOLATILITY: f64 = 25.0;
const OCCASIONAL_FALLBACK_VOLATILITY: f64 = 40.0;

/// Converts a nominal amount at the given cadence to its monthly equivalent.
/// One-time amounts are a single event, not a rate, and contribute zero to
/// steady-state monthly figures.
pub fn to_monthly_amount(amount: f64, frequency: Frequency) -> f64 {
    match frequency {
        Frequency::Monthly => amount,
        Frequency::Weekly => amount * WEEKS_PER_MONTH,
        Frequency::Biweekly => amount * BIWEEKS_PER_MONTH,
        Frequency::Yearly => amount / 12.0,
        Frequency::OneTime => 0.0,
    }
}

/// Stateless calculator over one immutable record-set snapshot. Every query
/// is a pure function of the snapshot and the evaluation date, so repeated
/// calls with the same inputs return identical results.
#[derive(Debug, Clone, Copy)]
pub struct BudgetEngine<'a> {
    snapshot: &'a BudgetSnapshot,
    eval_date: NaiveDate,
}

impl<'a> BudgetEngine<'a> {
    /// Builds an engine evaluating activation against today's date.
    pub fn new(snapshot: &'a BudgetSnapshot) -> Self {
        Self::with_eval_date(snapshot, Local::now().date_naive())
    }

    /// Builds an engine with a pinned evaluation date. Every metric uses this
    /// one date, which keeps results deterministic and testable.
    pub fn with_eval_date(snapshot: &'a BudgetSnapshot, eval_date: NaiveDate) -> Self {
        Self {
            snapshot,
            eval_date,
        }
    }

    pub fn eval_date(&self) -> NaiveDate {
        self.eval_date
    }

    /// Sum of monthly-equivalent amounts over currently active income
    /// sources.
    pub fn total_monthly_income(&self) -> f64 {
        self.snapshot
            .incomes
            .iter()
            .filter(|income| income.is_active_on(self.eval_date))
            .map(|income| to_monthly_amount(income.amount, income.frequency))
            .sum()
    }

    /// Sum of monthly-equivalent budgets over currently active expense
    /// categories. Undated categories are always included.
    pub fn total_monthly_expenses(&self) -> f64 {
        self.snapshot
            .expenses
            .iter()
            .filter(|expense| expense.is_active_on(self.eval_date))
            .map(|expense| to_monthly_amount(expense.budget, expense.frequency))
            .sum()
    }

    pub fn net_income(&self) -> f64 {
        self.total_monthly_income() - self.total_monthly_expenses()
    }

    /// Net income as a percentage of total income; 0 when there is no income.
    pub fn savings_rate(&self) -> f64 {
        let income = self.total_monthly_income();
        if income > 0.0 {
            self.net_income() / income * 100.0
        } else {
            0.0
        }
    }

    /// Minimum monthly income needed to cover the current fixed plus variable
    /// load. Occasional expenses are excluded.
    pub fn break_even_point(&self) -> f64 {
        self.monthly_expenses_of_type(ExpenseType::Fixed)
            + self.monthly_expenses_of_type(ExpenseType::Variable)
    }

    /// Floor income independent of one-off or non-recurring sources.
    pub fn stable_income(&self) -> f64 {
        self.snapshot
            .incomes
            .iter()
            .filter(|income| income.is_recurring && income.frequency != Frequency::OneTime)
            .filter(|income| income.is_active_on(self.eval_date))
            .map(|income| to_monthly_amount(income.amount, income.frequency))
            .sum()
    }

    /// Lifetime cumulative savings: every recorded deposit, with no date
    /// filter. Duplicate months sum.
    pub fn total_savings(&self) -> f64 {
        self.snapshot
            .monthly_savings
            .iter()
            .map(|entry| entry.amount)
            .sum()
    }

    pub fn average_monthly_savings(&self) -> f64 {
        let count = self.snapshot.monthly_savings.len();
        if count == 0 {
            return 0.0;
        }
        self.total_savings() / count as f64
    }

    /// Months of fixed (essential) expenses covered by accumulated savings.
    pub fn cash_flow_cushion(&self) -> f64 {
        let fixed = self.monthly_expenses_of_type(ExpenseType::Fixed);
        if fixed > 0.0 {
            self.total_savings() / fixed
        } else {
            0.0
        }
    }

    /// Months current savings would last given the current net income trend.
    /// A positive net income slows depletion, but the denominator is floored
    /// at 10% of expenses so a near-break-even budget does not report an
    /// absurd horizon. A deficit accelerates depletion.
    pub fn sustainability_months(&self) -> f64 {
        let expenses = self.total_monthly_expenses();
        if expenses <= 0.0 {
            return 0.0;
        }

        let net = self.net_income();
        let savings = self.total_savings();
        if net > 0.0 {
            savings / (expenses - net).max(expenses * 0.1)
        } else {
            savings / (expenses + net.abs())
        }
    }

    /// Coefficient-of-variation percentage per expense category, keyed by
    /// category id.
    pub fn expense_volatility_index(&self) -> BTreeMap<String, f64> {
        self.snapshot
            .expenses
            .iter()
            .map(|expense| {
                let series: Vec<f64> = self
                    .snapshot
                    .monthly_history
                    .iter()
                    .filter_map(|point| point.categories.get(&expense.id).copied())
                    .collect();
                (expense.id.clone(), volatility_of(&series, expense.kind))
            })
            .collect()
    }

    /// Multi-month projection anchored at the first day of the month holding
    /// the earliest income start date (or the evaluation date when no income
    /// is dated). Activation is re-evaluated against each projected month
    /// rather than against "now", and expenses compound monthly inflation
    /// while income stays nominal.
    pub fn project(&self, months_ahead: u32) -> Vec<MonthlyData> {
        let anchor = self.projection_anchor();
        let monthly_inflation = self.snapshot.settings.inflation_rate / 100.0 / 12.0;
        let mut cumulative_savings = 0.0;
        let mut projections = Vec::with_capacity(months_ahead as usize);

        for offset in 0..months_ahead {
            let Some(month_start) = anchor.checked_add_months(Months::new(offset)) else {
                break;
            };
            let month_end = last_day_of_month(month_start);

            let income: f64 = self
                .snapshot
                .incomes
                .iter()
                .filter(|income| income.is_recurring || income.frequency != Frequency::OneTime)
                .filter(|income| {
                    overlaps_month(income.start_date, income.end_date, month_start, month_end)
                })
                .map(|income| to_monthly_amount(income.amount, income.frequency))
                .sum();

            let raw_expenses: f64 = self
                .snapshot
                .expenses
                .iter()
                .filter(|expense| {
                    overlaps_month(expense.start_date, expense.end_date, month_start, month_end)
                })
                .map(|expense| to_monthly_amount(expense.budget, expense.frequency))
                .sum();

            let inflation_multiplier = (1.0 + monthly_inflation).powi(offset as i32);
            let adjusted_expenses = raw_expenses * inflation_multiplier;
            let surplus = income - adjusted_expenses;
            cumulative_savings += surplus;

            let mut categories = BTreeMap::new();
            categories.insert("savings".to_string(), cumulative_savings);

            projections.push(MonthlyData {
                month: format!("{:04}-{:02}", month_start.year(), month_start.month()),
                income,
                expenses: adjusted_expenses,
                surplus,
                savings: surplus,
                categories,
            });
        }

        projections
    }

    /// The full scalar bundle in one pass. No caching: every call recomputes
    /// from the snapshot.
    pub fn get_analytics(&self) -> BudgetAnalytics {
        let total_income = self.total_monthly_income();
        let total_expenses = self.total_monthly_expenses();
        let net_income = total_income - total_expenses;
        let savings_rate = if total_income > 0.0 {
            net_income / total_income * 100.0
        } else {
            0.0
        };

        BudgetAnalytics {
            total_income,
            total_expenses,
            net_income,
            savings_rate,
            break_even_point: self.break_even_point(),
            expense_volatility_index: self.aggregate_volatility(),
            cash_flow_cushion: self.cash_flow_cushion(),
            sustainability_months: self.sustainability_months(),
            stable_income: self.stable_income(),
            total_savings: self.total_savings(),
            average_monthly_savings: self.average_monthly_savings(),
        }
    }

    fn monthly_expenses_of_type(&self, kind: ExpenseType) -> f64 {
        self.snapshot
            .expenses
            .iter()
            .filter(|expense| expense.kind == kind)
            .filter(|expense| expense.is_active_on(self.eval_date))
            .map(|expense| to_monthly_amount(expense.budget, expense.frequency))
            .sum()
    }

    fn aggregate_volatility(&self) -> f64 {
        if self.snapshot.expenses.is_empty() {
            return 0.0;
        }
        let index = self.expense_volatility_index();
        index.values().sum::<f64>() / index.len() as f64
    }

    fn projection_anchor(&self) -> NaiveDate {
        let earliest = self
            .snapshot
            .incomes
            .iter()
            .filter_map(|income| income.start_date)
            .min();
        first_day_of_month(earliest.unwrap_or(self.eval_date))
    }
}

/// Composite 0-100 health score derived from the analytics bundle: savings
/// rate (40), emergency fund (30), income stability (20), and expense
/// management (10).
pub fn health_score(analytics: &BudgetAnalytics) -> u32 {
    let mut score = 0;

    score += match analytics.savings_rate {
        r if r >= 20.0 => 40,
        r if r >= 15.0 => 30,
        r if r >= 10.0 => 20,
        r if r >= 5.0 => 10,
        _ => 0,
    };

    score += match analytics.cash_flow_cushion {
        c if c >= 6.0 => 30,
        c if c >= 3.0 => 20,
        c if c >= 1.0 => 10,
        _ => 0,
    };

    if analytics.net_income > 0.0 {
        score += 20;
    } else if analytics.net_income >= -analytics.total_income * 0.1 {
        score += 10;
    }

    if analytics.expense_volatility_index < 20.0 {
        score += 10;
    } else if analytics.expense_volatility_index < 40.0 {
        score += 5;
    }

    score.min(100)
}

fn volatility_of(series: &[f64], kind: ExpenseType) -> f64 {
    if series.len() < 2 {
        return match kind {
            ExpenseType::Fixed => FIXED_FALLBACK_VOLATILITY,
            ExpenseType::Variable => VARIABLE_FALLBACK_VOLATILITY,
            ExpenseType::Occasional => OCCASIONAL_FALLBACK_VOLATILITY,
        };
    }

    let mean = series.iter().sum::<f64>() / series.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }

    let variance = series
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / series.len() as f64;
    variance.sqrt() / mean * 100.0
}

fn overlaps_month(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    month_start: NaiveDate,
    month_end: NaiveDate,
) -> bool {
    let starts_by_month_end = start.map_or(true, |s| s <= month_end);
    let runs_into_month = end.map_or(true, |e| e >= month_start);
    starts_by_month_end && runs_into_month
}

fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn last_day_of_month(month_start: NaiveDate) -> NaiveDate {
    month_start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(month_start)
}
