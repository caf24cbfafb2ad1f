use axum::{
    Router,
    extract::Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    BudgetAnalytics, BudgetEngine, BudgetSnapshot, ExpenseCategory, IncomeSource,
    MonthlyData, MonthlyHistoryPoint, MonthlySavings, Settings, health_score,
};

const DEFAULT_PROJECTION_MONTHS: u32 = 12;
const MAX_PROJECTION_MONTHS: u32 = 600;

/// Inbound record-set snapshot plus analysis knobs. Every field is optional
/// so a partial budget still analyzes; missing collections default to empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AnalyzePayload {
    incomes: Vec<IncomeSource>,
    expenses: Vec<ExpenseCategory>,
    monthly_savings: Vec<MonthlySavings>,
    monthly_history: Vec<MonthlyHistoryPoint>,
    settings: Option<Settings>,
    as_of: Option<NaiveDate>,
    projection_months: Option<u32>,
}

#[derive(Debug)]
struct AnalyzeRequest {
    snapshot: BudgetSnapshot,
    as_of: Option<NaiveDate>,
    projection_months: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    as_of: NaiveDate,
    currency: String,
    analytics: BudgetAnalytics,
    volatility_index: BTreeMap<String, f64>,
    health_score: u32,
    projection: Vec<MonthlyData>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_request(payload: AnalyzePayload) -> Result<AnalyzeRequest, String> {
    let projection_months = payload
        .projection_months
        .unwrap_or(DEFAULT_PROJECTION_MONTHS);
    if projection_months == 0 || projection_months > MAX_PROJECTION_MONTHS {
        return Err(format!(
            "projectionMonths must be between 1 and {MAX_PROJECTION_MONTHS}"
        ));
    }

    let settings = payload.settings.unwrap_or_default();
    if !settings.inflation_rate.is_finite() {
        return Err("settings.inflationRate must be a finite number".to_string());
    }

    for income in &payload.incomes {
        if !income.amount.is_finite() {
            return Err(format!("income '{}' has a non-finite amount", income.id));
        }
        if let (Some(start), Some(end)) = (income.start_date, income.end_date) {
            if end < start {
                return Err(format!(
                    "income '{}' endDate precedes its startDate",
                    income.id
                ));
            }
        }
    }

    for expense in &payload.expenses {
        if !expense.budget.is_finite() || !expense.spent.is_finite() {
            return Err(format!("expense '{}' has a non-finite amount", expense.id));
        }
        if let (Some(start), Some(end)) = (expense.start_date, expense.end_date) {
            if end < start {
                return Err(format!(
                    "expense '{}' endDate precedes its startDate",
                    expense.id
                ));
            }
        }
    }

    for entry in &payload.monthly_savings {
        if !entry.amount.is_finite() {
            return Err(format!(
                "savings entry '{}' has a non-finite amount",
                entry.id
            ));
        }
    }

    for point in &payload.monthly_history {
        if point.categories.values().any(|spent| !spent.is_finite()) {
            return Err(format!(
                "history month '{}' has a non-finite spend value",
                point.month
            ));
        }
    }

    Ok(AnalyzeRequest {
        snapshot: BudgetSnapshot {
            incomes: payload.incomes,
            expenses: payload.expenses,
            monthly_savings: payload.monthly_savings,
            monthly_history: payload.monthly_history,
            settings,
        },
        as_of: payload.as_of,
        projection_months,
    })
}

fn build_analyze_response(request: &AnalyzeRequest, as_of: NaiveDate) -> AnalyzeResponse {
    let engine = BudgetEngine::with_eval_date(&request.snapshot, as_of);
    let analytics = engine.get_analytics();

    AnalyzeResponse {
        as_of,
        currency: request.snapshot.settings.currency.clone(),
        volatility_index: engine.expense_volatility_index(),
        health_score: health_score(&analytics),
        projection: engine.project(request.projection_months),
        analytics,
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api/analyze", post(analyze_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("Budgeteer HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> Response {
    json_response(
        StatusCode::OK,
        serde_json::json!({
            "service": "budgeteer",
            "endpoints": { "POST /api/analyze": "record-set snapshot in, analytics bundle out" },
        }),
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn analyze_handler(Json(payload): Json<AnalyzePayload>) -> Response {
    let request = match build_request(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let as_of = request.as_of.unwrap_or_else(|| Local::now().date_naive());
    json_response(StatusCode::OK, build_analyze_response(&request, as_of))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn analyze_request_from_json(json: &str) -> Result<AnalyzeRequest, String> {
    let payload = serde_json::from_str::<AnalyzePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    build_request(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_json() -> &'static str {
        r##"{
          "incomes": [
            {
              "id": "salary",
              "name": "Salary",
              "amount": 4000,
              "frequency": "monthly",
              "category": "salary",
              "isRecurring": true,
              "startDate": "2025-01-01"
            },
            {
              "id": "gig",
              "name": "Weekend gig",
              "amount": 150,
              "frequency": "weekly",
              "category": "freelancing",
              "isRecurring": false,
              "startDate": "2025-02-01",
              "endDate": "2025-12-31"
            }
          ],
          "expenses": [
            {
              "id": "rent",
              "name": "Rent",
              "type": "fixed",
              "budget": 1500,
              "spent": 1500,
              "frequency": "monthly",
              "color": "#ef4444",
              "startDate": "2025-01-01"
            },
            {
              "id": "insurance",
              "name": "Insurance",
              "type": "fixed",
              "budget": 1200,
              "spent": 0,
              "frequency": "yearly"
            }
          ],
          "monthlySavings": [
            { "id": "jan", "month": "2025-01", "amount": 800 },
            { "id": "feb", "month": "2025-02", "amount": 600, "description": "bonus" }
          ],
          "monthlyHistory": [
            { "month": "2025-01", "categories": { "rent": 1500 } },
            { "month": "2025-02", "categories": { "rent": 1500 } }
          ],
          "settings": { "currency": "EUR", "inflationRate": 4.0, "emergencyFundTarget": 6 },
          "asOf": "2025-06-15",
          "projectionMonths": 6
        }"##
    }

    #[test]
    fn analyze_request_parses_web_payload() {
        let request = analyze_request_from_json(sample_json()).expect("json should parse");

        assert_eq!(request.snapshot.incomes.len(), 2);
        assert_eq!(request.snapshot.expenses.len(), 2);
        assert_eq!(request.snapshot.settings.currency, "EUR");
        assert_approx(request.snapshot.settings.inflation_rate, 4.0);
        assert_eq!(request.projection_months, 6);
        assert_eq!(
            request.as_of,
            NaiveDate::from_ymd_opt(2025, 6, 15)
        );
        assert_eq!(
            request.snapshot.incomes[1].end_date,
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
    }

    #[test]
    fn analyze_request_accepts_one_time_frequency_aliases() {
        let json = r#"{
          "incomes": [{
            "id": "gift",
            "name": "Gift",
            "amount": 500,
            "frequency": "one-time",
            "category": "other",
            "isRecurring": false
          }]
        }"#;
        let request = analyze_request_from_json(json).expect("json should parse");
        assert_eq!(
            request.snapshot.incomes[0].frequency,
            crate::core::Frequency::OneTime
        );
    }

    #[test]
    fn analyze_request_rejects_unknown_frequency() {
        let json = r#"{
          "incomes": [{
            "id": "x",
            "name": "X",
            "amount": 10,
            "frequency": "fortnightly",
            "category": "other",
            "isRecurring": true
          }]
        }"#;
        let err = analyze_request_from_json(json).expect_err("must reject unknown frequency");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn analyze_request_defaults_missing_collections() {
        let request = analyze_request_from_json("{}").expect("empty payload is valid");
        assert!(request.snapshot.incomes.is_empty());
        assert!(request.snapshot.expenses.is_empty());
        assert_eq!(request.snapshot.settings.currency, "USD");
        assert_eq!(request.projection_months, DEFAULT_PROJECTION_MONTHS);
        assert_eq!(request.as_of, None);
    }

    #[test]
    fn analyze_request_rejects_zero_projection_months() {
        let err = analyze_request_from_json(r#"{ "projectionMonths": 0 }"#)
            .expect_err("must reject zero months");
        assert!(err.contains("projectionMonths"));
    }

    #[test]
    fn analyze_request_rejects_excessive_projection_months() {
        let err = analyze_request_from_json(r#"{ "projectionMonths": 601 }"#)
            .expect_err("must reject excessive months");
        assert!(err.contains("projectionMonths"));
    }

    #[test]
    fn analyze_request_rejects_inverted_date_range() {
        let json = r#"{
          "incomes": [{
            "id": "salary",
            "name": "Salary",
            "amount": 4000,
            "frequency": "monthly",
            "category": "salary",
            "isRecurring": true,
            "startDate": "2025-06-01",
            "endDate": "2025-01-01"
          }]
        }"#;
        let err = analyze_request_from_json(json).expect_err("must reject inverted range");
        assert!(err.contains("endDate precedes"));
    }

    #[test]
    fn analyze_request_rejects_non_finite_amounts() {
        let mut payload = AnalyzePayload::default();
        payload.monthly_savings.push(MonthlySavings {
            id: "bad".to_string(),
            month: "2025-01".to_string(),
            amount: f64::NAN,
            description: None,
        });
        let err = build_request(payload).expect_err("must reject NaN amount");
        assert!(err.contains("non-finite"));
    }

    #[test]
    fn analyze_response_serialization_contains_expected_fields() {
        let request = analyze_request_from_json(sample_json()).expect("json should parse");
        let as_of = request.as_of.expect("asOf pinned in sample");
        let response = build_analyze_response(&request, as_of);
        let json = serde_json::to_string(&response).expect("response should serialize");

        assert!(json.contains("\"analytics\""));
        assert!(json.contains("\"totalIncome\""));
        assert!(json.contains("\"breakEvenPoint\""));
        assert!(json.contains("\"sustainabilityMonths\""));
        assert!(json.contains("\"volatilityIndex\""));
        assert!(json.contains("\"healthScore\""));
        assert!(json.contains("\"projection\""));
        assert!(json.contains("\"asOf\":\"2025-06-15\""));
        assert!(json.contains("\"currency\":\"EUR\""));
    }

    #[test]
    fn analyze_response_reflects_engine_results() {
        let request = analyze_request_from_json(sample_json()).expect("json should parse");
        let as_of = request.as_of.expect("asOf pinned in sample");
        let response = build_analyze_response(&request, as_of);

        // Salary 4000 + weekly gig 150 * 4.33.
        assert_approx(response.analytics.total_income, 4000.0 + 150.0 * 4.33);
        // Rent 1500 + yearly insurance 1200 / 12.
        assert_approx(response.analytics.total_expenses, 1600.0);
        assert_approx(response.analytics.total_savings, 1400.0);
        assert_eq!(response.projection.len(), 6);
        // Two flat history points for rent, fallback for insurance.
        assert_approx(response.volatility_index["rent"], 0.0);
        assert_approx(response.volatility_index["insurance"], 5.0);
    }
}
