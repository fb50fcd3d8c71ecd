use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::scope::Role;

/// A single spent line item, embedded in a finance record or an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid, // stable local id within the parent record
    pub date: Date,
    pub description: String,
    pub amount: f64,
    pub category: Option<String>,
}

/// A saved amount towards a plan's goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavingsTransaction {
    pub id: Uuid,
    pub date: Date,
    pub amount: f64,
    pub note: Option<String>,
}

/// A savings plan embedded in a finance record. `total_saved` and
/// `remaining_amount` are derived; `remaining_amount` may go negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinancePlan {
    pub id: Uuid,
    pub name: String,
    pub goal_amount: f64,
    #[serde(default)]
    pub savings: Vec<SavingsTransaction>,
    pub total_saved: f64,
    pub remaining_amount: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Client-supplied expense, before the server assigns a local id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExpense {
    pub date: Date,
    pub description: String,
    pub amount: f64,
    pub category: Option<String>,
}

/// Client-supplied savings plan.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub name: String,
    pub goal_amount: f64,
}

/// Client-supplied savings transaction. The date defaults to today.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSavings {
    pub date: Option<Date>,
    pub amount: f64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFinanceRequest {
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub expenses: Vec<NewExpense>,
    #[serde(default)]
    pub plans: Vec<NewPlan>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceResponse {
    pub id: Uuid,
    pub created_by: Uuid,
    pub created_by_role: Role,
    pub event_id: Option<Uuid>,
    pub expenses: Vec<Expense>,
    pub plans: Vec<FinancePlan>,
    pub total_spent: f64,
    pub total_saved: f64,
    pub remaining_budget: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn expense_dates_serialize_as_calendar_days() {
        let expense = Expense {
            id: Uuid::new_v4(),
            date: date!(2024 - 02 - 29),
            description: "venue deposit".into(),
            amount: 120.5,
            category: Some("venue".into()),
        };
        let json = serde_json::to_string(&expense).unwrap();
        assert!(json.contains("\"date\":\"2024-02-29\""));

        let back: Expense = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expense);
    }

    #[test]
    fn plan_accepts_missing_savings_list() {
        let json = r#"{
            "id": "7b5f4b10-5b9e-4f9f-9a53-0f4b58a2a001",
            "name": "emergency fund",
            "goalAmount": 1000.0,
            "totalSaved": 0.0,
            "remainingAmount": 1000.0,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;
        let plan: FinancePlan = serde_json::from_str(json).unwrap();
        assert!(plan.savings.is_empty());
    }
}
