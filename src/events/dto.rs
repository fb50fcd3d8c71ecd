use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::finance::dto::Expense;
use crate::scope::Role;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub name: String,
    pub budget: f64,
    #[serde(default)]
    pub is_public: bool,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub budget: Option<f64>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: Uuid,
    pub created_by: Uuid,
    pub created_by_role: Role,
    pub name: String,
    pub budget: f64,
    pub is_public: bool,
    pub expenses: Vec<Expense>,
    pub total_spent: f64,
    pub remaining_budget: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
