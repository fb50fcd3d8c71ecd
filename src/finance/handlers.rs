use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::ApiError,
    events::repo::Event,
    finance::{
        aggregate,
        dto::{
            CreateFinanceRequest, Expense, FinancePlan, FinanceResponse, NewExpense, NewPlan,
            NewSavings, SavingsTransaction,
        },
        period::PeriodQuery,
        repo::FinanceRecord,
    },
    scope,
    state::AppState,
};

pub fn finance_routes() -> Router<AppState> {
    Router::new()
        .route("/finance", post(create_record).get(list_records))
        .route("/finance/period", get(records_for_period))
        .route("/finance/:id/expenses", post(add_expense))
        .route("/finance/:id/plan", post(add_plan))
        .route("/finance/:id/plan/:plan_id/savings", post(add_savings))
        .route("/finance/:id", delete(delete_record))
}

fn to_response(record: FinanceRecord) -> Result<FinanceResponse, ApiError> {
    let creator = record.creator()?;
    Ok(FinanceResponse {
        id: record.id,
        created_by: creator.id(),
        created_by_role: creator.role(),
        event_id: record.event_id,
        expenses: record.expenses.0,
        plans: record.plans.0,
        total_spent: record.total_spent,
        total_saved: record.total_saved,
        remaining_budget: record.remaining_budget,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

fn check_amount(amount: f64) -> Result<(), ApiError> {
    if !amount.is_finite() {
        return Err(ApiError::validation("amount must be a finite number"));
    }
    Ok(())
}

fn build_expense(new: NewExpense) -> Result<Expense, ApiError> {
    check_amount(new.amount)?;
    if new.description.trim().is_empty() {
        return Err(ApiError::validation("description is required"));
    }
    Ok(Expense {
        id: Uuid::new_v4(),
        date: new.date,
        description: new.description,
        amount: new.amount,
        category: new.category,
    })
}

fn build_plan(new: NewPlan, now: OffsetDateTime) -> Result<FinancePlan, ApiError> {
    check_amount(new.goal_amount)?;
    if new.name.trim().is_empty() {
        return Err(ApiError::validation("plan name is required"));
    }
    Ok(FinancePlan {
        id: Uuid::new_v4(),
        name: new.name,
        goal_amount: new.goal_amount,
        savings: Vec::new(),
        total_saved: 0.0,
        remaining_amount: new.goal_amount,
        created_at: now,
        updated_at: now,
    })
}

/// Load a record and check the mutation rule before any write.
async fn load_for_mutation(
    state: &AppState,
    caller: scope::Caller,
    id: Uuid,
) -> Result<FinanceRecord, ApiError> {
    let record = FinanceRecord::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Finance record not found"))?;
    scope::ensure_mutate(caller, record.creator()?)?;
    Ok(record)
}

#[instrument(skip(state, payload))]
pub async fn create_record(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<CreateFinanceRequest>,
) -> Result<(StatusCode, Json<FinanceResponse>), ApiError> {
    if let Some(event_id) = payload.event_id {
        if Event::find_by_id(&state.db, event_id).await?.is_none() {
            return Err(ApiError::validation("eventId refers to an unknown event"));
        }
    }

    let now = OffsetDateTime::now_utc();
    let expenses = payload
        .expenses
        .into_iter()
        .map(build_expense)
        .collect::<Result<Vec<_>, _>>()?;
    let mut plans = payload
        .plans
        .into_iter()
        .map(|p| build_plan(p, now))
        .collect::<Result<Vec<_>, _>>()?;

    let totals = aggregate::recompute(&expenses, &mut plans, now);
    let record = FinanceRecord::insert(
        &state.db,
        caller.into(),
        payload.event_id,
        &expenses,
        &plans,
        totals,
    )
    .await?;

    info!(record_id = %record.id, account_id = %caller.id, "finance record created");
    Ok((StatusCode::CREATED, Json(to_response(record)?)))
}

#[instrument(skip(state))]
pub async fn list_records(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<FinanceResponse>>, ApiError> {
    let records = FinanceRecord::list_for(&state.db, caller).await?;
    let items = records
        .into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn records_for_period(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<FinanceResponse>>, ApiError> {
    let range = query.resolve()?;
    let records = FinanceRecord::list_in_period(&state.db, caller, range).await?;
    if records.is_empty() {
        // Zero activity is reported explicitly, not as an empty success.
        return Err(ApiError::NoData(
            "No financial data found for this period".into(),
        ));
    }
    let items = records
        .into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

#[instrument(skip(state, payload))]
pub async fn add_expense(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewExpense>,
) -> Result<Json<FinanceResponse>, ApiError> {
    let record = load_for_mutation(&state, caller, id).await?;

    let mut expenses = record.expenses.0;
    let mut plans = record.plans.0;
    expenses.push(build_expense(payload)?);

    let totals = aggregate::recompute(&expenses, &mut plans, OffsetDateTime::now_utc());
    let updated = FinanceRecord::save_items(&state.db, id, &expenses, &plans, totals).await?;
    Ok(Json(to_response(updated)?))
}

#[instrument(skip(state, payload))]
pub async fn add_plan(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewPlan>,
) -> Result<Json<FinanceResponse>, ApiError> {
    let record = load_for_mutation(&state, caller, id).await?;

    let now = OffsetDateTime::now_utc();
    let expenses = record.expenses.0;
    let mut plans = record.plans.0;
    plans.push(build_plan(payload, now)?);

    let totals = aggregate::recompute(&expenses, &mut plans, now);
    let updated = FinanceRecord::save_items(&state.db, id, &expenses, &plans, totals).await?;
    Ok(Json(to_response(updated)?))
}

#[instrument(skip(state, payload))]
pub async fn add_savings(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path((id, plan_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<NewSavings>,
) -> Result<Json<FinanceResponse>, ApiError> {
    check_amount(payload.amount)?;
    let record = load_for_mutation(&state, caller, id).await?;

    let now = OffsetDateTime::now_utc();
    let expenses = record.expenses.0;
    let mut plans = record.plans.0;

    let plan = plans
        .iter_mut()
        .find(|p| p.id == plan_id)
        .ok_or_else(|| ApiError::not_found("Finance plan not found"))?;
    plan.savings.push(SavingsTransaction {
        id: Uuid::new_v4(),
        date: payload.date.unwrap_or(now.date()),
        amount: payload.amount,
        note: payload.note,
    });

    let totals = aggregate::recompute(&expenses, &mut plans, now);
    let updated = FinanceRecord::save_items(&state.db, id, &expenses, &plans, totals).await?;
    Ok(Json(to_response(updated)?))
}

#[instrument(skip(state))]
pub async fn delete_record(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let record = load_for_mutation(&state, caller, id).await?;

    if !FinanceRecord::delete(&state.db, record.id).await? {
        warn!(record_id = %id, "record vanished before delete");
        return Err(ApiError::not_found("Finance record not found"));
    }
    info!(record_id = %id, account_id = %caller.id, "finance record deleted");
    Ok(StatusCode::NO_CONTENT)
}
