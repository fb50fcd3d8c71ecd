use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::ApiError,
    events::{
        dto::{CreateEventRequest, EventResponse, UpdateEventRequest},
        repo::Event,
    },
    finance::dto::{Expense, NewExpense},
    scope,
    state::AppState,
};

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/:id/expenses", post(add_expense))
}

/// Reduced aggregation rule for events: spent against a fixed budget.
fn event_totals(budget: f64, expenses: &[Expense]) -> (f64, f64) {
    let total_spent: f64 = expenses.iter().map(|e| e.amount).sum();
    (total_spent, budget - total_spent)
}

fn to_response(event: Event) -> Result<EventResponse, ApiError> {
    let creator = event.creator()?;
    Ok(EventResponse {
        id: event.id,
        created_by: creator.id(),
        created_by_role: creator.role(),
        name: event.name,
        budget: event.budget,
        is_public: event.is_public,
        expenses: event.expenses.0,
        total_spent: event.total_spent,
        remaining_budget: event.remaining_budget,
        created_at: event.created_at,
        updated_at: event.updated_at,
    })
}

async fn load_for_mutation(
    state: &AppState,
    caller: scope::Caller,
    id: Uuid,
) -> Result<Event, ApiError> {
    let event = Event::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;
    scope::ensure_mutate(caller, event.creator()?)?;
    Ok(event)
}

#[instrument(skip(state, payload))]
pub async fn create_event(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(payload): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("Event name is required"));
    }
    if !payload.budget.is_finite() || payload.budget < 0.0 {
        return Err(ApiError::validation("budget must be a non-negative number"));
    }

    let event = Event::insert(
        &state.db,
        caller.into(),
        payload.name.trim(),
        payload.budget,
        payload.is_public,
    )
    .await?;

    info!(event_id = %event.id, account_id = %caller.id, "event created");
    Ok((StatusCode::CREATED, Json(to_response(event)?)))
}

#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let events = Event::list_visible(&state.db, caller).await?;
    let items = events
        .into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EventResponse>, ApiError> {
    let event = Event::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    if !event.is_public {
        scope::ensure_read(caller, event.creator()?)?;
    }

    Ok(Json(to_response(event)?))
}

#[instrument(skip(state, payload))]
pub async fn update_event(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEventRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    let event = load_for_mutation(&state, caller, id).await?;

    let name = match payload.name {
        Some(name) if name.trim().is_empty() => {
            return Err(ApiError::validation("Event name is required"))
        }
        Some(name) => name.trim().to_string(),
        None => event.name.clone(),
    };
    let budget = match payload.budget {
        Some(b) if !b.is_finite() || b < 0.0 => {
            return Err(ApiError::validation("budget must be a non-negative number"))
        }
        Some(b) => b,
        None => event.budget,
    };
    let is_public = payload.is_public.unwrap_or(event.is_public);

    // Budget changes shift the derived remainder.
    let (total_spent, remaining_budget) = event_totals(budget, &event.expenses.0);
    let updated = Event::update_meta(
        &state.db,
        id,
        &name,
        budget,
        is_public,
        total_spent,
        remaining_budget,
    )
    .await?;
    Ok(Json(to_response(updated)?))
}

#[instrument(skip(state, payload))]
pub async fn add_expense(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewExpense>,
) -> Result<Json<EventResponse>, ApiError> {
    if !payload.amount.is_finite() {
        return Err(ApiError::validation("amount must be a finite number"));
    }
    if payload.description.trim().is_empty() {
        return Err(ApiError::validation("description is required"));
    }

    let event = load_for_mutation(&state, caller, id).await?;

    let mut expenses = event.expenses.0;
    expenses.push(Expense {
        id: Uuid::new_v4(),
        date: payload.date,
        description: payload.description,
        amount: payload.amount,
        category: payload.category,
    });

    let (total_spent, remaining_budget) = event_totals(event.budget, &expenses);
    let updated =
        Event::save_expenses(&state.db, id, &expenses, total_spent, remaining_budget).await?;
    Ok(Json(to_response(updated)?))
}

#[instrument(skip(state))]
pub async fn delete_event(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let event = load_for_mutation(&state, caller, id).await?;

    if !Event::delete(&state.db, event.id).await? {
        return Err(ApiError::not_found("Event not found"));
    }
    info!(event_id = %id, account_id = %caller.id, "event deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn expense(amount: f64) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            date: date!(2024 - 05 - 01),
            description: "supplies".into(),
            amount,
            category: None,
        }
    }

    #[test]
    fn totals_for_empty_event() {
        let (spent, remaining) = event_totals(500.0, &[]);
        assert_eq!(spent, 0.0);
        assert_eq!(remaining, 500.0);
    }

    #[test]
    fn overspending_goes_negative() {
        let (spent, remaining) = event_totals(100.0, &[expense(60.0), expense(70.0)]);
        assert_eq!(spent, 130.0);
        assert_eq!(remaining, -30.0);
    }
}
