use anyhow::Context;
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::finance::dto::Expense;
use crate::scope::{Caller, Creator, Role};

/// Budgeted activity row. Expenses are embedded like on finance records, with
/// the reduced derivation `remaining_budget = budget − total_spent`.
#[derive(Debug, Clone, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub created_by: Uuid,
    pub created_by_role: String,
    pub name: String,
    pub budget: f64,
    pub is_public: bool,
    pub expenses: Json<Vec<Expense>>,
    pub total_spent: f64,
    pub remaining_budget: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const EVENT_COLUMNS: &str = r#"id, created_by, created_by_role, name, budget, is_public,
       expenses, total_spent, remaining_budget, created_at, updated_at"#;

impl Event {
    pub fn creator(&self) -> anyhow::Result<Creator> {
        Ok(Creator::from_parts(
            self.created_by,
            Role::parse(&self.created_by_role)?,
        ))
    }

    pub async fn insert(
        db: &PgPool,
        creator: Creator,
        name: &str,
        budget: f64,
        is_public: bool,
    ) -> anyhow::Result<Event> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events
                (created_by, created_by_role, name, budget, is_public, remaining_budget)
            VALUES ($1, $2, $3, $4, $5, $4)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(creator.id())
        .bind(creator.role().as_str())
        .bind(name)
        .bind(budget)
        .bind(is_public)
        .fetch_one(db)
        .await
        .context("insert event")?;
        Ok(event)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find event")?;
        Ok(event)
    }

    /// Public events plus the caller's own; admins see everything.
    pub async fn list_visible(db: &PgPool, caller: Caller) -> anyhow::Result<Vec<Event>> {
        let rows = match caller.role {
            Role::Admin => {
                sqlx::query_as::<_, Event>(&format!(
                    r#"
                    SELECT {EVENT_COLUMNS}
                    FROM events
                    ORDER BY created_at DESC
                    "#
                ))
                .fetch_all(db)
                .await
            }
            Role::User => {
                sqlx::query_as::<_, Event>(&format!(
                    r#"
                    SELECT {EVENT_COLUMNS}
                    FROM events
                    WHERE is_public = TRUE OR created_by = $1
                    ORDER BY created_at DESC
                    "#
                ))
                .bind(caller.id)
                .fetch_all(db)
                .await
            }
        }
        .context("list events")?;
        Ok(rows)
    }

    pub async fn update_meta(
        db: &PgPool,
        id: Uuid,
        name: &str,
        budget: f64,
        is_public: bool,
        total_spent: f64,
        remaining_budget: f64,
    ) -> anyhow::Result<Event> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET name = $2,
                budget = $3,
                is_public = $4,
                total_spent = $5,
                remaining_budget = $6,
                updated_at = now()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(budget)
        .bind(is_public)
        .bind(total_spent)
        .bind(remaining_budget)
        .fetch_one(db)
        .await
        .context("update event")?;
        Ok(event)
    }

    /// Persist the expense list together with its recomputed totals.
    pub async fn save_expenses(
        db: &PgPool,
        id: Uuid,
        expenses: &[Expense],
        total_spent: f64,
        remaining_budget: f64,
    ) -> anyhow::Result<Event> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET expenses = $2,
                total_spent = $3,
                remaining_budget = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Json(expenses))
        .bind(total_spent)
        .bind(remaining_budget)
        .fetch_one(db)
        .await
        .context("save event expenses")?;
        Ok(event)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete event")?;
        Ok(result.rows_affected() > 0)
    }
}
