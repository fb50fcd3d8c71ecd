use anyhow::Context;
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::finance::aggregate::Totals;
use crate::finance::dto::{Expense, FinancePlan};
use crate::finance::period::DateRange;
use crate::scope::{Caller, Creator, Role};

/// Finance record row. Expenses and plans are embedded documents; every
/// mutation rewrites them together with the derived totals in one UPDATE.
#[derive(Debug, Clone, FromRow)]
pub struct FinanceRecord {
    pub id: Uuid,
    pub created_by: Uuid,
    pub created_by_role: String,
    pub event_id: Option<Uuid>,
    pub expenses: Json<Vec<Expense>>,
    pub plans: Json<Vec<FinancePlan>>,
    pub total_spent: f64,
    pub total_saved: f64,
    pub remaining_budget: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const RECORD_COLUMNS: &str = r#"id, created_by, created_by_role, event_id, expenses, plans,
       total_spent, total_saved, remaining_budget, created_at, updated_at"#;

impl FinanceRecord {
    pub fn creator(&self) -> anyhow::Result<Creator> {
        Ok(Creator::from_parts(
            self.created_by,
            Role::parse(&self.created_by_role)?,
        ))
    }

    pub async fn insert(
        db: &PgPool,
        creator: Creator,
        event_id: Option<Uuid>,
        expenses: &[Expense],
        plans: &[FinancePlan],
        totals: Totals,
    ) -> anyhow::Result<FinanceRecord> {
        let record = sqlx::query_as::<_, FinanceRecord>(&format!(
            r#"
            INSERT INTO finance_records
                (created_by, created_by_role, event_id, expenses, plans,
                 total_spent, total_saved, remaining_budget)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(creator.id())
        .bind(creator.role().as_str())
        .bind(event_id)
        .bind(Json(expenses))
        .bind(Json(plans))
        .bind(totals.total_spent)
        .bind(totals.total_saved)
        .bind(totals.remaining_budget)
        .fetch_one(db)
        .await
        .context("insert finance record")?;
        Ok(record)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<FinanceRecord>> {
        let record = sqlx::query_as::<_, FinanceRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM finance_records
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find finance record")?;
        Ok(record)
    }

    /// Records visible to the caller: everything for admins, own user-created
    /// records otherwise.
    pub async fn list_for(db: &PgPool, caller: Caller) -> anyhow::Result<Vec<FinanceRecord>> {
        let rows = match caller.role {
            Role::Admin => {
                sqlx::query_as::<_, FinanceRecord>(&format!(
                    r#"
                    SELECT {RECORD_COLUMNS}
                    FROM finance_records
                    ORDER BY created_at DESC
                    "#
                ))
                .fetch_all(db)
                .await
            }
            Role::User => {
                sqlx::query_as::<_, FinanceRecord>(&format!(
                    r#"
                    SELECT {RECORD_COLUMNS}
                    FROM finance_records
                    WHERE created_by = $1 AND created_by_role = 'user'
                    ORDER BY created_at DESC
                    "#
                ))
                .bind(caller.id)
                .fetch_all(db)
                .await
            }
        }
        .context("list finance records")?;
        Ok(rows)
    }

    /// Records in the caller's scope holding at least one expense dated within
    /// the range (inclusive on both ends).
    pub async fn list_in_period(
        db: &PgPool,
        caller: Caller,
        range: DateRange,
    ) -> anyhow::Result<Vec<FinanceRecord>> {
        let rows = match caller.role {
            Role::Admin => {
                sqlx::query_as::<_, FinanceRecord>(&format!(
                    r#"
                    SELECT {RECORD_COLUMNS}
                    FROM finance_records
                    WHERE EXISTS (
                        SELECT 1 FROM jsonb_array_elements(expenses) AS e
                        WHERE (e->>'date')::date BETWEEN $1 AND $2
                    )
                    ORDER BY created_at DESC
                    "#
                ))
                .bind(range.start)
                .bind(range.end)
                .fetch_all(db)
                .await
            }
            Role::User => {
                sqlx::query_as::<_, FinanceRecord>(&format!(
                    r#"
                    SELECT {RECORD_COLUMNS}
                    FROM finance_records
                    WHERE created_by = $3 AND created_by_role = 'user'
                      AND EXISTS (
                        SELECT 1 FROM jsonb_array_elements(expenses) AS e
                        WHERE (e->>'date')::date BETWEEN $1 AND $2
                    )
                    ORDER BY created_at DESC
                    "#
                ))
                .bind(range.start)
                .bind(range.end)
                .bind(caller.id)
                .fetch_all(db)
                .await
            }
        }
        .context("list finance records for period")?;
        Ok(rows)
    }

    /// Persist the embedded documents together with their recomputed totals.
    pub async fn save_items(
        db: &PgPool,
        id: Uuid,
        expenses: &[Expense],
        plans: &[FinancePlan],
        totals: Totals,
    ) -> anyhow::Result<FinanceRecord> {
        let record = sqlx::query_as::<_, FinanceRecord>(&format!(
            r#"
            UPDATE finance_records
            SET expenses = $2,
                plans = $3,
                total_spent = $4,
                total_saved = $5,
                remaining_budget = $6,
                updated_at = now()
            WHERE id = $1
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Json(expenses))
        .bind(Json(plans))
        .bind(totals.total_spent)
        .bind(totals.total_saved)
        .bind(totals.remaining_budget)
        .fetch_one(db)
        .await
        .context("save finance record items")?;
        Ok(record)
    }

    /// Returns true when a row was actually deleted.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM finance_records WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete finance record")?;
        Ok(result.rows_affected() > 0)
    }
}
