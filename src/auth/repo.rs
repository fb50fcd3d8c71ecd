use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::dto::PublicAccount;
use crate::scope::Role;

/// Account row in the database. Covers both users and admins; an admin's
/// managed users are the accounts whose `assigned_admin` points at it.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // Argon2 hash, never exposed in JSON
    pub display_name: String,
    pub role: String,
    pub assigned_admin: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl Account {
    pub fn role(&self) -> anyhow::Result<Role> {
        Role::parse(&self.role)
    }

    pub fn to_public(&self) -> anyhow::Result<PublicAccount> {
        Ok(PublicAccount {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role()?,
            assigned_admin: self.assigned_admin,
        })
    }

    /// Find an account by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, display_name, role, assigned_admin, created_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find account by email")?;
        Ok(account)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, display_name, role, assigned_admin, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find account by id")?;
        Ok(account)
    }

    /// Create a new account with hashed password.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        display_name: &str,
        role: Role,
        assigned_admin: Option<Uuid>,
    ) -> anyhow::Result<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (email, password_hash, display_name, role, assigned_admin)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, display_name, role, assigned_admin, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(role.as_str())
        .bind(assigned_admin)
        .fetch_one(db)
        .await
        .context("create account")?;
        Ok(account)
    }

    pub async fn update_display_name(
        db: &PgPool,
        id: Uuid,
        display_name: &str,
    ) -> anyhow::Result<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET display_name = $2
            WHERE id = $1
            RETURNING id, email, password_hash, display_name, role, assigned_admin, created_at
            "#,
        )
        .bind(id)
        .bind(display_name)
        .fetch_one(db)
        .await
        .context("update account display name")?;
        Ok(account)
    }

    /// All users reporting to the given admin, ordered by display name.
    pub async fn managed_by(db: &PgPool, admin_id: Uuid) -> anyhow::Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, display_name, role, assigned_admin, created_at
            FROM accounts
            WHERE assigned_admin = $1
            ORDER BY display_name ASC
            "#,
        )
        .bind(admin_id)
        .fetch_all(db)
        .await
        .context("list managed accounts")?;
        Ok(rows)
    }
}
