use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::chat::dto::MessageDto;
use crate::scope::Role;

/// Message row. `is_read` flips exactly once, when the receiver opens the
/// thread; rows are never deleted.
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub sender_role: String,
    pub receiver_role: String,
    pub content: String,
    pub sent_at: OffsetDateTime,
    pub is_read: bool,
}

impl Message {
    pub fn to_dto(&self) -> anyhow::Result<MessageDto> {
        Ok(MessageDto {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            sender_role: Role::parse(&self.sender_role)?,
            receiver_role: Role::parse(&self.receiver_role)?,
            content: self.content.clone(),
            sent_at: self.sent_at,
            is_read: self.is_read,
        })
    }

    pub async fn insert(
        db: &PgPool,
        sender_id: Uuid,
        sender_role: Role,
        receiver_id: Uuid,
        receiver_role: Role,
        content: &str,
        sent_at: OffsetDateTime,
    ) -> anyhow::Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
                (sender_id, receiver_id, sender_role, receiver_role, content, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sender_id, receiver_id, sender_role, receiver_role,
                      content, sent_at, is_read
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(sender_role.as_str())
        .bind(receiver_role.as_str())
        .bind(content)
        .bind(sent_at)
        .fetch_one(db)
        .await
        .context("insert message")?;
        Ok(message)
    }

    /// Every message between the two parties, both directions, oldest first.
    pub async fn thread(db: &PgPool, a: Uuid, b: Uuid) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, sender_role, receiver_role,
                   content, sent_at, is_read
            FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY sent_at ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(db)
        .await
        .context("fetch message thread")?;
        Ok(rows)
    }

    /// Mark everything `sender` sent to `receiver` as read. Returns the number
    /// of rows flipped.
    pub async fn mark_read(db: &PgPool, sender_id: Uuid, receiver_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE sender_id = $1 AND receiver_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .execute(db)
        .await
        .context("mark messages read")?;
        Ok(result.rows_affected())
    }

    /// Unread messages from `sender` to `receiver`.
    pub async fn unread_count(
        db: &PgPool,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> anyhow::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM messages
            WHERE sender_id = $1 AND receiver_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_one(db)
        .await
        .context("count unread messages")?;
        Ok(count)
    }
}
