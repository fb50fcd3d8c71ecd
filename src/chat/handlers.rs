use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    auth::{extractors::AuthUser, repo::Account},
    chat::{
        dto::{ChatListItem, MessageDto},
        repo::Message,
    },
    error::ApiError,
    scope::Role,
    state::AppState,
};

/// Conversation list with unread counters.
///
/// Admins get one entry per managed user; users get their assigned admin, or
/// an empty list when nobody is assigned yet.
#[instrument(skip(state))]
pub async fn chat_list(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<ChatListItem>>, ApiError> {
    let items = match caller.role {
        Role::Admin => {
            let rows: Vec<(Uuid, String, String, String, i64)> = sqlx::query_as(
                r#"
                SELECT a.id, a.display_name, a.email, a.role, COUNT(m.id)
                FROM accounts a
                LEFT JOIN messages m
                       ON m.sender_id = a.id
                      AND m.receiver_id = $1
                      AND m.is_read = FALSE
                WHERE a.assigned_admin = $1
                GROUP BY a.id, a.display_name, a.email, a.role
                ORDER BY a.display_name ASC
                "#,
            )
            .bind(caller.id)
            .fetch_all(&state.db)
            .await
            .map_err(|e| ApiError::Internal(e.into()))?;

            rows.into_iter()
                .map(|(id, display_name, email, role, unread_count)| {
                    Ok(ChatListItem {
                        id,
                        display_name,
                        email,
                        role: Role::parse(&role)?,
                        unread_count,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?
        }
        Role::User => {
            let me = Account::find_by_id(&state.db, caller.id)
                .await?
                .ok_or_else(|| ApiError::Unauthorized("Account not found".into()))?;

            match me.assigned_admin {
                None => {
                    debug!(account_id = %caller.id, "no assigned admin, empty chat list");
                    Vec::new()
                }
                Some(admin_id) => match Account::find_by_id(&state.db, admin_id).await? {
                    None => Vec::new(),
                    Some(admin) => {
                        let unread_count =
                            Message::unread_count(&state.db, admin.id, caller.id).await?;
                        vec![ChatListItem {
                            id: admin.id,
                            display_name: admin.display_name.clone(),
                            email: admin.email.clone(),
                            role: admin.role()?,
                            unread_count,
                        }]
                    }
                },
            }
        }
    };

    Ok(Json(items))
}

/// Full thread with a peer, oldest first. Serving the request acknowledges it:
/// everything the peer sent the caller is marked read before the rows are
/// returned.
#[instrument(skip(state))]
pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(receiver_id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let flipped = Message::mark_read(&state.db, receiver_id, caller.id).await?;
    if flipped > 0 {
        debug!(account_id = %caller.id, peer = %receiver_id, flipped, "messages marked read");
    }

    let thread = Message::thread(&state.db, caller.id, receiver_id).await?;
    let items = thread
        .iter()
        .map(Message::to_dto)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(items))
}
