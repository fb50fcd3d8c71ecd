use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::repo::Account;
use crate::chat::dto::{MessageDto, ServerEvent};
use crate::chat::repo::Message;
use crate::error::ApiError;
use crate::state::AppState;

/// Persist a message and fan it out.
///
/// The write comes first: live delivery is at-most-once and best-effort, so a
/// receiver that is offline simply misses the push and recovers the message by
/// fetching the thread later. The sender's own channel gets the echo too, which
/// keeps additional devices of the same account consistent.
pub async fn send_message(
    state: &AppState,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: &str,
    timestamp: Option<OffsetDateTime>,
) -> Result<MessageDto, ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::validation("Message content is required"));
    }

    let sender = Account::find_by_id(&state.db, sender_id)
        .await?
        .ok_or_else(|| ApiError::validation("Unknown sender"))?;
    let receiver = Account::find_by_id(&state.db, receiver_id)
        .await?
        .ok_or_else(|| ApiError::validation("Unknown receiver"))?;

    let sent_at = timestamp.unwrap_or_else(OffsetDateTime::now_utc);
    let message = Message::insert(
        &state.db,
        sender.id,
        sender.role()?,
        receiver.id,
        receiver.role()?,
        content,
        sent_at,
    )
    .await?;
    let dto = message.to_dto()?;

    let echoed = state.chat.send_to(
        sender_id,
        ServerEvent::ReceiveMessage {
            message: dto.clone(),
        },
    );
    let delivered = state.chat.send_to(
        receiver_id,
        ServerEvent::ReceiveMessage {
            message: dto.clone(),
        },
    );
    state.chat.send_to(
        receiver_id,
        ServerEvent::NewMessageNotification {
            sender_id,
            content: dto.content.clone(),
            sent_at: dto.sent_at,
        },
    );

    debug!(
        message_id = %dto.id,
        %sender_id,
        %receiver_id,
        echoed,
        delivered,
        "message persisted and fanned out"
    );
    info!(message_id = %dto.id, %sender_id, %receiver_id, "message sent");
    Ok(dto)
}
