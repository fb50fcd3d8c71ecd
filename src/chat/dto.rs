use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::scope::Role;

/// A persisted message as seen by clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub sender_role: Role,
    pub receiver_role: Role,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
    pub is_read: bool,
}

/// One row of the conversation list: a chat partner and how many of their
/// messages to the caller are still unread.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatListItem {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub unread_count: i64,
}

/// Events a client may push over the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Announce identity and join the personal delivery channel.
    #[serde(rename_all = "camelCase")]
    Join { user_id: Uuid },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        sender_id: Uuid,
        receiver_id: Uuid,
        content: String,
        #[serde(default, with = "time::serde::rfc3339::option")]
        timestamp: Option<OffsetDateTime>,
    },
}

/// Events the server pushes to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full message, echoed to both participants' channels.
    #[serde(rename_all = "camelCase")]
    ReceiveMessage { message: MessageDto },
    /// Lightweight badge ping for the receiver, sent alongside the message.
    #[serde(rename_all = "camelCase")]
    NewMessageNotification {
        sender_id: Uuid,
        content: String,
        #[serde(with = "time::serde::rfc3339")]
        sent_at: OffsetDateTime,
    },
    /// A rejected socket event, reported back to the offending connection.
    #[serde(rename_all = "camelCase")]
    ErrorMessage { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn join_event_parses_from_wire_form() {
        let raw = r#"{"event":"join","userId":"7b5f4b10-5b9e-4f9f-9a53-0f4b58a2a001"}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, ClientEvent::Join { .. }));
    }

    #[test]
    fn send_message_timestamp_is_optional() {
        let raw = r#"{
            "event": "sendMessage",
            "senderId": "7b5f4b10-5b9e-4f9f-9a53-0f4b58a2a001",
            "receiverId": "7b5f4b10-5b9e-4f9f-9a53-0f4b58a2a002",
            "content": "hello"
        }"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::SendMessage {
                content, timestamp, ..
            } => {
                assert_eq!(content, "hello");
                assert!(timestamp.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_events_use_camel_case_tags() {
        let notification = ServerEvent::NewMessageNotification {
            sender_id: Uuid::new_v4(),
            content: "ping".into(),
            sent_at: datetime!(2024-06-01 10:00 UTC),
        };
        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("\"event\":\"newMessageNotification\""));
        assert!(json.contains("\"senderId\""));

        let message = ServerEvent::ReceiveMessage {
            message: MessageDto {
                id: Uuid::new_v4(),
                sender_id: Uuid::new_v4(),
                receiver_id: Uuid::new_v4(),
                sender_role: Role::User,
                receiver_role: Role::Admin,
                content: "hello".into(),
                sent_at: datetime!(2024-06-01 10:00 UTC),
                is_read: false,
            },
        };
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"event\":\"receiveMessage\""));
        assert!(json.contains("\"isRead\":false"));
    }
}
