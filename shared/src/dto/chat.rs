//! # Channel Protocol Events
//!
//! Defines the bidirectional event set carried over the persistent chat
//! channel. The channel is only used for room membership and typing
//! presence; message persistence goes directly to the store and is not
//! represented here.

use serde::{Deserialize, Serialize};

/// Events sent from the client to the channel server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Request membership in a conversation room.
    Join(JoinPayload),
    /// Relay the caller's typing state to the room.
    Typing(TypingPayload),
}

/// Events sent from the channel server to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A join request succeeded.
    Joined(JoinedPayload),
    /// A room peer changed typing state. Never echoes the sender.
    Typing(TypingBroadcast),
    /// Any rejected operation; the connection itself stays open.
    Error(ErrorPayload),
}

/// Payload for [`ClientEvent::Join`].
///
/// `task_id` is a legacy alias kept for older clients that joined rooms by
/// task id; `conversation_id` wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Payload for [`ClientEvent::Typing`]. Accepts the same id alias as join.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub is_typing: bool,
}

/// Payload for [`ServerEvent::Joined`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinedPayload {
    pub conversation_id: String,
}

/// Payload for [`ServerEvent::Typing`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingBroadcast {
    pub sender_id: String,
    pub is_typing: bool,
}

/// Payload for [`ServerEvent::Error`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
}

impl ClientEvent {
    /// Build a join event for a conversation id.
    pub fn join(conversation_id: impl Into<String>) -> Self {
        ClientEvent::Join(JoinPayload {
            conversation_id: Some(conversation_id.into()),
            task_id: None,
        })
    }

    /// Build a typing event for a conversation id.
    pub fn typing(conversation_id: impl Into<String>, is_typing: bool) -> Self {
        ClientEvent::Typing(TypingPayload {
            conversation_id: Some(conversation_id.into()),
            task_id: None,
            is_typing,
        })
    }
}

/// Resolve the room id targeted by a client event payload.
///
/// Prefers `conversation_id`, falls back to the legacy `task_id` alias.
/// Whitespace-only ids count as absent.
pub fn normalize_room_id(
    conversation_id: Option<&str>,
    task_id: Option<&str>,
) -> Option<String> {
    conversation_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .or_else(|| task_id.map(str::trim).filter(|id| !id.is_empty()))
        .map(str::to_string)
}

impl JoinPayload {
    pub fn room_id(&self) -> Option<String> {
        normalize_room_id(self.conversation_id.as_deref(), self.task_id.as_deref())
    }
}

impl TypingPayload {
    pub fn room_id(&self) -> Option<String> {
        normalize_room_id(self.conversation_id.as_deref(), self.task_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_event_wire_shape() {
        let event = ClientEvent::join("T123");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "join");
        assert_eq!(json["data"]["conversationId"], "T123");
    }

    #[test]
    fn test_join_accepts_legacy_task_id_alias() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"join","data":{"taskId":"T123"}}"#).unwrap();

        match event {
            ClientEvent::Join(payload) => {
                assert_eq!(payload.room_id().as_deref(), Some("T123"));
            }
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn test_conversation_id_wins_over_alias() {
        let payload = JoinPayload {
            conversation_id: Some("C1".to_string()),
            task_id: Some("T1".to_string()),
        };
        assert_eq!(payload.room_id().as_deref(), Some("C1"));
    }

    #[test]
    fn test_blank_ids_count_as_absent() {
        let payload = TypingPayload {
            conversation_id: Some("   ".to_string()),
            task_id: None,
            is_typing: true,
        };
        assert_eq!(payload.room_id(), None);
    }

    #[test]
    fn test_typing_broadcast_round_trip() {
        let event = ServerEvent::Typing(TypingBroadcast {
            sender_id: "user-a".to_string(),
            is_typing: true,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""senderId":"user-a""#));
        assert!(json.contains(r#""isTyping":true"#));

        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
