use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{MessageResponse, ReactionResponse};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GatewayEvent {
    /// First frame on every connection. `authenticated` is false when the
    /// handshake carried no usable identity.
    Ready {
        user_id: Option<Uuid>,
        authenticated: bool,
    },

    /// Delivery copy of a freshly persisted message
    NewMessage(Box<MessageResponse>),

    /// A user started typing
    Typing {
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        group_id: Option<Uuid>,
    },

    /// A user stopped typing
    StopTyping {
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        group_id: Option<Uuid>,
    },

    /// Full list of users with a registered connection
    GetOnlineUsers(Vec<Uuid>),

    /// A reaction was added or replaced
    ReactionAdded {
        message_id: Uuid,
        reaction: ReactionResponse,
    },

    /// A reaction was removed
    ReactionRemoved { message_id: Uuid, user_id: Uuid },
}

impl GatewayEvent {
    /// Wire name of the event, as found in the `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::NewMessage(_) => "newMessage",
            Self::Typing { .. } => "typing",
            Self::StopTyping { .. } => "stopTyping",
            Self::GetOnlineUsers(_) => "getOnlineUsers",
            Self::ReactionAdded { .. } => "reactionAdded",
            Self::ReactionRemoved { .. } => "reactionRemoved",
        }
    }
}

/// Addressing carried by typing signals. `sender_id` is accepted for
/// compatibility but the gateway always uses the connection's own identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    #[serde(default)]
    pub sender_id: Option<Uuid>,
    #[serde(default)]
    pub receiver_id: Option<Uuid>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Join the room of a group
    #[serde(rename = "join-group")]
    JoinGroup(Uuid),

    /// Leave the room of a group
    #[serde(rename = "leave-group")]
    LeaveGroup(Uuid),

    #[serde(rename = "typing")]
    Typing(TypingPayload),

    #[serde(rename = "stopTyping")]
    StopTyping(TypingPayload),
}
