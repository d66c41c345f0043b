//! WebSocket protocol messages for the event ingestion server.

use leela_core::{Effect, PlayerState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::GameEvent;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Submit a game event for processing
    SubmitEvent { event: GameEvent },

    /// Subscribe to state updates for a player
    #[serde(rename_all = "camelCase")]
    Subscribe { user_id: String },

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned connection ID
    #[serde(rename_all = "camelCase")]
    Welcome { connection_id: Uuid },

    /// Event processed; state and effects reflect the outcome. `rejection`
    /// carries the status line when the rules turned the action into a no-op.
    #[serde(rename_all = "camelCase")]
    EventProcessed {
        event_id: Uuid,
        state: PlayerState,
        effects: Vec<Effect>,
        rejection: Option<String>,
    },

    /// Event could not be processed
    #[serde(rename_all = "camelCase")]
    EventFailed {
        event_id: Uuid,
        reason: String,
        retryable: bool,
    },

    /// Subscription confirmed
    #[serde(rename_all = "camelCase")]
    Subscribed { user_id: String },

    /// A subscribed player's state changed
    #[serde(rename_all = "camelCase")]
    StateChanged {
        user_id: String,
        state: PlayerState,
        effects: Vec<Effect>,
    },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}
