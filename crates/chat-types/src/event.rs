use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events a client sends over the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Ask the relay to stream a completion for this prompt
    SubmitPrompt { prompt: String },
    /// Join a named room
    JoinRoom { room_id: String },
    /// Leave a named room
    LeaveRoom { room_id: String },
    /// Send an arbitrary payload to a room's members
    RoomMessage { room_id: String, message: Value },
    /// Send an arbitrary payload to every connected client
    Broadcast { data: Value },
}

/// Events the relay sends back over the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A partial token from the upstream completion
    Delta { content: String },
    /// The upstream stream ended; carries the join of all deltas
    Complete { full_response: String },
    /// The upstream call failed; no Complete follows
    Error { error: String },
    /// Passthrough of a client broadcast
    Broadcast { data: Value },
    /// Passthrough of a room message
    RoomMessage { from: String, message: Value },
    /// Another client joined a room this client is in
    UserJoined { client_id: String },
    /// Another client left a room this client is in
    UserLeft { client_id: String },
}
