//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket. Every frame
//! is a JSON object tagged by its `action` field; unknown actions fail to
//! parse and are logged and dropped at the session boundary.

use serde::{Deserialize, Serialize};

use crate::game::state::SpecialEnd;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Introduce yourself with a display name.
    Logon {
        /// Requested display name; truncated server-side to 16 bytes.
        name: String,
    },

    /// Ready to be paired against an opponent.
    Standby,

    /// While waiting: pair me against a bot instead.
    BotRequest,

    /// A move for the given turn.
    Move {
        /// 0-based turn index; must match the server's current turn.
        turn: usize,
        /// Gesture code: 0 rock, 1 paper, 2 scissors. Anything else is a
        /// pass.
        #[serde(rename = "move")]
        code: i64,
    },

    /// Concede the current game but stay connected.
    Surrender,

    /// Concede and disconnect.
    Quit,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerMessage {
    /// An opponent was found; the game starts now.
    Match {
        /// Opponent's display name.
        opponent: String,
    },

    /// A turn was scored.
    Endturn {
        /// `"me"`, `"them"`, or `""` for a draw.
        winner: String,
        /// The opponent's gesture code (-1 for a pass).
        opponent_move: i64,
    },

    /// The game is over.
    Endgame {
        /// `"me"` or `"them"`.
        winner: String,
        /// Why the game ended early, `null` for a win on score.
        reason: Option<SpecialEnd>,
    },
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
