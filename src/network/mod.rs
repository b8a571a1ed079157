//! Network Layer
//!
//! WebSocket transport, the JSON wire protocol and the per-connection
//! session state machine. Everything game-related happens in `game/` and
//! `coord/`; this layer only translates between the two protocols.

pub mod protocol;
pub mod server;
pub mod session;

pub use protocol::{ClientMessage, ServerMessage};
pub use server::{Server, ServerConfig, ServerError};
