//! Game Module
//!
//! Rules, identities and the headless bot player.
//!
//! ## Module Structure
//!
//! - `gesture`: The move set and its cyclic ordering
//! - `state`: Per-game scores, turn records, win condition
//! - `participant`: UIDs, display names, command queues, pairings
//! - `bot`: Bot sessions

pub mod bot;
pub mod gesture;
pub mod participant;
pub mod state;

// Re-export key types
pub use gesture::Gesture;
pub use participant::{Pairing, Participant, SharedGame};
pub use state::{Game, Seat, SpecialEnd, TurnRecord};
