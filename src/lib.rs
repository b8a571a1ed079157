//! # RPS Duel Server
//!
//! Networked rock/paper/scissors duel server: pairs two clients over
//! WebSocket and arbitrates best-to-ten matches turn by turn.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RPS DUEL SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Rules and per-player state                │
//! │  ├── gesture.rs  - Gesture set and the cyclic beats relation │
//! │  ├── state.rs    - Game scores, turn records, win condition  │
//! │  ├── participant.rs - UIDs, names, command queues, pairings  │
//! │  └── bot.rs      - Headless bot sessions                     │
//! │                                                              │
//! │  coord/          - Singleton coordinators                    │
//! │  ├── matchmaker.rs - Waiting slot, livechecks, pair commits  │
//! │  └── judge.rs    - Outstanding moves, turn pairing, verdicts │
//! │                                                              │
//! │  network/        - Transport and protocol                    │
//! │  ├── protocol.rs - JSON wire messages                        │
//! │  ├── session.rs  - Per-connection session state machine      │
//! │  └── server.rs   - TCP/TLS accept loop                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Coordination model
//!
//! Every connected client (and every bot) runs as its own tokio task and
//! owns the receiving end of a private command queue. The matchmaker and
//! the judge are two long-lived tasks, each consuming a channel; all
//! cross-task traffic flows through those channels:
//!
//! ```text
//! client frames → session → { judge intake | matchmaker intake }
//!                                 │               │
//!                               judge         matchmaker
//!                                 │               │
//!                                 └─→ session command queues → client frames
//! ```
//!
//! Pairing state is mutated only by the matchmaker, game state only by the
//! judge, so each piece of shared state has a single writer task.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod coord;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use config::Settings;
pub use coord::{Coordinators, SessionCommand, Submission};
pub use game::gesture::Gesture;
pub use game::participant::Participant;
pub use game::state::{Game, SpecialEnd};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
