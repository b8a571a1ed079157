//! Game State
//!
//! Score keeping and turn records for a single duel between a fixed pair of
//! participants. Mutated only by the judge task.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::game::gesture::Gesture;

/// A game ends once the leader reaches this score with the required margin.
pub const TARGET_SCORE: u32 = 10;

/// Required lead over the opponent to close out a game.
pub const WIN_MARGIN: u32 = 2;

// =============================================================================
// SEAT
// =============================================================================

/// Identity of one side of a game: UID plus display name.
///
/// A value copy of the participant's identity rather than a handle to it,
/// so a game never keeps its players alive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seat {
    /// Participant UID.
    pub uid: String,
    /// Display name at pairing time.
    pub name: String,
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.uid, self.name)
    }
}

// =============================================================================
// SPECIAL TERMINATORS
// =============================================================================

/// An early game ending. Serialized as the `reason` of the end-game frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialEnd {
    /// Opponent's connection dropped or they quit.
    Leave,
    /// Opponent surrendered.
    Surrender,
}

// =============================================================================
// TURN RECORD
// =============================================================================

/// Outcome of a single turn: the optional winner and both gestures, keyed
/// by the submitting participant's UID.
#[derive(Clone, Debug)]
pub struct TurnRecord {
    /// UID of the turn winner, `None` on a draw.
    pub winner: Option<String>,
    moves: [(String, Gesture); 2],
}

impl TurnRecord {
    /// The gesture submitted by `uid` on this turn, if `uid` played in it.
    pub fn gesture_of(&self, uid: &str) -> Option<Gesture> {
        self.moves.iter().find(|(u, _)| u == uid).map(|(_, g)| *g)
    }
}

// =============================================================================
// GAME
// =============================================================================

/// A duel between a fixed, ordered pair of seats.
///
/// Seat order is fixed at creation; the judge maps submissions onto it
/// before calling [`Game::turn`].
#[derive(Clone, Debug)]
pub struct Game {
    user1: Seat,
    user2: Seat,
    score1: u32,
    score2: u32,
    /// UID of the overall winner once the game is decided.
    pub winner: Option<String>,
    /// Set when the game ended early instead of on score.
    pub special: Option<SpecialEnd>,
    turns: Vec<TurnRecord>,
}

impl Game {
    /// Create a fresh game between two seats, scores at zero.
    pub fn new(user1: Seat, user2: Seat) -> Self {
        Self {
            user1,
            user2,
            score1: 0,
            score2: 0,
            winner: None,
            special: None,
            turns: Vec::new(),
        }
    }

    /// First seat (order fixed at creation).
    pub fn user1(&self) -> &Seat {
        &self.user1
    }

    /// Second seat.
    pub fn user2(&self) -> &Seat {
        &self.user2
    }

    /// Whether `uid` occupies the first seat.
    pub fn is_user1(&self, uid: &str) -> bool {
        self.user1.uid == uid
    }

    /// Current scores as `(score1, score2)`.
    pub fn scores(&self) -> (u32, u32) {
        (self.score1, self.score2)
    }

    /// Number of completed turns; doubles as the index of the next turn.
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// The most recently completed turn.
    pub fn last_turn(&self) -> Option<&TurnRecord> {
        self.turns.last()
    }

    /// End the game early: `winner_uid` takes the game for `special`.
    pub fn end_special(&mut self, winner_uid: &str, special: SpecialEnd) {
        self.winner = Some(winner_uid.to_string());
        self.special = Some(special);
    }

    /// Score one turn. `move1` belongs to `user1`, `move2` to `user2`.
    ///
    /// The winner's score increments; the game's winner is set once the
    /// turn winner reaches `max(TARGET_SCORE, loser + WIN_MARGIN)`.
    pub fn turn(&mut self, move1: Gesture, move2: Gesture) {
        let winner = if move1.beats(move2) {
            self.score1 += 1;
            if self.score1 >= TARGET_SCORE.max(self.score2 + WIN_MARGIN) {
                self.winner = Some(self.user1.uid.clone());
            }
            Some(self.user1.uid.clone())
        } else if move2.beats(move1) {
            self.score2 += 1;
            if self.score2 >= TARGET_SCORE.max(self.score1 + WIN_MARGIN) {
                self.winner = Some(self.user2.uid.clone());
            }
            Some(self.user2.uid.clone())
        } else {
            None
        };

        self.turns.push(TurnRecord {
            winner,
            moves: [
                (self.user1.uid.clone(), move1),
                (self.user2.uid.clone(), move2),
            ],
        });

        debug!("{}: {}, {}: {}", self.user1, move1, self.user2, move2);
        debug!("{}", self);
        if let Some(winner) = &self.winner {
            info!("{} won {}", winner, self);
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {} {}",
            self.user1, self.score1, self.score2, self.user2
        )
    }
}
