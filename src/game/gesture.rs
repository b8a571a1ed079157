//! Gesture Definitions
//!
//! The closed set of moves a participant can submit on a turn, and the
//! cyclic ordering that decides a turn.

use std::fmt;

/// A player's move on a turn.
///
/// `Pass` is the implicit gesture for a missed or unparseable move: it loses
/// to every real gesture and draws only with itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// Beats scissors, loses to paper.
    Rock,
    /// Beats rock, loses to scissors.
    Paper,
    /// Beats paper, loses to rock.
    Scissors,
    /// The non-move. Submitted on timeout or for an unknown wire code.
    Pass,
}

impl Gesture {
    /// Decode a wire code. Anything outside {0, 1, 2} degrades to `Pass`.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Gesture::Rock,
            1 => Gesture::Paper,
            2 => Gesture::Scissors,
            _ => Gesture::Pass,
        }
    }

    /// Wire code for this gesture. `Pass` encodes as -1.
    pub fn code(self) -> i64 {
        match self {
            Gesture::Rock => 0,
            Gesture::Paper => 1,
            Gesture::Scissors => 2,
            Gesture::Pass => -1,
        }
    }

    /// Whether this gesture wins against `other`.
    ///
    /// Rock > scissors > paper > rock; any real gesture beats `Pass`.
    /// False both ways on a draw.
    #[inline]
    pub fn beats(self, other: Gesture) -> bool {
        matches!(
            (self, other),
            (Gesture::Rock, Gesture::Scissors)
                | (Gesture::Scissors, Gesture::Paper)
                | (Gesture::Paper, Gesture::Rock)
        ) || (self != Gesture::Pass && other == Gesture::Pass)
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Gesture::Rock => "ROCK",
            Gesture::Paper => "PAPER",
            Gesture::Scissors => "SCISSORS",
            Gesture::Pass => "PASS",
        };
        write!(f, "{}", name)
    }
}
