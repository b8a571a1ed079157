//! Participants
//!
//! A participant is one side of a duel: a connected human or a spawned bot.
//! It carries the identity shown to the opponent, the command queue its
//! session consumes, and the pairing handles set by the matchmaker.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::mpsc;

use crate::coord::SessionCommand;
use crate::game::state::{Game, Seat};

/// Display names are capped at this many bytes of UTF-8.
pub const MAX_NAME_BYTES: usize = 16;

/// A game shared by the two participants playing it.
pub type SharedGame = Arc<Mutex<Game>>;

/// Generate a participant UID: the first seven hex digits of a time-based
/// UUID, upper-cased.
pub fn generate_uid() -> String {
    static NODE_ID: OnceLock<[u8; 6]> = OnceLock::new();
    let node_id = NODE_ID.get_or_init(|| {
        let mut id = [0u8; 6];
        OsRng.fill_bytes(&mut id);
        id
    });
    let uuid = uuid::Uuid::now_v1(node_id);
    uuid.simple().to_string()[..7].to_ascii_uppercase()
}

/// Truncate a display name to at most [`MAX_NAME_BYTES`] bytes, backing off
/// to the nearest UTF-8 character boundary.
pub fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_BYTES {
        return name.to_string();
    }
    let mut end = MAX_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

// =============================================================================
// PAIRING
// =============================================================================

/// The references a participant holds while in a game.
///
/// Set by the matchmaker when a pair is committed, cleared by the session
/// once it has observed the game's terminal state.
#[derive(Clone)]
pub struct Pairing {
    /// The other side of the game.
    pub opponent: Arc<Participant>,
    /// The game shared with the opponent.
    pub game: SharedGame,
}

// =============================================================================
// PARTICIPANT
// =============================================================================

/// One side of a duel. Shared as `Arc<Participant>` between its session,
/// the coordinators and (while paired) the opponent.
pub struct Participant {
    uid: String,
    name: String,
    affiliation: Option<String>,
    commands: mpsc::UnboundedSender<SessionCommand>,
    dropped: AtomicBool,
    pairing: Mutex<Option<Pairing>>,
}

impl Participant {
    /// Create a participant with a fresh UID and its command queue.
    ///
    /// The sender half lives inside the participant; the returned receiver
    /// belongs to the session task driving it. `affiliation` is the owning
    /// human's UID for bots, `None` for humans.
    pub fn new(
        name: String,
        affiliation: Option<String>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let participant = Arc::new(Self {
            uid: generate_uid(),
            name,
            affiliation,
            commands: tx,
            dropped: AtomicBool::new(false),
            pairing: Mutex::new(None),
        });
        (participant, rx)
    }

    /// 7-character uppercase hex UID.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Display name (already truncated).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// UID of the human this bot plays for, `None` for humans.
    pub fn affiliation(&self) -> Option<&str> {
        self.affiliation.as_deref()
    }

    /// Whether this participant is a bot.
    pub fn is_bot(&self) -> bool {
        self.affiliation.is_some()
    }

    /// Queue a command for the session driving this participant.
    ///
    /// Never blocks; a command for a session that has already gone away is
    /// silently dropped.
    pub fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("{}: command queue closed, command dropped", self);
        }
    }

    /// Whether the session has torn down and released this participant.
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Mark this participant as gone. Set exactly once, at teardown.
    pub fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::SeqCst);
    }

    /// Current pairing, if any.
    pub fn pairing(&self) -> Option<Pairing> {
        self.pairing.lock().unwrap().clone()
    }

    /// Install the opponent and game references. Matchmaker only.
    pub fn set_pairing(&self, opponent: Arc<Participant>, game: SharedGame) {
        *self.pairing.lock().unwrap() = Some(Pairing { opponent, game });
    }

    /// Drop the opponent and game references.
    pub fn clear_pairing(&self) {
        *self.pairing.lock().unwrap() = None;
    }

    /// This participant's identity as a game seat.
    pub fn seat(&self) -> Seat {
        Seat {
            uid: self.uid.clone(),
            name: self.name.clone(),
        }
    }
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for Participant {}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.uid, self.name)
    }
}

// Hand-written: a derived Debug would recurse through the pairing into the
// opponent and back.
impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("affiliation", &self.affiliation)
            .field("dropped", &self.is_dropped())
            .finish_non_exhaustive()
    }
}
