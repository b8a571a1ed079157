//! Coordination Layer
//!
//! The two singleton coordinators (matchmaker and judge) and the message
//! types flowing between them and the sessions. The coordinators are
//! long-lived tasks, each consuming a private channel; sessions talk to
//! them through the [`Coordinators`] handle created at startup, and they
//! answer through each participant's command queue.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::game::gesture::Gesture;
use crate::game::participant::Participant;
use crate::game::state::SpecialEnd;

pub mod judge;
pub mod matchmaker;

/// Capacity of the matchmaker intake and livecheck reply channels.
const COORD_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// SESSION COMMANDS
// =============================================================================

/// A command delivered to a session through its participant's queue.
#[derive(Clone, Debug)]
pub enum SessionCommand {
    /// Matchmaker asks the session to prove its connection is alive.
    Livecheck,
    /// Matchmaker committed a pair; the session's opponent.
    Match {
        /// The other side of the new game.
        opponent: Arc<Participant>,
    },
    /// Judge scored a turn; the session should report it to its client.
    Endturn,
    /// Judge ended the game early; the session should report and move on.
    Endgame,
    /// Matchmaker evicts an unpaired bot.
    Terminate,
}

impl SessionCommand {
    /// Wire-style name of the command, for log messages.
    pub fn action(&self) -> &'static str {
        match self {
            SessionCommand::Livecheck => "livecheck",
            SessionCommand::Match { .. } => "match",
            SessionCommand::Endturn => "endturn",
            SessionCommand::Endgame => "endgame",
            SessionCommand::Terminate => "terminate",
        }
    }
}

// =============================================================================
// JUDGE INTAKE
// =============================================================================

/// One participant's contribution to the current turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// A gesture, including the implicit `Pass`.
    Play(Gesture),
    /// The participant quit or its connection dropped.
    Leave,
    /// The participant surrendered the game.
    Surrender,
}

impl Submission {
    /// The special terminator this submission carries, if any.
    pub fn as_special(self) -> Option<SpecialEnd> {
        match self {
            Submission::Play(_) => None,
            Submission::Leave => Some(SpecialEnd::Leave),
            Submission::Surrender => Some(SpecialEnd::Surrender),
        }
    }
}

/// Sender half of the judge intake.
///
/// Unbounded: a submission send always completes synchronously, so no
/// session or coordinator can stall on the judge.
pub type JudgeSender = mpsc::UnboundedSender<(Arc<Participant>, Submission)>;

/// Receiver half of the judge intake, owned by the judge task.
pub type JudgeReceiver = mpsc::UnboundedReceiver<(Arc<Participant>, Submission)>;

// =============================================================================
// MATCHMAKER INTAKE
// =============================================================================

/// A session asking to be paired.
#[derive(Clone, Debug)]
pub struct PairRequest {
    /// The participant to pair.
    pub participant: Arc<Participant>,
    /// Pair against a freshly spawned bot instead of another human.
    pub want_bot: bool,
}

/// A session's answer to a [`SessionCommand::Livecheck`].
#[derive(Clone, Debug)]
pub struct LivecheckReply {
    /// The probed participant.
    pub participant: Arc<Participant>,
    /// Whether the transport-level ping went through.
    pub live: bool,
}

// =============================================================================
// HANDLES
// =============================================================================

/// Channel handles into the coordinators, passed to every session.
#[derive(Clone)]
pub struct Coordinators {
    /// Matchmaker intake.
    pub matchmaker: mpsc::Sender<PairRequest>,
    /// Livecheck reply channel, read by the matchmaker.
    pub livecheck: mpsc::Sender<LivecheckReply>,
    /// Judge intake.
    pub judge: JudgeSender,
}

/// Spawn the matchmaker and judge tasks and return the handles sessions
/// use to reach them.
///
/// Both tasks run until every handle clone has been dropped.
pub fn spawn() -> Coordinators {
    let (matchmaker_tx, matchmaker_rx) = mpsc::channel(COORD_CHANNEL_CAPACITY);
    let (livecheck_tx, livecheck_rx) = mpsc::channel(COORD_CHANNEL_CAPACITY);
    let (judge_tx, judge_rx) = mpsc::unbounded_channel();

    tokio::spawn(judge::run(judge_rx));
    tokio::spawn(matchmaker::run(matchmaker_rx, livecheck_rx, judge_tx.clone()));

    Coordinators {
        matchmaker: matchmaker_tx,
        livecheck: livecheck_tx,
        judge: judge_tx,
    }
}
