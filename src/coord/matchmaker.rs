//! Matchmaker
//!
//! The single task that pairs participants. It holds at most one *waiting*
//! participant; every further arrival is matched against it, but only after
//! a livecheck proves the waiting side has not silently disconnected.
//!
//! Bot requests are satisfied inline: the requester takes the waiting slot
//! (anyone else waiting is briefly put on hold), a fresh bot affiliated to
//! the requester is spawned, and the pair is committed like any other.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::coord::{JudgeSender, LivecheckReply, PairRequest, SessionCommand};
use crate::game::bot;
use crate::game::participant::Participant;
use crate::game::state::Game;

/// How long a livecheck may take before the waiting side is presumed dead.
pub const LIVECHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the matchmaker until the intake closes.
pub async fn run(
    mut intake: mpsc::Receiver<PairRequest>,
    mut livecheck: mpsc::Receiver<LivecheckReply>,
    judge: JudgeSender,
) {
    let mut waiting: Option<Arc<Participant>> = None;

    loop {
        // A bot left waiting by a failed pairing is stale: it belongs to a
        // previous cycle and must not be paired against the next arrival.
        if let Some(bot) = waiting.as_ref().filter(|w| w.is_bot()).cloned() {
            bot.send(SessionCommand::Terminate);
            debug!("evicted stale bot {}", bot);
            waiting = None;
        }

        let Some(PairRequest {
            participant: new_user,
            want_bot,
        }) = intake.recv().await
        else {
            break;
        };

        let mut on_hold = None;
        let candidate = if want_bot {
            // The bot plays its requester, so the requester takes the
            // waiting slot; any *other* human waiting is shelved until the
            // bot pairing is settled.
            if let Some(w) = waiting.take() {
                if w.uid() != new_user.uid() {
                    on_hold = Some(w);
                }
            }
            waiting = Some(new_user.clone());
            bot::spawn(&new_user, judge.clone())
        } else {
            new_user
        };

        if let Some(w) = waiting.clone() {
            w.send(SessionCommand::Livecheck);
            if !await_reply(&mut livecheck, &w).await {
                // Dead waiter: the candidate inherits the slot. If the
                // candidate is a bot it gets evicted next cycle.
                waiting = Some(candidate);
                continue;
            }
            commit(&w, &candidate);
            waiting = None;
        } else {
            waiting = Some(candidate);
        }

        if on_hold.is_some() {
            waiting = on_hold;
        }
    }
}

/// Create the game, install the pairing on both sides and notify them.
///
/// The pairing references are in place before either `match` command is
/// queued, so a session that wakes up on the command always finds its game.
fn commit(waiting: &Arc<Participant>, newcomer: &Arc<Participant>) {
    let game = Arc::new(Mutex::new(Game::new(waiting.seat(), newcomer.seat())));
    waiting.set_pairing(newcomer.clone(), game.clone());
    newcomer.set_pairing(waiting.clone(), game);
    waiting.send(SessionCommand::Match {
        opponent: newcomer.clone(),
    });
    newcomer.send(SessionCommand::Match {
        opponent: waiting.clone(),
    });
    info!("match made: {} and {}", waiting, newcomer);
}

/// Wait for `expected`'s livecheck reply, ignoring replies from anyone
/// else. Deadline or a closed channel counts as dead.
async fn await_reply(
    livecheck: &mut mpsc::Receiver<LivecheckReply>,
    expected: &Arc<Participant>,
) -> bool {
    let deadline = Instant::now() + LIVECHECK_TIMEOUT;
    loop {
        match timeout_at(deadline, livecheck.recv()).await {
            Err(_) => {
                warn!("livecheck of {} timed out", expected);
                return false;
            }
            Ok(None) => return false,
            Ok(Some(reply)) if reply.participant.uid() == expected.uid() => {
                if !reply.live {
                    warn!("{} is gone, discarding", expected);
                }
                return reply.live;
            }
            Ok(Some(reply)) => {
                warn!(
                    "ignoring livecheck reply from {} while probing {}",
                    reply.participant, expected
                );
            }
        }
    }
}
