//! Judge
//!
//! The single task that scores games. It consumes one submission per
//! participant per turn, holds the first submission of a turn in the
//! outstanding table until its pair arrives, then applies the rules and
//! tells both sessions how to advance.
//!
//! The judge never blocks on a session: command queues are unbounded, and
//! commands for sessions that have already gone away are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::coord::{JudgeReceiver, SessionCommand, Submission};
use crate::game::participant::Participant;
use crate::game::state::SpecialEnd;

/// Run the judge until the intake closes.
pub async fn run(mut intake: JudgeReceiver) {
    let mut judge = Judge::new();
    while let Some((user, submission)) = intake.recv().await {
        judge.process(&user, submission);
    }
}

/// Judge state: the outstanding-moves table.
///
/// At most one entry per active game at any instant (the first mover of
/// the current turn), keyed by submitter UID.
struct Judge {
    outstanding: HashMap<String, Submission>,
}

impl Judge {
    fn new() -> Self {
        Self {
            outstanding: HashMap::new(),
        }
    }

    /// Handle one submission. Synchronous: every outbound send completes
    /// immediately.
    fn process(&mut self, user: &Arc<Participant>, submission: Submission) {
        if user.is_dropped() {
            warn!("judge: submission from dropped participant {}", user);
            return;
        }
        let Some(pairing) = user.pairing() else {
            warn!("judge: submission from unpaired participant {}", user);
            return;
        };
        let opponent = pairing.opponent;

        if opponent.is_dropped() {
            // The other side is gone for good; whatever this submission
            // was, the submitter takes the game.
            pairing
                .game
                .lock()
                .unwrap()
                .end_special(user.uid(), SpecialEnd::Leave);
            self.outstanding.remove(opponent.uid());
            user.send(SessionCommand::Endgame);
            info!("judge: {} deserted, {} wins", opponent, user);
            return;
        }

        let Some(theirs) = self.outstanding.remove(opponent.uid()) else {
            // First submission of the turn; wait for the pair.
            self.outstanding
                .insert(user.uid().to_string(), submission);
            return;
        };

        // Both moves are in. Map them onto the game's fixed seat order.
        let game = pairing.game.clone();
        let (u1, m1, u2, m2) = if game.lock().unwrap().is_user1(user.uid()) {
            (user.clone(), submission, opponent, theirs)
        } else {
            (opponent, theirs, user.clone(), submission)
        };

        if let Some(special) = m1.as_special() {
            game.lock().unwrap().end_special(u2.uid(), special);
            u2.send(SessionCommand::Endgame);
        } else if let Some(special) = m2.as_special() {
            game.lock().unwrap().end_special(u1.uid(), special);
            u1.send(SessionCommand::Endgame);
        } else {
            let (Submission::Play(g1), Submission::Play(g2)) = (m1, m2) else {
                unreachable!("specials handled above");
            };
            game.lock().unwrap().turn(g1, g2);
            u1.send(SessionCommand::Endturn);
            u2.send(SessionCommand::Endturn);
        }
    }
}
