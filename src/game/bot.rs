//! Bot Sessions
//!
//! A bot is a headless participant spawned by the matchmaker to satisfy a
//! human's request for a bot opponent. It speaks the same command-queue
//! protocol as a human session, but draws its moves from the OS CSPRNG and
//! never touches a transport.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::Rng;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::coord::{JudgeSender, SessionCommand, Submission};
use crate::game::gesture::Gesture;
use crate::game::participant::{truncate_name, Participant};

/// Spawn a bot affiliated to `owner` and return its participant handle.
pub fn spawn(owner: &Arc<Participant>, judge: JudgeSender) -> Arc<Participant> {
    let name = truncate_name(&format!("BOT ({})", owner.name()));
    let (bot, commands) = Participant::new(name, Some(owner.uid().to_string()));
    info!("spawned bot {} for {}", bot, owner);
    tokio::spawn(run(bot.clone(), commands, judge));
    bot
}

/// Drive a bot from spawn to teardown.
async fn run(
    me: Arc<Participant>,
    mut commands: UnboundedReceiver<SessionCommand>,
    judge: JudgeSender,
) {
    // Idle until the matchmaker either pairs or evicts us.
    loop {
        match commands.recv().await {
            None | Some(SessionCommand::Terminate) => {
                debug!("{}: terminated while unpaired", me);
                me.mark_dropped();
                return;
            }
            Some(SessionCommand::Match { .. }) => break,
            Some(cmd) => {
                warn!("{}: expecting command \"match\", ignored \"{}\"", me, cmd.action());
            }
        }
    }

    if let Some(pairing) = me.pairing() {
        play(&me, &mut commands, &judge, &pairing.game).await;
    } else {
        warn!("{}: matched without a pairing", me);
    }

    me.mark_dropped();
    me.clear_pairing();
    info!("dropped {}", me);
}

/// Play one game: submit random gestures until the game is decided.
async fn play(
    me: &Arc<Participant>,
    commands: &mut UnboundedReceiver<SessionCommand>,
    judge: &JudgeSender,
    game: &crate::game::participant::SharedGame,
) {
    loop {
        let gesture = random_gesture(&mut OsRng);
        debug!("{}: playing {}", me, gesture);
        if judge.send((me.clone(), Submission::Play(gesture))).is_err() {
            return;
        }

        loop {
            match commands.recv().await {
                None | Some(SessionCommand::Endgame) => return,
                Some(SessionCommand::Endturn) => break,
                Some(cmd) => {
                    warn!("{}: expecting command \"endturn\", ignored \"{}\"", me, cmd.action());
                }
            }
        }

        if game.lock().unwrap().winner.is_some() {
            return;
        }
    }
}

/// A uniformly random real gesture. `Pass` is never a legal bot move.
fn random_gesture<R: Rng>(rng: &mut R) -> Gesture {
    [Gesture::Rock, Gesture::Paper, Gesture::Scissors][rng.gen_range(0..3)]
}
