//! User Sessions
//!
//! One session task per accepted WebSocket connection. The session walks a
//! linear lifecycle — logon, wait for an opponent, play — translating client
//! frames into judge submissions and coordinator commands back into client
//! frames.
//!
//! All waits on the socket tolerate garbage: malformed JSON and unexpected
//! actions are logged and skipped, and only the expected frame (or one of
//! its interrupters) advances the state machine.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{info, warn};

use crate::coord::{Coordinators, LivecheckReply, PairRequest, SessionCommand, Submission};
use crate::game::gesture::Gesture;
use crate::game::participant::{truncate_name, Participant, SharedGame};
use crate::network::protocol::{ClientMessage, ServerMessage};

/// How long a client has to submit its move each turn.
pub const MOVE_TIMEOUT: Duration = Duration::from_millis(10_500);

/// Pause before the end-game frame, for client animation cadence.
const ENDGAME_PAUSE: Duration = Duration::from_millis(500);

/// Pause between turns, so clients can show the round's result.
const TURN_PAUSE: Duration = Duration::from_secs(2);

/// How long a participant stays resolvable after its session ends, so the
/// judge can drain residual submissions.
pub const RETENTION_GRACE: Duration = Duration::from_secs(30);

/// Errors on the client-bound half of the connection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Frame could not be serialized.
    #[error("failed to serialize frame: {0}")]
    Serialize(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

// =============================================================================
// CONNECTION
// =============================================================================

/// The two halves of one client's WebSocket.
struct Connection<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    stream: SplitStream<WebSocketStream<S>>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Next parseable client frame. `None` once the connection is closed.
    async fn next_frame(&mut self) -> Option<ClientMessage> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => match ClientMessage::from_json(&text) {
                    Ok(frame) => return Some(frame),
                    Err(e) => warn!("cannot decode frame ({}), ignored: {}", e, text),
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {} // pings, pongs, binary: not part of the protocol
                Err(e) => {
                    warn!("connection closed: {}", e);
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, frame: &ServerMessage) -> Result<(), SessionError> {
        let text = frame.to_json()?;
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Transport-level liveness probe.
    async fn ping(&mut self) -> Result<(), SessionError> {
        self.sink.send(Message::Ping(Vec::new())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

// =============================================================================
// SESSION LIFECYCLE
// =============================================================================

/// Drive one client connection from logon to teardown.
pub async fn run<S>(ws: WebSocketStream<S>, coord: Coordinators)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sink, stream) = ws.split();
    let mut conn = Connection { sink, stream };

    let Some(name) = logon(&mut conn).await else {
        return;
    };
    let (me, mut commands) = Participant::new(name, None);
    info!("user {} logged on", me);

    loop {
        let Some(them) = wait_for_opponent(&mut conn, &me, &mut commands, &coord).await else {
            break;
        };
        let Some(pairing) = me.pairing() else {
            warn!("{}: matched without a pairing", me);
            break;
        };
        if !play_game(&mut conn, &me, &them, &pairing.game, &mut commands, &coord).await {
            break;
        }
    }

    conn.close().await;
    info!("dropped {}", me);

    // Keep the participant resolvable while the judge drains whatever this
    // session submitted last.
    sleep(RETENTION_GRACE).await;
    me.mark_dropped();
    me.clear_pairing();
}

/// Logon state: wait for a non-empty name. `None` if the connection closed.
async fn logon<S>(conn: &mut Connection<S>) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        match conn.next_frame().await? {
            ClientMessage::Logon { name } if !name.is_empty() => {
                let stored = truncate_name(&name);
                if stored.len() < name.len() {
                    warn!("name \"{}\" too long, truncated to <= 16 bytes", name);
                }
                return Some(stored);
            }
            ClientMessage::Logon { .. } => {
                warn!("logon with empty name, ignored");
            }
            other => warn!("expecting \"logon\", ignored: {:?}", other),
        }
    }
}

/// One wake-up while waiting for an opponent.
enum WaitEvent {
    Frame(Option<ClientMessage>),
    Command(Option<SessionCommand>),
}

/// WaitOpponent state: announce ourselves to the matchmaker and wait for a
/// pair, answering livechecks and forwarding an optional bot request.
///
/// Returns the opponent, or `None` if the session should end.
async fn wait_for_opponent<S>(
    conn: &mut Connection<S>,
    me: &Arc<Participant>,
    commands: &mut UnboundedReceiver<SessionCommand>,
    coord: &Coordinators,
) -> Option<Arc<Participant>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // The client opens matchmaking with a standby.
    loop {
        match conn.next_frame().await? {
            ClientMessage::Standby => break,
            other => warn!("{}: expecting \"standby\", ignored: {:?}", me, other),
        }
    }

    coord
        .matchmaker
        .send(PairRequest {
            participant: me.clone(),
            want_bot: false,
        })
        .await
        .ok()?;

    // Listen for a bot request on the socket until a match arrives; the
    // select drops the in-flight read when the command wins, which is the
    // cancellation of the bot-request listener.
    let mut bot_requested = false;
    let mut reader_open = true;
    loop {
        let event = tokio::select! {
            frame = conn.next_frame(), if reader_open && !bot_requested => WaitEvent::Frame(frame),
            cmd = commands.recv() => WaitEvent::Command(cmd),
        };

        match event {
            WaitEvent::Frame(None) => {
                // EOF: stop polling the socket. The matchmaker's next
                // livecheck will reap us.
                reader_open = false;
            }
            WaitEvent::Frame(Some(ClientMessage::BotRequest)) => {
                bot_requested = true;
                coord
                    .matchmaker
                    .send(PairRequest {
                        participant: me.clone(),
                        want_bot: true,
                    })
                    .await
                    .ok()?;
            }
            WaitEvent::Frame(Some(other)) => {
                warn!("{}: expecting \"bot_request\", ignored: {:?}", me, other);
            }
            WaitEvent::Command(None) => return None,
            WaitEvent::Command(Some(SessionCommand::Livecheck)) => {
                let live = conn.ping().await.is_ok();
                coord
                    .livecheck
                    .send(LivecheckReply {
                        participant: me.clone(),
                        live,
                    })
                    .await
                    .ok()?;
                if !live {
                    warn!("{}: connection closed", me);
                    return None;
                }
            }
            WaitEvent::Command(Some(SessionCommand::Match { opponent })) => {
                return Some(opponent);
            }
            WaitEvent::Command(Some(cmd)) => {
                warn!("{}: expecting command \"match\", ignored \"{}\"", me, cmd.action());
            }
        }
    }
}

/// What the move wait produced.
enum MoveOutcome {
    Play(Gesture),
    Surrender,
    Quit,
    TimedOut,
    Closed,
}

/// Wait for this turn's move, with the surrender/quit interrupters and the
/// per-turn deadline. The deadline covers re-reads after garbage frames.
async fn read_move<S>(
    conn: &mut Connection<S>,
    me: &Arc<Participant>,
    expected_turn: usize,
) -> MoveOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let deadline = Instant::now() + MOVE_TIMEOUT;
    loop {
        let frame = match timeout_at(deadline, conn.next_frame()).await {
            Err(_) => {
                warn!("{}: move for turn {} timed out", me, expected_turn);
                return MoveOutcome::TimedOut;
            }
            Ok(None) => return MoveOutcome::Closed,
            Ok(Some(frame)) => frame,
        };

        match frame {
            ClientMessage::Move { turn, code } if turn == expected_turn => {
                return MoveOutcome::Play(Gesture::from_code(code));
            }
            ClientMessage::Move { turn, .. } => {
                warn!(
                    "{}: move for turn {} while expecting turn {}, ignored",
                    me, turn, expected_turn
                );
            }
            ClientMessage::Surrender => return MoveOutcome::Surrender,
            ClientMessage::Quit => return MoveOutcome::Quit,
            other => warn!("{}: expecting \"move\", ignored: {:?}", me, other),
        }
    }
}

/// PlayGame state: run one game to its end.
///
/// Returns `true` if the session may continue into another game, `false`
/// if it must end.
async fn play_game<S>(
    conn: &mut Connection<S>,
    me: &Arc<Participant>,
    them: &Arc<Participant>,
    game: &SharedGame,
    commands: &mut UnboundedReceiver<SessionCommand>,
    coord: &Coordinators,
) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Commence the game.
    let announce = ServerMessage::Match {
        opponent: them.name().to_string(),
    };
    if conn.send(&announce).await.is_err() {
        let _ = coord.judge.send((me.clone(), Submission::Leave));
        return false;
    }

    loop {
        let turn = game.lock().unwrap().turn_count();
        let submission = match read_move(conn, me, turn).await {
            MoveOutcome::Closed => {
                let _ = coord.judge.send((me.clone(), Submission::Leave));
                return false;
            }
            MoveOutcome::TimedOut => Submission::Play(Gesture::Pass),
            MoveOutcome::Quit => {
                info!("{} quit", me);
                let _ = coord.judge.send((me.clone(), Submission::Leave));
                conn.close().await;
                return false;
            }
            MoveOutcome::Surrender => {
                info!("{} surrendered to {}", me, them);
                let _ = coord.judge.send((me.clone(), Submission::Surrender));
                return true;
            }
            MoveOutcome::Play(gesture) => Submission::Play(gesture),
        };

        if coord.judge.send((me.clone(), submission)).is_err() {
            return false;
        }

        // Wait for the judge's verdict on this turn.
        let verdict = loop {
            match commands.recv().await {
                None => return false,
                Some(cmd @ (SessionCommand::Endturn | SessionCommand::Endgame)) => break cmd,
                Some(cmd) => {
                    warn!("{}: expecting command \"endturn\", ignored \"{}\"", me, cmd.action());
                }
            }
        };

        if matches!(verdict, SessionCommand::Endturn) {
            let (winner, opponent_move) = {
                let game = game.lock().unwrap();
                let Some(last) = game.last_turn() else {
                    warn!("{}: endturn before any turn was recorded", me);
                    return false;
                };
                let winner = match &last.winner {
                    Some(uid) if uid.as_str() == me.uid() => "me",
                    Some(_) => "them",
                    None => "",
                };
                let opponent_move = last
                    .gesture_of(them.uid())
                    .unwrap_or(Gesture::Pass)
                    .code();
                (winner.to_string(), opponent_move)
            };
            let frame = ServerMessage::Endturn {
                winner,
                opponent_move,
            };
            if conn.send(&frame).await.is_err() {
                let _ = coord.judge.send((me.clone(), Submission::Leave));
                return false;
            }
        }

        let decided = {
            let game = game.lock().unwrap();
            game.winner.clone().map(|uid| (uid, game.special))
        };
        if let Some((winner_uid, reason)) = decided {
            // Give clients a beat before the verdict lands.
            sleep(ENDGAME_PAUSE).await;
            let frame = ServerMessage::Endgame {
                winner: if winner_uid == me.uid() { "me" } else { "them" }.to_string(),
                reason,
            };
            // The game is already terminal: nobody is waiting on the judge,
            // so a failed send just ends the session.
            if conn.send(&frame).await.is_err() {
                return false;
            }
            me.clear_pairing();
            return true;
        }

        // Give clients time to show this round's result.
        sleep(TURN_PAUSE).await;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};
    use tokio_tungstenite::tungstenite::protocol::Role;

    use crate::coord;
    use crate::game::state::SpecialEnd;

    /// Virtual-time nudge: lets every ready task run before we continue.
    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    /// A scripted client on the far end of an in-memory WebSocket.
    struct TestClient {
        ws: WebSocketStream<DuplexStream>,
    }

    impl TestClient {
        /// Open a connection and spawn a real session task serving it.
        async fn connect(coord: &Coordinators) -> Self {
            let (server_io, client_io) = duplex(4096);
            let server_ws =
                WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
            let client_ws =
                WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
            tokio::spawn(run(server_ws, coord.clone()));
            Self { ws: client_ws }
        }

        async fn logon(coord: &Coordinators, name: &str) -> Self {
            let mut client = Self::connect(coord).await;
            client
                .send(&ClientMessage::Logon {
                    name: name.to_string(),
                })
                .await;
            client
        }

        async fn send(&mut self, msg: &ClientMessage) {
            self.ws
                .send(Message::Text(msg.to_json().unwrap()))
                .await
                .unwrap();
        }

        async fn send_raw(&mut self, text: &str) {
            self.ws.send(Message::Text(text.to_string())).await.unwrap();
        }

        async fn recv(&mut self) -> ServerMessage {
            loop {
                match self.ws.next().await.expect("connection open").expect("frame") {
                    Message::Text(text) => {
                        return ServerMessage::from_json(&text).expect("server frame")
                    }
                    _ => continue, // livecheck pings
                }
            }
        }

        async fn standby(&mut self) {
            self.send(&ClientMessage::Standby).await;
            settle().await;
        }

        async fn expect_match(&mut self) -> String {
            match self.recv().await {
                ServerMessage::Match { opponent } => opponent,
                other => panic!("expected match, got {:?}", other),
            }
        }

        async fn expect_endturn(&mut self) -> (String, i64) {
            match self.recv().await {
                ServerMessage::Endturn {
                    winner,
                    opponent_move,
                } => (winner, opponent_move),
                other => panic!("expected endturn, got {:?}", other),
            }
        }

        async fn expect_endgame(&mut self) -> (String, Option<SpecialEnd>) {
            match self.recv().await {
                ServerMessage::Endgame { winner, reason } => (winner, reason),
                other => panic!("expected endgame, got {:?}", other),
            }
        }
    }

    /// Log both clients on and pair them.
    async fn paired_clients(coord: &Coordinators) -> (TestClient, TestClient) {
        let mut a = TestClient::logon(coord, "A").await;
        a.standby().await;
        let mut b = TestClient::logon(coord, "B").await;
        b.standby().await;
        // The livecheck of A is answered by its session without any
        // client-side involvement; both sides now learn their opponent.
        assert_eq!(a.expect_match().await, "B");
        assert_eq!(b.expect_match().await, "A");
        (a, b)
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_win() {
        let coord = coord::spawn();
        let (mut a, mut b) = paired_clients(&coord).await;

        for turn in 0..10 {
            a.send(&ClientMessage::Move { turn, code: 0 }).await; // rock
            b.send(&ClientMessage::Move { turn, code: 2 }).await; // scissors
            let (winner_a, move_b) = a.expect_endturn().await;
            let (winner_b, move_a) = b.expect_endturn().await;
            assert_eq!(winner_a, "me");
            assert_eq!(winner_b, "them");
            assert_eq!(move_b, 2);
            assert_eq!(move_a, 0);
        }

        assert_eq!(a.expect_endgame().await, ("me".to_string(), None));
        assert_eq!(b.expect_endgame().await, ("them".to_string(), None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_surrender_mid_game() {
        let coord = coord::spawn();
        let (mut a, mut b) = paired_clients(&coord).await;

        a.send(&ClientMessage::Move { turn: 0, code: 0 }).await;
        b.send(&ClientMessage::Move { turn: 0, code: 2 }).await;
        a.expect_endturn().await;
        b.expect_endturn().await;

        // A gives up; B's side of the turn resolves by move deadline.
        a.send(&ClientMessage::Surrender).await;
        let (winner, reason) = b.expect_endgame().await;
        assert_eq!(winner, "me");
        assert_eq!(reason, Some(SpecialEnd::Surrender));

        // A may continue: standby again and take on a bot.
        a.standby().await;
        a.send(&ClientMessage::BotRequest).await;
        let opponent = a.expect_match().await;
        assert!(opponent.starts_with("BOT ("), "got opponent {:?}", opponent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_timeout_counts_as_pass() {
        let coord = coord::spawn();
        let (mut a, mut b) = paired_clients(&coord).await;

        // A stays silent on turn 0; B plays paper. The 10.5 s deadline
        // passes A automatically.
        b.send(&ClientMessage::Move { turn: 0, code: 1 }).await;
        let (winner_b, move_a) = b.expect_endturn().await;
        assert_eq!(winner_b, "me");
        assert_eq!(move_a, -1);

        let (winner_a, move_b) = a.expect_endturn().await;
        assert_eq!(winner_a, "them");
        assert_eq!(move_b, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_notifies_opponent() {
        let coord = coord::spawn();
        let (mut a, mut b) = paired_clients(&coord).await;

        a.send(&ClientMessage::Quit).await;
        // B's pending turn resolves by deadline and pairs with A's leave.
        let (winner, reason) = b.expect_endgame().await;
        assert_eq!(winner, "me");
        assert_eq!(reason, Some(SpecialEnd::Leave));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_game_runs_to_completion() {
        let coord = coord::spawn();
        let mut a = TestClient::logon(&coord, "A").await;
        a.standby().await;
        a.send(&ClientMessage::BotRequest).await;

        let opponent = a.expect_match().await;
        assert!(opponent.starts_with("BOT ("), "got opponent {:?}", opponent);

        // Mirror the server's scoring to know when the game must end.
        let (mut mine, mut theirs) = (0u32, 0u32);
        let mut turn = 0;
        loop {
            assert!(turn < 1000, "game did not converge");
            a.send(&ClientMessage::Move { turn, code: 0 }).await; // rock
            let (winner, opponent_move) = a.expect_endturn().await;
            assert!(
                (0..=2).contains(&opponent_move),
                "bot played illegal move {}",
                opponent_move
            );
            match winner.as_str() {
                "me" => mine += 1,
                "them" => theirs += 1,
                "" => {}
                other => panic!("unexpected winner tag {:?}", other),
            }
            turn += 1;

            if mine >= 10.max(theirs + 2) || theirs >= 10.max(mine + 2) {
                break;
            }
        }

        let (winner, reason) = a.expect_endgame().await;
        assert_eq!(winner, if mine > theirs { "me" } else { "them" });
        assert_eq!(reason, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silently_dead_waiter_is_reaped() {
        let coord = coord::spawn();
        let mut a = TestClient::logon(&coord, "A").await;
        a.standby().await;
        // A's link dies without a close handshake.
        drop(a);
        settle().await;

        let mut b = TestClient::logon(&coord, "B").await;
        b.standby().await;

        // The matchmaker pinged A, failed, and discarded it; B inherited
        // the waiting slot and pairs with the next arrival.
        let mut c = TestClient::logon(&coord, "C").await;
        c.standby().await;
        assert_eq!(b.expect_match().await, "C");
        assert_eq!(c.expect_match().await, "B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deuce_needs_two_point_lead() {
        let coord = coord::spawn();
        let (mut a, mut b) = paired_clients(&coord).await;

        let play = |a_code: i64, b_code: i64, turn: usize| {
            let msg_a = ClientMessage::Move {
                turn,
                code: a_code,
            };
            let msg_b = ClientMessage::Move {
                turn,
                code: b_code,
            };
            (msg_a, msg_b)
        };

        // Nine for A, nine for B.
        for turn in 0..9 {
            let (ma, mb) = play(0, 2, turn);
            a.send(&ma).await;
            b.send(&mb).await;
            a.expect_endturn().await;
            b.expect_endturn().await;
        }
        for turn in 9..18 {
            let (ma, mb) = play(2, 0, turn);
            a.send(&ma).await;
            b.send(&mb).await;
            a.expect_endturn().await;
            b.expect_endturn().await;
        }

        // 10-9 must not end the game: the next thing on the wire after
        // this endturn has to be another endturn, not an endgame.
        let (ma, mb) = play(0, 2, 18);
        a.send(&ma).await;
        b.send(&mb).await;
        assert_eq!(a.expect_endturn().await.0, "me");
        b.expect_endturn().await;

        let (ma, mb) = play(0, 2, 19);
        a.send(&ma).await;
        b.send(&mb).await;
        assert_eq!(a.expect_endturn().await.0, "me");
        b.expect_endturn().await;

        // 11-9: done.
        assert_eq!(a.expect_endgame().await, ("me".to_string(), None));
        assert_eq!(b.expect_endgame().await, ("them".to_string(), None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_frames_are_ignored() {
        let coord = coord::spawn();
        let mut a = TestClient::connect(&coord).await;

        a.send_raw("not json at all").await;
        a.send_raw(r#"{"action":"dance"}"#).await;
        a.send_raw(r#"{"action":"logon","name":""}"#).await;
        a.send(&ClientMessage::Logon {
            name: "A".to_string(),
        })
        .await;
        a.standby().await;

        let mut b = TestClient::logon(&coord, "B").await;
        b.standby().await;
        assert_eq!(a.expect_match().await, "B");
        assert_eq!(b.expect_match().await, "A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_name_is_truncated_on_logon() {
        let coord = coord::spawn();
        let mut a = TestClient::logon(&coord, "A").await;
        a.standby().await;
        let mut b = TestClient::logon(&coord, "BBBBBBBBBBBBBBBBBBBB").await;
        b.standby().await;

        assert_eq!(a.expect_match().await, "BBBBBBBBBBBBBBBB");
        assert_eq!(b.expect_match().await, "A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_turn_index_is_ignored() {
        let coord = coord::spawn();
        let (mut a, mut b) = paired_clients(&coord).await;

        // A stale move for turn 7 must not count for turn 0; A then
        // submits the real one.
        a.send(&ClientMessage::Move { turn: 7, code: 2 }).await;
        a.send(&ClientMessage::Move { turn: 0, code: 0 }).await;
        b.send(&ClientMessage::Move { turn: 0, code: 2 }).await;

        let (winner_a, move_b) = a.expect_endturn().await;
        assert_eq!(winner_a, "me");
        assert_eq!(move_b, 2);
        b.expect_endturn().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_move_code_degrades_to_pass() {
        let coord = coord::spawn();
        let (mut a, mut b) = paired_clients(&coord).await;

        a.send(&ClientMessage::Move { turn: 0, code: 9 }).await;
        b.send(&ClientMessage::Move { turn: 0, code: 0 }).await;

        let (winner_b, move_a) = b.expect_endturn().await;
        assert_eq!(winner_b, "me");
        assert_eq!(move_a, -1);
    }
}
