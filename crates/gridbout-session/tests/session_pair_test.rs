//! End-to-end tests: two session actors over in-memory links

use gridbout_board::{BoardState, CellColor, ClearedRow, RowMask};
use gridbout_network::{Link, Message};
use gridbout_session::{GameHooks, SessionConfig, SessionHandle, SessionManager, SessionState};
use gridbout_state::ScalarState;
use gridbout_test_utils::{link_pair, ScriptedConnector};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Debug)]
enum HookEvent {
    RemoteBoard(BoardState, ScalarState),
    Injected(BoardState),
    QueueLen(usize),
    Rtt,
    PeerGameOver,
    ConnectionLost,
}

struct RecordingHooks {
    events: mpsc::UnboundedSender<HookEvent>,
}

impl GameHooks for RecordingHooks {
    fn apply_remote_board(&mut self, board: &BoardState, scalars: &ScalarState) {
        let _ = self
            .events
            .send(HookEvent::RemoteBoard(board.clone(), *scalars));
    }

    fn apply_injected_board(&mut self, board: &BoardState) {
        let _ = self.events.send(HookEvent::Injected(board.clone()));
    }

    fn on_garbage_queue_changed(&mut self, pending: usize) {
        let _ = self.events.send(HookEvent::QueueLen(pending));
    }

    fn on_rtt(&mut self, _rtt: Duration, _laggy: bool) {
        let _ = self.events.send(HookEvent::Rtt);
    }

    fn on_peer_game_over(&mut self) {
        let _ = self.events.send(HookEvent::PeerGameOver);
    }

    fn on_connection_lost(&mut self) {
        let _ = self.events.send(HookEvent::ConnectionLost);
    }
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        heartbeat_interval: Duration::from_millis(100),
        sync_interval: Duration::from_millis(20),
        ..SessionConfig::default()
    }
}

fn spawn_session(
    config: SessionConfig,
    link: gridbout_test_utils::MemoryLink,
) -> (SessionHandle, mpsc::UnboundedReceiver<HookEvent>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (manager, handle) = SessionManager::new(
        config,
        Box::new(ScriptedConnector::new([link])),
        Box::new(RecordingHooks { events: events_tx }),
    );
    tokio::spawn(manager.run());
    (handle, events_rx)
}

async fn wait_for_state(handle: &SessionHandle, want: SessionState) {
    let mut rx = handle.state_changes();
    timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want:?}"))
        .expect("session actor died");
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<HookEvent>) -> HookEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for hook event")
        .expect("hook channel closed")
}

#[tokio::test]
async fn handshake_reaches_ready_on_both_sides() {
    let (a, b) = link_pair();
    let (handle_a, _events_a) = spawn_session(fast_config(), a);
    let (handle_b, _events_b) = spawn_session(fast_config(), b);

    wait_for_state(&handle_a, SessionState::Ready).await;
    wait_for_state(&handle_b, SessionState::Ready).await;
}

#[tokio::test]
async fn board_changes_propagate_to_the_peer_mirror() {
    let (a, b) = link_pair();
    let (handle_a, _events_a) = spawn_session(fast_config(), a);
    let (handle_b, mut events_b) = spawn_session(fast_config(), b);

    wait_for_state(&handle_a, SessionState::Ready).await;
    wait_for_state(&handle_b, SessionState::Ready).await;
    handle_a.start_game();
    handle_b.start_game();
    wait_for_state(&handle_a, SessionState::Active).await;
    wait_for_state(&handle_b, SessionState::Active).await;

    let mut board = BoardState::standard();
    for x in 0..4 {
        board.set(x, 19, Some(CellColor(0xAA00FFFF)));
    }
    let scalars = ScalarState {
        score: 300,
        level: 1,
        incoming_garbage: 0,
    };
    handle_a.update_board(board.clone(), scalars);

    // B's hooks converge on A's board, whatever mix of full syncs and
    // deltas carried it over
    loop {
        if let HookEvent::RemoteBoard(remote, remote_scalars) = next_event(&mut events_b).await {
            if remote == board {
                assert_eq!(remote_scalars.score, 300);
                assert_eq!(remote_scalars.level, 1);
                break;
            }
        }
    }
}

#[tokio::test]
async fn double_clear_attacks_and_injects_at_spawn_boundary() {
    let (a, b) = link_pair();
    let (handle_a, _events_a) = spawn_session(fast_config(), a);
    let (handle_b, mut events_b) = spawn_session(fast_config(), b);

    wait_for_state(&handle_a, SessionState::Ready).await;
    wait_for_state(&handle_b, SessionState::Ready).await;
    handle_a.start_game();
    handle_b.start_game();
    wait_for_state(&handle_a, SessionState::Active).await;
    wait_for_state(&handle_b, SessionState::Active).await;

    // A clears two rows; residue masks exclude the piece's columns
    let c = Some(CellColor(0x00CC00FF));
    let rows = vec![
        ClearedRow {
            index: 18,
            cells: vec![c, c, None, None, None, None, None, None, None, None],
            piece_columns: vec![],
        },
        ClearedRow {
            index: 19,
            cells: vec![None, c, None, c, None, None, None, None, None, None],
            piece_columns: vec![],
        },
    ];
    handle_a.lines_cleared(rows);

    // B learns two masks are pending
    loop {
        if let HookEvent::QueueLen(2) = next_event(&mut events_b).await {
            break;
        }
    }

    // Injection happens only at B's spawn boundary
    handle_b.spawn_boundary();
    let injected = loop {
        if let HookEvent::Injected(board) = next_event(&mut events_b).await {
            break board;
        }
    };

    assert_eq!(
        RowMask::from_cleared_row(injected.row(18), &[]),
        RowMask(0b0000000011)
    );
    assert_eq!(
        RowMask::from_cleared_row(injected.row(19), &[]),
        RowMask(0b0000001010)
    );
}

#[tokio::test]
async fn game_over_reaches_the_peer() {
    let (a, b) = link_pair();
    let (handle_a, _events_a) = spawn_session(fast_config(), a);
    let (handle_b, mut events_b) = spawn_session(fast_config(), b);

    wait_for_state(&handle_a, SessionState::Ready).await;
    wait_for_state(&handle_b, SessionState::Ready).await;

    handle_a.game_over();

    loop {
        if let HookEvent::PeerGameOver = next_event(&mut events_b).await {
            break;
        }
    }
}

#[tokio::test]
async fn pong_silence_exhausts_reconnects_and_terminates() {
    let (a, mut b) = link_pair();
    let blackhole = a.blackhole_switch();

    let config = SessionConfig {
        heartbeat_interval: Duration::from_millis(30),
        lag_threshold: Duration::from_millis(60),
        disconnect_threshold: Duration::from_millis(150),
        reconnect_attempts: 2,
        reconnect_backoff: Duration::from_millis(20),
        sync_interval: Duration::from_millis(25),
        ..SessionConfig::default()
    };
    let (handle, mut events) = spawn_session(config, a);

    // A scripted peer that answers the handshake and every ping, until
    // the line goes dark
    tokio::spawn(async move {
        while let Ok(msg) = b.recv().await {
            match msg {
                Message::PlayerReady => {
                    let _ = b.send(&Message::PlayerReady).await;
                }
                Message::Ping { timestamp_micros } => {
                    let _ = b.send(&Message::Pong { timestamp_micros }).await;
                }
                _ => {}
            }
        }
    });

    wait_for_state(&handle, SessionState::Ready).await;
    handle.start_game();
    wait_for_state(&handle, SessionState::Active).await;

    // Healthy heartbeat first: at least one RTT sample comes back
    loop {
        if let HookEvent::Rtt = next_event(&mut events).await {
            break;
        }
    }

    // Outbound frames now vanish; pongs stop, and with no spare link in
    // the connector, every retry fails
    blackhole.store(true, std::sync::atomic::Ordering::Relaxed);

    wait_for_state(&handle, SessionState::Terminated).await;
    loop {
        if let HookEvent::ConnectionLost = next_event(&mut events).await {
            break;
        }
    }
}
