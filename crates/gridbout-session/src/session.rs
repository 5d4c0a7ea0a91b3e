//! The session actor: lifecycle state machine, liveness, and dispatch

use crate::config::SessionConfig;
use crate::hooks::GameHooks;
use crate::SessionError;
use gridbout_board::{BoardState, ClearedRow, RowMask};
use gridbout_network::{Connector, Link, Message, NetworkError};
use gridbout_state::{
    decode_full_sync, encode_full_sync, DeltaBatch, GarbageQueue, ScalarState, SyncDecision,
    SyncPolicy,
};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Clears of fewer rows than this are not attacks
const MIN_ATTACK_ROWS: usize = 2;

/// Connection lifecycle state, owned exclusively by the session actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingPeerReady,
    Ready,
    Active,
    /// Gameplay continues but pongs are late; reported as elevated
    /// latency, no protocol action
    Degraded,
    Reconnecting,
    /// Reconnection retries exhausted; requires manual return to menu
    Terminated,
}

/// Heartbeat bookkeeping, updated every heartbeat interval
#[derive(Debug, Default, Clone, Copy)]
pub struct Liveness {
    pub last_ping_sent: Option<Instant>,
    pub last_pong_received: Option<Instant>,
    pub rtt: Option<Duration>,
}

/// Local game events fed to the actor
enum Command {
    UpdateBoard { board: BoardState, scalars: ScalarState },
    LinesCleared { rows: Vec<ClearedRow> },
    SpawnBoundary,
    StartGame,
    Restart,
    GameOver,
    Shutdown,
}

/// What one turn of the actor loop woke up for
enum Event {
    Command(Option<Command>),
    Inbound(Result<Message, NetworkError>),
    Heartbeat,
    SyncTick,
}

/// Clone-able handle the game loop and UI use to talk to the actor.
/// Every call is fire-and-forget; the simulation never blocks on
/// network state.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Replace the actor's copy of the local board and scalars. Call
    /// after every simulation step that mutated them, and before
    /// reporting a clear that depends on the new contents.
    pub fn update_board(&self, board: BoardState, scalars: ScalarState) {
        let _ = self.commands.send(Command::UpdateBoard { board, scalars });
    }

    /// Report a line clear with the rows' pre-deletion contents and the
    /// triggering piece's columns
    pub fn lines_cleared(&self, rows: Vec<ClearedRow>) {
        let _ = self.commands.send(Command::LinesCleared { rows });
    }

    /// A new piece is about to spawn; pending garbage may inject now
    pub fn spawn_boundary(&self) {
        let _ = self.commands.send(Command::SpawnBoundary);
    }

    /// Begin gameplay once both peers are ready
    pub fn start_game(&self) {
        let _ = self.commands.send(Command::StartGame);
    }

    /// Reset protocol state for a fresh game on the same connection
    pub fn restart(&self) {
        let _ = self.commands.send(Command::Restart);
    }

    /// Tell the opponent this player topped out
    pub fn game_over(&self) {
        let _ = self.commands.send(Command::GameOver);
    }

    /// Stop the actor and close the link
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Current connection state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch connection state transitions
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }
}

/// Owns one peer connection and all protocol state attached to it
pub struct SessionManager {
    config: SessionConfig,
    connector: Box<dyn Connector>,
    hooks: Box<dyn GameHooks>,

    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<SessionState>,

    link: Option<Box<dyn Link>>,
    state: SessionState,
    liveness: Liveness,
    /// Baseline for pong silence until the first pong arrives
    gameplay_started_at: Option<Instant>,
    local_ready: bool,
    remote_ready: bool,

    policy: SyncPolicy,
    garbage: GarbageQueue,
    local_board: BoardState,
    local_scalars: ScalarState,
    remote_board: BoardState,
    remote_scalars: ScalarState,

    malformed_count: u64,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        connector: Box<dyn Connector>,
        hooks: Box<dyn GameHooks>,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        let manager = Self {
            policy: SyncPolicy::new(config.board_rows, config.board_cols, config.sync.clone()),
            garbage: GarbageQueue::new(config.board_rows, config.max_outstanding_garbage),
            local_board: BoardState::new(config.board_rows, config.board_cols),
            local_scalars: ScalarState::default(),
            remote_board: BoardState::new(config.board_rows, config.board_cols),
            remote_scalars: ScalarState::default(),
            config,
            connector,
            hooks,
            commands: command_rx,
            state_tx,
            link: None,
            state: SessionState::Disconnected,
            liveness: Liveness::default(),
            gameplay_started_at: None,
            local_ready: false,
            remote_ready: false,
            malformed_count: 0,
        };
        let handle = SessionHandle {
            commands: command_tx,
            state_rx,
        };
        (manager, handle)
    }

    /// Connect, handshake, and run the actor loop until shutdown or a
    /// terminal failure. Spawn this on the runtime and keep the
    /// [`SessionHandle`].
    pub async fn run(mut self) -> Result<(), SessionError> {
        self.set_state(SessionState::Connecting);
        match self.connector.connect().await {
            Ok(link) => self.link = Some(link),
            Err(e) => {
                warn!(error = %e, "initial connection failed");
                self.set_state(SessionState::Terminated);
                self.hooks.on_connection_lost();
                return Err(e.into());
            }
        }

        self.send_message(&Message::PlayerReady).await;
        self.local_ready = true;
        self.set_state(SessionState::AwaitingPeerReady);

        let mut heartbeat = time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sync_tick = time::interval(self.config.sync_interval);
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                cmd = self.commands.recv() => Event::Command(cmd),
                msg = recv_next(&mut self.link) => Event::Inbound(msg),
                _ = heartbeat.tick() => Event::Heartbeat,
                _ = sync_tick.tick() => Event::SyncTick,
            };

            match event {
                Event::Command(None) | Event::Command(Some(Command::Shutdown)) => break,
                Event::Command(Some(cmd)) => self.handle_command(cmd).await,
                Event::Inbound(Ok(msg)) => self.handle_message(msg).await,
                Event::Inbound(Err(e)) => self.on_link_error(e),
                Event::Heartbeat => self.on_heartbeat_tick().await,
                Event::SyncTick => self.on_sync_tick().await,
            }

            // Reconnection runs on the actor loop itself, so a second
            // trigger while one is in progress cannot occur
            if self.state == SessionState::Reconnecting {
                self.run_reconnect().await;
            }
            if self.state == SessionState::Terminated {
                break;
            }
        }

        // The loop owns the heartbeat and sync timers, so both are gone
        // before the link closes
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        Ok(())
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        info!(from = ?self.state, to = ?next, "session state");
        self.state = next;
        let _ = self.state_tx.send(next);
        self.hooks.on_session_state(next);
    }

    async fn send_message(&mut self, msg: &Message) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if let Err(e) = link.send(msg).await {
            // Treated as the start of a connection loss; the liveness
            // check escalates if pongs stay absent
            warn!(error = %e, "send failed");
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::UpdateBoard { board, scalars } => {
                if board.rows() != self.config.board_rows || board.cols() != self.config.board_cols
                {
                    warn!(
                        rows = board.rows(),
                        cols = board.cols(),
                        "ignoring board update with wrong dimensions"
                    );
                    return;
                }
                self.local_board = board;
                let incoming = self.local_scalars.incoming_garbage;
                self.local_scalars = scalars;
                self.local_scalars.incoming_garbage = incoming;
            }
            Command::LinesCleared { rows } => self.on_lines_cleared(rows).await,
            Command::SpawnBoundary => self.on_spawn_boundary().await,
            Command::StartGame => {
                if self.state != SessionState::Ready {
                    warn!(state = ?self.state, "start requested before both peers ready");
                    return;
                }
                self.gameplay_started_at = Some(Instant::now());
                self.set_state(SessionState::Active);
                self.send_immediate_sync().await;
            }
            Command::Restart => {
                self.local_board.clear();
                self.local_scalars = ScalarState::default();
                self.policy.reset();
                self.garbage.reset();
                self.hooks.on_garbage_queue_changed(0);
            }
            Command::GameOver => self.send_message(&Message::GameOver).await,
            Command::Shutdown => {}
        }
    }

    /// Reconcile garbage flags with the clear, then convert multi-row
    /// clears into an attack and resync immediately
    async fn on_lines_cleared(&mut self, rows: Vec<ClearedRow>) {
        let indices: Vec<u8> = rows.iter().map(|r| r.index).collect();
        self.garbage.on_rows_cleared(&indices);
        self.local_scalars.incoming_garbage = self.garbage.pending_count() as u32;

        if rows.len() >= MIN_ATTACK_ROWS {
            let masks: Vec<RowMask> = rows.iter().map(ClearedRow::mask).collect();
            debug!(count = masks.len(), "sending line attack");
            self.send_message(&Message::LineAttack { masks }).await;
        }

        self.send_immediate_sync().await;
    }

    /// Spawn boundary: the only point where queued garbage may land
    async fn on_spawn_boundary(&mut self) {
        let injected = self.garbage.apply_pending(&mut self.local_board);
        self.local_scalars.incoming_garbage = self.garbage.pending_count() as u32;
        if injected == 0 {
            return;
        }
        self.hooks.apply_injected_board(&self.local_board);
        self.hooks
            .on_garbage_queue_changed(self.garbage.pending_count());
        self.send_immediate_sync().await;
    }

    async fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::PlayerReady => {
                self.remote_ready = true;
                if self.state == SessionState::AwaitingPeerReady && self.local_ready {
                    self.set_state(SessionState::Ready);
                }
            }
            Message::Ping { timestamp_micros } => {
                self.send_message(&Message::Pong { timestamp_micros }).await;
            }
            Message::Pong { timestamp_micros } => self.on_pong(timestamp_micros),
            Message::BoardDelta(batch) => self.apply_remote_batch(&batch),
            Message::BoardDeltaCompressed(compressed) => {
                self.apply_remote_batch(&compressed.decompress());
            }
            Message::BoardFullSync { payload } => match decode_full_sync(&payload) {
                Ok(batch) => self.apply_remote_batch(&batch),
                Err(e) => self.count_malformed(&e.to_string()),
            },
            Message::LineAttack { masks } => {
                let pending = self.garbage.enqueue(masks);
                self.local_scalars.incoming_garbage = pending as u32;
                self.hooks.on_garbage_queue_changed(pending);
            }
            Message::GameOver => self.hooks.on_peer_game_over(),
        }
    }

    /// Apply a batch to the remote mirror; commit only if the whole
    /// batch is valid
    fn apply_remote_batch(&mut self, batch: &DeltaBatch) {
        let mut board = self.remote_board.clone();
        let mut scalars = self.remote_scalars;
        match batch.apply(&mut board, &mut scalars) {
            Ok(()) => {
                self.remote_board = board;
                self.remote_scalars = scalars;
                self.hooks
                    .apply_remote_board(&self.remote_board, &self.remote_scalars);
            }
            Err(e) => self.count_malformed(&e.to_string()),
        }
    }

    fn count_malformed(&mut self, reason: &str) {
        self.malformed_count += 1;
        warn!(reason, total = self.malformed_count, "ignoring malformed message");
    }

    fn on_pong(&mut self, echoed_micros: u64) {
        let rtt = Duration::from_micros(Message::timestamp_now().saturating_sub(echoed_micros));
        self.liveness.last_pong_received = Some(Instant::now());
        self.liveness.rtt = Some(rtt);

        let laggy = rtt >= self.config.lag_threshold;
        self.hooks.on_rtt(rtt, laggy);

        if self.state == SessionState::Degraded {
            self.set_state(SessionState::Active);
        }
    }

    async fn on_heartbeat_tick(&mut self) {
        let now = Instant::now();
        if matches!(self.state, SessionState::Active | SessionState::Degraded) {
            self.liveness.last_ping_sent = Some(now);
            self.send_message(&Message::Ping {
                timestamp_micros: Message::timestamp_now(),
            })
            .await;
        }
        self.check_liveness(now);
    }

    /// Evaluate pong silence against the lag and disconnect thresholds.
    /// Only meaningful once gameplay has started; a stalled peer before
    /// that is "waiting", not a disconnect.
    fn check_liveness(&mut self, now: Instant) {
        if !matches!(self.state, SessionState::Active | SessionState::Degraded) {
            return;
        }
        let Some(base) = self.liveness.last_pong_received.or(self.gameplay_started_at) else {
            return;
        };
        let silence = now.duration_since(base);

        if silence >= self.config.disconnect_threshold {
            warn!(?silence, "no pong within disconnect threshold");
            self.set_state(SessionState::Reconnecting);
        } else if silence > self.config.lag_threshold {
            if self.state == SessionState::Active {
                warn!(?silence, "no pong within lag threshold");
                self.set_state(SessionState::Degraded);
            }
        }
    }

    async fn on_sync_tick(&mut self) {
        if !matches!(self.state, SessionState::Active | SessionState::Degraded) {
            return;
        }
        match self.policy.tick(&self.local_board, &self.local_scalars) {
            Ok(SyncDecision::Skip) => {}
            Ok(SyncDecision::Delta(batch)) => {
                self.send_message(&Message::BoardDelta(batch)).await;
            }
            Ok(SyncDecision::Compressed(compressed)) => {
                self.send_message(&Message::BoardDeltaCompressed(compressed))
                    .await;
            }
            Ok(SyncDecision::FullSync(batch)) => self.send_full_sync(batch).await,
            Err(e) => warn!(error = %e, "sync tick failed"),
        }
    }

    async fn send_immediate_sync(&mut self) {
        let batch = self
            .policy
            .send_immediate(&self.local_board, &self.local_scalars);
        self.send_full_sync(batch).await;
    }

    async fn send_full_sync(&mut self, batch: DeltaBatch) {
        match encode_full_sync(&batch) {
            Ok(payload) => self.send_message(&Message::BoardFullSync { payload }).await,
            Err(e) => warn!(error = %e, "failed to encode full sync"),
        }
    }

    fn on_link_error(&mut self, err: NetworkError) {
        warn!(error = %err, "link error");
        self.link = None;
        if matches!(self.state, SessionState::Active | SessionState::Degraded) {
            self.set_state(SessionState::Reconnecting);
        }
    }

    /// Bounded-retry reconnection with fixed backoff. On success the
    /// tracker and the attack queue are forced to a known state so
    /// post-reconnect deltas are computed against reality rather than
    /// pre-disconnect assumptions.
    async fn run_reconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }

        for attempt in 1..=self.config.reconnect_attempts {
            info!(attempt, max = self.config.reconnect_attempts, "reconnecting");
            time::sleep(self.config.reconnect_backoff).await;

            match self.connector.connect().await {
                Ok(mut link) => {
                    if let Err(e) = link.send(&Message::PlayerReady).await {
                        warn!(attempt, error = %e, "handshake resend failed");
                        continue;
                    }
                    self.link = Some(link);

                    self.policy
                        .force_update(&self.local_board, &self.local_scalars);
                    self.garbage.reset();
                    self.local_scalars.incoming_garbage = 0;
                    self.hooks.on_garbage_queue_changed(0);

                    self.liveness = Liveness::default();
                    self.gameplay_started_at = Some(Instant::now());
                    self.set_state(SessionState::Active);
                    self.send_immediate_sync().await;
                    return;
                }
                Err(e) => warn!(attempt, error = %e, "reconnect attempt failed"),
            }
        }

        self.set_state(SessionState::Terminated);
        self.hooks.on_connection_lost();
    }

    /// Heartbeat bookkeeping, for diagnostics
    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    /// Malformed or unknown inbound messages absorbed so far
    pub fn malformed_count(&self) -> u64 {
        self.malformed_count
    }
}

/// Next inbound message, or pending forever while no link is up
async fn recv_next(link: &mut Option<Box<dyn Link>>) -> Result<Message, NetworkError> {
    match link.as_mut() {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}
