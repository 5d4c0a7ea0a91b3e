//! Callbacks into the collaborating game and UI
//!
//! The session calls these; they never call back into protocol state.
//! Everything is a read-only notification from the game's point of view
//! except the two board handovers, which carry the authoritative state
//! the game should adopt.

use crate::session::SessionState;
use gridbout_board::BoardState;
use gridbout_state::ScalarState;
use std::time::Duration;

/// Implemented by the local game engine / UI layer. All methods default
/// to no-ops so collaborators override only what they render.
pub trait GameHooks: Send {
    /// The opponent's board changed; redraw the opponent view
    fn apply_remote_board(&mut self, _board: &BoardState, _scalars: &ScalarState) {}

    /// Pending garbage was injected into the local board at a spawn
    /// boundary; the game must adopt this snapshot before spawning
    fn apply_injected_board(&mut self, _board: &BoardState) {}

    /// The pending-garbage queue length changed (warning indicator)
    fn on_garbage_queue_changed(&mut self, _pending: usize) {}

    /// Connection state transition
    fn on_session_state(&mut self, _state: SessionState) {}

    /// A heartbeat round trip completed
    fn on_rtt(&mut self, _rtt: Duration, _laggy: bool) {}

    /// The opponent's game ended
    fn on_peer_game_over(&mut self) {}

    /// Reconnection retries are exhausted; the session is over and the
    /// user must return to the menu
    fn on_connection_lost(&mut self) {}
}

/// Hooks that ignore every notification
pub struct NullHooks;

impl GameHooks for NullHooks {}
