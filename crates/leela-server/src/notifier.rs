//! Outbound state notification.
//!
//! Publishing is fire-and-forget: a failed or missing subscriber never rolls
//! back a state write, so notification is at-least-once from the client's
//! point of view (the state itself is versioned and idempotent to re-read).

use leela_core::{Effect, PlayerState};
use tokio::sync::broadcast;
use tracing::debug;

/// A published state change.
#[derive(Debug, Clone)]
pub struct StateNotification {
    pub player_id: String,
    pub state: PlayerState,
    pub effects: Vec<Effect>,
}

/// Push a resulting state to any live subscriber.
pub trait Notifier: Send + Sync {
    fn publish(&self, player_id: &str, state: &PlayerState, effects: &[Effect]);
}

/// Notifier over a tokio broadcast channel; the WebSocket layer subscribes
/// and fans out to connected clients.
#[derive(Debug)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<StateNotification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateNotification> {
        self.sender.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, player_id: &str, state: &PlayerState, effects: &[Effect]) {
        let notification = StateNotification {
            player_id: player_id.to_string(),
            state: state.clone(),
            effects: effects.to_vec(),
        };
        // Send fails only when nobody is subscribed; that is fine.
        if self.sender.send(notification).is_err() {
            debug!(player_id, "no live subscribers for state update");
        }
    }
}

/// Test double that records every publish.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    published: std::sync::Mutex<Vec<StateNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<StateNotification> {
        self.published.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn publish(&self, player_id: &str, state: &PlayerState, effects: &[Effect]) {
        self.published.lock().unwrap().push(StateNotification {
            player_id: player_id.to_string(),
            state: state.clone(),
            effects: effects.to_vec(),
        });
    }
}
