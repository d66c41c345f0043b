//! Canonical per-player board record.
//!
//! One `PlayerState` exists per player, keyed externally by player id. It is
//! mutated exclusively by applying engine outcomes; collaborators (UI, auth)
//! read `plan`, `previous_plan`, `message` and `is_finished` for display only.

use serde::{Deserialize, Serialize};

/// Highest square on the board.
pub const MAX_PLAN: u8 = 72;

/// The winning square (Cosmic Consciousness). Reached only by exact landing.
pub const FINAL_PLAN: u8 = 68;

/// Sixes in a row that trigger the rollback penalty.
pub const SIX_STREAK_LIMIT: u8 = 3;

/// The canonical board-position record for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Current square, 0-72. 0 means the player has not entered the board.
    pub plan: u8,
    /// Square held immediately before the last move.
    pub previous_plan: u8,
    /// True once the player has entered the board with an initial six.
    pub is_started: bool,
    /// True when square 68 was reached by exact landing; a six restarts play.
    pub is_finished: bool,
    /// Current run of consecutive sixes, reset on any non-six.
    pub consecutive_sixes: u8,
    /// Square held when the current run of sixes began; rollback target.
    pub position_before_three_sixes: u8,
    /// Set when the current square demands a written reflection before the
    /// next roll; always equal to `plan` while set.
    pub pending_report_plan: Option<u8>,
    /// Last status line surfaced to the client. Informational only.
    pub message: String,
    /// Optimistic-concurrency token; +1 per accepted mutation.
    pub version: u64,
}

impl PlayerState {
    /// Freshly-initialized record: off the board, nothing pending.
    pub fn new() -> Self {
        Self {
            plan: 0,
            previous_plan: 0,
            is_started: false,
            is_finished: false,
            consecutive_sixes: 0,
            position_before_three_sixes: 0,
            pending_report_plan: None,
            message: String::new(),
            version: 0,
        }
    }

    /// Whether a roll is currently blocked by an unsubmitted report.
    pub fn report_pending(&self) -> bool {
        self.pending_report_plan.is_some()
    }

    /// Check the record invariants. Used by tests and debug assertions.
    pub fn validate(&self) -> Result<(), String> {
        if self.plan > MAX_PLAN {
            return Err(format!("plan {} out of range", self.plan));
        }
        if self.consecutive_sixes >= SIX_STREAK_LIMIT {
            return Err(format!(
                "consecutive_sixes {} not reset",
                self.consecutive_sixes
            ));
        }
        if let Some(p) = self.pending_report_plan {
            if p != self.plan {
                return Err(format!(
                    "pending report plan {} does not match plan {}",
                    p, self.plan
                ));
            }
        }
        if self.is_finished && self.plan != FINAL_PLAN {
            return Err(format!("finished at plan {}", self.plan));
        }
        if self.is_finished && !self.is_started {
            return Err("finished but never started".to_string());
        }
        Ok(())
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}
