//! Leela - the 72-square spiritual board game progression engine.
//!
//! This crate provides the deterministic core of the game:
//! - The canonical per-player board record
//! - The action/effect vocabulary
//! - The board with plan metadata and report gates
//! - The pure rule engine (entry gating, movement, the three-sixes penalty,
//!   finish detection, report gating)
//!
//! # Architecture
//!
//! The engine is a pure function over explicit state: it performs no I/O and
//! never consults a clock or RNG, so an action can be replayed against the
//! same state any number of times with an identical result. Persistence,
//! event delivery and notification live in `leela-server`.
//!
//! # Modules
//!
//! - [`state`]: the canonical `PlayerState` record
//! - [`actions`]: player actions and their effects
//! - [`board`]: plan metadata and the report-gate table
//! - [`engine`]: the rule engine

pub mod actions;
pub mod board;
pub mod engine;
pub mod state;

// Re-export commonly used types
pub use actions::{Action, Effect};
pub use board::{Board, PlanInfo};
pub use engine::{Engine, Outcome, RuleError};
pub use state::{PlayerState, FINAL_PLAN, MAX_PLAN, SIX_STREAK_LIMIT};
