//! Player actions and the effects that result from them.
//!
//! `Action` is what a player submits; `Effect` is the human-readable
//! consequence the engine emits alongside the next state. The rendered final
//! effect of a move becomes `PlayerState::message`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// All actions the engine accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Action {
    /// Idempotent creation of the player record.
    Init,

    /// A die roll, face value 1-6.
    DiceRoll { value: u8 },

    /// A written reflection for the report gate on `plan`.
    ReportSubmit { plan: u8, content: String },
}

/// Consequences of applying an action, in the order they occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Effect {
    /// Player entered the board on an initial six.
    EnteredBoard,

    /// Not on the board yet and the roll was not a six. Legal no-op turn.
    MustRollSixToStart,

    /// Journey complete; only a six starts a new round.
    MustRollSixToRestart,

    /// Finished player rolled a six and begins again from square 1.
    RestartedJourney,

    /// Ordinary forward movement.
    Moved { from: u8, to: u8 },

    /// The roll would carry past the last square; the turn is forfeit.
    OvershootForfeit { plan: u8, value: u8 },

    /// Third six in a row: rolled back to where the streak began.
    ThreeSixesPenalty { returned_to: u8 },

    /// Exact landing on the final square.
    ReachedFinish,

    /// The landing square demands a reflection before the next roll.
    ReportRequired { plan: u8 },

    /// A matching reflection cleared the gate.
    ReportAccepted { plan: u8 },
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::EnteredBoard => write!(f, "You rolled a six and entered the board"),
            Effect::MustRollSixToStart => write!(f, "Roll a six to begin your journey"),
            Effect::MustRollSixToRestart => {
                write!(f, "Journey complete - roll a six to begin again")
            }
            Effect::RestartedJourney => write!(f, "A six! Your journey begins anew"),
            Effect::Moved { from, to } => write!(f, "Moved from plan {} to plan {}", from, to),
            Effect::OvershootForfeit { plan, value } => write!(
                f,
                "A roll of {} would carry past the last square - staying on plan {}",
                value, plan
            ),
            Effect::ThreeSixesPenalty { returned_to } => write!(
                f,
                "Three sixes in a row - returned to plan {}",
                returned_to
            ),
            Effect::ReachedFinish => write!(f, "Cosmic Consciousness reached!"),
            Effect::ReportRequired { plan } => write!(
                f,
                "Plan {} asks for a written reflection before your next roll",
                plan
            ),
            Effect::ReportAccepted { plan } => {
                write!(f, "Reflection for plan {} accepted", plan)
            }
        }
    }
}
