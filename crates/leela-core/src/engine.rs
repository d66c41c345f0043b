//! The progression rule engine.
//!
//! `Engine::apply` is a pure function from (state, action) to the next state
//! plus its effects. It performs no I/O and never consults a clock or RNG, so
//! replaying an action against the same state always yields the same outcome.
//! Dice values arrive already rolled; rolling happens at the transport edge.

use crate::actions::{Action, Effect};
use crate::board::Board;
use crate::state::{PlayerState, FINAL_PLAN, MAX_PLAN, SIX_STREAK_LIMIT};
use thiserror::Error;

/// Errors from applying an action.
///
/// Domain rejections (`ReportRequired`, `NoPendingReport`) are legal game
/// outcomes: the caller acknowledges the event, writes nothing, and surfaces
/// the message. The remaining variants are malformed input and permanent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("a reflection for plan {0} must be submitted before rolling")]
    ReportRequired(u8),

    #[error("no reflection is pending for plan {0}")]
    NoPendingReport(u8),

    #[error("dice value {0} is outside 1-6")]
    InvalidDiceValue(u8),

    #[error("reflection content must not be empty")]
    EmptyReport,
}

impl RuleError {
    /// Rejections that are ordinary game outcomes rather than failures.
    /// Acknowledged upstream, never retried, no state written.
    pub fn is_domain_rejection(&self) -> bool {
        matches!(
            self,
            RuleError::ReportRequired(_) | RuleError::NoPendingReport(_)
        )
    }
}

/// The next state together with what happened, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub state: PlayerState,
    pub effects: Vec<Effect>,
}

/// Pure rule engine over a fixed board.
#[derive(Debug, Clone)]
pub struct Engine {
    board: Board,
}

impl Engine {
    pub fn new(board: Board) -> Self {
        Self { board }
    }

    /// Engine over the classic 72-square board.
    pub fn standard() -> Self {
        Self::new(Board::standard())
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Apply `action` to `state`, producing the next state and its effects.
    ///
    /// The returned state's `version` is already incremented; the caller is
    /// expected to persist it with a compare-and-swap against the version it
    /// loaded.
    pub fn apply(&self, state: &PlayerState, action: &Action) -> Result<Outcome, RuleError> {
        match action {
            Action::Init => Ok(Outcome {
                state: state.clone(),
                effects: Vec::new(),
            }),
            Action::DiceRoll { value } => self.apply_roll(state, *value),
            Action::ReportSubmit { plan, content } => self.apply_report(state, *plan, content),
        }
    }

    fn apply_roll(&self, state: &PlayerState, value: u8) -> Result<Outcome, RuleError> {
        if !(1..=6).contains(&value) {
            return Err(RuleError::InvalidDiceValue(value));
        }
        if let Some(plan) = state.pending_report_plan {
            return Err(RuleError::ReportRequired(plan));
        }

        let mut next = state.clone();
        next.version += 1;
        let mut effects = Vec::new();

        if !state.is_started {
            // Entry gate: only a six puts the player on the board. The
            // entering six does not count toward the streak.
            if value == 6 {
                next.is_started = true;
                next.previous_plan = 0;
                next.plan = 1;
                effects.push(Effect::EnteredBoard);
                self.arm_report_gate(&mut next, &mut effects);
            } else {
                effects.push(Effect::MustRollSixToStart);
            }
            return Ok(finalize(next, effects));
        }

        if state.is_finished {
            // Same six-to-restart rule after reaching the finish.
            if value == 6 {
                next.is_finished = false;
                next.previous_plan = state.plan;
                next.plan = 1;
                next.consecutive_sixes = 0;
                effects.push(Effect::RestartedJourney);
                self.arm_report_gate(&mut next, &mut effects);
            } else {
                effects.push(Effect::MustRollSixToRestart);
            }
            return Ok(finalize(next, effects));
        }

        if value == 6 {
            if next.consecutive_sixes == 0 {
                next.position_before_three_sixes = state.plan;
            }
            next.consecutive_sixes += 1;
            if next.consecutive_sixes == SIX_STREAK_LIMIT {
                // The penalty consumes the triggering roll: roll back to
                // where the streak began, no movement for this six. The
                // rollback square was already visited, so the report gate is
                // not re-armed.
                next.previous_plan = state.plan;
                next.plan = next.position_before_three_sixes;
                next.consecutive_sixes = 0;
                effects.push(Effect::ThreeSixesPenalty {
                    returned_to: next.plan,
                });
                return Ok(finalize(next, effects));
            }
        } else {
            next.consecutive_sixes = 0;
        }

        let candidate = state.plan + value;
        if candidate > MAX_PLAN {
            // Must land on or before the last square; overshoot voids the
            // roll (the six, if it was one, still counted above).
            effects.push(Effect::OvershootForfeit {
                plan: state.plan,
                value,
            });
            return Ok(finalize(next, effects));
        }

        next.previous_plan = state.plan;
        next.plan = candidate;
        effects.push(Effect::Moved {
            from: state.plan,
            to: candidate,
        });
        if candidate == FINAL_PLAN {
            next.is_finished = true;
            effects.push(Effect::ReachedFinish);
        }
        self.arm_report_gate(&mut next, &mut effects);

        Ok(finalize(next, effects))
    }

    fn apply_report(
        &self,
        state: &PlayerState,
        plan: u8,
        content: &str,
    ) -> Result<Outcome, RuleError> {
        if content.trim().is_empty() {
            return Err(RuleError::EmptyReport);
        }
        match state.pending_report_plan {
            Some(pending) if pending == plan => {
                let mut next = state.clone();
                next.version += 1;
                next.pending_report_plan = None;
                let effects = vec![Effect::ReportAccepted { plan }];
                Ok(finalize(next, effects))
            }
            _ => Err(RuleError::NoPendingReport(plan)),
        }
    }

    fn arm_report_gate(&self, next: &mut PlayerState, effects: &mut Vec<Effect>) {
        if self.board.requires_report(next.plan) {
            next.pending_report_plan = Some(next.plan);
            effects.push(Effect::ReportRequired { plan: next.plan });
        }
    }
}

/// Stamp the last effect into the status message.
fn finalize(mut state: PlayerState, effects: Vec<Effect>) -> Outcome {
    if let Some(last) = effects.last() {
        state.message = last.to_string();
    }
    Outcome { state, effects }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::PlanInfo;
    use pretty_assertions::assert_eq;

    fn engine() -> Engine {
        Engine::standard()
    }

    /// A started state standing on `plan`, version 1.
    fn on_plan(plan: u8) -> PlayerState {
        let mut state = PlayerState::new();
        state.is_started = true;
        state.plan = plan;
        state.previous_plan = plan.saturating_sub(1);
        state.version = 1;
        state
    }

    fn roll(engine: &Engine, state: &PlayerState, value: u8) -> Outcome {
        engine
            .apply(state, &Action::DiceRoll { value })
            .expect("roll should be accepted")
    }

    #[test]
    fn test_must_roll_six_to_enter() {
        let engine = engine();
        let state = PlayerState::new();

        for value in 1..=5 {
            let outcome = roll(&engine, &state, value);
            assert_eq!(outcome.state.plan, 0);
            assert!(!outcome.state.is_started);
            assert_eq!(outcome.effects, vec![Effect::MustRollSixToStart]);
            assert_eq!(outcome.state.version, state.version + 1);
        }

        let outcome = roll(&engine, &state, 6);
        assert!(outcome.state.is_started);
        assert_eq!(outcome.state.plan, 1);
        assert_eq!(outcome.state.previous_plan, 0);
        assert_eq!(outcome.effects, vec![Effect::EnteredBoard]);
    }

    #[test]
    fn test_entering_six_does_not_count_toward_streak() {
        let engine = engine();
        let outcome = roll(&engine, &PlayerState::new(), 6);
        assert_eq!(outcome.state.consecutive_sixes, 0);
    }

    #[test]
    fn test_normal_move_advances_and_tracks_previous_plan() {
        let engine = engine();
        let outcome = roll(&engine, &on_plan(1), 4);
        assert_eq!(outcome.state.plan, 5);
        assert_eq!(outcome.state.previous_plan, 1);
        assert_eq!(outcome.effects, vec![Effect::Moved { from: 1, to: 5 }]);
        assert!(outcome.state.validate().is_ok());
    }

    #[test]
    fn test_non_six_resets_streak() {
        let engine = engine();
        let mut state = on_plan(20);
        state.consecutive_sixes = 2;
        state.position_before_three_sixes = 8;

        let outcome = roll(&engine, &state, 3);
        assert_eq!(outcome.state.consecutive_sixes, 0);
        assert_eq!(outcome.state.plan, 23);
    }

    #[test]
    fn test_three_sixes_roll_back_to_streak_start() {
        let engine = engine();
        let mut state = on_plan(20);

        let first = roll(&engine, &state, 6);
        assert_eq!(first.state.plan, 26);
        assert_eq!(first.state.consecutive_sixes, 1);
        assert_eq!(first.state.position_before_three_sixes, 20);

        state = first.state;
        let second = roll(&engine, &state, 6);
        assert_eq!(second.state.plan, 32);
        assert_eq!(second.state.consecutive_sixes, 2);

        state = second.state;
        let third = roll(&engine, &state, 6);
        assert_eq!(third.state.plan, 20, "rolled back to streak start");
        assert_eq!(third.state.previous_plan, 32);
        assert_eq!(third.state.consecutive_sixes, 0);
        assert_eq!(
            third.effects,
            vec![Effect::ThreeSixesPenalty { returned_to: 20 }]
        );
        assert!(third.state.validate().is_ok());
    }

    #[test]
    fn test_penalty_consumes_the_triggering_roll() {
        // The third six is not added to the rollback position.
        let engine = engine();
        let mut state = on_plan(30);
        state.consecutive_sixes = 2;
        state.position_before_three_sixes = 18;

        let outcome = roll(&engine, &state, 6);
        assert_eq!(outcome.state.plan, 18);
    }

    #[test]
    fn test_overshoot_forfeits_the_turn() {
        let engine = engine();
        for (plan, value) in [(70, 3), (72, 1), (67, 6)] {
            let state = on_plan(plan);
            let outcome = roll(&engine, &state, value);
            assert_eq!(outcome.state.plan, plan, "no movement on overshoot");
            assert_eq!(outcome.state.previous_plan, state.previous_plan);
            assert_eq!(
                outcome.effects,
                vec![Effect::OvershootForfeit { plan, value }]
            );
            assert_eq!(outcome.state.version, state.version + 1);
        }
    }

    #[test]
    fn test_overshoot_six_still_counts_toward_streak() {
        let engine = engine();
        let outcome = roll(&engine, &on_plan(70), 6);
        assert_eq!(outcome.state.plan, 70);
        assert_eq!(outcome.state.consecutive_sixes, 1);
        assert_eq!(outcome.state.position_before_three_sixes, 70);
    }

    #[test]
    fn test_squares_past_68_are_ordinary() {
        // 66 + 5 = 71 is a legal intermediate square, not an overshoot and
        // not a finish.
        let engine = engine();
        let outcome = roll(&engine, &on_plan(66), 5);
        assert_eq!(outcome.state.plan, 71);
        assert!(!outcome.state.is_finished);
    }

    #[test]
    fn test_exact_landing_on_68_finishes() {
        let engine = engine();
        let outcome = roll(&engine, &on_plan(64), 4);
        assert_eq!(outcome.state.plan, 68);
        assert!(outcome.state.is_finished);
        assert!(outcome
            .effects
            .contains(&Effect::ReachedFinish));
        // The finish square is report-gated on the standard board.
        assert_eq!(outcome.state.pending_report_plan, Some(68));
        assert!(outcome.state.validate().is_ok());
    }

    #[test]
    fn test_passing_68_does_not_finish() {
        let engine = engine();
        let outcome = roll(&engine, &on_plan(65), 6);
        assert_eq!(outcome.state.plan, 71);
        assert!(!outcome.state.is_finished);
    }

    #[test]
    fn test_finished_player_needs_six_to_restart() {
        let engine = engine();
        let mut state = on_plan(68);
        state.is_finished = true;

        for value in 1..=5 {
            let outcome = roll(&engine, &state, value);
            assert_eq!(outcome.state.plan, 68);
            assert!(outcome.state.is_finished);
            assert_eq!(outcome.effects, vec![Effect::MustRollSixToRestart]);
        }

        let outcome = roll(&engine, &state, 6);
        assert_eq!(outcome.state.plan, 1);
        assert_eq!(outcome.state.previous_plan, 68);
        assert!(!outcome.state.is_finished);
        assert_eq!(outcome.state.consecutive_sixes, 0);
        assert_eq!(outcome.effects, vec![Effect::RestartedJourney]);
    }

    #[test]
    fn test_pending_report_blocks_every_roll() {
        let engine = engine();
        let mut state = on_plan(10);
        state.pending_report_plan = Some(10);

        for value in 1..=6 {
            let err = engine
                .apply(&state, &Action::DiceRoll { value })
                .unwrap_err();
            assert_eq!(err, RuleError::ReportRequired(10));
            assert!(err.is_domain_rejection());
        }
    }

    #[test]
    fn test_landing_on_gated_square_arms_the_gate() {
        let engine = engine();
        let outcome = roll(&engine, &on_plan(7), 3);
        assert_eq!(outcome.state.plan, 10);
        assert_eq!(outcome.state.pending_report_plan, Some(10));
        assert!(outcome
            .effects
            .contains(&Effect::ReportRequired { plan: 10 }));
    }

    #[test]
    fn test_matching_report_clears_the_gate() {
        let engine = engine();
        let mut state = on_plan(10);
        state.pending_report_plan = Some(10);

        let outcome = engine
            .apply(
                &state,
                &Action::ReportSubmit {
                    plan: 10,
                    content: "Purification asks for honesty".to_string(),
                },
            )
            .unwrap();
        assert_eq!(outcome.state.pending_report_plan, None);
        assert_eq!(outcome.effects, vec![Effect::ReportAccepted { plan: 10 }]);

        // The gate cleared, rolling works again.
        let after = roll(&engine, &outcome.state, 2);
        assert_eq!(after.state.plan, 12);
    }

    #[test]
    fn test_unrequested_report_is_a_domain_rejection() {
        let engine = engine();
        let state = on_plan(5);
        let err = engine
            .apply(
                &state,
                &Action::ReportSubmit {
                    plan: 5,
                    content: "unsolicited".to_string(),
                },
            )
            .unwrap_err();
        assert_eq!(err, RuleError::NoPendingReport(5));
        assert!(err.is_domain_rejection());

        // Mismatched plan likewise.
        let mut gated = on_plan(10);
        gated.pending_report_plan = Some(10);
        let err = engine
            .apply(
                &gated,
                &Action::ReportSubmit {
                    plan: 11,
                    content: "wrong square".to_string(),
                },
            )
            .unwrap_err();
        assert_eq!(err, RuleError::NoPendingReport(11));
    }

    #[test]
    fn test_malformed_input_is_not_a_domain_rejection() {
        let engine = engine();
        let err = engine
            .apply(&on_plan(5), &Action::DiceRoll { value: 7 })
            .unwrap_err();
        assert_eq!(err, RuleError::InvalidDiceValue(7));
        assert!(!err.is_domain_rejection());

        let err = engine
            .apply(
                &on_plan(5),
                &Action::ReportSubmit {
                    plan: 5,
                    content: "   ".to_string(),
                },
            )
            .unwrap_err();
        assert_eq!(err, RuleError::EmptyReport);
        assert!(!err.is_domain_rejection());
    }

    #[test]
    fn test_init_leaves_state_untouched() {
        let engine = engine();
        let state = on_plan(9);
        let outcome = engine.apply(&state, &Action::Init).unwrap();
        assert_eq!(outcome.state, state);
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn test_apply_is_deterministic() {
        let engine = engine();
        let state = on_plan(33);
        let a = roll(&engine, &state, 6);
        let b = roll(&engine, &state, 6);
        assert_eq!(a, b);
    }

    #[test]
    fn test_message_is_last_effect() {
        let engine = engine();
        let outcome = roll(&engine, &on_plan(7), 3);
        assert_eq!(
            outcome.state.message,
            Effect::ReportRequired { plan: 10 }.to_string()
        );
    }

    #[test]
    fn test_custom_board_gates_are_honored() {
        let plans = (1..=12u8)
            .map(|number| PlanInfo {
                number,
                name: format!("Plan {}", number),
                description: String::new(),
                requires_report: number == 3,
            })
            .collect();
        let engine = Engine::new(Board::from_plans(plans));

        let outcome = roll(&engine, &on_plan(1), 2);
        assert_eq!(outcome.state.pending_report_plan, Some(3));
    }
}
