//! Inbound game events.
//!
//! Events arrive from a durable at-least-once queue (or the WebSocket layer
//! in this binary); `event_id` is the idempotency key. Payload tags follow
//! the logical event names used by the surrounding platform.

use leela_core::PlayerState;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One inbound event, uniquely identified for deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    #[serde(rename = "eventId")]
    pub event_id: Uuid,
    #[serde(flatten)]
    pub payload: GameEventPayload,
}

impl GameEvent {
    pub fn new(payload: GameEventPayload) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            payload,
        }
    }

    pub fn user_id(&self) -> &str {
        match &self.payload {
            GameEventPayload::PlayerInit { user_id }
            | GameEventPayload::DiceRoll { user_id, .. }
            | GameEventPayload::ReportSubmit { user_id, .. }
            | GameEventPayload::StateUpdate { user_id, .. } => user_id,
        }
    }
}

/// Event payloads, tagged with their logical names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum GameEventPayload {
    /// Idempotent creation of the player record.
    #[serde(rename = "game.player.init", rename_all = "camelCase")]
    PlayerInit { user_id: String },

    /// A die roll. When `roll` is omitted the server rolls the die itself;
    /// a supplied value must be 1-6.
    #[serde(rename = "game.dice.roll", rename_all = "camelCase")]
    DiceRoll {
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        roll: Option<u8>,
    },

    /// A written reflection for a report-gated plan.
    #[serde(rename = "game.report.submit", rename_all = "camelCase")]
    ReportSubmit {
        user_id: String,
        plan_number: u8,
        content: String,
    },

    /// Administrative field patch. Bypasses the rule engine; applied as a
    /// raw merge with its own version check.
    #[serde(rename = "game.player.state.update", rename_all = "camelCase")]
    StateUpdate { user_id: String, updates: StatePatch },
}

/// Partial update of a player record. Absent fields are left alone;
/// `pendingReportPlan: null` clears the gate. `version` cannot be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_plan: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_started: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_finished: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_sixes: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_before_three_sixes: Option<u8>,
    #[serde(
        deserialize_with = "nested_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub pending_report_plan: Option<Option<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Distinguishes an absent field (no change) from an explicit null (clear).
fn nested_option<'de, D>(deserializer: D) -> Result<Option<Option<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u8>::deserialize(deserializer).map(Some)
}

impl StatePatch {
    /// Merge the patch into `state`. Does not touch `version`.
    pub fn apply_to(&self, state: &mut PlayerState) {
        if let Some(plan) = self.plan {
            state.plan = plan;
        }
        if let Some(previous_plan) = self.previous_plan {
            state.previous_plan = previous_plan;
        }
        if let Some(is_started) = self.is_started {
            state.is_started = is_started;
        }
        if let Some(is_finished) = self.is_finished {
            state.is_finished = is_finished;
        }
        if let Some(consecutive_sixes) = self.consecutive_sixes {
            state.consecutive_sixes = consecutive_sixes;
        }
        if let Some(position) = self.position_before_three_sixes {
            state.position_before_three_sixes = position;
        }
        if let Some(pending) = self.pending_report_plan {
            state.pending_report_plan = pending;
        }
        if let Some(message) = &self.message {
            state.message = message.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_names() {
        let event: GameEvent = serde_json::from_value(json!({
            "eventId": "8f9f0a4e-3b6e-4d0c-9f0e-5a3f0e6b1c2d",
            "type": "game.dice.roll",
            "payload": { "userId": "alice", "roll": 4 }
        }))
        .unwrap();
        assert_eq!(event.user_id(), "alice");
        assert!(matches!(
            event.payload,
            GameEventPayload::DiceRoll { roll: Some(4), .. }
        ));
    }

    #[test]
    fn test_roll_value_is_optional() {
        let event: GameEvent = serde_json::from_value(json!({
            "eventId": "8f9f0a4e-3b6e-4d0c-9f0e-5a3f0e6b1c2d",
            "type": "game.dice.roll",
            "payload": { "userId": "alice" }
        }))
        .unwrap();
        assert!(matches!(
            event.payload,
            GameEventPayload::DiceRoll { roll: None, .. }
        ));
    }

    #[test]
    fn test_patch_merges_only_present_fields() {
        let patch: StatePatch = serde_json::from_value(json!({
            "plan": 40,
            "pendingReportPlan": null
        }))
        .unwrap();

        let mut state = PlayerState::new();
        state.is_started = true;
        state.plan = 10;
        state.pending_report_plan = Some(10);
        state.version = 7;

        patch.apply_to(&mut state);
        assert_eq!(state.plan, 40);
        assert_eq!(state.pending_report_plan, None, "explicit null clears");
        assert!(state.is_started, "absent fields untouched");
        assert_eq!(state.version, 7, "version is never patched");
    }

    #[test]
    fn test_patch_absent_pending_report_is_no_change() {
        let patch: StatePatch = serde_json::from_value(json!({ "plan": 12 })).unwrap();
        let mut state = PlayerState::new();
        state.is_started = true;
        state.plan = 10;
        state.pending_report_plan = Some(10);

        patch.apply_to(&mut state);
        assert_eq!(state.pending_report_plan, Some(10));
    }
}
