//! Idempotent event processing.
//!
//! The processor turns at-least-once event delivery into exactly-once state
//! effect. Every event is claimed in the idempotency ledger before any work
//! happens; completed events replay their cached outcome without re-running
//! the engine. Writes go through the store's compare-and-swap, and a version
//! conflict (a concurrent event for the same player won the race) reloads
//! and re-applies against fresh state.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use leela_core::{Action, Effect, Engine, PlayerState};
use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::{GameEvent, GameEventPayload, StatePatch};
use crate::notifier::Notifier;
use crate::store::{StateStore, StoreError};

/// Processing failure, classified for the queue infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// Transient: return the event to the queue for redelivery.
    #[error("retryable failure: {0}")]
    Retryable(String),

    /// Permanent: dead-letter the event, never redeliver blindly.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl ProcessError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessError::Retryable(_))
    }
}

/// The result of processing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub player_id: String,
    pub state: PlayerState,
    pub effects: Vec<Effect>,
    /// Set when the engine rejected the action as a legal no-op (report
    /// pending, unrequested report). The event is acknowledged, nothing was
    /// written, and this message is surfaced to the player.
    pub rejection: Option<String>,
    /// True when this outcome was served from the idempotency ledger.
    pub replayed: bool,
}

/// Retry and deadline tuning.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Bound on load-apply-save cycles (CAS conflicts and store outages).
    pub max_attempts: u32,
    /// First backoff delay after a transient store failure; doubles per
    /// attempt up to `backoff_cap`.
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Overall budget per event; on expiry the event goes back to the queue.
    pub event_deadline: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_millis(25),
            backoff_cap: Duration::from_secs(1),
            event_deadline: Duration::from_secs(5),
        }
    }
}

enum LedgerEntry {
    InFlight,
    Completed(ProcessOutcome),
    Failed(String),
}

/// Consumes inbound game events: deduplicates, loads state, runs the rule
/// engine, saves through compare-and-swap, publishes the result.
pub struct EventProcessor<S, N> {
    engine: Engine,
    store: Arc<S>,
    notifier: Arc<N>,
    ledger: DashMap<Uuid, LedgerEntry>,
    config: ProcessorConfig,
}

impl<S: StateStore, N: Notifier> EventProcessor<S, N> {
    pub fn new(engine: Engine, store: Arc<S>, notifier: Arc<N>, config: ProcessorConfig) -> Self {
        Self {
            engine,
            store,
            notifier,
            ledger: DashMap::new(),
            config,
        }
    }

    /// Process one event. Safe under replay and under concurrent delivery of
    /// the same `event_id`: exactly one delivery runs the engine, the rest
    /// get the cached outcome (or a retryable rejection while it is still in
    /// flight).
    pub async fn process(&self, event: &GameEvent) -> Result<ProcessOutcome, ProcessError> {
        use dashmap::mapref::entry::Entry;

        // Atomic claim: insert-if-vacant under the ledger's entry lock.
        match self.ledger.entry(event.event_id) {
            Entry::Occupied(entry) => {
                return match entry.get() {
                    LedgerEntry::Completed(outcome) => {
                        debug!(event_id = %event.event_id, "replaying cached outcome");
                        let mut outcome = outcome.clone();
                        outcome.replayed = true;
                        Ok(outcome)
                    }
                    LedgerEntry::Failed(reason) => Err(ProcessError::Permanent(reason.clone())),
                    LedgerEntry::InFlight => Err(ProcessError::Retryable(format!(
                        "event {} is already being processed",
                        event.event_id
                    ))),
                };
            }
            Entry::Vacant(slot) => {
                slot.insert(LedgerEntry::InFlight);
            }
        }

        let result = self.run(event).await;

        // Finalize the claim: cache successes and permanent failures, release
        // on transient failure so redelivery can try again.
        match &result {
            Ok(outcome) => {
                self.ledger
                    .insert(event.event_id, LedgerEntry::Completed(outcome.clone()));
            }
            Err(ProcessError::Permanent(reason)) => {
                self.ledger
                    .insert(event.event_id, LedgerEntry::Failed(reason.clone()));
            }
            Err(ProcessError::Retryable(_)) => {
                self.ledger.remove(&event.event_id);
            }
        }
        result
    }

    async fn run(&self, event: &GameEvent) -> Result<ProcessOutcome, ProcessError> {
        let deadline = Instant::now() + self.config.event_deadline;
        match &event.payload {
            GameEventPayload::PlayerInit { user_id } => self.init_player(user_id, deadline).await,
            GameEventPayload::DiceRoll { user_id, roll } => {
                // A missing value means the server rolls the die. Decided
                // once per delivery, before the retry loop, so CAS retries
                // re-apply the same roll.
                let value = roll.unwrap_or_else(|| rand::thread_rng().gen_range(1..=6));
                self.apply_action(user_id, Action::DiceRoll { value }, deadline)
                    .await
            }
            GameEventPayload::ReportSubmit {
                user_id,
                plan_number,
                content,
            } => {
                self.apply_action(
                    user_id,
                    Action::ReportSubmit {
                        plan: *plan_number,
                        content: content.clone(),
                    },
                    deadline,
                )
                .await
            }
            GameEventPayload::StateUpdate { user_id, updates } => {
                self.patch_state(user_id, updates, deadline).await
            }
        }
    }

    /// Idempotent creation: an existing record is returned unchanged.
    async fn init_player(
        &self,
        user_id: &str,
        deadline: Instant,
    ) -> Result<ProcessOutcome, ProcessError> {
        let mut attempt = 0;
        loop {
            self.check_deadline(deadline)?;
            match self.store.create(user_id, PlayerState::new()) {
                Ok(_) => {
                    let state = PlayerState::new();
                    self.notifier.publish(user_id, &state, &[]);
                    return Ok(self.outcome(user_id, state, Vec::new()));
                }
                Err(StoreError::AlreadyExists(_)) => {
                    let existing = self.load_existing(user_id, deadline).await?;
                    return Ok(self.outcome(user_id, existing.state, Vec::new()));
                }
                Err(StoreError::Unavailable(reason)) => {
                    attempt += 1;
                    self.backoff_or_fail(attempt, &reason, deadline).await?;
                }
                Err(other) => return Err(ProcessError::Permanent(other.to_string())),
            }
        }
    }

    /// The load, apply, compare-and-swap cycle for rule-engine actions.
    async fn apply_action(
        &self,
        user_id: &str,
        action: Action,
        deadline: Instant,
    ) -> Result<ProcessOutcome, ProcessError> {
        let mut attempt = 0;
        loop {
            self.check_deadline(deadline)?;
            let loaded = self.load_existing(user_id, deadline).await?;

            let outcome = match self.engine.apply(&loaded.state, &action) {
                Ok(outcome) => outcome,
                Err(err) if err.is_domain_rejection() => {
                    // Legal no-op: acknowledge, write nothing, surface the
                    // message. Published so subscribers see the status line.
                    debug!(user_id, %err, "action rejected by rules");
                    self.notifier.publish(user_id, &loaded.state, &[]);
                    return Ok(ProcessOutcome {
                        player_id: user_id.to_string(),
                        state: loaded.state,
                        effects: Vec::new(),
                        rejection: Some(err.to_string()),
                        replayed: false,
                    });
                }
                Err(err) => return Err(ProcessError::Permanent(err.to_string())),
            };

            match self
                .store
                .save(user_id, outcome.state.clone(), loaded.version)
            {
                Ok(_) => {
                    self.notifier
                        .publish(user_id, &outcome.state, &outcome.effects);
                    return Ok(self.outcome(user_id, outcome.state, outcome.effects));
                }
                Err(StoreError::VersionConflict { stored, .. }) => {
                    // A concurrent event for this player landed first; the
                    // rules must be re-run against the fresh state.
                    attempt += 1;
                    warn!(user_id, stored, attempt, "version conflict, reloading");
                    if attempt >= self.config.max_attempts {
                        return Err(ProcessError::Retryable(format!(
                            "gave up after {} version conflicts for {}",
                            attempt, user_id
                        )));
                    }
                }
                Err(StoreError::Unavailable(reason)) => {
                    attempt += 1;
                    self.backoff_or_fail(attempt, &reason, deadline).await?;
                }
                Err(other) => return Err(ProcessError::Permanent(other.to_string())),
            }
        }
    }

    /// Administrative raw merge, bypassing the rule engine.
    async fn patch_state(
        &self,
        user_id: &str,
        patch: &StatePatch,
        deadline: Instant,
    ) -> Result<ProcessOutcome, ProcessError> {
        let mut attempt = 0;
        loop {
            self.check_deadline(deadline)?;
            let loaded = self.load_existing(user_id, deadline).await?;

            let mut next = loaded.state.clone();
            patch.apply_to(&mut next);
            next.version = loaded.version + 1;
            if let Err(violation) = next.validate() {
                return Err(ProcessError::Permanent(format!(
                    "patch breaks invariants: {}",
                    violation
                )));
            }

            match self.store.save(user_id, next.clone(), loaded.version) {
                Ok(_) => {
                    self.notifier.publish(user_id, &next, &[]);
                    return Ok(self.outcome(user_id, next, Vec::new()));
                }
                Err(StoreError::VersionConflict { stored, .. }) => {
                    attempt += 1;
                    warn!(user_id, stored, attempt, "version conflict on patch");
                    if attempt >= self.config.max_attempts {
                        return Err(ProcessError::Retryable(format!(
                            "gave up after {} version conflicts for {}",
                            attempt, user_id
                        )));
                    }
                }
                Err(StoreError::Unavailable(reason)) => {
                    attempt += 1;
                    self.backoff_or_fail(attempt, &reason, deadline).await?;
                }
                Err(other) => return Err(ProcessError::Permanent(other.to_string())),
            }
        }
    }

    async fn load_existing(
        &self,
        user_id: &str,
        deadline: Instant,
    ) -> Result<crate::store::VersionedState, ProcessError> {
        let mut attempt = 0;
        loop {
            self.check_deadline(deadline)?;
            match self.store.load(user_id) {
                Ok(Some(loaded)) => return Ok(loaded),
                Ok(None) => {
                    return Err(ProcessError::Permanent(format!(
                        "player {} has no record; init must come first",
                        user_id
                    )))
                }
                Err(StoreError::Unavailable(reason)) => {
                    attempt += 1;
                    self.backoff_or_fail(attempt, &reason, deadline).await?;
                }
                Err(other) => return Err(ProcessError::Permanent(other.to_string())),
            }
        }
    }

    fn check_deadline(&self, deadline: Instant) -> Result<(), ProcessError> {
        if Instant::now() >= deadline {
            // No partial writes exist (saves are all-or-nothing), so the
            // event can safely go back to the queue uncommitted.
            return Err(ProcessError::Retryable(
                "per-event deadline exceeded".to_string(),
            ));
        }
        Ok(())
    }

    async fn backoff_or_fail(
        &self,
        attempt: u32,
        reason: &str,
        deadline: Instant,
    ) -> Result<(), ProcessError> {
        if attempt >= self.config.max_attempts {
            return Err(ProcessError::Retryable(format!(
                "store unavailable after {} attempts: {}",
                attempt, reason
            )));
        }
        let exp = self.config.backoff_base * 2u32.saturating_pow(attempt - 1);
        let delay = exp.min(self.config.backoff_cap);
        warn!(attempt, ?delay, reason, "store unavailable, backing off");
        if Instant::now() + delay >= deadline {
            return Err(ProcessError::Retryable(
                "per-event deadline exceeded".to_string(),
            ));
        }
        tokio::time::sleep(delay).await;
        Ok(())
    }

    fn outcome(&self, user_id: &str, state: PlayerState, effects: Vec<Effect>) -> ProcessOutcome {
        ProcessOutcome {
            player_id: user_id.to_string(),
            state,
            effects,
            rejection: None,
            replayed: false,
        }
    }
}
