// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending action state machine
//!
//! A `PendingAction` is a scheduled, not-yet-executed mail derived from a
//! rule firing. It is never mutated in place by reconciliation: when the
//! source rule or entity changes, the stale action is cancelled and a
//! fresh one created.
//!
//! Execution is guarded by a claim: only a `Scheduled` action can move to
//! `Claimed`, and cancellation of a claimed action has no effect (the
//! claim wins). From `Claimed` the action reaches a terminal state, is
//! returned to `Scheduled` with a later due time (interval throttling),
//! or is returned to `Scheduled` with an incremented attempt counter
//! (transient delivery failure).

use crate::event::DomainEvent;
use crate::id::{ActionId, OptionId, RuleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// De-duplication key: at most one live action exists per key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionKey {
    pub rule: RuleId,
    pub recipient: UserId,
    pub option: OptionId,
    /// The date slot a time-relative action was derived from
    /// (`coursestarttime`, `session:<id>`, ...); event-triggered actions
    /// use the event type name.
    pub slot: String,
}

impl ActionKey {
    pub fn new(
        rule: impl Into<RuleId>,
        recipient: impl Into<UserId>,
        option: impl Into<OptionId>,
        slot: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            recipient: recipient.into(),
            option: option.into(),
            slot: slot.into(),
        }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.rule, self.option, self.recipient, self.slot
        )
    }
}

/// The current state of a pending action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Waiting for its due time
    Scheduled,
    /// Claimed by a worker for execution
    Claimed,
    /// Mail was sent
    Executed,
    /// Dropped: the rule's config changed after scheduling
    SuppressedStale,
    /// Dropped: the rule no longer applies to this recipient/entity
    SuppressedInapplicable,
    /// Dropped: delivery kept failing past the retry budget
    Failed,
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionState::Executed
                | ActionState::SuppressedStale
                | ActionState::SuppressedInapplicable
                | ActionState::Failed
        )
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionState::Scheduled => write!(f, "scheduled"),
            ActionState::Claimed => write!(f, "claimed"),
            ActionState::Executed => write!(f, "executed"),
            ActionState::SuppressedStale => write!(f, "suppressed_stale"),
            ActionState::SuppressedInapplicable => write!(f, "suppressed_inapplicable"),
            ActionState::Failed => write!(f, "failed"),
        }
    }
}

/// A scheduled, not-yet-executed mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: ActionId,
    pub key: ActionKey,
    pub due: DateTime<Utc>,
    /// Rule fingerprint captured at schedule time
    pub fingerprint: String,
    /// Event snapshot for event-triggered actions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<DomainEvent>,
    /// Raw subject template; rendered at execution time
    pub subject: String,
    /// Raw body template; rendered at execution time
    pub body: String,
    pub state: ActionState,
    pub attempts: u32,
    pub scheduled_at: DateTime<Utc>,
}

impl PendingAction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<ActionId>,
        key: ActionKey,
        due: DateTime<Utc>,
        fingerprint: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            key,
            due,
            fingerprint: fingerprint.into(),
            event: None,
            subject: subject.into(),
            body: body.into(),
            state: ActionState::Scheduled,
            attempts: 0,
            scheduled_at,
        }
    }

    pub fn with_event(mut self, event: DomainEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.state == ActionState::Scheduled
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.is_pending() && self.due <= as_of
    }

    /// Claim for execution. Returns `None` unless the action is still
    /// scheduled; a second claim or a claim on a terminal action fails,
    /// which is what prevents double-send when sweeps race.
    pub fn claim(&self) -> Option<PendingAction> {
        match self.state {
            ActionState::Scheduled => Some(PendingAction {
                state: ActionState::Claimed,
                ..self.clone()
            }),
            _ => None,
        }
    }

    /// Claimed → Executed
    pub fn executed(self) -> Self {
        debug_assert_eq!(self.state, ActionState::Claimed);
        Self {
            state: ActionState::Executed,
            ..self
        }
    }

    /// Claimed → SuppressedStale
    pub fn suppressed_stale(self) -> Self {
        debug_assert_eq!(self.state, ActionState::Claimed);
        Self {
            state: ActionState::SuppressedStale,
            ..self
        }
    }

    /// Claimed → SuppressedInapplicable
    pub fn suppressed_inapplicable(self) -> Self {
        debug_assert_eq!(self.state, ActionState::Claimed);
        Self {
            state: ActionState::SuppressedInapplicable,
            ..self
        }
    }

    /// Claimed → Scheduled with a later due time (interval throttling)
    pub fn rescheduled(self, due: DateTime<Utc>) -> Self {
        debug_assert_eq!(self.state, ActionState::Claimed);
        Self {
            state: ActionState::Scheduled,
            due,
            ..self
        }
    }

    /// Claimed → Scheduled (retry) or Failed once the budget is spent
    pub fn delivery_failed(self, max_attempts: u32) -> Self {
        debug_assert_eq!(self.state, ActionState::Claimed);
        let attempts = self.attempts + 1;
        let state = if attempts >= max_attempts {
            ActionState::Failed
        } else {
            ActionState::Scheduled
        };
        Self {
            state,
            attempts,
            ..self
        }
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
