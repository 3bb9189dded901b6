// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event fan-out: resolve matching rules into pending actions
//!
//! Dispatch is deliberately thin. It evaluates recipients against current
//! entity state, snapshots the event into each action, and hands the
//! actions to the scheduler with the due time set to now. All suppression
//! logic (staleness, applicability, intervals, overrides) runs later, at
//! execution time, against the state of the world at that moment.

use crate::scheduler::ActionScheduler;
use crate::store::RuleStore;
use bn_core::adapters::EntityStore;
use bn_core::condition::{evaluate, EvalContext};
use bn_core::event::DomainEvent;
use bn_core::id::{ActionId, IdGen};
use bn_core::pending::{ActionKey, PendingAction};
use chrono::{DateTime, Utc};

/// Fan an event out to every matching rule and recipient. Returns the
/// ids of the actions now live in the scheduler (existing ids for
/// de-duplicated keys).
pub fn dispatch_event<S: EntityStore, G: IdGen>(
    event: &DomainEvent,
    rules: &RuleStore,
    store: &S,
    scheduler: &mut ActionScheduler,
    ids: &G,
    now: DateTime<Utc>,
) -> Vec<ActionId> {
    let matching = rules.by_event(&event.kind);
    if matching.is_empty() {
        tracing::debug!(event = %event.kind, option = %event.option_id, "no matching rules");
        return Vec::new();
    }

    let option = match store.get_option(&event.option_id) {
        Ok(option) => option,
        Err(e) => {
            tracing::warn!(event = %event.kind, error = %e, "event references unknown option");
            return Vec::new();
        }
    };

    let slot = event.kind.name();
    let mut scheduled = Vec::new();
    for rule in matching {
        let ctx = EvalContext::new(&option, store).with_event(event);
        let recipients = evaluate(&rule.recipients, &ctx);
        tracing::debug!(
            rule = %rule.id,
            event = %event.kind,
            recipients = recipients.len(),
            "rule matched event"
        );
        for recipient in recipients {
            let key = ActionKey::new(
                rule.id.clone(),
                recipient,
                option.id.clone(),
                slot.clone(),
            );
            let action = PendingAction::new(
                ids.next(),
                key,
                now,
                rule.fingerprint(),
                rule.action.subject.clone(),
                rule.action.body.clone(),
                now,
            )
            .with_event(event.clone());
            scheduled.push(scheduler.schedule(action));
        }
    }
    scheduled
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
