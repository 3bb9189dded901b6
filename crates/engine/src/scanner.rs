// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time-relative rule reconciliation
//!
//! Invoked when an option is created, updated, or deleted, and
//! periodically to catch drift. The scanner recomputes the desired set of
//! (rule, recipient, slot) reminders from current entity state, compares
//! it against the live actions in the scheduler, and converges: unchanged
//! actions are left alone, changed ones are superseded (delete and
//! recreate), vanished ones are cancelled.
//!
//! State flags like cancelled or invisible do NOT stop scheduling here;
//! they are re-checked at execution time, since they can flip either way
//! between scheduling and firing.

use crate::scheduler::ActionScheduler;
use crate::store::RuleStore;
use bn_core::adapters::EntityStore;
use bn_core::condition::{evaluate, EvalContext};
use bn_core::id::{IdGen, OptionId};
use bn_core::pending::{ActionKey, PendingAction};
use bn_core::rule::Trigger;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// New actions for keys with no prior live action
    pub scheduled: u32,
    /// Actions superseded because due time or rule config changed
    pub replaced: u32,
    /// Live actions whose source slot or recipient vanished
    pub cancelled: u32,
    /// Actions already matching the desired state
    pub unchanged: u32,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.scheduled == 0 && self.replaced == 0 && self.cancelled == 0
    }
}

/// Converge the scheduler's time-relative actions for one option onto
/// what current rules and entity dates require. Safe to call repeatedly;
/// a second pass with no intervening change reports all-unchanged.
pub fn reconcile_option<S: EntityStore, G: IdGen>(
    option_id: &OptionId,
    rules: &RuleStore,
    store: &S,
    scheduler: &mut ActionScheduler,
    ids: &G,
    now: DateTime<Utc>,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    // A deleted option cancels everything scheduled against it
    let option = match store.get_option(option_id) {
        Ok(option) => option,
        Err(_) => {
            report.cancelled = scheduler.cancel_option(option_id) as u32;
            tracing::info!(
                option = %option_id,
                cancelled = report.cancelled,
                "option deleted, pending actions cancelled"
            );
            return report;
        }
    };

    // Desired state: (key -> due) for every time rule x slot x recipient
    let mut desired: HashMap<ActionKey, (DateTime<Utc>, &bn_core::rule::Rule)> = HashMap::new();
    for rule in rules.time_relative() {
        let Trigger::TimeRelative { date_field, .. } = &rule.trigger else {
            continue;
        };
        for (slot, date) in option.date_slots(date_field) {
            let Some(due) = rule.trigger.due_at(date) else {
                continue;
            };
            let ctx = EvalContext::new(&option, store);
            for recipient in evaluate(&rule.recipients, &ctx) {
                let key = ActionKey::new(rule.id.clone(), recipient, option.id.clone(), slot.clone());
                desired.insert(key, (due, rule));
            }
        }
    }

    // Cancel live time-relative actions that no longer correspond to a
    // desired key (slot deleted, recipient left, rule retargeted).
    // Event-triggered actions are not the scanner's to touch.
    for key in scheduler.live_keys_for_option(option_id) {
        let time_sourced = rules
            .get(&key.rule)
            .map(|r| r.is_time_relative())
            .unwrap_or(true);
        if time_sourced && !desired.contains_key(&key) {
            if scheduler.cancel_key(&key) {
                report.cancelled += 1;
            }
        }
    }

    // Schedule or supersede the desired set
    for (key, (due, rule)) in desired {
        let prior = scheduler.get_key(&key);
        let fingerprint = rule.fingerprint();
        match prior {
            Some(existing) if existing.due == due && existing.fingerprint == fingerprint => {
                report.unchanged += 1;
                continue;
            }
            Some(_) => report.replaced += 1,
            None => report.scheduled += 1,
        }
        let action = PendingAction::new(
            ids.next(),
            key,
            due,
            fingerprint,
            rule.action.subject.clone(),
            rule.action.body.clone(),
            now,
        );
        scheduler.schedule(action);
    }

    if !report.is_noop() {
        tracing::info!(
            option = %option_id,
            scheduled = report.scheduled,
            replaced = report.replaced,
            cancelled = report.cancelled,
            "time rules reconciled"
        );
    }
    report
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
