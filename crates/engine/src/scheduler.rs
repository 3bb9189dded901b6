// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue of pending mail actions
//!
//! The scheduler enforces one live action per (rule, recipient, option,
//! slot) key and runs the claim-then-revalidate execution protocol: a due
//! action is claimed (the idempotent gate against double-send), then its
//! rule fingerprint is re-derived and compared against the one captured at
//! schedule time, then applicability is re-checked against current entity
//! state, then interval throttling and override suppression are applied,
//! and only then is the mail rendered and handed to the transport.
//!
//! Cancellation is cooperative: an action that has been claimed cannot be
//! cancelled; a scheduled one is simply removed from the due set.

use crate::config::EngineConfig;
use crate::store::RuleStore;
use bn_core::adapters::{EntityStore, Mailer};
use bn_core::condition::{evaluate, EvalContext};
use bn_core::entity::BookingOption;
use bn_core::event::EventKind;
use bn_core::id::{ActionId, OptionId, RuleId, UserId};
use bn_core::pending::{ActionKey, PendingAction};
use bn_core::rule::Rule;
use bn_core::template::{interpolate, RenderPass};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;

/// What happened when a due action was executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Mail handed to the transport
    Sent,
    /// Rule config changed since scheduling; dropped
    SuppressedStale,
    /// Rule no longer applies (entity state, role membership, override)
    SuppressedInapplicable,
    /// Inside the repeat-suppression window; due time pushed out
    Rescheduled { until: DateTime<Utc> },
    /// Transient delivery failure; returned to the due set
    Retried { attempt: u32 },
    /// Delivery kept failing past the retry budget
    Failed,
    /// Referenced rule or option is gone; action dropped
    Dropped,
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Sent => write!(f, "mail successfully sent"),
            ExecutionOutcome::SuppressedStale => {
                write!(f, "Rule has changed. Mail was NOT SENT")
            }
            ExecutionOutcome::SuppressedInapplicable => {
                write!(f, "Rule does not apply anymore. Mail was NOT SENT")
            }
            ExecutionOutcome::Rescheduled { until } => write!(f, "rescheduled until {}", until),
            ExecutionOutcome::Retried { attempt } => write!(f, "delivery retry {}", attempt),
            ExecutionOutcome::Failed => write!(f, "delivery failed permanently"),
            ExecutionOutcome::Dropped => write!(f, "referenced data missing, action dropped"),
        }
    }
}

/// Per-sweep counters, returned for observability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub executed: u32,
    pub suppressed_stale: u32,
    pub suppressed_inapplicable: u32,
    pub rescheduled: u32,
    pub retried: u32,
    pub failed: u32,
    pub dropped: u32,
}

impl SweepReport {
    pub fn total(&self) -> u32 {
        self.executed
            + self.suppressed_stale
            + self.suppressed_inapplicable
            + self.rescheduled
            + self.retried
            + self.failed
            + self.dropped
    }

    fn record(&mut self, outcome: &ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Sent => self.executed += 1,
            ExecutionOutcome::SuppressedStale => self.suppressed_stale += 1,
            ExecutionOutcome::SuppressedInapplicable => self.suppressed_inapplicable += 1,
            ExecutionOutcome::Rescheduled { .. } => self.rescheduled += 1,
            ExecutionOutcome::Retried { .. } => self.retried += 1,
            ExecutionOutcome::Failed => self.failed += 1,
            ExecutionOutcome::Dropped => self.dropped += 1,
        }
    }
}

/// Durable set of pending actions with execution bookkeeping
#[derive(Default)]
pub struct ActionScheduler {
    /// All known actions; terminal records are pruned at the end of each
    /// sweep
    actions: HashMap<ActionId, PendingAction>,
    /// Live (non-terminal) actions by de-duplication key
    index: HashMap<ActionKey, ActionId>,
    /// Last successful send per (rule, recipient, option); drives both
    /// interval throttling and fire-time override suppression. One entry
    /// per triple, overwritten on each send, so the ledger is bounded by
    /// the rule/recipient/option population rather than by send volume.
    fired: HashMap<(RuleId, UserId, OptionId), DateTime<Utc>>,
}

impl ActionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an action, enforcing the one-live-action-per-key
    /// invariant. Scheduling an identical (due, fingerprint) pair for an
    /// existing key is a no-op returning the existing id; a differing
    /// pair supersedes the old action (delete and recreate).
    pub fn schedule(&mut self, action: PendingAction) -> ActionId {
        if let Some(existing_id) = self.index.get(&action.key).cloned() {
            if let Some(existing) = self.actions.get(&existing_id) {
                if existing.is_pending()
                    && existing.due == action.due
                    && existing.fingerprint == action.fingerprint
                {
                    tracing::debug!(key = %action.key, "action already scheduled, keeping");
                    return existing_id;
                }
            }
            self.cancel_key(&action.key);
        }

        let id = action.id.clone();
        tracing::debug!(key = %action.key, due = %action.due, "action scheduled");
        self.index.insert(action.key.clone(), id.clone());
        self.actions.insert(id.clone(), action);
        id
    }

    /// Cancel the live action for a key. No effect once claimed or
    /// terminal (the claim wins).
    pub fn cancel_key(&mut self, key: &ActionKey) -> bool {
        let Some(id) = self.index.get(key).cloned() else {
            return false;
        };
        let cancellable = self
            .actions
            .get(&id)
            .map(|a| a.is_pending())
            .unwrap_or(false);
        if !cancellable {
            return false;
        }
        self.index.remove(key);
        self.actions.remove(&id);
        tracing::debug!(key = %key, "action cancelled");
        true
    }

    /// Cancel every live action sourced from a rule (admin deletion)
    pub fn cancel_rule(&mut self, rule: &RuleId) -> usize {
        self.cancel_where(|key| &key.rule == rule)
    }

    /// Cancel every live action targeting an option (entity deletion)
    pub fn cancel_option(&mut self, option: &OptionId) -> usize {
        self.cancel_where(|key| &key.option == option)
    }

    fn cancel_where(&mut self, pred: impl Fn(&ActionKey) -> bool) -> usize {
        let keys: Vec<ActionKey> = self.index.keys().filter(|k| pred(k)).cloned().collect();
        keys.iter().filter(|k| self.cancel_key(k)).count()
    }

    /// The live action for a key, if any
    pub fn get_key(&self, key: &ActionKey) -> Option<&PendingAction> {
        self.index.get(key).and_then(|id| self.actions.get(id))
    }

    pub fn get(&self, id: &ActionId) -> Option<&PendingAction> {
        self.actions.get(id)
    }

    /// Keys of live actions targeting an option
    pub fn live_keys_for_option(&self, option: &OptionId) -> Vec<ActionKey> {
        self.index
            .keys()
            .filter(|k| &k.option == option)
            .cloned()
            .collect()
    }

    /// Number of live (scheduled, not yet claimed or finished) actions
    pub fn live_count(&self) -> usize {
        self.index.len()
    }

    /// Ids of actions due at or before `as_of`, earliest first
    pub fn due_actions(&self, as_of: DateTime<Utc>) -> Vec<ActionId> {
        let mut due: Vec<&PendingAction> = self
            .actions
            .values()
            .filter(|a| a.is_due(as_of))
            .collect();
        due.sort_by(|a, b| a.due.cmp(&b.due).then_with(|| a.key.cmp(&b.key)));
        due.into_iter().map(|a| a.id.clone()).collect()
    }

    /// Execute one due action through the revalidation protocol.
    /// Returns `None` if the action could not be claimed (already
    /// claimed, finished, or cancelled).
    pub async fn execute<S, M>(
        &mut self,
        id: &ActionId,
        rules: &RuleStore,
        store: &S,
        mailer: &M,
        config: &EngineConfig,
        now: DateTime<Utc>,
        pass: &mut RenderPass,
    ) -> Option<ExecutionOutcome>
    where
        S: EntityStore,
        M: Mailer,
    {
        let claimed = self.actions.get(id).and_then(|a| a.claim())?;
        let key = claimed.key.clone();
        self.actions.insert(id.clone(), claimed.clone());

        // Step 1: the rule must still exist and carry the same config
        let Some(rule) = rules.get(&key.rule) else {
            tracing::error!(key = %key, "rule missing, action dropped");
            self.drop_action(id, &key);
            return Some(ExecutionOutcome::Dropped);
        };
        if rule.fingerprint() != claimed.fingerprint {
            tracing::warn!(
                option = %key.option,
                recipient = %key.recipient,
                rule = %key.rule,
                "Rule has changed. Mail was NOT SENT"
            );
            self.finish(id, &key, claimed.suppressed_stale());
            return Some(ExecutionOutcome::SuppressedStale);
        }

        // Step 2: the rule must still apply to this recipient and entity
        let option = match store.get_option(&key.option) {
            Ok(option) => option,
            Err(_) => {
                tracing::error!(key = %key, "option missing, action dropped");
                self.drop_action(id, &key);
                return Some(ExecutionOutcome::Dropped);
            }
        };
        if let Some(reason) = self.inapplicable_reason(rule, rules, &claimed, &option, store, config)
        {
            tracing::warn!(
                option = %key.option,
                recipient = %key.recipient,
                rule = %key.rule,
                reason,
                "Rule does not apply anymore. Mail was NOT SENT"
            );
            self.finish(id, &key, claimed.suppressed_inapplicable());
            return Some(ExecutionOutcome::SuppressedInapplicable);
        }

        // Step 3: interval throttling reschedules instead of dropping
        let fired_key = (key.rule.clone(), key.recipient.clone(), key.option.clone());
        if let Some(interval) = rule.action.interval {
            if let Some(last) = self.fired.get(&fired_key) {
                let window = Duration::from_std(interval).unwrap_or_else(|_| Duration::zero());
                let next_allowed = *last + window;
                if now < next_allowed {
                    tracing::info!(
                        option = %key.option,
                        recipient = %key.recipient,
                        until = %next_allowed,
                        "inside send interval, rescheduled"
                    );
                    let rescheduled = claimed.rescheduled(next_allowed);
                    self.actions.insert(id.clone(), rescheduled);
                    return Some(ExecutionOutcome::Rescheduled {
                        until: next_allowed,
                    });
                }
            }
        }

        // Step 4: render and send. Entity values come memoized from the
        // pass; recipient and event snapshot are this action's own.
        let vars = pass.vars(&option, claimed.event.as_ref(), &key.recipient);
        let subject = interpolate(&claimed.subject, &vars);
        let body = interpolate(&claimed.body, &vars);

        match mailer.send(&key.recipient, &subject, &body).await {
            Ok(()) => {
                tracing::info!(
                    option = %key.option,
                    recipient = %key.recipient,
                    rule = %key.rule,
                    "mail successfully sent"
                );
                self.fired.insert(fired_key, now);
                self.finish(id, &key, claimed.executed());
                Some(ExecutionOutcome::Sent)
            }
            Err(e) => {
                let failed = claimed.delivery_failed(config.max_delivery_attempts);
                let outcome = if failed.is_pending() {
                    tracing::warn!(key = %key, error = %e, attempt = failed.attempts, "delivery failed, will retry");
                    ExecutionOutcome::Retried {
                        attempt: failed.attempts,
                    }
                } else {
                    tracing::error!(key = %key, error = %e, "delivery failed permanently");
                    self.index.remove(&key);
                    ExecutionOutcome::Failed
                };
                self.actions.insert(id.clone(), failed);
                Some(outcome)
            }
        }
    }

    /// Run every action due at or before `as_of` and tally the outcomes.
    pub async fn sweep<S, M>(
        &mut self,
        as_of: DateTime<Utc>,
        rules: &RuleStore,
        store: &S,
        mailer: &M,
        config: &EngineConfig,
    ) -> SweepReport
    where
        S: EntityStore,
        M: Mailer,
    {
        let due = self.due_actions(as_of);
        let mut report = SweepReport::default();
        // Placeholder memoization lives exactly as long as one sweep
        let mut pass = RenderPass::new();
        for id in due {
            if let Some(outcome) = self
                .execute(&id, rules, store, mailer, config, as_of, &mut pass)
                .await
            {
                report.record(&outcome);
            }
        }
        // Terminal records were tallied above; drop them so the action
        // set stays bounded by the live workload.
        self.actions.retain(|_, action| !action.is_terminal());
        tracing::debug!(
            executed = report.executed,
            suppressed = report.suppressed_stale + report.suppressed_inapplicable,
            rescheduled = report.rescheduled,
            "sweep finished"
        );
        report
    }

    /// Why a claimed action no longer applies, if it doesn't
    fn inapplicable_reason<S: EntityStore>(
        &self,
        rule: &Rule,
        rules: &RuleStore,
        action: &PendingAction,
        option: &BookingOption,
        store: &S,
        config: &EngineConfig,
    ) -> Option<&'static str> {
        // A cancelled option suppresses everything except the mails the
        // cancellation itself triggered.
        let cancellation_triggered = matches!(
            action.event.as_ref().map(|e| &e.kind),
            Some(EventKind::OptionCancelled) | Some(EventKind::AnswerCancelled)
        );
        if option.cancelled && !cancellation_triggered {
            return Some("option cancelled");
        }

        if !option.visible && !config.send_for_invisible {
            return Some("option invisible");
        }

        // Fire-time override: a rule that overrides this one already sent
        // to the same (option, recipient). The send only invalidates
        // actions that were pending when it happened, so later triggers
        // start with a clean slate.
        for other in rules.iter() {
            if !other.overrides.contains(&action.key.rule) {
                continue;
            }
            let fired_at = self.fired.get(&(
                other.id.clone(),
                action.key.recipient.clone(),
                action.key.option.clone(),
            ));
            if fired_at.is_some_and(|at| *at >= action.scheduled_at) {
                return Some("overridden by a firing rule");
            }
        }

        // Recipient must still be selected under current entity state
        let mut ctx = EvalContext::new(option, store);
        if let Some(event) = action.event.as_ref() {
            ctx = ctx.with_event(event);
        }
        if !evaluate(&rule.recipients, &ctx).contains(&action.key.recipient) {
            return Some("recipient no longer selected");
        }

        None
    }

    fn finish(&mut self, id: &ActionId, key: &ActionKey, terminal: PendingAction) {
        self.index.remove(key);
        self.actions.insert(id.clone(), terminal);
    }

    fn drop_action(&mut self, id: &ActionId, key: &ActionKey) {
        self.index.remove(key);
        self.actions.remove(id);
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
