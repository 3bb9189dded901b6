// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Notifier` facade the host platform calls into
//!
//! Owns the rule registry and the action scheduler and borrows the
//! host-provided adapters (record store, mail transport, clock, id
//! source). Everything is driven externally: the host forwards domain
//! events, pokes reconciliation on entity mutation, and ticks the due
//! sweep from its own task queue. No internal timers or threads.

use crate::config::EngineConfig;
use crate::dispatch::dispatch_event;
use crate::error::EngineError;
use crate::scanner::{reconcile_option, ReconcileReport};
use crate::scheduler::{ActionScheduler, SweepReport};
use crate::store::RuleStore;
use crate::waitlist;
use bn_core::adapters::{EntityStore, Mailer};
use bn_core::clock::Clock;
use bn_core::event::{DomainEvent, EventKind};
use bn_core::id::{ActionId, IdGen, OptionId, RuleId, UserId};
use bn_core::rule::Rule;
use bn_core::rulebook::load_rulebook;

/// Booking notification engine facade
pub struct Notifier<S, M, C, G> {
    rules: RuleStore,
    scheduler: ActionScheduler,
    config: EngineConfig,
    store: S,
    mailer: M,
    clock: C,
    ids: G,
}

impl<S, M, C, G> Notifier<S, M, C, G>
where
    S: EntityStore,
    M: Mailer,
    C: Clock,
    G: IdGen,
{
    pub fn new(store: S, mailer: M, clock: C, ids: G, config: EngineConfig) -> Self {
        Self {
            rules: RuleStore::new(),
            scheduler: ActionScheduler::new(),
            config,
            store,
            mailer,
            clock,
            ids,
        }
    }

    /// Load rules from a TOML rulebook, replacing same-id rules and
    /// reconciling every known option. Individually broken rules are
    /// skipped; a malformed document is fatal.
    pub fn load_rulebook_str(&mut self, toml: &str) -> Result<usize, EngineError> {
        let rulebook = load_rulebook(toml)?;
        let count = rulebook.rules.len();
        for rule in rulebook.rules {
            self.rules.insert(rule);
        }
        self.reconcile_all();
        Ok(count)
    }

    /// Forward a domain event from the host. Matching rules fan out into
    /// pending actions; booking-lifecycle events additionally move the
    /// waitlist, and each resulting promotion is dispatched as its own
    /// `FreeToBookAgain` event.
    pub fn submit_event(&mut self, event: &DomainEvent) -> Result<Vec<ActionId>, EngineError> {
        let now = self.clock.now();
        let mut scheduled = dispatch_event(
            event,
            &self.rules,
            &self.store,
            &mut self.scheduler,
            &self.ids,
            now,
        );

        match &event.kind {
            EventKind::AnswerCancelled => {
                if let Some(user) = &event.related_user {
                    waitlist::release_booking(&self.store, &event.option_id, user)?;
                }
                scheduled.extend(self.promote_free_slots(&event.option_id)?);
            }
            EventKind::OptionUpdated => {
                // Dates or capacity may have moved
                self.reconcile_option(&event.option_id);
                scheduled.extend(self.promote_free_slots(&event.option_id)?);
            }
            _ => {}
        }
        Ok(scheduled)
    }

    /// Converge time-relative actions for one option
    pub fn reconcile_option(&mut self, option_id: &OptionId) -> ReconcileReport {
        reconcile_option(
            option_id,
            &self.rules,
            &self.store,
            &mut self.scheduler,
            &self.ids,
            self.clock.now(),
        )
    }

    /// Converge time-relative actions for every option in the store
    pub fn reconcile_all(&mut self) -> ReconcileReport {
        let mut total = ReconcileReport::default();
        for option_id in self.store.option_ids() {
            let report = self.reconcile_option(&option_id);
            total.scheduled += report.scheduled;
            total.replaced += report.replaced;
            total.cancelled += report.cancelled;
            total.unchanged += report.unchanged;
        }
        total
    }

    /// Execute everything due as of the current clock. Invoked by the
    /// host's task-queue tick.
    pub async fn sweep_due_actions(&mut self) -> SweepReport {
        let as_of = self.clock.now();
        self.scheduler
            .sweep(as_of, &self.rules, &self.store, &self.mailer, &self.config)
            .await
    }

    /// Insert or replace a rule, then reconcile so time-relative actions
    /// pick up the new fingerprint and due times.
    pub fn admin_update_rule(&mut self, rule: Rule) -> ReconcileReport {
        tracing::info!(rule = %rule.id, "rule updated");
        self.rules.insert(rule);
        self.reconcile_all()
    }

    /// Delete a rule and cascade-cancel its pending actions
    pub fn admin_delete_rule(&mut self, id: &RuleId) -> Result<usize, EngineError> {
        if self.rules.remove(id).is_none() {
            return Err(EngineError::RuleNotFound(id.clone()));
        }
        let cancelled = self.scheduler.cancel_rule(id);
        tracing::info!(rule = %id, cancelled, "rule deleted");
        Ok(cancelled)
    }

    /// Put a user on the waitlist and dispatch the `WaitlistBooked` event
    pub fn enqueue_waitlist(
        &mut self,
        option_id: &OptionId,
        user: impl Into<UserId>,
    ) -> Result<Vec<ActionId>, EngineError> {
        let user = user.into();
        let now = self.clock.now();
        waitlist::enqueue(&self.store, option_id, user.clone(), now)?;
        let event = DomainEvent::new(EventKind::WaitlistBooked, option_id.clone(), now)
            .with_related_user(user);
        self.submit_event(&event)
    }

    /// Move a waitlisted user to a new rank
    pub fn reorder_waitlist(
        &mut self,
        option_id: &OptionId,
        user: &UserId,
        new_rank: usize,
    ) -> Result<(), EngineError> {
        waitlist::reorder(&self.store, option_id, user, new_rank)
    }

    /// Promote the next candidate into a free slot, dispatching the
    /// single-candidate event. Returns the promoted user, if any.
    pub fn promote_next(&mut self, option_id: &OptionId) -> Result<Option<UserId>, EngineError> {
        let now = self.clock.now();
        match waitlist::promote_next(&self.store, option_id, now)? {
            Some(promotion) => {
                dispatch_event(
                    &promotion.event,
                    &self.rules,
                    &self.store,
                    &mut self.scheduler,
                    &self.ids,
                    now,
                );
                Ok(Some(promotion.user))
            }
            None => Ok(None),
        }
    }

    /// Promote per free slot and dispatch each promotion's event
    fn promote_free_slots(&mut self, option_id: &OptionId) -> Result<Vec<ActionId>, EngineError> {
        let now = self.clock.now();
        let mut scheduled = Vec::new();
        for promotion in waitlist::apply_capacity(&self.store, option_id, now)? {
            scheduled.extend(dispatch_event(
                &promotion.event,
                &self.rules,
                &self.store,
                &mut self.scheduler,
                &self.ids,
                now,
            ));
        }
        Ok(scheduled)
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn scheduler(&self) -> &ActionScheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
