// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recipient resolution for booking rules
//!
//! Evaluation is pure over the context it is handed. Role selectors
//! resolve against the option snapshot in the context, so evaluating at
//! execution time (with a freshly loaded snapshot) naturally honours role
//! changes that happened after scheduling: a teacher removed between
//! schedule and fire is simply no longer in the result set.

use crate::adapters::ProfileSource;
use crate::entity::BookingOption;
use crate::event::DomainEvent;
use crate::id::UserId;
use crate::rule::{MatchOp, Recipients};
use std::collections::BTreeSet;

/// Everything recipient resolution may look at
pub struct EvalContext<'a> {
    pub option: &'a BookingOption,
    /// The triggering event snapshot, if the rule is event-triggered
    pub event: Option<&'a DomainEvent>,
    pub profiles: &'a dyn ProfileSource,
}

impl<'a> EvalContext<'a> {
    pub fn new(option: &'a BookingOption, profiles: &'a dyn ProfileSource) -> Self {
        Self {
            option,
            event: None,
            profiles,
        }
    }

    pub fn with_event(mut self, event: &'a DomainEvent) -> Self {
        self.event = Some(event);
        self
    }
}

/// Resolve a recipient selector to the set of user ids it targets.
pub fn evaluate(recipients: &Recipients, ctx: &EvalContext) -> BTreeSet<UserId> {
    match recipients {
        Recipients::StudentsInOption => ctx.option.booked.iter().cloned().collect(),
        Recipients::TeachersInOption => ctx.option.teachers.iter().cloned().collect(),
        Recipients::ResponsibleContacts => {
            ctx.option.responsible_contacts.iter().cloned().collect()
        }
        Recipients::BookingManager => ctx.option.booking_manager.iter().cloned().collect(),
        Recipients::WaitlistInOption => {
            ctx.option.waitlist.iter().map(|e| e.user.clone()).collect()
        }
        Recipients::EventRelatedUser => ctx
            .event
            .and_then(|e| e.related_user.clone())
            .into_iter()
            .collect(),
        Recipients::UserList { users } => users.iter().cloned().collect(),
        Recipients::ProfileField { field, op, value } => participants(ctx.option)
            .into_iter()
            .filter(|user| {
                ctx.profiles
                    .profile_field(user, field)
                    .is_some_and(|stored| matches_op(op, &stored, value))
            })
            .collect(),
        Recipients::WaitlistRankBelow { rank } => ctx
            .option
            .waitlist_sorted()
            .into_iter()
            .filter(|e| !e.promoted)
            .take(*rank as usize)
            .map(|e| e.user.clone())
            .collect(),
    }
}

/// Booked plus waitlisted users, the base set for profile filtering
fn participants(option: &BookingOption) -> BTreeSet<UserId> {
    let mut users: BTreeSet<UserId> = option.booked.iter().cloned().collect();
    users.extend(option.waitlist.iter().map(|e| e.user.clone()));
    users
}

fn matches_op(op: &MatchOp, stored: &str, target: &str) -> bool {
    match op {
        MatchOp::Equals => stored == target,
        MatchOp::Contains => stored.contains(target),
    }
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
