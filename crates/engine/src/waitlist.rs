// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Waitlist ordering, promotion, and reordering
//!
//! Order is derived purely from the `joined_at` timestamp, earliest
//! first. Reordering rewrites that timestamp from the target rank's
//! neighbors and nothing else; the sorted order is re-derived from
//! scratch on every read.
//!
//! Promotion targets exactly one candidate at a time: the earliest
//! not-yet-promoted entry gets a confirmed slot and a `FreeToBookAgain`
//! event scoped to that single user. A capacity increase promotes once
//! per newly free slot, each promotion carrying its own event.

use crate::error::EngineError;
use bn_core::adapters::EntityStore;
use bn_core::entity::WaitlistEntry;
use bn_core::event::{DomainEvent, EventKind};
use bn_core::id::{OptionId, UserId};
use chrono::{DateTime, Duration, Utc};

/// One waitlist promotion: who moved up, and the event to dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub user: UserId,
    pub event: DomainEvent,
}

/// Append a user to the waitlist. Booked or already-waitlisted users
/// are left where they are.
pub fn enqueue<S: EntityStore>(
    store: &S,
    option_id: &OptionId,
    user: impl Into<UserId>,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    let user = user.into();
    let mut option = store.get_option(option_id)?;
    if option.is_booked(&user) || option.is_waitlisted(&user) {
        tracing::debug!(option = %option_id, user = %user, "already present, enqueue skipped");
        return Ok(());
    }
    option.waitlist.push(WaitlistEntry::new(user.clone(), now));
    store.put_option(option);
    tracing::info!(option = %option_id, user = %user, "user joined waitlist");
    Ok(())
}

/// Remove a confirmed booking, freeing a slot for promotion
pub fn release_booking<S: EntityStore>(
    store: &S,
    option_id: &OptionId,
    user: &UserId,
) -> Result<(), EngineError> {
    let mut option = store.get_option(option_id)?;
    option.booked.retain(|u| u != user);
    store.put_option(option);
    Ok(())
}

/// Promote the earliest not-yet-promoted waitlist entry into a free
/// confirmed slot. Returns `None` when the waitlist is disabled, no
/// slot is free, or no candidate remains.
pub fn promote_next<S: EntityStore>(
    store: &S,
    option_id: &OptionId,
    now: DateTime<Utc>,
) -> Result<Option<Promotion>, EngineError> {
    let mut option = store.get_option(option_id)?;
    if !option.waitlist_enabled || option.free_slots() == 0 {
        return Ok(None);
    }
    let Some(user) = option
        .waitlist_sorted()
        .into_iter()
        .find(|e| !e.promoted)
        .map(|e| e.user.clone())
    else {
        return Ok(None);
    };

    for entry in &mut option.waitlist {
        if entry.user == user {
            entry.promoted = true;
        }
    }
    option.booked.push(user.clone());

    // One event for one candidate, never a waitlist-wide broadcast
    let event = DomainEvent::new(EventKind::FreeToBookAgain, option_id.clone(), now)
        .with_related_user(user.clone())
        .with_payload("title", option.title.clone());
    store.put_option(option);
    tracing::info!(option = %option_id, user = %user, "waitlist candidate promoted");
    Ok(Some(Promotion { user, event }))
}

/// Promote one candidate per free confirmed slot, e.g. after a capacity
/// increase. Stops when slots or candidates run out.
pub fn apply_capacity<S: EntityStore>(
    store: &S,
    option_id: &OptionId,
    now: DateTime<Utc>,
) -> Result<Vec<Promotion>, EngineError> {
    let mut promotions = Vec::new();
    while let Some(promotion) = promote_next(store, option_id, now)? {
        promotions.push(promotion);
    }
    Ok(promotions)
}

/// Move a waitlisted user to `new_rank` among not-yet-promoted entries
/// by rewriting the entry's timestamp relative to its new neighbors.
pub fn reorder<S: EntityStore>(
    store: &S,
    option_id: &OptionId,
    user: &UserId,
    new_rank: usize,
) -> Result<(), EngineError> {
    let mut option = store.get_option(option_id)?;
    if !option.is_waitlisted(user) {
        return Err(EngineError::NotWaitlisted {
            option: option_id.clone(),
            user: user.clone(),
        });
    }

    let others: Vec<DateTime<Utc>> = option
        .waitlist_sorted()
        .into_iter()
        .filter(|e| !e.promoted && &e.user != user)
        .map(|e| e.joined_at)
        .collect();

    let new_joined_at = if others.is_empty() {
        // Sole entry, rank is already whatever it is
        return Ok(());
    } else if new_rank == 0 {
        others[0] - Duration::seconds(1)
    } else if new_rank >= others.len() {
        others[others.len() - 1] + Duration::seconds(1)
    } else {
        let before = others[new_rank - 1];
        let after = others[new_rank];
        before + (after - before) / 2
    };

    for entry in &mut option.waitlist {
        if &entry.user == user {
            entry.joined_at = new_joined_at;
        }
    }
    store.put_option(option);
    tracing::info!(option = %option_id, user = %user, rank = new_rank, "waitlist entry reordered");
    Ok(())
}

#[cfg(test)]
#[path = "waitlist_tests.rs"]
mod tests;
