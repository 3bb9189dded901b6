// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain events forwarded by the host platform
//!
//! Events carry fixed entity references plus an open payload map for
//! event-specific data. The payload is a snapshot captured at emission
//! time and is embedded into any action scheduled from the event, so a
//! deferred mail renders state as it was when the event fired.

use crate::id::{OptionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The closed set of event types the engine reacts to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The whole option was cancelled
    OptionCancelled,
    /// A confirmed booking (answer) was cancelled
    AnswerCancelled,
    /// Option fields changed (dates, capacity, visibility)
    OptionUpdated,
    /// A teacher was assigned to the option
    TeacherAdded,
    /// A user joined the waitlist
    WaitlistBooked,
    /// A waitlist candidate was promoted and may book again
    FreeToBookAgain,
    /// Host-specific event for extensibility
    Custom(String),
}

impl EventKind {
    /// Parse a host event name. Unknown names map to `Custom` so rules
    /// can be written against host-specific events.
    pub fn parse(name: &str) -> Self {
        match name {
            "option_cancelled" => EventKind::OptionCancelled,
            "answer_cancelled" => EventKind::AnswerCancelled,
            "option_updated" => EventKind::OptionUpdated,
            "teacher_added" => EventKind::TeacherAdded,
            "waitlist_booked" => EventKind::WaitlistBooked,
            "free_to_book_again" => EventKind::FreeToBookAgain,
            other => EventKind::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> String {
        match self {
            EventKind::OptionCancelled => "option_cancelled".to_string(),
            EventKind::AnswerCancelled => "answer_cancelled".to_string(),
            EventKind::OptionUpdated => "option_updated".to_string(),
            EventKind::TeacherAdded => "teacher_added".to_string(),
            EventKind::WaitlistBooked => "waitlist_booked".to_string(),
            EventKind::FreeToBookAgain => "free_to_book_again".to_string(),
            EventKind::Custom(name) => name.clone(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A domain event with entity references and a payload snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub option_id: OptionId,
    /// The booking (answer) this event concerns, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_id: Option<String>,
    /// The user the event is about (e.g. the cancelled booker)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_user: Option<UserId>,
    /// The user who caused the event (e.g. the cancelling manager)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acting_user: Option<UserId>,
    /// Event-specific data captured at emission time
    #[serde(default)]
    pub payload: BTreeMap<String, String>,
}

impl DomainEvent {
    pub fn new(kind: EventKind, option_id: impl Into<OptionId>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            occurred_at,
            option_id: option_id.into(),
            answer_id: None,
            related_user: None,
            acting_user: None,
            payload: BTreeMap::new(),
        }
    }

    pub fn with_answer(mut self, answer_id: impl Into<String>) -> Self {
        self.answer_id = Some(answer_id.into());
        self
    }

    pub fn with_related_user(mut self, user: impl Into<UserId>) -> Self {
        self.related_user = Some(user.into());
        self
    }

    pub fn with_acting_user(mut self, user: impl Into<UserId>) -> Self {
        self.acting_user = Some(user.into());
        self
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
