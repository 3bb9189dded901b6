// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Booking-option snapshots observed from the host record store
//!
//! The engine never owns these entities. It reads their fields to resolve
//! recipients, compute reminder due times, and decide whether a deferred
//! mail still applies at execution time.

use crate::id::{OptionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single session date within an option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub starts_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, starts_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            starts_at,
        }
    }
}

/// A waitlist entry. `joined_at` is the only ordering key: the earliest
/// timestamp is first in line. Reordering rewrites the timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub user: UserId,
    pub joined_at: DateTime<Utc>,
    pub promoted: bool,
}

impl WaitlistEntry {
    pub fn new(user: impl Into<UserId>, joined_at: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            joined_at,
            promoted: false,
        }
    }
}

/// A read-only snapshot of a booking option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingOption {
    pub id: OptionId,
    pub title: String,
    pub visible: bool,
    pub cancelled: bool,
    /// Maximum number of confirmed bookings
    pub capacity: u32,
    pub waitlist_enabled: bool,
    pub course_start: Option<DateTime<Utc>>,
    pub course_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub teachers: Vec<UserId>,
    #[serde(default)]
    pub responsible_contacts: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_manager: Option<UserId>,
    /// Confirmed bookings
    #[serde(default)]
    pub booked: Vec<UserId>,
    #[serde(default)]
    pub waitlist: Vec<WaitlistEntry>,
}

impl BookingOption {
    pub fn new(id: impl Into<OptionId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            visible: true,
            cancelled: false,
            capacity: 0,
            waitlist_enabled: false,
            course_start: None,
            course_end: None,
            sessions: Vec::new(),
            teachers: Vec::new(),
            responsible_contacts: Vec::new(),
            booking_manager: None,
            booked: Vec::new(),
            waitlist: Vec::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_waitlist(mut self) -> Self {
        self.waitlist_enabled = true;
        self
    }

    pub fn with_course_start(mut self, start: DateTime<Utc>) -> Self {
        self.course_start = Some(start);
        self
    }

    pub fn with_course_end(mut self, end: DateTime<Utc>) -> Self {
        self.course_end = Some(end);
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.sessions.push(session);
        self
    }

    pub fn with_teacher(mut self, user: impl Into<UserId>) -> Self {
        self.teachers.push(user.into());
        self
    }

    pub fn with_responsible(mut self, user: impl Into<UserId>) -> Self {
        self.responsible_contacts.push(user.into());
        self
    }

    pub fn with_manager(mut self, user: impl Into<UserId>) -> Self {
        self.booking_manager = Some(user.into());
        self
    }

    pub fn with_booked(mut self, user: impl Into<UserId>) -> Self {
        self.booked.push(user.into());
        self
    }

    /// Resolve a named date field to (slot, timestamp) pairs.
    ///
    /// `coursestarttime` and `courseendtime` yield at most one slot.
    /// `sessions` yields one slot per session date, keyed `session:<id>`,
    /// so one time-relative rule can schedule several reminders for the
    /// same booking.
    pub fn date_slots(&self, field: &str) -> Vec<(String, DateTime<Utc>)> {
        match field {
            "coursestarttime" => self
                .course_start
                .map(|t| vec![(field.to_string(), t)])
                .unwrap_or_default(),
            "courseendtime" => self
                .course_end
                .map(|t| vec![(field.to_string(), t)])
                .unwrap_or_default(),
            "sessions" => self
                .sessions
                .iter()
                .map(|s| (format!("session:{}", s.id), s.starts_at))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of unclaimed confirmed slots
    pub fn free_slots(&self) -> u32 {
        self.capacity.saturating_sub(self.booked.len() as u32)
    }

    /// Waitlist entries sorted by recency, earliest first
    pub fn waitlist_sorted(&self) -> Vec<&WaitlistEntry> {
        let mut entries: Vec<&WaitlistEntry> = self.waitlist.iter().collect();
        entries.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        entries
    }

    /// Zero-based position in the waitlist among not-yet-promoted entries
    pub fn waitlist_rank(&self, user: &UserId) -> Option<usize> {
        self.waitlist_sorted()
            .iter()
            .filter(|e| !e.promoted)
            .position(|e| &e.user == user)
    }

    pub fn is_booked(&self, user: &UserId) -> bool {
        self.booked.contains(user)
    }

    pub fn is_waitlisted(&self, user: &UserId) -> bool {
        self.waitlist.iter().any(|e| &e.user == user)
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
