// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative booking rules: trigger, recipient selector, mail action
//!
//! A rule is immutable once a pending action references it; administrative
//! updates go through the rule store, which bumps its epoch and forces
//! delete-and-recreate of dependent pending actions. Staleness is detected
//! at execution time by comparing the rule's fingerprint (canonical JSON of
//! its recipient and action config) against the fingerprint captured when
//! the action was scheduled.

use crate::event::EventKind;
use crate::id::{RuleId, UserId};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What causes a rule to fire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire when the host forwards a matching event
    OnEvent { event: EventKind },
    /// Fire at a fixed offset from an entity date field.
    ///
    /// A positive offset fires before the date, a negative one after:
    /// `due = date - offset`. One signed formula, no sign branching.
    TimeRelative { date_field: String, offset_secs: i64 },
}

impl Trigger {
    /// Compute the absolute due time for a resolved date-field value.
    /// Only meaningful for time-relative triggers.
    pub fn due_at(&self, date_value: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::OnEvent { .. } => None,
            Trigger::TimeRelative { offset_secs, .. } => {
                Some(date_value - ChronoDuration::seconds(*offset_secs))
            }
        }
    }
}

/// Operator for profile-field matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOp {
    Equals,
    Contains,
}

/// Who receives the mail when a rule fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recipients {
    /// Users with a confirmed booking on the option
    StudentsInOption,
    /// Teachers assigned to the option
    TeachersInOption,
    /// Responsible contacts configured on the option
    ResponsibleContacts,
    /// The option's booking manager
    BookingManager,
    /// Users currently on the waitlist
    WaitlistInOption,
    /// The single user the triggering event is about
    EventRelatedUser,
    /// A fixed, config-provided user list
    UserList { users: Vec<UserId> },
    /// Participants whose stored profile field matches a target value
    ProfileField {
        field: String,
        op: MatchOp,
        value: String,
    },
    /// The first `rank` not-yet-promoted waitlist entries, in order
    WaitlistRankBelow { rank: u32 },
}

/// The mail to send when a rule fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAction {
    /// Subject template with `{placeholder}` substitution
    pub subject: String,
    /// Body template with `{placeholder}` substitution
    pub body: String,
    /// Minimum spacing between sends to the same recipient for the same
    /// option. A due action inside the window is rescheduled to
    /// `last_sent + interval`, not dropped.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde::option"
    )]
    pub interval: Option<Duration>,
}

impl MailAction {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            interval: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

/// A declarative booking rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub trigger: Trigger,
    pub recipients: Recipients,
    pub action: MailAction,
    /// Rules whose pending actions this rule's firing invalidates.
    /// Suppression is resolved at fire time: the overridden action is
    /// dropped at its own execution attempt, not at schedule time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<RuleId>,
}

impl Rule {
    pub fn new(
        id: impl Into<RuleId>,
        name: impl Into<String>,
        trigger: Trigger,
        recipients: Recipients,
        action: MailAction,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            trigger,
            recipients,
            action,
            overrides: Vec::new(),
        }
    }

    pub fn with_override(mut self, rule: impl Into<RuleId>) -> Self {
        self.overrides.push(rule.into());
        self
    }

    /// Does this rule's trigger match the given event type?
    pub fn matches_event(&self, kind: &EventKind) -> bool {
        matches!(&self.trigger, Trigger::OnEvent { event } if event == kind)
    }

    pub fn is_time_relative(&self) -> bool {
        matches!(self.trigger, Trigger::TimeRelative { .. })
    }

    /// Serialized snapshot of the condition and action config, used to
    /// detect staleness at execution time. Canonical: all maps in the
    /// serialized types are ordered, so equality is deterministic.
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Fingerprint<'a> {
            recipients: &'a Recipients,
            action: &'a MailAction,
            overrides: &'a [RuleId],
        }
        serde_json::to_string(&Fingerprint {
            recipients: &self.recipients,
            action: &self.action,
            overrides: &self.overrides,
        })
        .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
