// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rulebook loader: converts raw TOML tables into validated rules.
//!
//! Per-rule problems (unknown recipient kind, missing trigger, bad
//! interval) are collected as errors and the offending rule is skipped;
//! the remaining rules still load. Only a syntactically broken file
//! fails as a whole.

use super::types::{RawRecipients, RawRule, RawRulebook};
use crate::event::EventKind;
use crate::id::UserId;
use crate::rule::{MailAction, MatchOp, Recipients, Rule, Trigger};
use std::path::Path;
use thiserror::Error;

const SECS_PER_DAY: i64 = 86_400;

/// Errors that can occur while loading a rulebook.
#[derive(Debug, Error)]
pub enum LoadError {
    /// TOML syntax error, fatal for the whole file
    #[error("TOML syntax error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error reading file
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Rule declares neither or both trigger forms
    #[error("rule '{rule}': exactly one of on_event or date_field is required")]
    AmbiguousTrigger { rule: String },

    /// Unknown recipient selector kind
    #[error("rule '{rule}': unknown recipient kind '{kind}'")]
    UnknownRecipientKind { rule: String, kind: String },

    /// Recipient selector missing a required parameter
    #[error("rule '{rule}': recipient kind '{kind}' requires '{field}'")]
    MissingRecipientField {
        rule: String,
        kind: String,
        field: &'static str,
    },

    /// Unknown profile-match operator
    #[error("rule '{rule}': unknown match op '{op}'")]
    UnknownMatchOp { rule: String, op: String },

    /// Unparseable interval
    #[error("rule '{rule}': bad interval '{value}': {source}")]
    BadInterval {
        rule: String,
        value: String,
        source: humantime::DurationError,
    },
}

/// The result of loading a rulebook: usable rules plus per-rule errors
#[derive(Debug, Default)]
pub struct Rulebook {
    pub rules: Vec<Rule>,
    pub errors: Vec<LoadError>,
}

/// Load a rulebook from TOML string content.
pub fn load_rulebook(toml_content: &str) -> Result<Rulebook, LoadError> {
    let raw: RawRulebook = toml::from_str(toml_content)?;

    let mut book = Rulebook::default();
    for raw_rule in raw.rules {
        match convert_rule(&raw_rule) {
            Ok(rule) => book.rules.push(rule),
            Err(e) => {
                tracing::warn!(rule = %raw_rule.id, error = %e, "skipping misconfigured rule");
                book.errors.push(e);
            }
        }
    }
    Ok(book)
}

/// Load a rulebook from a TOML file.
pub fn load_rulebook_file(path: &Path) -> Result<Rulebook, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_rulebook(&content)
}

fn convert_rule(raw: &RawRule) -> Result<Rule, LoadError> {
    let trigger = convert_trigger(raw)?;
    let recipients = convert_recipients(&raw.id, &raw.recipients)?;

    let mut action = MailAction::new(raw.subject.clone(), raw.body.clone());
    if let Some(value) = &raw.interval {
        let interval = humantime::parse_duration(value).map_err(|e| LoadError::BadInterval {
            rule: raw.id.clone(),
            value: value.clone(),
            source: e,
        })?;
        action = action.with_interval(interval);
    }

    let name = raw.name.clone().unwrap_or_else(|| raw.id.clone());
    let mut rule = Rule::new(raw.id.clone(), name, trigger, recipients, action);
    rule.overrides = raw.overrides.iter().map(|id| id.clone().into()).collect();
    Ok(rule)
}

fn convert_trigger(raw: &RawRule) -> Result<Trigger, LoadError> {
    match (&raw.on_event, &raw.date_field) {
        (Some(event), None) => Ok(Trigger::OnEvent {
            event: EventKind::parse(event),
        }),
        (None, Some(field)) => {
            let offset_secs =
                raw.days.unwrap_or(0) * SECS_PER_DAY + raw.seconds.unwrap_or(0);
            Ok(Trigger::TimeRelative {
                date_field: field.clone(),
                offset_secs,
            })
        }
        _ => Err(LoadError::AmbiguousTrigger {
            rule: raw.id.clone(),
        }),
    }
}

fn convert_recipients(rule: &str, raw: &RawRecipients) -> Result<Recipients, LoadError> {
    let require = |field: &'static str, value: &Option<String>| {
        value.clone().ok_or(LoadError::MissingRecipientField {
            rule: rule.to_string(),
            kind: raw.kind.clone(),
            field,
        })
    };

    match raw.kind.as_str() {
        "students_in_option" => Ok(Recipients::StudentsInOption),
        "teachers_in_option" => Ok(Recipients::TeachersInOption),
        "responsible_contacts" => Ok(Recipients::ResponsibleContacts),
        "booking_manager" => Ok(Recipients::BookingManager),
        "waitlist_in_option" => Ok(Recipients::WaitlistInOption),
        "event_related_user" => Ok(Recipients::EventRelatedUser),
        "user_list" => {
            let users = raw
                .users
                .clone()
                .ok_or(LoadError::MissingRecipientField {
                    rule: rule.to_string(),
                    kind: raw.kind.clone(),
                    field: "users",
                })?;
            Ok(Recipients::UserList {
                users: users.into_iter().map(UserId::from).collect(),
            })
        }
        "profile_field" => {
            let field = require("field", &raw.field)?;
            let value = require("value", &raw.value)?;
            let op = match raw.op.as_deref().unwrap_or("equals") {
                "equals" => MatchOp::Equals,
                "contains" => MatchOp::Contains,
                other => {
                    return Err(LoadError::UnknownMatchOp {
                        rule: rule.to_string(),
                        op: other.to_string(),
                    })
                }
            };
            Ok(Recipients::ProfileField { field, op, value })
        }
        "waitlist_rank_below" => {
            let rank = raw.rank.ok_or(LoadError::MissingRecipientField {
                rule: rule.to_string(),
                kind: raw.kind.clone(),
                field: "rank",
            })?;
            Ok(Recipients::WaitlistRankBelow { rank })
        }
        other => Err(LoadError::UnknownRecipientKind {
            rule: rule.to_string(),
            kind: other.to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
