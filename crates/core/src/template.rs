// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template variable interpolation for mail subjects and bodies

use crate::entity::BookingOption;
use crate::event::DomainEvent;
use crate::id::UserId;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

// Regex pattern for {variable_name} - this is a constant valid pattern
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("constant regex pattern is valid")
});

/// Interpolate `{name}` placeholders with values from the vars map
///
/// Unknown template variables are left as-is.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> String {
    VAR_PATTERN
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            vars.get(name)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

/// Placeholder values derived from the option snapshot alone
pub fn entity_vars(option: &BookingOption) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("title".to_string(), option.title.clone());
    vars.insert("optionid".to_string(), option.id.to_string());
    vars.insert(
        "participants".to_string(),
        option.booked.len().to_string(),
    );
    if let Some(start) = option.course_start {
        vars.insert("coursestarttime".to_string(), start.to_rfc3339());
    }
    if let Some(end) = option.course_end {
        vars.insert("courseendtime".to_string(), end.to_rfc3339());
    }
    vars
}

fn personalize(
    mut vars: HashMap<String, String>,
    event: Option<&DomainEvent>,
    recipient: &UserId,
) -> HashMap<String, String> {
    vars.insert("userid".to_string(), recipient.to_string());
    if let Some(event) = event {
        vars.insert("eventtype".to_string(), event.kind.name());
        for (key, value) in &event.payload {
            vars.insert(key.clone(), value.clone());
        }
    }
    vars
}

/// Build the variable map for one (option, event, recipient) triple.
///
/// Structural fields come from the current option snapshot; the event
/// payload is layered on top and wins on key collision, so deferred mail
/// renders event data as captured at trigger time.
pub fn mail_vars(
    option: &BookingOption,
    event: Option<&DomainEvent>,
    recipient: &UserId,
) -> HashMap<String, String> {
    personalize(entity_vars(option), event, recipient)
}

/// Pass-scoped memoization of entity-derived placeholder values.
///
/// Only values that depend solely on the option snapshot are cached,
/// keyed by option id and discarded with the pass. Recipient and
/// event-snapshot values are layered fresh on every call, so two actions
/// sharing an option each render their own trigger-time data.
#[derive(Default)]
pub struct RenderPass {
    entity_cache: HashMap<String, HashMap<String, String>>,
}

impl RenderPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder values for one action: memoized entity values plus
    /// the action's own recipient and event snapshot.
    pub fn vars(
        &mut self,
        option: &BookingOption,
        event: Option<&DomainEvent>,
        recipient: &UserId,
    ) -> HashMap<String, String> {
        let base = self
            .entity_cache
            .entry(option.id.to_string())
            .or_insert_with(|| entity_vars(option))
            .clone();
        personalize(base, event, recipient)
    }

    /// Number of options with cached entity values
    pub fn cached_count(&self) -> usize {
        self.entity_cache.len()
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
