// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule registry with admin mutation tracking
//!
//! The store keeps the declarative rules and an epoch counter that bumps
//! on every administrative mutation. Pending actions carry the rule
//! fingerprint captured at schedule time; the epoch is the coarse signal
//! that *something* changed and reconciliation should run.

use bn_core::event::EventKind;
use bn_core::id::RuleId;
use bn_core::rule::Rule;
use std::collections::HashMap;

/// Registry of configured rules
#[derive(Debug, Default)]
pub struct RuleStore {
    rules: HashMap<RuleId, Rule>,
    epoch: u64,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a rule, bumping the epoch
    pub fn insert(&mut self, rule: Rule) -> Option<Rule> {
        self.epoch += 1;
        self.rules.insert(rule.id.clone(), rule)
    }

    /// Remove a rule, bumping the epoch if it existed
    pub fn remove(&mut self, id: &RuleId) -> Option<Rule> {
        let removed = self.rules.remove(id);
        if removed.is_some() {
            self.epoch += 1;
        }
        removed
    }

    pub fn get(&self, id: &RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }

    /// Rules triggered by the given event type, in stable id order
    pub fn by_event(&self, kind: &EventKind) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self
            .rules
            .values()
            .filter(|r| r.matches_event(kind))
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules
    }

    /// All time-relative rules, in stable id order
    pub fn time_relative(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self
            .rules
            .values()
            .filter(|r| r.is_time_relative())
            .collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Change counter, bumped on every insert/remove
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
