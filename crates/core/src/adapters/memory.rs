// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory adapter implementations
//!
//! `MemoryStore` backs tests and embedded use; `RecordingMailer` captures
//! outgoing mail for assertions and can be scripted to fail delivery.

use super::traits::{EntityStore, MailError, Mailer, ProfileSource, StoreError};
use crate::entity::BookingOption;
use crate::id::{OptionId, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// In-memory record store
#[derive(Clone, Default)]
pub struct MemoryStore {
    options: Arc<RwLock<HashMap<OptionId, BookingOption>>>,
    profiles: Arc<RwLock<HashMap<(UserId, String), String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a stored profile field for a user
    pub fn set_profile_field(
        &self,
        user: impl Into<UserId>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        profiles.insert((user.into(), field.into()), value.into());
    }
}

impl ProfileSource for MemoryStore {
    fn profile_field(&self, user: &UserId, field: &str) -> Option<String> {
        let profiles = self.profiles.read().unwrap_or_else(|e| e.into_inner());
        profiles.get(&(user.clone(), field.to_string())).cloned()
    }
}

impl EntityStore for MemoryStore {
    fn get_option(&self, id: &OptionId) -> Result<BookingOption, StoreError> {
        let options = self.options.read().unwrap_or_else(|e| e.into_inner());
        options
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::OptionNotFound(id.clone()))
    }

    fn put_option(&self, option: BookingOption) {
        let mut options = self.options.write().unwrap_or_else(|e| e.into_inner());
        options.insert(option.id.clone(), option);
    }

    fn delete_option(&self, id: &OptionId) {
        let mut options = self.options.write().unwrap_or_else(|e| e.into_inner());
        options.remove(id);
    }

    fn option_ids(&self) -> Vec<OptionId> {
        let options = self.options.read().unwrap_or_else(|e| e.into_inner());
        options.keys().cloned().collect()
    }
}

/// A mail captured by [`RecordingMailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub user: UserId,
    pub subject: String,
    pub body: String,
}

/// Mailer that records sends instead of delivering
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentMail>>>,
    /// Remaining scripted failures per user
    failures: Arc<Mutex<HashMap<UserId, u32>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` sends to `user` fail with a transient error
    pub fn fail_next(&self, user: impl Into<UserId>, count: u32) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.insert(user.into(), count);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_to(&self, user: &UserId) -> Vec<SentMail> {
        self.sent()
            .into_iter()
            .filter(|m| &m.user == user)
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, user: &UserId, subject: &str, body: &str) -> Result<(), MailError> {
        {
            let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(remaining) = failures.get_mut(user) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(MailError::Delivery {
                        user: user.clone(),
                        reason: "scripted failure".to_string(),
                    });
                }
            }
        }

        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push(SentMail {
            user: user.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
