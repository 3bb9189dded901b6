// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use bn_core::adapters::{MailError, StoreError};
use bn_core::id::{OptionId, RuleId, UserId};
use bn_core::rulebook::LoadError;
use thiserror::Error;

/// Errors that can occur in the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Misconfigured rule (unknown kind, bad parameters)
    #[error("configuration error: {0}")]
    Configuration(#[from] LoadError),

    /// Referenced rule is missing from the store
    #[error("rule not found: {0}")]
    RuleNotFound(RuleId),

    /// Referenced option is missing from the record store
    #[error("option not found: {0}")]
    OptionNotFound(OptionId),

    /// Record store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Waitlist operation on a user who is not on the waitlist
    #[error("user {user} is not on the waitlist of option {option}")]
    NotWaitlisted { option: OptionId, user: UserId },

    /// Mail transport failure after the retry budget was spent
    #[error("delivery failed permanently: {0}")]
    Delivery(#[from] MailError),
}
