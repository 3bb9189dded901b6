// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter trait definitions for external integrations
//!
//! The record store, profile store, and mail transport belong to the host
//! platform. The engine consumes them through these traits; tests use the
//! in-memory implementations in this module's sibling.

use crate::entity::BookingOption;
use crate::id::{OptionId, UserId};
use async_trait::async_trait;
use thiserror::Error;

// =============================================================================
// Entity store
// =============================================================================

/// Errors from record store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("option not found: {0}")]
    OptionNotFound(OptionId),
}

/// Read access to stored user profile fields
pub trait ProfileSource: Send + Sync {
    fn profile_field(&self, user: &UserId, field: &str) -> Option<String>;
}

/// Adapter for the host record store
pub trait EntityStore: ProfileSource {
    /// Load the current snapshot of an option
    fn get_option(&self, id: &OptionId) -> Result<BookingOption, StoreError>;

    /// Write back an option snapshot
    fn put_option(&self, option: BookingOption);

    /// Remove an option
    fn delete_option(&self, id: &OptionId);

    /// All known option ids
    fn option_ids(&self) -> Vec<OptionId>;
}

// =============================================================================
// Mail transport
// =============================================================================

/// Errors from mail delivery
#[derive(Debug, Error)]
pub enum MailError {
    /// Transient transport failure, eligible for retry
    #[error("delivery failed for {user}: {reason}")]
    Delivery { user: UserId, reason: String },
}

/// Adapter for the host mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, user: &UserId, subject: &str, body: &str) -> Result<(), MailError>;
}
