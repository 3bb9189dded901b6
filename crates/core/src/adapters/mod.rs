// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter traits for external collaborators and in-memory implementations

mod memory;
mod traits;

pub use memory::{MemoryStore, RecordingMailer, SentMail};
pub use traits::{EntityStore, MailError, Mailer, ProfileSource, StoreError};
