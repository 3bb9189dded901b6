// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! bn-core: Core library for the booking notification (bn) engine
//!
//! This crate provides:
//! - The declarative rule model (triggers, recipient selectors, mail actions)
//! - Pure state machines for pending mail actions
//! - Recipient resolution against booking-option snapshots
//! - Template interpolation for message subjects and bodies
//! - Adapter traits for external integrations (record store, mail transport)
//! - TOML rulebook parsing

pub mod clock;
pub mod id;

pub mod adapters;
pub mod condition;
pub mod entity;
pub mod event;
pub mod pending;
pub mod rule;
pub mod rulebook;
pub mod template;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use condition::{evaluate, EvalContext};
pub use entity::{BookingOption, Session, WaitlistEntry};
pub use event::{DomainEvent, EventKind};
pub use id::{ActionId, IdGen, OptionId, RuleId, SequentialIdGen, UserId, UuidIdGen};
pub use pending::{ActionKey, ActionState, PendingAction};
pub use rule::{MailAction, MatchOp, Recipients, Rule, Trigger};

// Re-export adapters
pub use adapters::{EntityStore, MailError, Mailer, MemoryStore, RecordingMailer, StoreError};
