// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! bn-engine: Runtime for the booking notification engine
//!
//! This crate wires the pure state machines from `bn-core` into a
//! running engine: rule registry with admin mutation, the durable
//! pending-action scheduler with its claim-then-revalidate execution
//! protocol, time-relative reconciliation, waitlist promotion, and the
//! `Notifier` facade the host calls into.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod runtime;
pub mod scanner;
pub mod scheduler;
pub mod store;
pub mod waitlist;

pub use config::EngineConfig;
pub use dispatch::dispatch_event;
pub use error::EngineError;
pub use runtime::Notifier;
pub use scanner::{reconcile_option, ReconcileReport};
pub use scheduler::{ActionScheduler, ExecutionOutcome, SweepReport};
pub use store::RuleStore;
pub use waitlist::Promotion;
