// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rulebook parsing and loading.
//!
//! A rulebook is a TOML file declaring booking rules. This module
//! provides:
//!
//! - **types**: Raw data types that mirror TOML structure
//! - **loader**: Conversion to [`crate::rule::Rule`] with per-rule
//!   validation
//!
//! A malformed file is a hard error; a malformed individual rule is a
//! configuration error that skips that rule and leaves the rest of the
//! rulebook usable.

mod loader;
mod types;

pub use loader::{load_rulebook, load_rulebook_file, LoadError, Rulebook};
pub use types::{RawRecipients, RawRule, RawRulebook};
