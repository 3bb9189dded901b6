// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw data types mirroring rulebook TOML structure.
//!
//! No validation happens here; the loader turns these into `Rule` values
//! and reports per-rule errors.

use serde::Deserialize;

/// A whole rulebook file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRulebook {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RawRule>,
}

/// One `[[rule]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct RawRule {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,

    // Trigger: exactly one of `on_event` or `date_field` must be set.
    #[serde(default)]
    pub on_event: Option<String>,
    #[serde(default)]
    pub date_field: Option<String>,
    /// Day part of the offset; positive fires before the date
    #[serde(default)]
    pub days: Option<i64>,
    /// Second part of the offset, added to `days`
    #[serde(default)]
    pub seconds: Option<i64>,

    pub recipients: RawRecipients,

    pub subject: String,
    pub body: String,
    /// Repeat-suppression window, humantime syntax (`"30m"`, `"1day"`)
    #[serde(default)]
    pub interval: Option<String>,

    #[serde(default)]
    pub overrides: Vec<String>,
}

/// The `recipients` table of a rule
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecipients {
    pub kind: String,
    #[serde(default)]
    pub users: Option<Vec<String>>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub rank: Option<u32>,
}
