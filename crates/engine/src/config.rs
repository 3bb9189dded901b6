// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration

use serde::{Deserialize, Serialize};

/// Host-level configuration for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Send mail for options flagged invisible. When false, a due action
    /// whose option turned invisible is suppressed at execution time.
    pub send_for_invisible: bool,
    /// Delivery attempts before an action is marked permanently failed
    pub max_delivery_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            send_for_invisible: false,
            max_delivery_attempts: 3,
        }
    }
}
