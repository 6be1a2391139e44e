// ABOUTME: Daily query quota snapshot returned by the usage limiter
// ABOUTME: Mirrors the row shape of the check-and-increment stored procedure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};

/// Per-user, per-day quota state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Whether the current request was admitted
    pub allowed: bool,
    /// Queries counted today (after the increment when admitted)
    pub queries_used: i32,
    /// Daily allowance for the user's role
    pub queries_limit: i32,
    /// Queries left as reported by the datastore
    pub remaining: i32,
}

impl UsageSnapshot {
    /// Remaining queries to report once the admitted turn is charged
    #[must_use]
    pub fn remaining_after_charge(&self) -> i32 {
        (self.remaining - 1).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_after_charge_never_negative() {
        let snapshot = UsageSnapshot {
            allowed: true,
            queries_used: 20,
            queries_limit: 20,
            remaining: 0,
        };
        assert_eq!(snapshot.remaining_after_charge(), 0);

        let snapshot = UsageSnapshot {
            remaining: 5,
            ..snapshot
        };
        assert_eq!(snapshot.remaining_after_charge(), 4);
    }
}
