// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A block timestamp: whole seconds since the Unix epoch. Consensus never
/// reads the wall clock; callers supply the time.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u32);

impl Timestamp {
    /// Sentinel for "never": paid-out comments park their cashout here.
    pub const MAX: Timestamp = Timestamp(u32::MAX);

    pub fn saturating_add_secs(self, secs: u32) -> Timestamp {
        Timestamp(self.0.saturating_add(secs))
    }

    pub fn saturating_sub_secs(self, secs: u32) -> Timestamp {
        Timestamp(self.0.saturating_sub(secs))
    }

    /// Seconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn secs_since(self, earlier: Timestamp) -> u32 {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<u32> for Timestamp {
    type Output = Timestamp;

    fn add(self, secs: u32) -> Timestamp {
        Timestamp(self.0 + secs)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = i64;

    fn sub(self, other: Timestamp) -> i64 {
        i64::from(self.0) - i64::from(other.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let t = Timestamp(100);
        assert_eq!(t + 20, Timestamp(120));
        assert_eq!(Timestamp(120) - t, 20);
        assert_eq!(t - Timestamp(120), -20);
        assert_eq!(t.secs_since(Timestamp(120)), 0);
        assert_eq!(Timestamp::MAX.saturating_add_secs(10), Timestamp::MAX);
    }
}
