use std::fmt;

/// Unix timestamp in seconds.
///
/// The ledger never reads a clock. Callers pass the current time into every
/// gated operation and the stored expiry is compared against that value, so
/// the passage of time on its own never mutates state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs)
    }

    pub const fn secs(self) -> u64 {
        self.0
    }

    /// The timestamp `secs` seconds later, saturating at the maximum.
    pub const fn offset(self, secs: u64) -> Self {
        Timestamp(self.0.saturating_add(secs))
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Timestamp(secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
