use crate::{address::Address, time::Timestamp};
use std::fmt;
use thiserror::Error;

/// Hard ceiling on the number of options: option indices travel as a single
/// byte through the read API.
pub const OPTIONS_ABS_MAX: usize = u8::MAX as usize;

/// Unique poll identifier, allocated sequentially by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollId(u32);

impl PollId {
    pub const fn new(id: u32) -> Self {
        PollId(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }

    pub(crate) fn next(self) -> PollId {
        PollId(self.0 + 1)
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validation limits applied when a poll is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of options in one poll.
    pub max_options: usize,
    /// Maximum title length in bytes.
    pub max_title: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_options: 32,
            max_title: 256,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("poll title is empty")]
    EmptyTitle,

    #[error("poll title can be no more than {max} bytes long; got {actual} bytes")]
    TitleTooLong { max: usize, actual: usize },

    #[error("a poll needs at least 2 options; got {actual}")]
    InsufficientOptions { actual: usize },

    #[error("a poll can have at most {max} options; got {actual}")]
    TooManyOptions { max: usize, actual: usize },

    #[error("poll expiry {expire_at} is not after the current time {now}")]
    ExpiryNotInFuture {
        now: Timestamp,
        expire_at: Timestamp,
    },
}

/// Immutable definition of a poll: everything fixed at creation time.
///
/// Construction performs no validation; the create transition does, so a
/// rejected definition leaves no trace in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Poll {
    title: String,
    description: String,
    options: Vec<String>,
    expire_at: Timestamp,
    creator: Address,
}

impl Poll {
    pub fn new(
        title: String,
        description: String,
        options: Vec<String>,
        expire_at: Timestamp,
        creator: Address,
    ) -> Self {
        Self {
            title,
            description,
            options,
            expire_at,
            creator,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Ordered option labels; an option's position is its option index.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn expire_at(&self) -> Timestamp {
        self.expire_at
    }

    pub fn creator(&self) -> Address {
        self.creator
    }

    /// # Errors
    ///
    /// Fails when the title is empty or over the limit, when there are fewer
    /// than two or too many options, or when the expiry is not strictly in
    /// the future.
    pub fn validate(&self, now: Timestamp, limits: &Limits) -> Result<(), PollError> {
        if self.title.is_empty() {
            return Err(PollError::EmptyTitle);
        }
        if self.title.len() > limits.max_title {
            return Err(PollError::TitleTooLong {
                max: limits.max_title,
                actual: self.title.len(),
            });
        }
        if self.options.len() < 2 {
            return Err(PollError::InsufficientOptions {
                actual: self.options.len(),
            });
        }
        let max_options = limits.max_options.min(OPTIONS_ABS_MAX);
        if self.options.len() > max_options {
            return Err(PollError::TooManyOptions {
                max: max_options,
                actual: self.options.len(),
            });
        }
        if self.expire_at <= now {
            return Err(PollError::ExpiryNotInFuture {
                now,
                expire_at: self.expire_at,
            });
        }
        Ok(())
    }
}
