//! Confidential multi-option polls over an encrypted tally.
//!
//! The per-option counts of an open poll only exist as ciphertext handles;
//! votes update them homomorphically through the `poll-fhe` boundary, and an
//! external oracle decrypts the whole batch once the poll has ended. The
//! [`PollLedger`] applies every operation as an atomic transition: it takes
//! the current ledger value and either returns the successor or an error,
//! never a partially mutated state.

pub mod address;
pub mod event;
pub mod ledger;
pub mod manager;
pub mod poll;
pub mod status;
pub mod tally;
#[cfg(any(test, feature = "property-test-api"))]
pub mod testing;
pub mod time;
pub mod vote;

pub use crate::{
    address::Address,
    event::{Event, EventKind},
    ledger::{Error, PollLedger},
    manager::{PollManager, Stage, TallyError, VoteError, LEDGER_PRINCIPAL},
    poll::{Limits, Poll, PollError, PollId},
    status::PollStatus,
    tally::{MalformedCleartext, TallyResult},
    time::Timestamp,
    vote::{Payload, VoteCast},
};
