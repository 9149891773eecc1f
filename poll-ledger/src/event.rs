use crate::{address::Address, poll::PollId, time::Timestamp};
use poll_fhe::RequestId;
use strum_macros::{Display, EnumIter};

/// Entry of the ledger's event log: ordered, append-only, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PollCreated {
        id: PollId,
        creator: Address,
        title: String,
        expire_at: Timestamp,
    },
    VoteCast {
        id: PollId,
        voter: Address,
    },
    PollEnded {
        id: PollId,
    },
    FinalizeRequested {
        id: PollId,
        request: RequestId,
    },
    ResultsPublished {
        id: PollId,
        results: Vec<u32>,
    },
}

impl Event {
    /// The poll this event belongs to.
    pub fn poll(&self) -> PollId {
        match self {
            Event::PollCreated { id, .. }
            | Event::VoteCast { id, .. }
            | Event::PollEnded { id }
            | Event::FinalizeRequested { id, .. }
            | Event::ResultsPublished { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::PollCreated { .. } => EventKind::PollCreated,
            Event::VoteCast { .. } => EventKind::VoteCast,
            Event::PollEnded { .. } => EventKind::PollEnded,
            Event::FinalizeRequested { .. } => EventKind::FinalizeRequested,
            Event::ResultsPublished { .. } => EventKind::ResultsPublished,
        }
    }
}

/// Discriminant of [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum EventKind {
    PollCreated,
    VoteCast,
    PollEnded,
    FinalizeRequested,
    ResultsPublished,
}
