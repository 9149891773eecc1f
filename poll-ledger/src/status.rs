use crate::{
    address::Address, manager::PollManager, poll::PollId, tally::TallyResult, time::Timestamp,
};

/// Read-only snapshot of one poll, as served to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct PollStatus {
    pub id: PollId,
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub expire_at: Timestamp,
    pub creator: Address,
    pub active: bool,
    pub finalized: bool,
    /// Number of ballots counted so far.
    pub votes: usize,
    /// Clear counts, present once the poll is finalized.
    pub results: Option<TallyResult>,
}

impl PollStatus {
    pub(crate) fn new(id: PollId, manager: &PollManager) -> Self {
        let poll = manager.poll();
        Self {
            id,
            title: poll.title().to_string(),
            description: poll.description().to_string(),
            options: poll.options().to_vec(),
            expire_at: poll.expire_at(),
            creator: poll.creator(),
            active: manager.is_active(),
            finalized: manager.is_finalized(),
            votes: manager.vote_count(),
            results: manager.results().ok().cloned(),
        }
    }
}
