use crate::{address::Address, poll::Poll, tally::TallyResult, time::Timestamp, vote::Payload};
use poll_fhe::{Ciphertext, FheBackend, FheError, Principal, RequestId};
use std::collections::BTreeSet;
use thiserror::Error;

/// ACL identity of the ledger itself; every tally counter stays decryptable
/// under it so finalization can batch the whole poll.
pub const LEDGER_PRINCIPAL: Principal = Principal::new(*b"poll-ledger/tally-authority/v1\0\0");

/// Lifecycle of a poll. The stage only moves forward; `Finalized` is
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Accepting ballots until the expiry passes.
    Active,
    /// Explicitly ended; the tally counters are frozen.
    Ended,
    /// A batched decryption of the counters is pending with the oracle.
    FinalizeRequested { request: RequestId },
    /// Clear results are published.
    Finalized { results: TallyResult },
}

impl Stage {
    pub fn is_active(&self) -> bool {
        matches!(self, Stage::Active)
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, Stage::Finalized { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("the poll is no longer active")]
    NotActive,

    #[error("the poll expired at {expire_at}, current time {now}")]
    Expired {
        expire_at: Timestamp,
        now: Timestamp,
    },

    #[error("{voter} has already voted in this poll")]
    AlreadyVoted { voter: Address },

    #[error(transparent)]
    Backend(#[from] FheError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TallyError {
    #[error("the poll does not expire until {expire_at}, current time {now}")]
    NotExpired {
        expire_at: Timestamp,
        now: Timestamp,
    },

    #[error("the poll has already been ended")]
    AlreadyEnded,

    #[error("the poll is still active")]
    StillActive,

    #[error("finalization request {request} is already pending")]
    AlreadyRequested { request: RequestId },

    #[error("the poll has no pending finalization request")]
    NotRequested,

    #[error("delivered request {actual} does not match the pending request {expected}")]
    RequestMismatch {
        expected: RequestId,
        actual: RequestId,
    },

    #[error("the poll is already finalized")]
    AlreadyFinalized,

    #[error("results are not available until the poll is finalized")]
    ResultsNotAvailable,

    #[error("expected {expected} counters from the oracle, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Backend(#[from] FheError),
}

/// State machine of a single poll: the immutable definition, the encrypted
/// per-option counters, the voters seen so far and the lifecycle stage.
///
/// Transitions take `&self` and return the successor state; on error the
/// current state is untouched. There is exactly one counter per option for
/// the poll's entire lifetime and counters are never decremented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollManager {
    poll: Poll,
    stage: Stage,
    voters: BTreeSet<Address>,
    counters: Box<[Ciphertext]>,
}

impl PollManager {
    /// Fresh manager with one zero-valued encrypted counter per option,
    /// each kept decryptable by the ledger.
    pub fn new<F: FheBackend>(fhe: &mut F, poll: Poll) -> Self {
        let counters = poll
            .options()
            .iter()
            .map(|_| {
                let counter = fhe.encrypt_zero();
                fhe.allow(counter, LEDGER_PRINCIPAL);
                counter
            })
            .collect();
        Self {
            poll,
            stage: Stage::Active,
            voters: BTreeSet::new(),
            counters,
        }
    }

    pub fn poll(&self) -> &Poll {
        &self.poll
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn is_active(&self) -> bool {
        self.stage.is_active()
    }

    pub fn is_finalized(&self) -> bool {
        self.stage.is_finalized()
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.voters.contains(voter)
    }

    /// Number of ballots counted so far.
    pub fn vote_count(&self) -> usize {
        self.voters.len()
    }

    /// Encrypted counters, index-aligned with the options.
    pub fn counters(&self) -> &[Ciphertext] {
        &self.counters
    }

    /// Encrypted counter of one option.
    pub fn counter(&self, option: u8) -> Option<Ciphertext> {
        self.counters.get(usize::from(option)).copied()
    }

    /// Clear results of a finalized poll.
    pub fn results(&self) -> Result<&TallyResult, TallyError> {
        match &self.stage {
            Stage::Finalized { results } => Ok(results),
            _ => Err(TallyError::ResultsNotAvailable),
        }
    }

    /// Apply one ballot.
    ///
    /// The tally update touches every option: the ballot is compared against
    /// each option index in the encrypted domain and the matching counter
    /// grows by an encrypted one, all others by an encrypted zero. No
    /// cleartext branch depends on the ballot. Every updated counter is
    /// re-authorized for the ledger and for the voter.
    pub fn vote<F: FheBackend>(
        &self,
        fhe: &mut F,
        now: Timestamp,
        voter: Address,
        payload: &Payload,
    ) -> Result<Self, VoteError> {
        if !self.stage.is_active() {
            return Err(VoteError::NotActive);
        }
        if now >= self.poll.expire_at() {
            return Err(VoteError::Expired {
                expire_at: self.poll.expire_at(),
                now,
            });
        }
        if self.voters.contains(&voter) {
            return Err(VoteError::AlreadyVoted { voter });
        }

        let domain = self.counters.len() as u32;
        let choice = fhe.import(payload.ciphertext(), payload.proof(), domain)?;
        let one = fhe.trivial(1);
        let zero = fhe.trivial(0);

        let mut counters = self.counters.clone();
        for (index, counter) in counters.iter_mut().enumerate() {
            let option = fhe.trivial(index as u32);
            let selected = fhe.eq(choice, option);
            let amount = fhe.select(selected, one, zero);
            *counter = fhe.add(*counter, amount);
            fhe.allow(*counter, LEDGER_PRINCIPAL);
            fhe.allow(*counter, voter.into());
        }

        let mut voters = self.voters.clone();
        voters.insert(voter);

        Ok(Self {
            poll: self.poll.clone(),
            stage: Stage::Active,
            voters,
            counters,
        })
    }

    /// Explicitly end the poll once its expiry has passed. The expiry alone
    /// never flips the stored stage; it only gates this transition and the
    /// ballot path.
    pub fn end(&self, now: Timestamp) -> Result<Self, TallyError> {
        match &self.stage {
            Stage::Active => (),
            Stage::Ended | Stage::FinalizeRequested { .. } => {
                return Err(TallyError::AlreadyEnded)
            }
            Stage::Finalized { .. } => return Err(TallyError::AlreadyFinalized),
        }
        if now < self.poll.expire_at() {
            return Err(TallyError::NotExpired {
                expire_at: self.poll.expire_at(),
                now,
            });
        }
        Ok(self.with_stage(Stage::Ended))
    }

    /// Submit the full ordered counter batch for decryption.
    ///
    /// At most one request is live per poll; a second submission while the
    /// first is pending is rejected.
    pub fn request_finalize<F: FheBackend>(
        &self,
        fhe: &mut F,
    ) -> Result<(Self, RequestId), TallyError> {
        match &self.stage {
            Stage::Active => return Err(TallyError::StillActive),
            Stage::Ended => (),
            Stage::FinalizeRequested { request } => {
                return Err(TallyError::AlreadyRequested { request: *request })
            }
            Stage::Finalized { .. } => return Err(TallyError::AlreadyFinalized),
        }
        let request = fhe.request_decryption(&self.counters)?;
        Ok((
            self.with_stage(Stage::FinalizeRequested { request }),
            request,
        ))
    }

    /// Commit decrypted counts delivered for `request`.
    pub fn publish(&self, request: RequestId, counts: Vec<u32>) -> Result<Self, TallyError> {
        match &self.stage {
            Stage::Active => return Err(TallyError::StillActive),
            Stage::Ended => return Err(TallyError::NotRequested),
            Stage::FinalizeRequested { request: pending } => {
                if *pending != request {
                    return Err(TallyError::RequestMismatch {
                        expected: *pending,
                        actual: request,
                    });
                }
            }
            Stage::Finalized { .. } => return Err(TallyError::AlreadyFinalized),
        }
        if counts.len() != self.counters.len() {
            return Err(TallyError::CountMismatch {
                expected: self.counters.len(),
                actual: counts.len(),
            });
        }
        Ok(self.with_stage(Stage::Finalized {
            results: TallyResult::new(counts),
        }))
    }

    fn with_stage(&self, stage: Stage) -> Self {
        Self {
            poll: self.poll.clone(),
            stage,
            voters: self.voters.clone(),
            counters: self.counters.clone(),
        }
    }
}
