use crate::{
    address::Address,
    event::Event,
    manager::{PollManager, TallyError, VoteError},
    poll::{Limits, Poll, PollError, PollId},
    status::PollStatus,
    tally::{decode_counts, MalformedCleartext, TallyResult},
    time::Timestamp,
    vote::VoteCast,
};
use poll_fhe::{Ciphertext, FheBackend, FheError, OracleResponse, RequestId};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("poll {id} does not exist")]
    PollNotFound { id: PollId },

    #[error("poll {id} has no option {option}")]
    OptionNotFound { id: PollId, option: u8 },

    #[error("cannot register the poll: {reason}")]
    InvalidPoll { reason: PollError },

    #[error("cannot apply the ballot to poll {id}: {reason}")]
    Vote { id: PollId, reason: VoteError },

    #[error("cannot advance the lifecycle of poll {id}: {reason}")]
    Tally { id: PollId, reason: TallyError },

    #[error("no pending finalization maps to request {request}")]
    UnknownRequest { request: RequestId },

    #[error(transparent)]
    MalformedCleartext(#[from] MalformedCleartext),

    #[error(transparent)]
    Backend(#[from] FheError),
}

/// The poll ledger: registry, lifecycle gate and finalization bookkeeping.
///
/// Every mutating operation takes `&self` and returns the successor ledger,
/// so a failed call leaves no partial state behind. The hosting environment
/// serializes calls; the only asynchrony is the gap between
/// [`request_finalize`] and the oracle's response, bridged by the pending
/// request table.
///
/// [`request_finalize`]: PollLedger::request_finalize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollLedger {
    limits: Limits,
    polls: BTreeMap<PollId, PollManager>,
    next_id: PollId,
    pending: BTreeMap<RequestId, PollId>,
    events: Vec<Event>,
}

impl PollLedger {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            polls: BTreeMap::new(),
            next_id: PollId::new(0),
            pending: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Total number of polls ever created.
    pub fn poll_count(&self) -> u32 {
        self.next_id.id()
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The full event log, in emission order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events of one poll, in emission order.
    pub fn events_for(&self, id: PollId) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().filter(move |event| event.poll() == id)
    }

    /// Read view of a poll. Ended and finalized polls remain queryable;
    /// only an id that was never allocated is not found.
    pub fn poll(&self, id: PollId) -> Result<PollStatus, Error> {
        self.manager(id).map(|manager| PollStatus::new(id, manager))
    }

    /// Handle of one encrypted counter. The handle is opaque; decrypting it
    /// is between its holder and the encryption service's ACL.
    pub fn encrypted_vote_count(&self, id: PollId, option: u8) -> Result<Ciphertext, Error> {
        self.manager(id)?
            .counter(option)
            .ok_or(Error::OptionNotFound { id, option })
    }

    pub fn has_voted(&self, id: PollId, voter: &Address) -> Result<bool, Error> {
        self.manager(id).map(|manager| manager.has_voted(voter))
    }

    pub fn is_finalized(&self, id: PollId) -> Result<bool, Error> {
        self.manager(id).map(|manager| manager.is_finalized())
    }

    /// Clear counts of a finalized poll.
    pub fn clear_vote_counts(&self, id: PollId) -> Result<&TallyResult, Error> {
        self.manager(id)?
            .results()
            .map_err(|reason| Error::Tally { id, reason })
    }

    /// Register a new poll and seed its encrypted counters.
    pub fn create_poll<F: FheBackend>(
        &self,
        fhe: &mut F,
        now: Timestamp,
        poll: Poll,
    ) -> Result<(Self, PollId), Error> {
        poll.validate(now, &self.limits)
            .map_err(|reason| Error::InvalidPoll { reason })?;

        let id = self.next_id;
        let event = Event::PollCreated {
            id,
            creator: poll.creator(),
            title: poll.title().to_string(),
            expire_at: poll.expire_at(),
        };
        let manager = PollManager::new(fhe, poll);

        let mut polls = self.polls.clone();
        polls.insert(id, manager);
        let mut events = self.events.clone();
        events.push(event);

        let ledger = Self {
            limits: self.limits,
            polls,
            next_id: id.next(),
            pending: self.pending.clone(),
            events,
        };
        Ok((ledger, id))
    }

    /// Apply a ballot to its poll.
    pub fn cast_vote<F: FheBackend>(
        &self,
        fhe: &mut F,
        now: Timestamp,
        voter: Address,
        cast: &VoteCast,
    ) -> Result<Self, Error> {
        let id = cast.poll();
        let updated = self
            .manager(id)?
            .vote(fhe, now, voter, cast.payload())
            .map_err(|reason| Error::Vote { id, reason })?;
        Ok(self.replace(id, updated, Event::VoteCast { id, voter }))
    }

    /// Explicitly end an expired poll. Permissionless: anyone may freeze an
    /// expired tally.
    pub fn end_poll(&self, now: Timestamp, id: PollId) -> Result<Self, Error> {
        let updated = self
            .manager(id)?
            .end(now)
            .map_err(|reason| Error::Tally { id, reason })?;
        Ok(self.replace(id, updated, Event::PollEnded { id }))
    }

    /// Ask the oracle to decrypt the full counter batch of an ended poll.
    /// Permissionless: publishing results benefits everyone.
    pub fn request_finalize<F: FheBackend>(
        &self,
        fhe: &mut F,
        id: PollId,
    ) -> Result<(Self, RequestId), Error> {
        let (updated, request) = self
            .manager(id)?
            .request_finalize(fhe)
            .map_err(|reason| Error::Tally { id, reason })?;
        let mut ledger = self.replace(id, updated, Event::FinalizeRequested { id, request });
        ledger.pending.insert(request, id);
        Ok((ledger, request))
    }

    /// Consume an oracle response and publish clear results.
    ///
    /// The single write path to clear results: the pending entry is deleted
    /// on success, so a replayed or stale response is rejected as
    /// [`Error::UnknownRequest`] and published counts never change.
    pub fn apply_decryption<F: FheBackend>(
        &self,
        fhe: &F,
        response: &OracleResponse,
    ) -> Result<Self, Error> {
        let request = response.request();
        let id = *self
            .pending
            .get(&request)
            .ok_or(Error::UnknownRequest { request })?;
        let manager = self.manager(id)?;
        let counts = decode_counts(response.cleartexts(), manager.poll().options().len())?;
        fhe.verify_response(response)?;
        let results = counts.clone();
        let updated = manager
            .publish(request, counts)
            .map_err(|reason| Error::Tally { id, reason })?;

        let mut ledger = self.replace(id, updated, Event::ResultsPublished { id, results });
        ledger.pending.remove(&request);
        Ok(ledger)
    }

    fn manager(&self, id: PollId) -> Result<&PollManager, Error> {
        self.polls.get(&id).ok_or(Error::PollNotFound { id })
    }

    fn replace(&self, id: PollId, manager: PollManager, event: Event) -> Self {
        let mut polls = self.polls.clone();
        polls.insert(id, manager);
        let mut events = self.events.clone();
        events.push(event);
        Self {
            limits: self.limits,
            polls,
            next_id: self.next_id,
            pending: self.pending.clone(),
            events,
        }
    }
}

impl Default for PollLedger {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::manager::LEDGER_PRINCIPAL;
    use crate::testing::TestGen;
    use poll_fhe::PlaintextBackend;
    use quickcheck_macros::quickcheck;

    const NOW: Timestamp = Timestamp::from_secs(1_000);
    const EXPIRY: Timestamp = Timestamp::from_secs(2_000);

    fn created(fhe: &mut PlaintextBackend, options: usize) -> (PollLedger, PollId) {
        PollLedger::default()
            .create_poll(fhe, NOW, TestGen::poll(options, EXPIRY))
            .unwrap()
    }

    #[test]
    fn create_then_get_returns_the_submitted_definition() {
        let mut fhe = PlaintextBackend::new();
        let creator = TestGen::address();
        let poll = Poll::new(
            "favorite dish".to_string(),
            "dinner planning".to_string(),
            vec!["pasta".to_string(), "ramen".to_string()],
            EXPIRY,
            creator,
        );
        let (ledger, id) = PollLedger::default()
            .create_poll(&mut fhe, NOW, poll)
            .unwrap();

        let status = ledger.poll(id).unwrap();
        assert_eq!(status.title, "favorite dish");
        assert_eq!(status.description, "dinner planning");
        assert_eq!(status.options, ["pasta", "ramen"]);
        assert_eq!(status.expire_at, EXPIRY);
        assert_eq!(status.creator, creator);
        assert!(status.active);
        assert!(!status.finalized);
        assert_eq!(status.votes, 0);
        assert_eq!(status.results, None);
        assert_eq!(ledger.poll_count(), 1);
    }

    #[test]
    fn poll_ids_are_allocated_sequentially() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, first) = created(&mut fhe, 2);
        let (ledger, second) = ledger
            .create_poll(&mut fhe, NOW, TestGen::poll(2, EXPIRY))
            .unwrap();
        assert_eq!(first, PollId::new(0));
        assert_eq!(second, PollId::new(1));
        assert_eq!(ledger.poll_count(), 2);
    }

    #[test]
    fn an_invalid_poll_leaves_the_ledger_untouched() {
        let mut fhe = PlaintextBackend::new();
        let ledger = PollLedger::default();
        let err = ledger
            .create_poll(&mut fhe, NOW, TestGen::poll(1, EXPIRY))
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidPoll {
                reason: PollError::InsufficientOptions { actual: 1 }
            }
        );
        assert_eq!(ledger.poll_count(), 0);
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn unknown_polls_are_not_found() {
        let ledger = PollLedger::default();
        let id = PollId::new(3);
        assert_eq!(ledger.poll(id).unwrap_err(), Error::PollNotFound { id });
        assert_eq!(
            ledger.is_finalized(id).unwrap_err(),
            Error::PollNotFound { id }
        );
    }

    #[test]
    fn ended_polls_remain_queryable() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        let ledger = ledger.end_poll(EXPIRY, id).unwrap();
        let status = ledger.poll(id).unwrap();
        assert!(!status.active);
        assert!(!status.finalized);
    }

    #[test]
    fn voting_updates_only_the_chosen_counter() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        let ledger = ledger
            .cast_vote(&mut fhe, NOW, TestGen::address(), &TestGen::ballot(id, 0))
            .unwrap();

        let yes = ledger.encrypted_vote_count(id, 0).unwrap();
        let no = ledger.encrypted_vote_count(id, 1).unwrap();
        assert_eq!(fhe.value(yes), 1);
        assert_eq!(fhe.value(no), 0);
        assert!(fhe.is_allowed(yes, LEDGER_PRINCIPAL));
    }

    #[test]
    fn the_second_ballot_of_a_voter_is_rejected() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        let voter = TestGen::address();
        let ledger = ledger
            .cast_vote(&mut fhe, NOW, voter, &TestGen::ballot(id, 0))
            .unwrap();
        assert_eq!(ledger.has_voted(id, &voter), Ok(true));

        let err = ledger
            .cast_vote(&mut fhe, NOW, voter, &TestGen::ballot(id, 1))
            .unwrap_err();
        assert_eq!(
            err,
            Error::Vote {
                id,
                reason: VoteError::AlreadyVoted { voter }
            }
        );
        let counter = ledger.encrypted_vote_count(id, 0).unwrap();
        assert_eq!(fhe.value(counter), 1);
        assert_eq!(ledger.poll(id).unwrap().votes, 1);
    }

    #[test]
    fn a_tampered_ballot_proof_is_rejected() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        let (ciphertext, _) = PlaintextBackend::encrypt(0);
        let (_, other_proof) = PlaintextBackend::encrypt(1);
        let cast = VoteCast::new(id, crate::vote::Payload::new(ciphertext, other_proof));
        let err = ledger
            .cast_vote(&mut fhe, NOW, TestGen::address(), &cast)
            .unwrap_err();
        assert_eq!(
            err,
            Error::Vote {
                id,
                reason: VoteError::Backend(FheError::InvalidProof)
            }
        );
        assert_eq!(ledger.poll(id).unwrap().votes, 0);
    }

    #[test]
    fn missing_options_are_reported() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        assert_eq!(
            ledger.encrypted_vote_count(id, 2).unwrap_err(),
            Error::OptionNotFound { id, option: 2 }
        );
    }

    #[test]
    fn finalize_is_gated_on_the_lifecycle() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        assert_eq!(
            ledger.request_finalize(&mut fhe, id).unwrap_err(),
            Error::Tally {
                id,
                reason: TallyError::StillActive
            }
        );

        let ledger = ledger.end_poll(EXPIRY, id).unwrap();
        let (ledger, request) = ledger.request_finalize(&mut fhe, id).unwrap();
        assert_eq!(
            ledger.request_finalize(&mut fhe, id).unwrap_err(),
            Error::Tally {
                id,
                reason: TallyError::AlreadyRequested { request }
            }
        );
    }

    #[test]
    fn a_callback_publishes_results_exactly_once() {
        let mut fhe = PlaintextBackend::new();
        let (mut ledger, id) = created(&mut fhe, 2);
        for choice in [0, 0, 0, 1, 1] {
            ledger = ledger
                .cast_vote(&mut fhe, NOW, TestGen::address(), &TestGen::ballot(id, choice))
                .unwrap();
        }
        let ledger = ledger.end_poll(EXPIRY, id).unwrap();
        let (ledger, request) = ledger.request_finalize(&mut fhe, id).unwrap();
        assert_eq!(ledger.is_finalized(id), Ok(false));
        assert_eq!(
            ledger.clear_vote_counts(id).unwrap_err(),
            Error::Tally {
                id,
                reason: TallyError::ResultsNotAvailable
            }
        );

        let response = fhe.respond(request).unwrap();
        let ledger = ledger.apply_decryption(&fhe, &response).unwrap();
        assert_eq!(ledger.is_finalized(id), Ok(true));
        assert_eq!(ledger.clear_vote_counts(id).unwrap().votes(), [3, 2]);
        assert_eq!(ledger.poll(id).unwrap().results, Some(TallyResult::new(vec![3, 2])));

        // replaying the same response hits the consumed request entry
        assert_eq!(
            ledger.apply_decryption(&fhe, &response).unwrap_err(),
            Error::UnknownRequest { request }
        );
        assert_eq!(ledger.clear_vote_counts(id).unwrap().votes(), [3, 2]);
    }

    #[test]
    fn a_tampered_response_is_rejected() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        let ledger = ledger.end_poll(EXPIRY, id).unwrap();
        let (ledger, request) = ledger.request_finalize(&mut fhe, id).unwrap();

        let response = fhe.respond(request).unwrap();
        let tampered = OracleResponse::new(
            response.request(),
            vec![9, 0, 0, 0, 9, 0, 0, 0],
            response.attestations().to_vec(),
        );
        assert_eq!(
            ledger.apply_decryption(&fhe, &tampered).unwrap_err(),
            Error::Backend(FheError::InvalidAttestation)
        );
        assert_eq!(ledger.is_finalized(id), Ok(false));
    }

    #[test]
    fn a_short_cleartext_blob_is_malformed() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        let ledger = ledger.end_poll(EXPIRY, id).unwrap();
        let (ledger, request) = ledger.request_finalize(&mut fhe, id).unwrap();

        let original = fhe.respond(request).unwrap();
        let short = OracleResponse::new(
            original.request(),
            original.cleartexts()[..4].to_vec(),
            original.attestations().to_vec(),
        );
        assert_eq!(
            ledger.apply_decryption(&fhe, &short).unwrap_err(),
            Error::MalformedCleartext(MalformedCleartext {
                expected: 8,
                actual: 4
            })
        );
        assert_eq!(ledger.is_finalized(id), Ok(false));
    }

    #[test]
    fn the_event_log_records_the_whole_lifecycle() {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        let voter = TestGen::address();
        let ledger = ledger
            .cast_vote(&mut fhe, NOW, voter, &TestGen::ballot(id, 1))
            .unwrap();
        let ledger = ledger.end_poll(EXPIRY, id).unwrap();
        let (ledger, request) = ledger.request_finalize(&mut fhe, id).unwrap();
        let response = fhe.respond(request).unwrap();
        let ledger = ledger.apply_decryption(&fhe, &response).unwrap();

        let kinds: Vec<EventKind> = ledger.events().iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            [
                EventKind::PollCreated,
                EventKind::VoteCast,
                EventKind::PollEnded,
                EventKind::FinalizeRequested,
                EventKind::ResultsPublished
            ]
        );
        assert_eq!(
            ledger.events().last(),
            Some(&Event::ResultsPublished {
                id,
                results: vec![0, 1]
            })
        );
        assert_eq!(ledger.events_for(id).count(), 5);
        assert_eq!(ledger.events_for(PollId::new(9)).count(), 0);
    }

    #[quickcheck]
    fn conservation_of_votes(choices: Vec<u8>) -> bool {
        let mut fhe = PlaintextBackend::new();
        let (mut ledger, id) = created(&mut fhe, 3);
        let mut voters = 0u64;
        for choice in choices {
            let ballot = TestGen::ballot(id, u32::from(choice) % 3);
            ledger = ledger
                .cast_vote(&mut fhe, NOW, TestGen::address(), &ballot)
                .unwrap();
            voters += 1;
        }
        let ledger = ledger.end_poll(EXPIRY, id).unwrap();
        let (ledger, request) = ledger.request_finalize(&mut fhe, id).unwrap();
        let response = fhe.respond(request).unwrap();
        let ledger = ledger.apply_decryption(&fhe, &response).unwrap();
        ledger.clear_vote_counts(id).unwrap().total() == voters
    }

    #[quickcheck]
    fn a_failed_transition_never_changes_the_ledger(choice: u8) -> bool {
        let mut fhe = PlaintextBackend::new();
        let (ledger, id) = created(&mut fhe, 2);
        let voter = TestGen::address();
        let ledger = ledger
            .cast_vote(&mut fhe, NOW, voter, &TestGen::ballot(id, u32::from(choice) % 2))
            .unwrap();

        let before = ledger.clone();
        let _ = ledger.cast_vote(&mut fhe, NOW, voter, &TestGen::ballot(id, 0));
        let _ = ledger.end_poll(NOW, id);
        let _ = ledger.request_finalize(&mut fhe, id);
        ledger == before
    }
}
