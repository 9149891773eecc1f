//! Generators for tests and property-test harnesses.

use crate::{
    address::{Address, ADDRESS_SIZE},
    poll::{Poll, PollId},
    time::Timestamp,
    vote::{Payload, VoteCast},
};
use poll_fhe::PlaintextBackend;
use quickcheck::{Arbitrary, Gen};
use rand::RngCore;

pub struct TestGen;

impl TestGen {
    pub fn address() -> Address {
        let mut bytes = [0; ADDRESS_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Address::new(bytes)
    }

    /// Poll with `options` generic labels, created by a random address.
    pub fn poll(options: usize, expire_at: Timestamp) -> Poll {
        Poll::new(
            "test poll".to_string(),
            "generated".to_string(),
            (0..options).map(|index| format!("option {index}")).collect(),
            expire_at,
            Self::address(),
        )
    }

    /// Ballot payload choosing `choice`, encrypted for the plaintext
    /// backend.
    pub fn payload(choice: u32) -> Payload {
        let (ciphertext, proof) = PlaintextBackend::encrypt(choice);
        Payload::new(ciphertext, proof)
    }

    /// Full ballot for `poll` choosing `choice`.
    pub fn ballot(poll: PollId, choice: u32) -> VoteCast {
        VoteCast::new(poll, Self::payload(choice))
    }
}

impl Arbitrary for Address {
    fn arbitrary<G: Gen>(g: &mut G) -> Self {
        let mut bytes = [0; ADDRESS_SIZE];
        g.fill_bytes(&mut bytes);
        Address::new(bytes)
    }
}

impl Arbitrary for Timestamp {
    fn arbitrary<G: Gen>(g: &mut G) -> Self {
        Timestamp::from_secs(u64::arbitrary(g))
    }
}

impl Arbitrary for PollId {
    fn arbitrary<G: Gen>(g: &mut G) -> Self {
        PollId::new(u32::arbitrary(g))
    }
}
