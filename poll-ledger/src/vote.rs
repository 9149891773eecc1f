use crate::poll::PollId;
use poll_fhe::{ExternalCiphertext, Proof};

/// Encrypted content of a ballot: the ciphertext of the chosen option index
/// together with the proof that makes it admissible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    ciphertext: ExternalCiphertext,
    proof: Proof,
}

impl Payload {
    pub fn new(ciphertext: ExternalCiphertext, proof: Proof) -> Self {
        Self { ciphertext, proof }
    }

    pub fn ciphertext(&self) -> &ExternalCiphertext {
        &self.ciphertext
    }

    pub fn proof(&self) -> &Proof {
        &self.proof
    }
}

/// A ballot submitted to a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCast {
    poll: PollId,
    payload: Payload,
}

impl VoteCast {
    pub fn new(poll: PollId, payload: Payload) -> Self {
        Self { poll, payload }
    }

    pub fn poll(&self) -> PollId {
        self.poll
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}
