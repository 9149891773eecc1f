use crate::handle::{Ciphertext, EncryptedBool, ExternalCiphertext, Proof};
use std::fmt;
use thiserror::Error;

/// ACL identity a ciphertext can be authorized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Principal([u8; 32]);

impl Principal {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Principal(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Identifier of a batched decryption request, issued by the service when
/// the request is submitted and echoed back in the oracle's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(id: u64) -> Self {
        RequestId(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque voucher attached to an [`OracleResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation(Vec<u8>);

impl Attestation {
    pub fn new(bytes: Vec<u8>) -> Self {
        Attestation(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// What the oracle delivers once a batched decryption resolves: the request
/// it answers, the clear values as one blob of option-ordered little-endian
/// 32-bit integers, and attestations binding the two together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResponse {
    request: RequestId,
    cleartexts: Vec<u8>,
    attestations: Vec<Attestation>,
}

impl OracleResponse {
    pub fn new(request: RequestId, cleartexts: Vec<u8>, attestations: Vec<Attestation>) -> Self {
        Self {
            request,
            cleartexts,
            attestations,
        }
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn cleartexts(&self) -> &[u8] {
        &self.cleartexts
    }

    pub fn attestations(&self) -> &[Attestation] {
        &self.attestations
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FheError {
    #[error("ciphertext proof was rejected by the encryption service")]
    InvalidProof,

    #[error("oracle response attestation does not match the delivered cleartexts")]
    InvalidAttestation,

    #[error("a decryption request needs at least one ciphertext")]
    EmptyBatch,
}

/// Capability boundary to the external encryption/oracle service.
///
/// Homomorphic operations compute on ciphertexts without revealing the
/// plaintexts. Decryption only happens off-path: [`request_decryption`]
/// submits a batch, and the service later delivers an [`OracleResponse`]
/// out-of-band.
///
/// [`request_decryption`]: FheBackend::request_decryption
pub trait FheBackend {
    /// Fresh encryption of zero.
    fn encrypt_zero(&mut self) -> Ciphertext;

    /// Lift a public constant into the encrypted domain.
    fn trivial(&mut self, value: u32) -> Ciphertext;

    /// Admit an externally produced ciphertext.
    ///
    /// The proof must attest that the ciphertext is well formed and encrypts
    /// a value in `0..domain`; anything else is [`FheError::InvalidProof`].
    fn import(
        &mut self,
        external: &ExternalCiphertext,
        proof: &Proof,
        domain: u32,
    ) -> Result<Ciphertext, FheError>;

    /// Encrypted equality test.
    fn eq(&mut self, a: Ciphertext, b: Ciphertext) -> EncryptedBool;

    /// Encrypted conditional: `if_true` where `cond` holds, else `if_false`.
    fn select(
        &mut self,
        cond: EncryptedBool,
        if_true: Ciphertext,
        if_false: Ciphertext,
    ) -> Ciphertext;

    /// Encrypted addition, modulo 2^32.
    fn add(&mut self, a: Ciphertext, b: Ciphertext) -> Ciphertext;

    /// Grant `principal` permission to later decrypt `ciphertext`.
    fn allow(&mut self, ciphertext: Ciphertext, principal: Principal);

    /// Submit a batched decryption, resolved asynchronously by the oracle.
    fn request_decryption(&mut self, ciphertexts: &[Ciphertext]) -> Result<RequestId, FheError>;

    /// Check that a delivered response carries a valid attestation.
    fn verify_response(&self, response: &OracleResponse) -> Result<(), FheError>;
}
