use std::fmt;

/// Backend-issued identifier of an encrypted value held by the service.
///
/// A handle says nothing about the plaintext behind it. Backend
/// implementations mint handles; everyone else only moves them around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

impl Handle {
    pub const fn new(index: u64) -> Self {
        Handle(index)
    }

    pub const fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.to_be_bytes()))
    }
}

/// Opaque reference to an encrypted 32-bit unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ciphertext(Handle);

impl Ciphertext {
    pub const fn new(handle: Handle) -> Self {
        Ciphertext(handle)
    }

    pub const fn handle(self) -> Handle {
        self.0
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque reference to an encrypted boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EncryptedBool(Handle);

impl EncryptedBool {
    pub const fn new(handle: Handle) -> Self {
        EncryptedBool(handle)
    }

    pub const fn handle(self) -> Handle {
        self.0
    }
}

/// Raw ciphertext bytes produced outside the service, not yet admitted.
///
/// A voter's client encrypts its option index into this form; the bytes stay
/// opaque until [`FheBackend::import`] turns them into a [`Ciphertext`].
///
/// [`FheBackend::import`]: crate::FheBackend::import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCiphertext(Vec<u8>);

impl ExternalCiphertext {
    pub fn new(bytes: Vec<u8>) -> Self {
        ExternalCiphertext(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Attestation accompanying an [`ExternalCiphertext`]: it vouches that the
/// ciphertext is well formed and encrypts a value from the agreed domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof(Vec<u8>);

impl Proof {
    pub fn new(bytes: Vec<u8>) -> Self {
        Proof(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
