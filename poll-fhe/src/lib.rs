//! Opaque handles to encrypted values and the capability boundary to the
//! external encryption/oracle service.
//!
//! Nothing in this crate performs cryptography. Ciphertexts are references
//! into a service that does; the [`FheBackend`] trait is the full surface the
//! poll ledger needs from it, and [`PlaintextBackend`] is an in-memory
//! stand-in computing on clear values behind the same interface.

mod backend;
mod handle;
mod plaintext;

pub use crate::{
    backend::{Attestation, FheBackend, FheError, OracleResponse, Principal, RequestId},
    handle::{Ciphertext, EncryptedBool, ExternalCiphertext, Handle, Proof},
    plaintext::PlaintextBackend,
};
