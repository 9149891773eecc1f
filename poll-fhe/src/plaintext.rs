use crate::backend::{Attestation, FheBackend, FheError, OracleResponse, Principal, RequestId};
use crate::handle::{Ciphertext, EncryptedBool, ExternalCiphertext, Handle, Proof};
use cryptoxide::{blake2b::Blake2b, digest::Digest};
use std::collections::{BTreeMap, BTreeSet};

const DIGEST_SIZE: usize = 32;

/// In-memory stand-in for the encryption service, computing on clear values
/// behind the [`FheBackend`] interface.
///
/// Handles index a table of clear 32-bit integers; booleans are stored as
/// 0/1 in the same table. The backend also plays the oracle: [`respond`]
/// turns a pending decryption request into the [`OracleResponse`] the real
/// service would deliver out-of-band, attested with a blake2b digest that
/// [`verify_response`] recomputes.
///
/// Feeding it a handle minted by a different instance is a programmer error
/// and panics.
///
/// [`respond`]: PlaintextBackend::respond
/// [`verify_response`]: FheBackend::verify_response
#[derive(Debug, Clone, Default)]
pub struct PlaintextBackend {
    values: Vec<u32>,
    grants: BTreeSet<(Handle, Principal)>,
    requests: BTreeMap<RequestId, Vec<u32>>,
    next_request: u64,
}

impl PlaintextBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client-side encryption: what a voter's wallet would produce.
    ///
    /// The ciphertext is the value's little-endian bytes; the proof is a
    /// digest over them, which is what [`FheBackend::import`] checks.
    pub fn encrypt(value: u32) -> (ExternalCiphertext, Proof) {
        let bytes = value.to_le_bytes().to_vec();
        let proof = Proof::new(digest(&bytes));
        (ExternalCiphertext::new(bytes), proof)
    }

    /// Clear value behind a handle.
    ///
    /// Test inspection only: the real service never exposes this.
    pub fn value(&self, ciphertext: Ciphertext) -> u32 {
        self.lookup(ciphertext.handle())
    }

    /// Whether `principal` has been granted access to `ciphertext`.
    pub fn is_allowed(&self, ciphertext: Ciphertext, principal: Principal) -> bool {
        self.grants.contains(&(ciphertext.handle(), principal))
    }

    /// Number of decryption requests the oracle has not answered yet.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Play the oracle: produce the response for a pending request.
    ///
    /// The request is consumed; `None` if it is unknown or already answered.
    pub fn respond(&mut self, request: RequestId) -> Option<OracleResponse> {
        let values = self.requests.remove(&request)?;
        let mut cleartexts = Vec::with_capacity(values.len() * 4);
        for value in values {
            cleartexts.extend_from_slice(&value.to_le_bytes());
        }
        let attestation = Attestation::new(response_digest(request, &cleartexts));
        Some(OracleResponse::new(request, cleartexts, vec![attestation]))
    }

    fn lookup(&self, handle: Handle) -> u32 {
        match self.values.get(handle.index() as usize) {
            Some(value) => *value,
            None => panic!("unknown ciphertext handle {}", handle),
        }
    }

    fn store(&mut self, value: u32) -> Handle {
        let handle = Handle::new(self.values.len() as u64);
        self.values.push(value);
        handle
    }
}

fn digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Blake2b::new(DIGEST_SIZE);
    hasher.input(data);
    let mut out = vec![0; DIGEST_SIZE];
    hasher.result(&mut out);
    out
}

fn response_digest(request: RequestId, cleartexts: &[u8]) -> Vec<u8> {
    let mut data = request.id().to_le_bytes().to_vec();
    data.extend_from_slice(cleartexts);
    digest(&data)
}

impl FheBackend for PlaintextBackend {
    fn encrypt_zero(&mut self) -> Ciphertext {
        self.trivial(0)
    }

    fn trivial(&mut self, value: u32) -> Ciphertext {
        let handle = self.store(value);
        Ciphertext::new(handle)
    }

    fn import(
        &mut self,
        external: &ExternalCiphertext,
        proof: &Proof,
        domain: u32,
    ) -> Result<Ciphertext, FheError> {
        if proof.as_bytes() != digest(external.as_bytes()).as_slice() {
            return Err(FheError::InvalidProof);
        }
        let raw: [u8; 4] = external
            .as_bytes()
            .try_into()
            .map_err(|_| FheError::InvalidProof)?;
        let value = u32::from_le_bytes(raw);
        if value >= domain {
            return Err(FheError::InvalidProof);
        }
        let handle = self.store(value);
        Ok(Ciphertext::new(handle))
    }

    fn eq(&mut self, a: Ciphertext, b: Ciphertext) -> EncryptedBool {
        let equal = self.lookup(a.handle()) == self.lookup(b.handle());
        let handle = self.store(equal as u32);
        EncryptedBool::new(handle)
    }

    fn select(
        &mut self,
        cond: EncryptedBool,
        if_true: Ciphertext,
        if_false: Ciphertext,
    ) -> Ciphertext {
        let chosen = if self.lookup(cond.handle()) != 0 {
            if_true
        } else {
            if_false
        };
        let value = self.lookup(chosen.handle());
        let handle = self.store(value);
        Ciphertext::new(handle)
    }

    fn add(&mut self, a: Ciphertext, b: Ciphertext) -> Ciphertext {
        let sum = self.lookup(a.handle()).wrapping_add(self.lookup(b.handle()));
        let handle = self.store(sum);
        Ciphertext::new(handle)
    }

    fn allow(&mut self, ciphertext: Ciphertext, principal: Principal) {
        self.grants.insert((ciphertext.handle(), principal));
    }

    fn request_decryption(&mut self, ciphertexts: &[Ciphertext]) -> Result<RequestId, FheError> {
        if ciphertexts.is_empty() {
            return Err(FheError::EmptyBatch);
        }
        let request = RequestId::new(self.next_request);
        self.next_request += 1;
        let values = ciphertexts.iter().map(|c| self.lookup(c.handle())).collect();
        self.requests.insert(request, values);
        Ok(request)
    }

    fn verify_response(&self, response: &OracleResponse) -> Result<(), FheError> {
        let expected = response_digest(response.request(), response.cleartexts());
        let attested = response
            .attestations()
            .iter()
            .any(|attestation| attestation.as_bytes() == expected.as_slice());
        if attested {
            Ok(())
        } else {
            Err(FheError::InvalidAttestation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn principal(tag: u8) -> Principal {
        Principal::new([tag; 32])
    }

    #[test]
    fn trivial_values_are_stored() {
        let mut fhe = PlaintextBackend::new();
        let zero = fhe.encrypt_zero();
        let seven = fhe.trivial(7);
        assert_eq!(fhe.value(zero), 0);
        assert_eq!(fhe.value(seven), 7);
    }

    #[test]
    fn import_accepts_a_matching_pair() {
        let mut fhe = PlaintextBackend::new();
        let (external, proof) = PlaintextBackend::encrypt(3);
        let ciphertext = fhe.import(&external, &proof, 5).unwrap();
        assert_eq!(fhe.value(ciphertext), 3);
    }

    #[test]
    fn import_rejects_a_tampered_proof() {
        let mut fhe = PlaintextBackend::new();
        let (external, _) = PlaintextBackend::encrypt(3);
        let (_, other_proof) = PlaintextBackend::encrypt(4);
        assert_eq!(
            fhe.import(&external, &other_proof, 5),
            Err(FheError::InvalidProof)
        );
    }

    #[test]
    fn import_rejects_a_value_outside_the_domain() {
        let mut fhe = PlaintextBackend::new();
        let (external, proof) = PlaintextBackend::encrypt(5);
        assert_eq!(fhe.import(&external, &proof, 5), Err(FheError::InvalidProof));
    }

    #[test]
    fn import_rejects_malformed_ciphertext_bytes() {
        let mut fhe = PlaintextBackend::new();
        let external = ExternalCiphertext::new(vec![1, 2, 3]);
        let proof = Proof::new(super::digest(external.as_bytes()));
        assert_eq!(fhe.import(&external, &proof, 5), Err(FheError::InvalidProof));
    }

    #[test]
    fn select_follows_the_condition() {
        let mut fhe = PlaintextBackend::new();
        let two = fhe.trivial(2);
        let nine = fhe.trivial(9);
        let yes = fhe.eq(two, two);
        let no = fhe.eq(two, nine);
        let picked_true = fhe.select(yes, two, nine);
        let picked_false = fhe.select(no, two, nine);
        assert_eq!(fhe.value(picked_true), 2);
        assert_eq!(fhe.value(picked_false), 9);
    }

    #[test]
    fn grants_are_recorded_per_handle() {
        let mut fhe = PlaintextBackend::new();
        let a = fhe.trivial(1);
        let b = fhe.trivial(1);
        fhe.allow(a, principal(0xaa));
        assert!(fhe.is_allowed(a, principal(0xaa)));
        assert!(!fhe.is_allowed(b, principal(0xaa)));
        assert!(!fhe.is_allowed(a, principal(0xbb)));
    }

    #[test]
    fn decryption_round_trips_through_the_oracle() {
        let mut fhe = PlaintextBackend::new();
        let batch = [fhe.trivial(3), fhe.trivial(0), fhe.trivial(2)];
        let request = fhe.request_decryption(&batch).unwrap();
        assert_eq!(fhe.pending_requests(), 1);

        let response = fhe.respond(request).unwrap();
        assert_eq!(fhe.pending_requests(), 0);
        assert_eq!(response.request(), request);
        assert_eq!(response.cleartexts(), [3, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0]);
        assert!(fhe.verify_response(&response).is_ok());

        // the request is consumed
        assert!(fhe.respond(request).is_none());
    }

    #[test]
    fn empty_batches_are_rejected() {
        let mut fhe = PlaintextBackend::new();
        assert_eq!(fhe.request_decryption(&[]), Err(FheError::EmptyBatch));
    }

    #[test]
    fn tampered_cleartexts_fail_verification() {
        let mut fhe = PlaintextBackend::new();
        let batch = [fhe.trivial(3)];
        let request = fhe.request_decryption(&batch).unwrap();
        let response = fhe.respond(request).unwrap();

        let tampered = OracleResponse::new(
            response.request(),
            vec![9, 0, 0, 0],
            response.attestations().to_vec(),
        );
        assert_eq!(
            fhe.verify_response(&tampered),
            Err(FheError::InvalidAttestation)
        );

        let unattested = OracleResponse::new(
            response.request(),
            response.cleartexts().to_vec(),
            Vec::new(),
        );
        assert_eq!(
            fhe.verify_response(&unattested),
            Err(FheError::InvalidAttestation)
        );
    }

    #[quickcheck]
    fn add_matches_clear_addition(a: u32, b: u32) -> bool {
        let mut fhe = PlaintextBackend::new();
        let ca = fhe.trivial(a);
        let cb = fhe.trivial(b);
        let sum = fhe.add(ca, cb);
        fhe.value(sum) == a.wrapping_add(b)
    }

    #[quickcheck]
    fn eq_matches_clear_equality(a: u32, b: u32) -> bool {
        let mut fhe = PlaintextBackend::new();
        let ca = fhe.trivial(a);
        let cb = fhe.trivial(b);
        let one = fhe.trivial(1);
        let zero = fhe.trivial(0);
        let cond = fhe.eq(ca, cb);
        let picked = fhe.select(cond, one, zero);
        fhe.value(picked) == (a == b) as u32
    }
}
