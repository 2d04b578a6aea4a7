// Hash family
// Variable-length digests for address derivation and transaction payloads

use sha2::{Digest, Sha512};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Sha3_512, Shake128, Shake256};

use super::algorithm::HashAlgorithm;
use super::quantum::QuantumError;
use super::registry::Hasher;

// Domain tags keep digests from different families unrelated even when the
// underlying XOF is shared.
const STANDARD_DOMAIN: &[u8] = b"dirac.hash.standard.v1";
const IMPROVED_DOMAIN: &[u8] = b"dirac.hash.improved.v1";
const GROVER_CONTEXT: &str = "dirac.hash.grover.v1";
const SHOR_DOMAIN: &[u8] = b"dirac.hash.shor.v1";

/// Largest digest any family will produce
pub const MAX_DIGEST_SIZE: usize = 1 << 16;

/// Binding for every [`HashAlgorithm`]
#[derive(Debug, Clone, Copy)]
pub struct DiracHasher {
    algorithm: HashAlgorithm,
}

impl DiracHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }
}

fn shake<X: Default + Update + ExtendableOutput>(parts: &[&[u8]], out: &mut [u8]) {
    let mut xof = X::default();
    for part in parts {
        Update::update(&mut xof, part);
    }
    xof.finalize_xof().read(out);
}

impl Hasher for DiracHasher {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn hash(&self, data: &[u8], digest_size: usize) -> Result<Vec<u8>, QuantumError> {
        if digest_size == 0 || digest_size > MAX_DIGEST_SIZE {
            return Err(QuantumError::InvalidDigestSize(digest_size));
        }

        let mut out = vec![0u8; digest_size];
        match self.algorithm {
            HashAlgorithm::Standard => shake::<Shake128>(&[STANDARD_DOMAIN, data], &mut out),
            HashAlgorithm::Improved => shake::<Shake256>(&[IMPROVED_DOMAIN, data], &mut out),
            HashAlgorithm::Grover => {
                let mut hasher = blake3::Hasher::new_derive_key(GROVER_CONTEXT);
                hasher.update(data);
                hasher.finalize_xof().fill(&mut out);
            }
            HashAlgorithm::Shor => {
                let inner = Sha512::digest(data);
                shake::<Shake256>(&[SHOR_DOMAIN, inner.as_slice()], &mut out);
            }
            HashAlgorithm::QuantumEnhanced => {
                let seed = Sha3_512::digest(data);
                let mut key = [0u8; 32];
                key.copy_from_slice(&seed[..32]);
                let mut hasher = blake3::Hasher::new_keyed(&key);
                hasher.update(data);
                hasher.finalize_xof().fill(&mut out);
            }
        }
        Ok(out)
    }
}
