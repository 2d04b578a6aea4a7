// Algorithm registry
// Maps algorithm identifiers to bound primitives behind capability traits

use std::collections::BTreeSet;
use std::fmt;

use zeroize::Zeroizing;

use super::algorithm::{AlgorithmId, HashAlgorithm, KemAlgorithm, SecurityLevel, SignatureAlgorithm};
use super::hash::DiracHasher;
use super::kem::{KemError, KyberKem, SharedSecret};
use super::lamport::LamportScheme;
use super::quantum::{DilithiumScheme, QuantumError, SphincsScheme};

/// Raw keypair returned by every primitive
pub struct RawKeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for RawKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawKeyPair")
            .field("public_key_len", &self.public_key.len())
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Signature capability
pub trait SignatureScheme: Send + Sync {
    fn algorithm(&self) -> SignatureAlgorithm;

    fn security_level(&self) -> SecurityLevel;

    fn generate_keypair(&self) -> Result<RawKeyPair, QuantumError>;

    fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, QuantumError>;

    /// Returns false for any failure, including malformed key or signature bytes
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

/// Hash capability
pub trait Hasher: Send + Sync {
    fn algorithm(&self) -> HashAlgorithm;

    /// Returns exactly `digest_size` bytes
    fn hash(&self, data: &[u8], digest_size: usize) -> Result<Vec<u8>, QuantumError>;
}

/// Key encapsulation capability
pub trait KemScheme: Send + Sync {
    fn algorithm(&self) -> KemAlgorithm;

    fn security_level(&self) -> SecurityLevel;

    fn generate_keypair(&self) -> Result<RawKeyPair, KemError>;

    /// Returns `(ciphertext, shared_secret)`
    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, SharedSecret), KemError>;

    fn decapsulate(&self, ciphertext: &[u8], secret_key: &[u8]) -> Result<SharedSecret, KemError>;
}

/// Static mapping from algorithm ids to primitive bindings.
///
/// Every hash family and the KEM are always present. The set of signature
/// algorithms can be narrowed, which also narrows how many backup keys a
/// keyring generates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmRegistry {
    signatures: BTreeSet<SignatureAlgorithm>,
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self {
            signatures: SignatureAlgorithm::ALL.into_iter().collect(),
        }
    }
}

impl AlgorithmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the given signature algorithms
    pub fn with_signatures(algorithms: &[SignatureAlgorithm]) -> Self {
        Self {
            signatures: algorithms.iter().copied().collect(),
        }
    }

    pub fn is_registered(&self, id: AlgorithmId) -> bool {
        match id {
            AlgorithmId::Signature(a) => self.signatures.contains(&a),
            AlgorithmId::Hash(_) | AlgorithmId::Kem(_) => true,
        }
    }

    /// Registered signature algorithms in stable order
    pub fn signature_algorithms(&self) -> Vec<SignatureAlgorithm> {
        SignatureAlgorithm::ALL
            .into_iter()
            .filter(|a| self.signatures.contains(a))
            .collect()
    }

    /// Parse a name and confirm it is registered
    pub fn resolve(&self, name: &str) -> Result<AlgorithmId, QuantumError> {
        let id: AlgorithmId = name.parse()?;
        if self.is_registered(id) {
            Ok(id)
        } else {
            Err(QuantumError::UnsupportedAlgorithm(name.to_string()))
        }
    }

    pub fn signature(
        &self,
        algorithm: SignatureAlgorithm,
        level: SecurityLevel,
    ) -> Result<Box<dyn SignatureScheme>, QuantumError> {
        if !self.signatures.contains(&algorithm) {
            return Err(QuantumError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        Ok(match algorithm {
            SignatureAlgorithm::Sphincs => Box::new(SphincsScheme::new(level)),
            SignatureAlgorithm::Dilithium => Box::new(DilithiumScheme::new(level)),
            SignatureAlgorithm::Lamport => Box::new(LamportScheme::new(level)),
        })
    }

    pub fn hasher(&self, algorithm: HashAlgorithm) -> Box<dyn Hasher> {
        Box::new(DiracHasher::new(algorithm))
    }

    pub fn kem(&self, algorithm: KemAlgorithm, level: SecurityLevel) -> Box<dyn KemScheme> {
        match algorithm {
            KemAlgorithm::Kyber => Box::new(KyberKem::new(level)),
        }
    }
}
