// Cryptographic primitives for the Dirac wallet
// Every algorithm is reached through the registry's capability traits

pub mod algorithm;
pub mod hash;
pub mod kem;
pub mod lamport;
pub mod quantum;
pub mod registry;

pub use algorithm::{
    AlgorithmId, HashAlgorithm, KemAlgorithm, SecurityLevel, SecurityTier, SignatureAlgorithm,
};
pub use hash::DiracHasher;
pub use kem::{KemError, KyberKem, SharedSecret};
pub use lamport::LamportScheme;
pub use quantum::{DilithiumScheme, QuantumError, SphincsScheme};
pub use registry::{AlgorithmRegistry, Hasher, KemScheme, RawKeyPair, SignatureScheme};
