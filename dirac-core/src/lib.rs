// Dirac core library
// Post-quantum algorithm registry shared by the wallet and its tooling

pub mod crypto;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::crypto::{
    AlgorithmId, AlgorithmRegistry, HashAlgorithm, Hasher, KemAlgorithm, KemError, KemScheme,
    QuantumError, RawKeyPair, SecurityLevel, SecurityTier, SharedSecret, SignatureAlgorithm,
    SignatureScheme,
};
