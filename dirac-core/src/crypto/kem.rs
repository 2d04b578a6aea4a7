//! Key Encapsulation Mechanism (KEM) for post-quantum key exchange
//!
//! Kyber parameter sets are selected by security level: Kyber512 for levels
//! 1-2, Kyber768 for level 3 and Kyber1024 for levels 4-5.

use pqcrypto_kyber::{kyber1024, kyber512, kyber768};
use pqcrypto_traits::kem::{
    Ciphertext as KemCiphertextTrait, PublicKey as KemPublicKeyTrait,
    SecretKey as KemSecretKeyTrait, SharedSecret as KemSharedSecretTrait,
};
use thiserror::Error;
use zeroize::Zeroizing;

use super::algorithm::{KemAlgorithm, SecurityLevel, SecurityTier};
use super::registry::{KemScheme, RawKeyPair};

/// Shared secret produced by encapsulation; wiped on drop
pub type SharedSecret = Zeroizing<Vec<u8>>;

/// KEM errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KemError {
    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("Invalid ciphertext")]
    InvalidCiphertext,

    #[error("Key generation failed")]
    KeyGenerationFailed,
}

/// CRYSTALS-Kyber bound to one parameter set
#[derive(Debug, Clone, Copy)]
pub struct KyberKem {
    level: SecurityLevel,
}

impl KyberKem {
    pub fn new(level: SecurityLevel) -> Self {
        Self { level }
    }

    pub fn ciphertext_bytes(&self) -> usize {
        match self.level.tier() {
            SecurityTier::Low => kyber512::ciphertext_bytes(),
            SecurityTier::Medium => kyber768::ciphertext_bytes(),
            SecurityTier::High => kyber1024::ciphertext_bytes(),
        }
    }
}

impl KemScheme for KyberKem {
    fn algorithm(&self) -> KemAlgorithm {
        KemAlgorithm::Kyber
    }

    fn security_level(&self) -> SecurityLevel {
        self.level
    }

    fn generate_keypair(&self) -> Result<RawKeyPair, KemError> {
        let (public_key, secret_key) = match self.level.tier() {
            SecurityTier::Low => {
                let (pk, sk) = kyber512::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            SecurityTier::Medium => {
                let (pk, sk) = kyber768::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            SecurityTier::High => {
                let (pk, sk) = kyber1024::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
        };
        Ok(RawKeyPair {
            public_key,
            secret_key: Zeroizing::new(secret_key),
        })
    }

    fn encapsulate(&self, public_key: &[u8]) -> Result<(Vec<u8>, SharedSecret), KemError> {
        let (ciphertext, shared) = match self.level.tier() {
            SecurityTier::Low => {
                let pk = kyber512::PublicKey::from_bytes(public_key)
                    .map_err(|_| KemError::InvalidPublicKey)?;
                let (ss, ct) = kyber512::encapsulate(&pk);
                (ct.as_bytes().to_vec(), ss.as_bytes().to_vec())
            }
            SecurityTier::Medium => {
                let pk = kyber768::PublicKey::from_bytes(public_key)
                    .map_err(|_| KemError::InvalidPublicKey)?;
                let (ss, ct) = kyber768::encapsulate(&pk);
                (ct.as_bytes().to_vec(), ss.as_bytes().to_vec())
            }
            SecurityTier::High => {
                let pk = kyber1024::PublicKey::from_bytes(public_key)
                    .map_err(|_| KemError::InvalidPublicKey)?;
                let (ss, ct) = kyber1024::encapsulate(&pk);
                (ct.as_bytes().to_vec(), ss.as_bytes().to_vec())
            }
        };
        Ok((ciphertext, Zeroizing::new(shared)))
    }

    fn decapsulate(&self, ciphertext: &[u8], secret_key: &[u8]) -> Result<SharedSecret, KemError> {
        let shared = match self.level.tier() {
            SecurityTier::Low => {
                let ct = kyber512::Ciphertext::from_bytes(ciphertext)
                    .map_err(|_| KemError::InvalidCiphertext)?;
                let sk = kyber512::SecretKey::from_bytes(secret_key)
                    .map_err(|_| KemError::InvalidSecretKey)?;
                kyber512::decapsulate(&ct, &sk).as_bytes().to_vec()
            }
            SecurityTier::Medium => {
                let ct = kyber768::Ciphertext::from_bytes(ciphertext)
                    .map_err(|_| KemError::InvalidCiphertext)?;
                let sk = kyber768::SecretKey::from_bytes(secret_key)
                    .map_err(|_| KemError::InvalidSecretKey)?;
                kyber768::decapsulate(&ct, &sk).as_bytes().to_vec()
            }
            SecurityTier::High => {
                let ct = kyber1024::Ciphertext::from_bytes(ciphertext)
                    .map_err(|_| KemError::InvalidCiphertext)?;
                let sk = kyber1024::SecretKey::from_bytes(secret_key)
                    .map_err(|_| KemError::InvalidSecretKey)?;
                kyber1024::decapsulate(&ct, &sk).as_bytes().to_vec()
            }
        };
        Ok(Zeroizing::new(shared))
    }
}
