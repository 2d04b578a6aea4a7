// Quantum-resistant signature bindings
// Dilithium and SPHINCS+ parameter sets selected by security level

use pqcrypto_dilithium::{dilithium2, dilithium3, dilithium5};
use pqcrypto_sphincsplus::{
    sphincsshake128fsimple, // NIST Level 1 (128-bit) - Low security
    sphincsshake192fsimple, // NIST Level 3 (192-bit) - Medium security
    sphincsshake256fsimple, // NIST Level 5 (256-bit) - High security
};
use pqcrypto_traits::sign::{
    DetachedSignature as SignDetachedSignatureTrait, PublicKey as SignPublicKeyTrait,
    SecretKey as SignSecretKeyTrait,
};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use super::algorithm::{SecurityLevel, SecurityTier, SignatureAlgorithm};
use super::registry::{RawKeyPair, SignatureScheme};

/// Errors raised by the primitive bindings
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantumError {
    /// Algorithm name or id not present in the registry
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Invalid key
    #[error("Invalid quantum key: {0}")]
    InvalidKey(String),

    /// Invalid signature
    #[error("Invalid quantum signature: {0}")]
    InvalidSignature(String),

    /// Signing operation failed
    #[error("Signing operation failed: {0}")]
    SigningFailed(String),

    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Unsupported security level
    #[error("Unsupported security level: {0}")]
    UnsupportedSecurityLevel(u8),

    /// Digest size outside what a hasher can produce
    #[error("Invalid digest size: {0}")]
    InvalidDigestSize(usize),

    /// Cryptographic operation failed
    #[error("Cryptographic operation failed: {0}")]
    CryptoOperationFailed(String),
}

/// CRYSTALS-Dilithium bound to one parameter set
#[derive(Debug, Clone, Copy)]
pub struct DilithiumScheme {
    level: SecurityLevel,
}

impl DilithiumScheme {
    pub fn new(level: SecurityLevel) -> Self {
        Self { level }
    }

    /// Signature size in bytes for the bound parameter set
    pub fn signature_bytes(&self) -> usize {
        match self.level.tier() {
            SecurityTier::Low => dilithium2::signature_bytes(),
            SecurityTier::Medium => dilithium3::signature_bytes(),
            SecurityTier::High => dilithium5::signature_bytes(),
        }
    }

    fn try_verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool, QuantumError> {
        match self.level.tier() {
            SecurityTier::Low => {
                let pk = dilithium2::PublicKey::from_bytes(public_key)
                    .map_err(|e| QuantumError::InvalidKey(format!("{:?}", e)))?;
                let sig = dilithium2::DetachedSignature::from_bytes(signature)
                    .map_err(|e| QuantumError::InvalidSignature(format!("{:?}", e)))?;
                Ok(dilithium2::verify_detached_signature(&sig, message, &pk).is_ok())
            }
            SecurityTier::Medium => {
                let pk = dilithium3::PublicKey::from_bytes(public_key)
                    .map_err(|e| QuantumError::InvalidKey(format!("{:?}", e)))?;
                let sig = dilithium3::DetachedSignature::from_bytes(signature)
                    .map_err(|e| QuantumError::InvalidSignature(format!("{:?}", e)))?;
                Ok(dilithium3::verify_detached_signature(&sig, message, &pk).is_ok())
            }
            SecurityTier::High => {
                let pk = dilithium5::PublicKey::from_bytes(public_key)
                    .map_err(|e| QuantumError::InvalidKey(format!("{:?}", e)))?;
                let sig = dilithium5::DetachedSignature::from_bytes(signature)
                    .map_err(|e| QuantumError::InvalidSignature(format!("{:?}", e)))?;
                Ok(dilithium5::verify_detached_signature(&sig, message, &pk).is_ok())
            }
        }
    }
}

impl SignatureScheme for DilithiumScheme {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Dilithium
    }

    fn security_level(&self) -> SecurityLevel {
        self.level
    }

    fn generate_keypair(&self) -> Result<RawKeyPair, QuantumError> {
        let (public_key, secret_key) = match self.level.tier() {
            SecurityTier::Low => {
                let (pk, sk) = dilithium2::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            SecurityTier::Medium => {
                let (pk, sk) = dilithium3::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            SecurityTier::High => {
                let (pk, sk) = dilithium5::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
        };
        debug!(level = %self.level, pk_len = public_key.len(), "generated dilithium keypair");
        Ok(RawKeyPair {
            public_key,
            secret_key: Zeroizing::new(secret_key),
        })
    }

    fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, QuantumError> {
        let invalid = |e: pqcrypto_traits::Error| {
            QuantumError::InvalidKey(format!("Invalid Dilithium secret key: {:?}", e))
        };
        let signature = match self.level.tier() {
            SecurityTier::Low => {
                let sk = dilithium2::SecretKey::from_bytes(secret_key).map_err(invalid)?;
                dilithium2::detached_sign(message, &sk).as_bytes().to_vec()
            }
            SecurityTier::Medium => {
                let sk = dilithium3::SecretKey::from_bytes(secret_key).map_err(invalid)?;
                dilithium3::detached_sign(message, &sk).as_bytes().to_vec()
            }
            SecurityTier::High => {
                let sk = dilithium5::SecretKey::from_bytes(secret_key).map_err(invalid)?;
                dilithium5::detached_sign(message, &sk).as_bytes().to_vec()
            }
        };
        Ok(signature)
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        match self.try_verify(message, signature, public_key) {
            Ok(valid) => valid,
            Err(e) => {
                debug!(error = %e, "dilithium verification rejected malformed input");
                false
            }
        }
    }
}

/// SPHINCS+ (SHAKE, fast, simple) bound to one parameter set
#[derive(Debug, Clone, Copy)]
pub struct SphincsScheme {
    level: SecurityLevel,
}

impl SphincsScheme {
    pub fn new(level: SecurityLevel) -> Self {
        Self { level }
    }

    pub fn signature_bytes(&self) -> usize {
        match self.level.tier() {
            SecurityTier::Low => sphincsshake128fsimple::signature_bytes(),
            SecurityTier::Medium => sphincsshake192fsimple::signature_bytes(),
            SecurityTier::High => sphincsshake256fsimple::signature_bytes(),
        }
    }

    fn try_verify(
        &self,
        message: &[u8],
        signature: &[u8],
        public_key: &[u8],
    ) -> Result<bool, QuantumError> {
        match self.level.tier() {
            SecurityTier::Low => {
                let pk = sphincsshake128fsimple::PublicKey::from_bytes(public_key)
                    .map_err(|e| QuantumError::InvalidKey(format!("{:?}", e)))?;
                let sig = sphincsshake128fsimple::DetachedSignature::from_bytes(signature)
                    .map_err(|e| QuantumError::InvalidSignature(format!("{:?}", e)))?;
                Ok(sphincsshake128fsimple::verify_detached_signature(&sig, message, &pk).is_ok())
            }
            SecurityTier::Medium => {
                let pk = sphincsshake192fsimple::PublicKey::from_bytes(public_key)
                    .map_err(|e| QuantumError::InvalidKey(format!("{:?}", e)))?;
                let sig = sphincsshake192fsimple::DetachedSignature::from_bytes(signature)
                    .map_err(|e| QuantumError::InvalidSignature(format!("{:?}", e)))?;
                Ok(sphincsshake192fsimple::verify_detached_signature(&sig, message, &pk).is_ok())
            }
            SecurityTier::High => {
                let pk = sphincsshake256fsimple::PublicKey::from_bytes(public_key)
                    .map_err(|e| QuantumError::InvalidKey(format!("{:?}", e)))?;
                let sig = sphincsshake256fsimple::DetachedSignature::from_bytes(signature)
                    .map_err(|e| QuantumError::InvalidSignature(format!("{:?}", e)))?;
                Ok(sphincsshake256fsimple::verify_detached_signature(&sig, message, &pk).is_ok())
            }
        }
    }
}

impl SignatureScheme for SphincsScheme {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Sphincs
    }

    fn security_level(&self) -> SecurityLevel {
        self.level
    }

    fn generate_keypair(&self) -> Result<RawKeyPair, QuantumError> {
        let (public_key, secret_key) = match self.level.tier() {
            SecurityTier::Low => {
                let (pk, sk) = sphincsshake128fsimple::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            SecurityTier::Medium => {
                let (pk, sk) = sphincsshake192fsimple::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
            SecurityTier::High => {
                let (pk, sk) = sphincsshake256fsimple::keypair();
                (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
            }
        };
        debug!(level = %self.level, pk_len = public_key.len(), "generated sphincs+ keypair");
        Ok(RawKeyPair {
            public_key,
            secret_key: Zeroizing::new(secret_key),
        })
    }

    fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, QuantumError> {
        let invalid = |e: pqcrypto_traits::Error| {
            QuantumError::InvalidKey(format!("Invalid SPHINCS+ secret key: {:?}", e))
        };
        let signature = match self.level.tier() {
            SecurityTier::Low => {
                let sk = sphincsshake128fsimple::SecretKey::from_bytes(secret_key).map_err(invalid)?;
                sphincsshake128fsimple::detached_sign(message, &sk).as_bytes().to_vec()
            }
            SecurityTier::Medium => {
                let sk = sphincsshake192fsimple::SecretKey::from_bytes(secret_key).map_err(invalid)?;
                sphincsshake192fsimple::detached_sign(message, &sk).as_bytes().to_vec()
            }
            SecurityTier::High => {
                let sk = sphincsshake256fsimple::SecretKey::from_bytes(secret_key).map_err(invalid)?;
                sphincsshake256fsimple::detached_sign(message, &sk).as_bytes().to_vec()
            }
        };
        Ok(signature)
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        match self.try_verify(message, signature, public_key) {
            Ok(valid) => valid,
            Err(e) => {
                debug!(error = %e, "sphincs+ verification rejected malformed input");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(n: u8) -> SecurityLevel {
        SecurityLevel::new(n).unwrap()
    }

    #[test]
    fn test_dilithium_sign_verify_all_tiers() {
        for n in [2, 3, 5] {
            let scheme = DilithiumScheme::new(level(n));
            let keypair = scheme.generate_keypair().unwrap();
            let message = b"dilithium test message";

            let signature = scheme.sign(message, &keypair.secret_key).unwrap();
            assert_eq!(signature.len(), scheme.signature_bytes());
            assert!(scheme.verify(message, &signature, &keypair.public_key));
            assert!(!scheme.verify(b"other message", &signature, &keypair.public_key));
        }
    }

    #[test]
    fn test_sphincs_sign_verify() {
        let scheme = SphincsScheme::new(level(1));
        let keypair = scheme.generate_keypair().unwrap();
        let message = b"sphincs test message";

        let signature = scheme.sign(message, &keypair.secret_key).unwrap();
        assert!(scheme.verify(message, &signature, &keypair.public_key));

        let mut tampered = signature.clone();
        tampered[10] ^= 0x01;
        assert!(!scheme.verify(message, &tampered, &keypair.public_key));
    }

    #[test]
    fn test_malformed_inputs_verify_false() {
        let scheme = DilithiumScheme::new(level(3));
        let keypair = scheme.generate_keypair().unwrap();
        assert!(!scheme.verify(b"msg", &[0u8; 7], &keypair.public_key));
        assert!(!scheme.verify(b"msg", &[0u8; 7], &[1u8; 3]));
    }

    #[test]
    fn test_sign_with_malformed_secret_key_fails() {
        let scheme = SphincsScheme::new(level(3));
        assert!(matches!(
            scheme.sign(b"msg", &[0u8; 5]),
            Err(QuantumError::InvalidKey(_))
        ));
    }
}
