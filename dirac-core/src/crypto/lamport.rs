//! Lamport one-time signatures over SHA-256.
//!
//! Secret key: 256 pairs of 32-byte preimages. Public key: the SHA-256 of each
//! preimage. A signature reveals one preimage per bit of the message digest.
//! Every key must sign at most one message; signing twice leaks preimages for
//! both bit values wherever the two digests differ.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::algorithm::{SecurityLevel, SignatureAlgorithm};
use super::quantum::QuantumError;
use super::registry::{RawKeyPair, SignatureScheme};

const BITS: usize = 256;
const CHUNK: usize = 32;

/// Length of secret and public keys in bytes
pub const KEY_BYTES: usize = BITS * 2 * CHUNK;
/// Length of a signature in bytes
pub const SIGNATURE_BYTES: usize = BITS * CHUNK;

#[derive(Debug, Clone, Copy)]
pub struct LamportScheme {
    // Carried for key metadata only; the parameter set is fixed
    level: SecurityLevel,
}

impl LamportScheme {
    pub fn new(level: SecurityLevel) -> Self {
        Self { level }
    }
}

fn bit(digest: &[u8], index: usize) -> usize {
    ((digest[index / 8] >> (7 - (index % 8))) & 1) as usize
}

impl SignatureScheme for LamportScheme {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Lamport
    }

    fn security_level(&self) -> SecurityLevel {
        self.level
    }

    fn generate_keypair(&self) -> Result<RawKeyPair, QuantumError> {
        let mut secret_key = Zeroizing::new(vec![0u8; KEY_BYTES]);
        OsRng
            .try_fill_bytes(secret_key.as_mut_slice())
            .map_err(|e| QuantumError::KeyGenerationFailed(e.to_string()))?;

        let mut public_key = Vec::with_capacity(KEY_BYTES);
        for preimage in secret_key.chunks_exact(CHUNK) {
            public_key.extend_from_slice(&Sha256::digest(preimage));
        }

        Ok(RawKeyPair {
            public_key,
            secret_key,
        })
    }

    fn sign(&self, message: &[u8], secret_key: &[u8]) -> Result<Vec<u8>, QuantumError> {
        if secret_key.len() != KEY_BYTES {
            return Err(QuantumError::InvalidKey(format!(
                "Lamport secret key must be {} bytes, got {}",
                KEY_BYTES,
                secret_key.len()
            )));
        }

        let digest = Sha256::digest(message);
        let mut signature = Vec::with_capacity(SIGNATURE_BYTES);
        for i in 0..BITS {
            let offset = (2 * i + bit(&digest, i)) * CHUNK;
            signature.extend_from_slice(&secret_key[offset..offset + CHUNK]);
        }
        Ok(signature)
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        if signature.len() != SIGNATURE_BYTES || public_key.len() != KEY_BYTES {
            return false;
        }

        let digest = Sha256::digest(message);
        let mut valid = subtle::Choice::from(1u8);
        for i in 0..BITS {
            let revealed = &signature[i * CHUNK..(i + 1) * CHUNK];
            let offset = (2 * i + bit(&digest, i)) * CHUNK;
            let expected = &public_key[offset..offset + CHUNK];
            valid &= Sha256::digest(revealed).as_slice().ct_eq(expected);
        }
        valid.into()
    }
}
