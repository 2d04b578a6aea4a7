// Key material model
// Encoded keypairs, key bundles and their canonical byte form

use dirac_core::{AlgorithmId, SecurityLevel};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Serde adapter storing raw bytes as standard base64 text
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// One half of a keypair under a named algorithm.
///
/// Key bytes are wiped when the value is dropped; this covers secret keys
/// held in memory while a wallet is unlocked.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    #[zeroize(skip)]
    pub algorithm: AlgorithmId,
    #[zeroize(skip)]
    pub security_level: SecurityLevel,
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
}

impl KeyMaterial {
    pub fn new(algorithm: impl Into<AlgorithmId>, security_level: SecurityLevel, key: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            security_level,
            key,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("security_level", &self.security_level)
            .field("key_len", &self.key.len())
            .finish()
    }
}

/// Public halves of the primary signing key, the KEM key and any backups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyBundle {
    pub primary: KeyMaterial,
    pub encryption: KeyMaterial,
    #[serde(default)]
    pub backups: Vec<KeyMaterial>,
}

/// Private halves, index-aligned with [`PublicKeyBundle`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyBundle {
    pub primary: KeyMaterial,
    pub encryption: KeyMaterial,
    #[serde(default)]
    pub backups: Vec<KeyMaterial>,
}

impl PublicKeyBundle {
    /// Stable serialization used for address derivation.
    ///
    /// Round-trips through `serde_json::Value`, whose maps are ordered by key,
    /// so field order in the struct never affects the bytes.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        serde_json::to_vec(&value)
    }

    pub fn backup_count(&self) -> usize {
        self.backups.len()
    }
}
