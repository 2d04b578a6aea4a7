// Persisted wallet aggregate

use chrono::{DateTime, Utc};
use dirac_core::{HashAlgorithm, KemAlgorithm, SecurityLevel, SignatureAlgorithm};
use serde::{Deserialize, Serialize};

use super::keys::{PrivateKeyBundle, PublicKeyBundle};
use crate::network::Network;

/// Wallet file format version written into every record
pub const RECORD_VERSION: &str = "1.0";

/// Algorithms in effect for one wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    pub signature: SignatureAlgorithm,
    pub hash: HashAlgorithm,
    pub kem: KemAlgorithm,
    pub security_level: SecurityLevel,
    pub backups: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletMetadata {
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub version: String,
    pub network: Network,
}

/// Full wallet record. `private_key` is `None` for exported and watch-only copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub name: String,
    pub chain_address: String,
    pub quantum_address: String,
    pub public_key: PublicKeyBundle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PrivateKeyBundle>,
    pub algorithm: AlgorithmConfig,
    pub metadata: WalletMetadata,
}

impl WalletRecord {
    pub fn is_watch_only(&self) -> bool {
        self.private_key.is_none()
    }

    /// Copy with every private field removed
    pub fn public_copy(&self) -> WalletRecord {
        WalletRecord {
            private_key: None,
            ..self.clone()
        }
    }

    /// Non-secret fields stored in clear beside the encrypted payload
    pub fn summary(&self) -> WalletSummary {
        WalletSummary {
            name: self.name.clone(),
            chain_address: self.chain_address.clone(),
            algorithm: self.algorithm.signature,
            created_at: self.metadata.created_at,
            network: self.metadata.network,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub name: String,
    pub chain_address: String,
    pub algorithm: SignatureAlgorithm,
    pub created_at: DateTime<Utc>,
    pub network: Network,
}
