// Wallet Lifecycle
// Locked <-> Unlocked facade over the keyring and encrypted storage

use chrono::{DateTime, Utc};
use dirac_core::{HashAlgorithm, SecurityLevel, SignatureAlgorithm};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::address::{decode_chain_address, verify_address_mapping};
use super::error::WalletError;
use super::keyring::Keyring;
use super::keys::{PrivateKeyBundle, PublicKeyBundle};
use super::message::Pubkey;
use super::record::{WalletMetadata, WalletRecord, WalletSummary, RECORD_VERSION};
use super::storage::{BackupInfo, BackupSelector, StorageError, WalletStorage};
use super::transaction_builder::QuantumTransaction;
use crate::history::{TransactionHistory, TransactionRecord};
use crate::network::Network;

/// Result of [`QuantumWallet::create`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedWallet {
    pub chain_address: String,
    pub quantum_address: String,
    pub path: PathBuf,
    pub backup_id: String,
}

/// Displayable wallet facts. Fields the clear-text summary lacks are `None`
/// until the wallet has been unlocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletInfo {
    pub name: String,
    pub chain_address: String,
    pub quantum_address: Option<String>,
    pub signature_algorithm: SignatureAlgorithm,
    pub hash_algorithm: Option<HashAlgorithm>,
    pub security_level: Option<SecurityLevel>,
    pub backup_keys: usize,
    pub network: Network,
    pub created_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub unlocked: bool,
    pub watch_only: bool,
}

/// Handle on one named wallet. Starts locked.
pub struct QuantumWallet {
    storage: WalletStorage,
    keyring: Keyring,
    name: String,
    network: Network,
    /// Public view is kept while locked; private keys only while unlocked
    record: Option<WalletRecord>,
    unlocked: bool,
}

impl QuantumWallet {
    pub fn new(
        storage: WalletStorage,
        keyring: Keyring,
        name: impl Into<String>,
        network: Network,
    ) -> Self {
        Self {
            storage,
            keyring,
            name: name.into(),
            network,
            record: None,
            unlocked: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    pub fn storage(&self) -> &WalletStorage {
        &self.storage
    }

    pub fn record(&self) -> Option<&WalletRecord> {
        self.record.as_ref()
    }

    pub fn public_key(&self) -> Option<&PublicKeyBundle> {
        self.record.as_ref().map(|r| &r.public_key)
    }

    pub fn chain_address(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.chain_address.as_str())
    }

    pub fn chain_pubkey(&self) -> Option<Pubkey> {
        let address = self.chain_address()?;
        decode_chain_address(address).ok().map(Pubkey::new_from_array)
    }

    /// Private keys, available only while unlocked
    pub fn signing_keys(&self) -> Result<&PrivateKeyBundle, WalletError> {
        if !self.unlocked {
            return Err(WalletError::WalletLocked);
        }
        let record = self
            .record
            .as_ref()
            .ok_or_else(|| WalletError::NotLoaded(self.name.clone()))?;
        record
            .private_key
            .as_ref()
            .ok_or_else(|| WalletError::WatchOnly(self.name.clone()))
    }

    /// Generate keys, persist the encrypted record and an initial backup, then unlock.
    ///
    /// An existing wallet is only replaced with `overwrite`, and its current
    /// file is snapshotted first.
    pub fn create(&mut self, password: &str, overwrite: bool) -> Result<CreatedWallet, WalletError> {
        if self.storage.exists(&self.name) {
            if !overwrite {
                return Err(StorageError::AlreadyExists(self.name.clone()).into());
            }
            let snapshot = self.storage.snapshot(&self.name)?;
            warn!(wallet = %self.name, backup = %snapshot, "Overwriting existing wallet");
        }

        let (private_key, public_key) = self.keyring.generate_keypair()?;
        let chain_address = self.keyring.derive_chain_address(&public_key)?;
        let quantum_address = self.keyring.derive_address(&public_key)?;

        let now = Utc::now();
        let record = WalletRecord {
            name: self.name.clone(),
            chain_address: chain_address.clone(),
            quantum_address: quantum_address.clone(),
            public_key,
            private_key: Some(private_key),
            algorithm: self.keyring.config(),
            metadata: WalletMetadata {
                created_at: now,
                last_accessed: now,
                version: RECORD_VERSION.to_string(),
                network: self.network,
            },
        };

        let path = self.storage.save(&self.name, &record, password)?;
        let backup_id = self.storage.create_backup(&self.name, &record, password)?;

        info!(
            wallet = %self.name,
            address = %chain_address,
            algorithm = %record.algorithm.signature,
            network = %self.network,
            "Created quantum wallet"
        );

        self.record = Some(record);
        self.unlocked = true;

        Ok(CreatedWallet {
            chain_address,
            quantum_address,
            path,
            backup_id,
        })
    }

    /// Decrypt the stored record. A wrong password returns `Ok(false)` and leaves
    /// the wallet locked with no private material loaded.
    pub fn unlock(&mut self, password: &str) -> Result<bool, WalletError> {
        self.lock();

        let mut record = match self.storage.load(&self.name, password) {
            Ok(record) => record,
            Err(StorageError::InvalidPassword) => {
                warn!(wallet = %self.name, "Unlock failed: invalid password");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let keyring = self.keyring.reconfigure(record.algorithm)?;
        if !verify_address_mapping(&keyring, &record.public_key, &record.chain_address) {
            warn!(wallet = %self.name, "Stored chain address does not match the public key");
        }
        if record.metadata.network != self.network {
            warn!(
                wallet = %self.name,
                stored = %record.metadata.network,
                requested = %self.network,
                "Wallet belongs to a different network; using the stored one"
            );
        }

        record.metadata.last_accessed = Utc::now();
        self.storage.save(&self.name, &record, password)?;

        self.network = record.metadata.network;
        self.keyring = keyring;
        self.record = Some(record);
        self.unlocked = true;
        info!(wallet = %self.name, "Wallet unlocked");
        Ok(true)
    }

    /// Drop private key material. Idempotent.
    pub fn lock(&mut self) {
        if let Some(record) = self.record.as_mut() {
            // KeyMaterial zeroizes on drop
            record.private_key = None;
        }
        if self.unlocked {
            debug!(wallet = %self.name, "Wallet locked");
        }
        self.unlocked = false;
    }

    pub fn info(&self) -> Result<WalletInfo, WalletError> {
        if let Some(record) = &self.record {
            return Ok(WalletInfo {
                name: record.name.clone(),
                chain_address: record.chain_address.clone(),
                quantum_address: Some(record.quantum_address.clone()),
                signature_algorithm: record.algorithm.signature,
                hash_algorithm: Some(record.algorithm.hash),
                security_level: Some(record.algorithm.security_level),
                backup_keys: record.public_key.backup_count(),
                network: record.metadata.network,
                created_at: record.metadata.created_at,
                last_accessed: Some(record.metadata.last_accessed),
                unlocked: self.unlocked,
                watch_only: self.unlocked && record.is_watch_only(),
            });
        }

        let WalletSummary {
            name,
            chain_address,
            algorithm,
            created_at,
            network,
        } = self.storage.read_summary(&self.name)?;
        Ok(WalletInfo {
            name,
            chain_address,
            quantum_address: None,
            signature_algorithm: algorithm,
            hash_algorithm: None,
            security_level: None,
            backup_keys: 0,
            network,
            created_at,
            last_accessed: None,
            unlocked: false,
            watch_only: false,
        })
    }

    /// Start a transfer signed by this wallet
    pub fn transaction(&self) -> QuantumTransaction<'_> {
        QuantumTransaction::new(self)
    }

    pub fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, WalletError> {
        let keys = self.signing_keys()?;
        Ok(self.keyring.sign_transaction(message, keys)?)
    }

    pub fn verify_signature(&self, message: &[u8], signature: &[u8]) -> Result<bool, WalletError> {
        let public = self
            .public_key()
            .ok_or_else(|| WalletError::NotLoaded(self.name.clone()))?;
        Ok(self.keyring.verify_transaction(message, signature, public))
    }

    /// Encrypt to this wallet's own KEM key. Returns `(ciphertext, kem_ciphertext)`.
    pub fn encrypt_for_self(&self, data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), WalletError> {
        let public = self
            .public_key()
            .ok_or_else(|| WalletError::NotLoaded(self.name.clone()))?;
        Ok(self.keyring.encrypt(data, public)?)
    }

    pub fn decrypt(&self, ciphertext: &[u8], kem_ciphertext: &[u8]) -> Result<Vec<u8>, WalletError> {
        let keys = self.signing_keys()?;
        Ok(self.keyring.decrypt(ciphertext, kem_ciphertext, keys)?)
    }

    /// Snapshot the live encrypted file. Needs no password.
    pub fn create_backup(&self) -> Result<String, WalletError> {
        Ok(self.storage.snapshot(&self.name)?)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, WalletError> {
        Ok(self.storage.list_backups(&self.name)?)
    }

    /// Replace the live record with a backup and refresh what is held in memory
    pub fn restore(
        &mut self,
        selector: &BackupSelector,
        password: &str,
    ) -> Result<WalletSummary, WalletError> {
        let record = self.storage.restore(&self.name, selector, password)?;
        let summary = record.summary();

        if self.unlocked {
            self.keyring = self.keyring.reconfigure(record.algorithm)?;
            self.network = record.metadata.network;
            self.record = Some(record);
        } else if self.record.is_some() {
            self.record = Some(record.public_copy());
        }
        Ok(summary)
    }

    /// Re-encrypt the live file. Existing backups keep the password they were written with.
    pub fn change_password(&mut self, old_password: &str, new_password: &str) -> Result<(), WalletError> {
        let record = self.storage.load(&self.name, old_password)?;
        self.storage.save(&self.name, &record, new_password)?;
        info!(wallet = %self.name, "Wallet password changed");
        Ok(())
    }

    pub fn history(&self) -> Result<TransactionHistory, WalletError> {
        Ok(self.storage.transaction_history(&self.name)?)
    }

    pub fn record_transaction(&self, record: TransactionRecord) -> Result<(), WalletError> {
        Ok(self.storage.append_transaction(&self.name, record)?)
    }
}

impl std::fmt::Debug for QuantumWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantumWallet")
            .field("name", &self.name)
            .field("network", &self.network)
            .field("chain_address", &self.chain_address())
            .field("unlocked", &self.unlocked)
            .finish()
    }
}
