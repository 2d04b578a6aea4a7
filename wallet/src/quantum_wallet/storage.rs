// Encrypted Wallet Storage
// One password-encrypted file per wallet plus immutable timestamped backups

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use fs2::FileExt;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::error::ErrorKind;
use super::record::{WalletRecord, WalletSummary};
use crate::history::{HistoryError, TransactionHistory, TransactionRecord};

/// Extension of live wallet files and backups
pub const WALLET_FILE_EXTENSION: &str = "dwf";

/// Version of the JSON envelope around the encrypted blob
pub const STORAGE_FORMAT_VERSION: u32 = 1;

const MAGIC: &[u8; 4] = b"DWF1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid password")]
    InvalidPassword,

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Wallet '{0}' already exists")]
    AlreadyExists(String),

    #[error("Wallet '{0}' is being written by another process")]
    StorageBusy(String),

    #[error("Invalid wallet name '{0}': use letters, digits, '-' or '_'")]
    InvalidName(String),

    #[error("Corrupt wallet file: {0}")]
    Corrupt(String),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("History error: {0}")]
    History(#[from] HistoryError),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::InvalidPassword => ErrorKind::InvalidPassword,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StorageError::StorageBusy(_) => ErrorKind::StorageBusy,
            StorageError::InvalidName(_) => ErrorKind::InvalidConfiguration,
            StorageError::Corrupt(_) | StorageError::Serialization(_) => ErrorKind::Serialization,
            StorageError::KeyDerivation(_) | StorageError::Encryption(_) => ErrorKind::Crypto,
            StorageError::Io(_) => ErrorKind::Io,
            StorageError::History(HistoryError::Io(_)) => ErrorKind::Io,
            StorageError::History(HistoryError::Serialization(_)) => ErrorKind::Serialization,
            StorageError::History(HistoryError::TransactionNotFound(_)) => ErrorKind::NotFound,
        }
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory in KiB
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never use for real wallets.
    pub fn testing() -> Self {
        Self {
            m_cost: 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, StorageError> {
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, Some(KEY_LEN))
            .map_err(|e| StorageError::KeyDerivation(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut key[..])
            .map_err(|e| StorageError::KeyDerivation(e.to_string()))?;
        Ok(key)
    }
}

/// Encrypt under a password: `magic || salt || nonce || ciphertext || tag`.
///
/// Salt and nonce are fresh on every call.
pub fn encrypt_blob(plaintext: &[u8], password: &str, kdf: &KdfParams) -> Result<Vec<u8>, StorageError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let key = kdf.derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| StorageError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| StorageError::Encryption(e.to_string()))?;

    let mut blob = Vec::with_capacity(MAGIC.len() + SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(MAGIC);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Reverse of [`encrypt_blob`]. Authentication failure is reported as `InvalidPassword`.
pub fn decrypt_blob(
    blob: &[u8],
    password: &str,
    kdf: &KdfParams,
) -> Result<Zeroizing<Vec<u8>>, StorageError> {
    let header = MAGIC.len() + SALT_LEN + NONCE_LEN;
    if blob.len() < header + TAG_LEN {
        return Err(StorageError::Corrupt(format!("blob of {} bytes is truncated", blob.len())));
    }
    if &blob[..MAGIC.len()] != MAGIC {
        return Err(StorageError::Corrupt("unknown file magic".to_string()));
    }

    let salt = &blob[MAGIC.len()..MAGIC.len() + SALT_LEN];
    let nonce = &blob[MAGIC.len() + SALT_LEN..header];
    let key = kdf.derive_key(password, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| StorageError::Encryption(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), &blob[header..])
        .map(Zeroizing::new)
        .map_err(|_| StorageError::InvalidPassword)
}

/// On-disk form of a `.dwf` file
#[derive(Debug, Serialize, Deserialize)]
struct WalletEnvelope {
    format_version: u32,
    kdf: KdfParams,
    summary: WalletSummary,
    payload: String,
}

/// Which backup to restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupSelector {
    Latest,
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// Advisory write lock on one wallet name, released on drop
#[derive(Debug)]
pub struct StorageLock {
    file: File,
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "Failed to release wallet lock");
        }
    }
}

/// Wallet storage backend rooted at one directory
#[derive(Debug, Clone)]
pub struct WalletStorage {
    root: PathBuf,
    kdf: KdfParams,
}

impl WalletStorage {
    /// Open storage under `root`, creating the directory layout if needed
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(root.join("backups"))?;
        fs::create_dir_all(root.join("transactions"))?;
        Ok(Self {
            root,
            kdf: KdfParams::default(),
        })
    }

    /// Key-derivation cost for files written from now on
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn wallet_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, WALLET_FILE_EXTENSION))
    }

    fn backup_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    fn backup_path(&self, id: &str) -> PathBuf {
        self.backup_dir().join(format!("{}.{}", id, WALLET_FILE_EXTENSION))
    }

    fn history_path(&self, name: &str) -> PathBuf {
        self.root.join("transactions").join(format!("{}.json", name))
    }

    /// Take the advisory write lock for `name`, failing fast if it is held
    pub fn lock(&self, name: &str) -> Result<StorageLock, StorageError> {
        validate_name(name)?;
        let path = self.root.join(format!(".{}.lock", name));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(StorageLock { file }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(StorageError::StorageBusy(name.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.wallet_path(name).is_file()
    }

    /// Encrypt and persist `record` as the live file for `name`
    pub fn save(&self, name: &str, record: &WalletRecord, password: &str) -> Result<PathBuf, StorageError> {
        let _lock = self.lock(name)?;
        let path = self.wallet_path(name);
        self.write_envelope(&path, record, password)?;
        debug!(wallet = name, path = %path.display(), "Saved wallet");
        Ok(path)
    }

    pub fn load(&self, name: &str, password: &str) -> Result<WalletRecord, StorageError> {
        validate_name(name)?;
        let path = self.wallet_path(name);
        if !path.is_file() {
            return Err(StorageError::NotFound(format!("wallet '{}'", name)));
        }
        self.read_envelope(&path, password)
    }

    /// Non-secret summary of `name`; needs no password
    pub fn read_summary(&self, name: &str) -> Result<WalletSummary, StorageError> {
        validate_name(name)?;
        let path = self.wallet_path(name);
        if !path.is_file() {
            return Err(StorageError::NotFound(format!("wallet '{}'", name)));
        }
        Ok(read_envelope_file(&path)?.summary)
    }

    /// Summaries of every wallet in the directory, sorted by name
    pub fn list(&self) -> Result<Vec<WalletSummary>, StorageError> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(WALLET_FILE_EXTENSION) {
                continue;
            }
            match read_envelope_file(&path) {
                Ok(envelope) => summaries.push(envelope.summary),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable wallet file"),
            }
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    /// Remove the live file. Backups and history are kept.
    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        let _lock = self.lock(name)?;
        let path = self.wallet_path(name);
        if !path.is_file() {
            return Err(StorageError::NotFound(format!("wallet '{}'", name)));
        }
        fs::remove_file(&path)?;
        info!(wallet = name, "Deleted wallet");
        Ok(())
    }

    /// Write an immutable encrypted snapshot of `record`. Returns the backup id.
    pub fn create_backup(
        &self,
        name: &str,
        record: &WalletRecord,
        password: &str,
    ) -> Result<String, StorageError> {
        let _lock = self.lock(name)?;
        let (id, path) = self.next_backup_slot(name)?;
        self.write_envelope(&path, record, password)?;
        info!(wallet = name, backup = %id, "Created wallet backup");
        Ok(id)
    }

    /// Back up the live file as it is on disk, without decrypting it
    pub fn snapshot(&self, name: &str) -> Result<String, StorageError> {
        let _lock = self.lock(name)?;
        let source = self.wallet_path(name);
        if !source.is_file() {
            return Err(StorageError::NotFound(format!("wallet '{}'", name)));
        }
        let bytes = fs::read(&source)?;
        let (id, path) = self.next_backup_slot(name)?;
        write_atomic(&path, &bytes)?;
        info!(wallet = name, backup = %id, "Created wallet backup");
        Ok(id)
    }

    /// Next free backup id, strictly newer than every existing backup of `name`
    fn next_backup_slot(&self, name: &str) -> Result<(String, PathBuf), StorageError> {
        let newest = self
            .list_backups(name)?
            .first()
            .map(|b| b.created_at.timestamp_millis() + 1)
            .unwrap_or(i64::MIN);
        let mut millis = Utc::now().timestamp_millis().max(newest);
        loop {
            let id = format!("{}_backup_{}", name, millis);
            let path = self.backup_path(&id);
            if !path.exists() {
                return Ok((id, path));
            }
            millis += 1;
        }
    }

    /// Backups of `name`, newest first
    pub fn list_backups(&self, name: &str) -> Result<Vec<BackupInfo>, StorageError> {
        validate_name(name)?;
        let prefix = format!("{}_backup_", name);
        let mut backups = Vec::new();

        for entry in fs::read_dir(self.backup_dir())? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(WALLET_FILE_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(millis) = id
                .strip_prefix(&prefix)
                .and_then(|suffix| suffix.parse::<i64>().ok())
            else {
                continue;
            };
            let Some(created_at) = Utc.timestamp_millis_opt(millis).single() else {
                continue;
            };
            backups.push((millis, BackupInfo {
                id: id.to_string(),
                created_at,
                path: path.clone(),
            }));
        }

        backups.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(backups.into_iter().map(|(_, info)| info).collect())
    }

    /// Replace the live record of `name` with a backup, wholesale.
    ///
    /// The backup must decrypt under `password`; it is copied byte for byte,
    /// so the restored file keeps the password it was backed up with.
    pub fn restore(
        &self,
        name: &str,
        selector: &BackupSelector,
        password: &str,
    ) -> Result<WalletRecord, StorageError> {
        let backups = self.list_backups(name)?;
        let backup = match selector {
            BackupSelector::Latest => backups.first(),
            BackupSelector::Id(id) => backups.iter().find(|b| &b.id == id),
        }
        .ok_or_else(|| StorageError::NotFound(format!("backup for wallet '{}'", name)))?;

        let record = self.read_envelope(&backup.path, password)?;

        let _lock = self.lock(name)?;
        let bytes = fs::read(&backup.path)?;
        write_atomic(&self.wallet_path(name), &bytes)?;
        info!(wallet = name, backup = %backup.id, "Restored wallet from backup");
        Ok(record)
    }

    /// Write the record as plaintext JSON to `<out_dir>/<name>_export.json`.
    ///
    /// Private keys are stripped unless `include_private` is set.
    pub fn export(
        &self,
        name: &str,
        password: &str,
        out_dir: &Path,
        include_private: bool,
    ) -> Result<PathBuf, StorageError> {
        let record = self.load(name, password)?;
        let exported = if include_private {
            warn!(wallet = name, "Exporting wallet with private keys in plaintext");
            record
        } else {
            record.public_copy()
        };

        fs::create_dir_all(out_dir)?;
        let path = out_dir.join(format!("{}_export.json", name));
        let json = Zeroizing::new(serde_json::to_vec_pretty(&exported)?);
        write_atomic(&path, &json)?;
        info!(wallet = name, path = %path.display(), include_private, "Exported wallet");
        Ok(path)
    }

    /// Import an exported record, optionally under a new name.
    ///
    /// Public-only records are accepted and become watch-only wallets.
    pub fn import(
        &self,
        path: &Path,
        name: Option<&str>,
        password: &str,
    ) -> Result<WalletRecord, StorageError> {
        let json = Zeroizing::new(fs::read(path)?);
        let mut record: WalletRecord = serde_json::from_slice(&json)?;
        if let Some(name) = name {
            record.name = name.to_string();
        }

        validate_name(&record.name)?;
        if self.exists(&record.name) {
            return Err(StorageError::AlreadyExists(record.name));
        }
        self.save(&record.name, &record, password)?;
        info!(wallet = %record.name, watch_only = record.is_watch_only(), "Imported wallet");
        Ok(record)
    }

    /// Appends hold the wallet's write lock
    pub fn append_transaction(&self, name: &str, record: TransactionRecord) -> Result<(), StorageError> {
        let _lock = self.lock(name)?;
        let mut history = TransactionHistory::new(self.history_path(name))?;
        history.append(record)?;
        Ok(())
    }

    pub fn transaction_history(&self, name: &str) -> Result<TransactionHistory, StorageError> {
        validate_name(name)?;
        Ok(TransactionHistory::new(self.history_path(name))?)
    }

    fn write_envelope(&self, path: &Path, record: &WalletRecord, password: &str) -> Result<(), StorageError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(record)?);
        let blob = encrypt_blob(&plaintext, password, &self.kdf)?;
        let envelope = WalletEnvelope {
            format_version: STORAGE_FORMAT_VERSION,
            kdf: self.kdf,
            summary: record.summary(),
            payload: STANDARD.encode(blob),
        };
        write_atomic(path, &serde_json::to_vec_pretty(&envelope)?)
    }

    fn read_envelope(&self, path: &Path, password: &str) -> Result<WalletRecord, StorageError> {
        let envelope = read_envelope_file(path)?;
        let blob = STANDARD
            .decode(envelope.payload.as_bytes())
            .map_err(|e| StorageError::Corrupt(format!("payload is not base64: {}", e)))?;
        let plaintext = decrypt_blob(&blob, password, &envelope.kdf)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

fn read_envelope_file(path: &Path) -> Result<WalletEnvelope, StorageError> {
    let data = fs::read(path)?;
    let envelope: WalletEnvelope = serde_json::from_slice(&data)
        .map_err(|e| StorageError::Corrupt(format!("{}: {}", path.display(), e)))?;
    if envelope.format_version != STORAGE_FORMAT_VERSION {
        return Err(StorageError::Corrupt(format!(
            "unsupported format version {}",
            envelope.format_version
        )));
    }
    Ok(envelope)
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::Corrupt(format!("invalid path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::quantum_wallet::keyring::Keyring;
    use crate::quantum_wallet::record::{WalletMetadata, RECORD_VERSION};
    use dirac_core::{AlgorithmRegistry, HashAlgorithm, SecurityLevel, SignatureAlgorithm};
    use tempfile::TempDir;

    fn storage() -> (TempDir, WalletStorage) {
        let dir = TempDir::new().unwrap();
        let storage = WalletStorage::new(dir.path())
            .unwrap()
            .with_kdf_params(KdfParams::testing());
        (dir, storage)
    }

    fn record(name: &str) -> WalletRecord {
        let keyring = Keyring::new(
            AlgorithmRegistry::default(),
            SignatureAlgorithm::Dilithium,
            HashAlgorithm::Improved,
            SecurityLevel::new(2).unwrap(),
            false,
        )
        .unwrap();
        let (private, public) = keyring.generate_keypair().unwrap();
        let now = Utc::now();
        WalletRecord {
            name: name.to_string(),
            chain_address: keyring.derive_chain_address(&public).unwrap(),
            quantum_address: keyring.derive_address(&public).unwrap(),
            public_key: public,
            private_key: Some(private),
            algorithm: keyring.config(),
            metadata: WalletMetadata {
                created_at: now,
                last_accessed: now,
                version: RECORD_VERSION.to_string(),
                network: Network::Devnet,
            },
        }
    }

    #[test]
    fn test_blob_round_trip_and_fresh_salt() {
        let kdf = KdfParams::testing();
        let a = encrypt_blob(b"wallet bytes", "hunter2", &kdf).unwrap();
        let b = encrypt_blob(b"wallet bytes", "hunter2", &kdf).unwrap();
        assert_ne!(a, b);
        assert_eq!(&a[..4], MAGIC);
        assert_eq!(decrypt_blob(&a, "hunter2", &kdf).unwrap().as_slice(), b"wallet bytes");
    }

    #[test]
    fn test_wrong_password_is_distinct_from_corruption() {
        let kdf = KdfParams::testing();
        let blob = encrypt_blob(b"wallet bytes", "right", &kdf).unwrap();
        assert!(matches!(
            decrypt_blob(&blob, "wrong", &kdf),
            Err(StorageError::InvalidPassword)
        ));

        let mut bad_magic = blob.clone();
        bad_magic[0] ^= 0xff;
        let err = decrypt_blob(&bad_magic, "right", &kdf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);

        let err = decrypt_blob(&blob[..20], "right", &kdf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, storage) = storage();
        let original = record("alice");
        let path = storage.save("alice", &original, "pw").unwrap();
        assert!(path.ends_with("alice.dwf"));
        assert!(storage.exists("alice"));

        let loaded = storage.load("alice", "pw").unwrap();
        assert_eq!(loaded, original);
        assert_eq!(storage.read_summary("alice").unwrap(), original.summary());
    }

    #[test]
    fn test_load_missing_wallet() {
        let (_dir, storage) = storage();
        let err = storage.load("nobody", "pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_names_cannot_escape_the_directory() {
        let (_dir, storage) = storage();
        let err = storage.save("../evil", &record("evil"), "pw").unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
        assert!(!storage.exists("../evil"));
    }

    #[test]
    fn test_list_reads_summaries_without_password() {
        let (_dir, storage) = storage();
        storage.save("bob", &record("bob"), "pw1").unwrap();
        storage.save("alice", &record("alice"), "pw2").unwrap();

        let names: Vec<_> = storage.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_backup_ids_never_collide() {
        let (_dir, storage) = storage();
        let rec = record("alice");
        let ids: Vec<_> = (0..3)
            .map(|_| storage.create_backup("alice", &rec, "pw").unwrap())
            .collect();
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);

        let listed: Vec<_> = storage
            .list_backups("alice")
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(listed, ids.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_restore_unknown_backup() {
        let (_dir, storage) = storage();
        let err = storage
            .restore("alice", &BackupSelector::Latest, "pw")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_held_lock_fails_fast() {
        let (_dir, storage) = storage();
        let _held = storage.lock("alice").unwrap();
        let err = storage.save("alice", &record("alice"), "pw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageBusy);
    }

    #[test]
    fn test_history_append_takes_wallet_lock() {
        use crate::history::{TransactionDirection, TransactionStatus};

        let (_dir, storage) = storage();
        let entry = |tx_id: &str| TransactionRecord {
            tx_id: tx_id.to_string(),
            timestamp: Utc::now(),
            direction: TransactionDirection::Received,
            amount: 10,
            counterparty: "11111111111111111111111111111111".to_string(),
            status: TransactionStatus::Confirmed,
            payload_hash: None,
            signature_algorithm: None,
            label: None,
        };

        let held = storage.lock("alice").unwrap();
        let err = storage.append_transaction("alice", entry("tx1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageBusy);
        drop(held);

        storage.append_transaction("alice", entry("tx2")).unwrap();
        let history = storage.transaction_history("alice").unwrap();
        assert!(history.get_transaction("tx1").is_none());
        assert!(history.get_transaction("tx2").is_some());
    }

    #[test]
    fn test_export_strips_private_keys() {
        let (dir, storage) = storage();
        storage.save("alice", &record("alice"), "pw").unwrap();
        let out = dir.path().join("exports");

        let path = storage.export("alice", "pw", &out, false).unwrap();
        let exported: WalletRecord =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(exported.is_watch_only());

        let imported = storage.import(&path, Some("alice-watch"), "pw2").unwrap();
        assert!(imported.is_watch_only());
        assert!(storage.load("alice-watch", "pw2").unwrap().is_watch_only());

        let err = storage.import(&path, Some("alice-watch"), "pw2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }
}
