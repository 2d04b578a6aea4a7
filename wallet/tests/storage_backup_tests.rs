//! Storage and Backup Tests
//!
//! Encrypted persistence of complete wallet records, backups, restore,
//! export/import and password changes.

use dirac_core::{AlgorithmRegistry, HashAlgorithm, SecurityLevel, SignatureAlgorithm};
use dirac_wallet::quantum_wallet::storage::decrypt_blob;
use dirac_wallet::quantum_wallet::{
    BackupSelector, Blockhash, ErrorKind, KdfParams, Keyring, QuantumWallet, StorageError,
    TransactionError, WalletError, WalletRecord, WalletStorage,
};
use dirac_wallet::Network;
use proptest::prelude::*;
use tempfile::{tempdir, TempDir};

const RECIPIENT: &str = "4fYNw3dojWmQ4dXtSGE9epjRGy9pFSx62YypT7avPYvA";

fn storage(dir: &TempDir) -> WalletStorage {
    WalletStorage::new(dir.path())
        .expect("Failed to open storage")
        .with_kdf_params(KdfParams::testing())
}

fn keyring(backups: bool) -> Keyring {
    Keyring::new(
        AlgorithmRegistry::default(),
        SignatureAlgorithm::Dilithium,
        HashAlgorithm::Improved,
        SecurityLevel::new(2).expect("valid level"),
        backups,
    )
    .expect("Failed to build keyring")
}

fn created(dir: &TempDir, name: &str, password: &str, backups: bool) -> QuantumWallet {
    let mut wallet = QuantumWallet::new(storage(dir), keyring(backups), name, Network::Devnet);
    wallet.create(password, false).expect("Failed to create wallet");
    wallet
}

#[test]
fn test_record_round_trip_keeps_backup_keys() {
    let dir = tempdir().expect("Failed to create temp dir");
    let wallet = created(&dir, "alice", "pw", true);
    let original = wallet.record().expect("record").clone();

    let loaded = storage(&dir).load("alice", "pw").expect("Failed to load");
    assert_eq!(loaded, original);

    let private = loaded.private_key.expect("private keys");
    assert_eq!(private.backups.len(), 2);
    assert_eq!(private.backups.len(), loaded.public_key.backups.len());
    for (secret, public) in private.backups.iter().zip(&loaded.public_key.backups) {
        assert_eq!(secret.algorithm, public.algorithm);
        assert_eq!(secret.security_level, public.security_level);
    }

    println!("✓ Round trip preserved {} backup keypairs", private.backups.len());
}

#[test]
fn test_file_holds_no_plaintext_secrets() {
    let dir = tempdir().expect("Failed to create temp dir");
    let wallet = created(&dir, "alice", "pw", false);
    let record = wallet.record().expect("record");

    let raw = std::fs::read_to_string(storage(&dir).wallet_path("alice")).expect("read file");
    let envelope: serde_json::Value = serde_json::from_str(&raw).expect("json envelope");

    assert_eq!(envelope["summary"]["name"], "alice");
    assert_eq!(envelope["summary"]["chain_address"], record.chain_address.as_str());
    assert!(envelope["kdf"]["m_cost"].is_u64());
    assert!(!raw.contains(&record.quantum_address));
    assert!(!raw.contains("private_key"));
}

#[test]
fn test_wrong_password_and_missing_wallet() {
    let dir = tempdir().expect("Failed to create temp dir");
    created(&dir, "alice", "right", false);
    let storage = storage(&dir);

    let wrong = storage.load("alice", "wrong").expect_err("wrong password");
    assert!(matches!(wrong, StorageError::InvalidPassword));

    let missing = storage.load("nobody", "right").expect_err("missing");
    assert!(matches!(missing, StorageError::NotFound(_)));
    assert_ne!(wrong.kind().exit_code(), missing.kind().exit_code());

    // Summary stays readable without any password
    assert_eq!(storage.read_summary("alice").expect("summary").name, "alice");
}

#[test]
fn test_restore_by_id() {
    let dir = tempdir().expect("Failed to create temp dir");
    let wallet = created(&dir, "alice", "pw", false);
    let storage = storage(&dir);
    let original = wallet.record().expect("record").clone();

    let first = storage.snapshot("alice").expect("first snapshot");

    let renamed = WalletRecord {
        metadata: dirac_wallet::quantum_wallet::WalletMetadata {
            network: Network::Testnet,
            ..original.metadata.clone()
        },
        ..original.clone()
    };
    storage.save("alice", &renamed, "pw").expect("save");
    let second = storage.snapshot("alice").expect("second snapshot");

    let backups = storage.list_backups("alice").expect("list");
    let ids: Vec<_> = backups.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids[0], second.as_str());
    assert!(ids.contains(&first.as_str()));
    assert!(backups.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let restored = storage
        .restore("alice", &BackupSelector::Id(first.clone()), "pw")
        .expect("restore by id");
    assert_eq!(restored.metadata.network, Network::Devnet);
    assert_eq!(storage.load("alice", "pw").expect("load"), original);

    let latest = storage
        .restore("alice", &BackupSelector::Latest, "pw")
        .expect("restore latest");
    assert_eq!(latest.metadata.network, Network::Testnet);
}

#[test]
fn test_imported_watch_only_wallet_cannot_sign() {
    let dir = tempdir().expect("Failed to create temp dir");
    let export_dir = tempdir().expect("Failed to create export dir");
    created(&dir, "alice", "pw", false);
    let storage = storage(&dir);

    let exported = storage
        .export("alice", "pw", export_dir.path(), false)
        .expect("export");
    assert!(!std::fs::read_to_string(&exported)
        .expect("read export")
        .contains("private_key"));

    let duplicate = storage
        .import(&exported, None, "pw2")
        .expect_err("name already taken");
    assert_eq!(duplicate.kind(), ErrorKind::AlreadyExists);

    let imported = storage
        .import(&exported, Some("watcher"), "pw2")
        .expect("import under new name");
    assert!(imported.is_watch_only());

    let mut watcher = QuantumWallet::new(
        storage.clone(),
        keyring(false),
        "watcher",
        Network::Devnet,
    );
    assert!(watcher.unlock("pw2").expect("unlock runs"));
    assert!(watcher.info().expect("info").watch_only);

    let err = watcher.sign_message(b"hello").expect_err("watch-only");
    assert!(matches!(err, WalletError::WatchOnly(_)));

    let mut tx = watcher.transaction();
    tx.create_transfer(RECIPIENT, 1).expect("watch-only can build");
    let err = tx
        .sign(Some(Blockhash::new_from_array([1u8; 32])))
        .expect_err("watch-only cannot sign");
    assert!(matches!(err, TransactionError::WatchOnly));

    println!("✓ Watch-only import refuses to sign");
}

#[test]
fn test_private_export_imports_as_signing_wallet() {
    let dir = tempdir().expect("Failed to create temp dir");
    let other = tempdir().expect("Failed to create second store");
    let export_dir = tempdir().expect("Failed to create export dir");
    let alice = created(&dir, "alice", "pw", true);

    let exported = storage(&dir)
        .export("alice", "pw", export_dir.path(), true)
        .expect("export");
    let imported = storage(&other)
        .import(&exported, None, "new-pw")
        .expect("import");
    assert_eq!(imported.private_key, alice.record().expect("record").private_key);

    let mut moved = QuantumWallet::new(storage(&other), keyring(true), "alice", Network::Devnet);
    assert!(moved.unlock("new-pw").expect("unlock"));
    let signature = moved.sign_message(b"moved").expect("sign");
    assert!(alice.verify_signature(b"moved", &signature).expect("verify"));
}

#[test]
fn test_change_password_keeps_old_backups_readable() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut alice = created(&dir, "alice", "old", false);

    let err = alice
        .change_password("not-old", "new")
        .expect_err("old password checked");
    assert_eq!(err.kind(), ErrorKind::InvalidPassword);

    alice.change_password("old", "new").expect("change password");
    assert!(!alice.unlock("old").expect("unlock runs"));
    assert!(alice.unlock("new").expect("unlock runs"));

    // Backups are copied byte for byte, so they keep the previous password
    let err = alice
        .restore(&BackupSelector::Latest, "new")
        .expect_err("backup predates the change");
    assert_eq!(err.kind(), ErrorKind::InvalidPassword);
    alice
        .restore(&BackupSelector::Latest, "old")
        .expect("restore with old password");
    assert!(alice.unlock("old").expect("unlock runs"));
}

#[test]
fn test_delete_removes_wallet() {
    let dir = tempdir().expect("Failed to create temp dir");
    created(&dir, "alice", "pw", false);
    let storage = storage(&dir);

    assert!(storage.exists("alice"));
    storage.delete("alice").expect("delete");
    assert!(!storage.exists("alice"));
    assert_eq!(
        storage.delete("alice").expect_err("already gone").kind(),
        ErrorKind::NotFound
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_arbitrary_blobs_never_decrypt(blob in proptest::collection::vec(any::<u8>(), 0..128)) {
        let err = decrypt_blob(&blob, "pw", &KdfParams::testing()).unwrap_err();
        prop_assert!(matches!(err, StorageError::Corrupt(_) | StorageError::InvalidPassword));
    }
}
