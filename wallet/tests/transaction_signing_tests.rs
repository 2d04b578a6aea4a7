//! Transaction Signing Tests
//!
//! Builder state machine, quantum signature metadata, tamper evidence and
//! the async send flow against an in-memory node.

use async_trait::async_trait;
use dirac_core::{AlgorithmRegistry, HashAlgorithm, SecurityLevel, SignatureAlgorithm};
use dirac_wallet::history::{TransactionDirection, TransactionStatus};
use dirac_wallet::quantum_wallet::message::{system_transfer, SYSTEM_PROGRAM_ID};
use dirac_wallet::quantum_wallet::{
    quantum_to_chain, verify_bundle, Blockhash, ErrorKind, KdfParams, Keyring, Pubkey,
    QuantumWallet, TransactionError, TransactionState, WalletStorage,
};
use dirac_wallet::rpc::{
    send_transfer, ChainRpc, RpcError, TransactionConfirmation, ESTIMATED_FEE_LAMPORTS,
};
use dirac_wallet::Network;
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};

const RECIPIENT: &str = "4fYNw3dojWmQ4dXtSGE9epjRGy9pFSx62YypT7avPYvA";

fn dummy_blockhash() -> Blockhash {
    Blockhash::new_from_array([7u8; 32])
}

fn wallet(dir: &TempDir, name: &str, signature: SignatureAlgorithm, level: u8) -> QuantumWallet {
    let storage = WalletStorage::new(dir.path())
        .expect("Failed to open storage")
        .with_kdf_params(KdfParams::testing());
    let keyring = Keyring::new(
        AlgorithmRegistry::default(),
        signature,
        HashAlgorithm::Improved,
        SecurityLevel::new(level).expect("valid level"),
        false,
    )
    .expect("Failed to build keyring");
    let mut wallet = QuantumWallet::new(storage, keyring, name, Network::Devnet);
    wallet.create("pw", false).expect("Failed to create wallet");
    wallet
}

#[test]
fn test_sphincs_transfer_bundle() {
    let dir = tempdir().expect("Failed to create temp dir");
    let alice = wallet(&dir, "alice", SignatureAlgorithm::Sphincs, 3);

    let mut tx = alice.transaction();
    assert_eq!(tx.state(), TransactionState::Empty);
    tx.create_transfer(RECIPIENT, 100_000_000).expect("Failed to build transfer");
    assert_eq!(tx.state(), TransactionState::Built);
    tx.sign(Some(dummy_blockhash())).expect("Failed to sign");
    assert_eq!(tx.state(), TransactionState::Signed);

    let bundle = tx.prepare_for_broadcast().expect("Failed to bundle");
    assert!(!bundle.raw_payload.is_empty());
    assert!(bundle.raw_payload.ends_with(&[7u8; 32]));
    assert_eq!(bundle.metadata.signature_algorithm, SignatureAlgorithm::Sphincs);
    assert_eq!(bundle.metadata.security_level.value(), 3);
    assert_eq!(bundle.metadata.payload_hash.len(), 64);
    assert_eq!(bundle.blockhash, dummy_blockhash());

    let transfer = bundle.transfer.expect("transfer details");
    assert_eq!(transfer.lamports, 100_000_000);
    assert_eq!(transfer.recipient.to_string(), RECIPIENT);

    assert!(bundle.verify(alice.keyring()));

    let json: serde_json::Value = serde_json::to_value(&bundle).expect("serialize");
    assert_eq!(json["metadata"]["signature_algorithm"], "sphincs");
    assert_eq!(json["metadata"]["security_level"], 3);
    assert!(json["raw_payload"].is_string());

    println!(
        "✓ SPHINCS+ bundle: {} byte payload, {} byte signature",
        bundle.raw_payload.len(),
        bundle.metadata.signature.len()
    );
}

#[test]
fn test_any_payload_byte_flip_fails_verification() {
    let dir = tempdir().expect("Failed to create temp dir");
    let alice = wallet(&dir, "alice", SignatureAlgorithm::Dilithium, 2);

    let mut tx = alice.transaction();
    tx.create_transfer(RECIPIENT, 42).expect("build");
    tx.sign(Some(dummy_blockhash())).expect("sign");
    let bundle = tx.prepare_for_broadcast().expect("bundle");
    assert!(verify_bundle(&bundle.raw_payload, &bundle.metadata, alice.keyring()));

    for i in 0..bundle.raw_payload.len() {
        let mut tampered = bundle.raw_payload.clone();
        tampered[i] ^= 0x01;
        assert!(
            !verify_bundle(&tampered, &bundle.metadata, alice.keyring()),
            "flip at byte {} went unnoticed",
            i
        );
    }

    // Recomputing the hash does not help without a matching signature
    let mut tampered = bundle.raw_payload.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xff;
    let mut metadata = bundle.metadata.clone();
    metadata.payload_hash = hex::encode(
        alice
            .keyring()
            .hash(&tampered, 32)
            .expect("hash"),
    );
    assert!(!verify_bundle(&tampered, &metadata, alice.keyring()));

    let mut forged = bundle.metadata.clone();
    forged.signature[0] ^= 0x80;
    assert!(!verify_bundle(&bundle.raw_payload, &forged, alice.keyring()));

    println!("✓ {} single-byte tamperings rejected", bundle.raw_payload.len());
}

#[test]
fn test_builder_error_kinds() {
    let dir = tempdir().expect("Failed to create temp dir");
    let alice = wallet(&dir, "alice", SignatureAlgorithm::Dilithium, 2);

    let mut tx = alice.transaction();
    let err = tx.sign(Some(dummy_blockhash())).expect_err("empty");
    assert!(matches!(err, TransactionError::MissingInstructions));

    assert_eq!(
        tx.create_transfer(RECIPIENT, 0).err().map(|e| e.kind()),
        Some(ErrorKind::InvalidAmount)
    );
    assert_eq!(
        tx.create_transfer("not-an-address!", 5).err().map(|e| e.kind()),
        Some(ErrorKind::InvalidAddress)
    );

    tx.create_transfer(RECIPIENT, 5).expect("build");
    let err = tx.sign(None).expect_err("no blockhash");
    assert_eq!(err.kind(), ErrorKind::MissingBlockhash);

    let unsigned = alice.transaction();
    assert_eq!(
        unsigned.prepare_for_broadcast().expect_err("unsigned").kind(),
        ErrorKind::NotSigned
    );

    // Instruction added by hand, without a fee payer
    let mut manual = alice.transaction();
    let from = alice.chain_pubkey().expect("pubkey");
    let to: Pubkey = RECIPIENT.parse().expect("pubkey");
    manual.add_instruction(system_transfer(&from, &to, 9));
    assert_eq!(
        manual.build_message().expect_err("no fee payer").kind(),
        ErrorKind::MissingFeePayer
    );
    manual.set_fee_payer(from);
    let message = manual.build_message().expect("message");
    assert_eq!(message.account_keys[0], from);
    assert!(message.account_keys.contains(&SYSTEM_PROGRAM_ID));
}

#[test]
fn test_new_instruction_discards_signature() {
    let dir = tempdir().expect("Failed to create temp dir");
    let alice = wallet(&dir, "alice", SignatureAlgorithm::Dilithium, 2);

    let mut tx = alice.transaction();
    tx.create_transfer(RECIPIENT, 1).expect("build");
    tx.sign(Some(dummy_blockhash())).expect("sign");
    assert!(tx.signed_info().is_some());

    tx.create_transfer(RECIPIENT, 2).expect("second transfer");
    assert!(tx.signed_info().is_none());
    assert_eq!(tx.state(), TransactionState::Built);
}

#[test]
fn test_quantum_address_recipient() {
    let dir = tempdir().expect("Failed to create temp dir");
    let alice = wallet(&dir, "alice", SignatureAlgorithm::Dilithium, 2);
    let bob = wallet(&dir, "bob", SignatureAlgorithm::Dilithium, 2);

    let bob_quantum = bob.record().expect("record").quantum_address.clone();
    let expected = quantum_to_chain(&bob_quantum).expect("maps to chain");

    let mut tx = alice.transaction();
    tx.create_transfer(&bob_quantum, 10).expect("quantum recipient");
    tx.sign(Some(dummy_blockhash())).expect("sign");
    let bundle = tx.prepare_for_broadcast().expect("bundle");

    assert_eq!(
        bundle.transfer.expect("transfer").recipient.to_string(),
        expected
    );
}

#[test]
fn test_metadata_follows_key_algorithm_when_config_disagrees() {
    let dir = tempdir().expect("Failed to create temp dir");
    let alice = wallet(&dir, "alice", SignatureAlgorithm::Dilithium, 2);

    // Record whose algorithm config names a different scheme than its keys
    let mut edited = alice.record().expect("record").clone();
    edited.algorithm.signature = SignatureAlgorithm::Lamport;
    alice
        .storage()
        .save("alice", &edited, "pw")
        .expect("save edited record");

    let mut reopened = QuantumWallet::new(
        alice.storage().clone(),
        alice.keyring().clone(),
        "alice",
        Network::Devnet,
    );
    assert!(reopened.unlock("pw").expect("unlock runs"));
    assert_eq!(reopened.keyring().signature_algorithm(), SignatureAlgorithm::Lamport);

    let mut tx = reopened.transaction();
    tx.create_transfer(RECIPIENT, 77).expect("build");
    tx.sign(Some(dummy_blockhash())).expect("sign");
    let bundle = tx.prepare_for_broadcast().expect("bundle");

    assert_eq!(bundle.metadata.signature_algorithm, SignatureAlgorithm::Dilithium);
    assert_eq!(bundle.metadata.security_level.value(), 2);
    assert!(bundle.verify(reopened.keyring()));
}

struct MockNode {
    balance: u64,
    submitted: Mutex<Vec<Vec<u8>>>,
}

impl MockNode {
    fn with_balance(balance: u64) -> Self {
        Self {
            balance,
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn submissions(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().expect("mutex").clone()
    }
}

#[async_trait]
impl ChainRpc for MockNode {
    fn network(&self) -> Network {
        Network::Devnet
    }

    async fn get_balance(&self, _address: &Pubkey) -> Result<u64, RpcError> {
        Ok(self.balance)
    }

    async fn get_recent_blockhash(&self) -> Result<Blockhash, RpcError> {
        Ok(dummy_blockhash())
    }

    async fn submit_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        let mut submitted = self.submitted.lock().expect("mutex");
        submitted.push(raw.to_vec());
        Ok(format!("mock-tx-{}", submitted.len()))
    }

    async fn get_transaction_status(&self, _tx_id: &str) -> Result<TransactionConfirmation, RpcError> {
        Ok(TransactionConfirmation {
            confirmed: true,
            error: None,
        })
    }

    async fn request_airdrop(&self, _address: &Pubkey, _lamports: u64) -> Result<String, RpcError> {
        Ok("mock-airdrop".to_string())
    }
}

#[tokio::test]
async fn test_send_transfer_submits_and_records_history() {
    let dir = tempdir().expect("Failed to create temp dir");
    let alice = wallet(&dir, "alice", SignatureAlgorithm::Dilithium, 2);
    let node = MockNode::with_balance(1_000_000_000);

    let receipt = send_transfer(&alice, &node, RECIPIENT, 250_000)
        .await
        .expect("Failed to send");

    assert_eq!(receipt.tx_id, "mock-tx-1");
    assert_eq!(node.submissions(), vec![receipt.bundle.raw_payload.clone()]);
    assert!(receipt.bundle.verify(alice.keyring()));

    let history = alice.history().expect("history");
    let recorded = history
        .get_transaction("mock-tx-1")
        .expect("recorded transaction");
    assert_eq!(recorded.direction, TransactionDirection::Sent);
    assert_eq!(recorded.amount, 250_000);
    assert_eq!(recorded.counterparty, RECIPIENT);
    assert_eq!(recorded.status, TransactionStatus::Submitted);
    assert_eq!(
        recorded.payload_hash.as_deref(),
        Some(receipt.bundle.metadata.payload_hash.as_str())
    );
    assert_eq!(history.get_total_sent(), 250_000);

    println!("✓ Transfer submitted as {}", receipt.tx_id);
}

#[tokio::test]
async fn test_send_transfer_checks_balance_with_fee() {
    let dir = tempdir().expect("Failed to create temp dir");
    let alice = wallet(&dir, "alice", SignatureAlgorithm::Dilithium, 2);

    // Exactly the amount, nothing left for the fee
    let node = MockNode::with_balance(10_000);
    let err = send_transfer(&alice, &node, RECIPIENT, 10_000)
        .await
        .expect_err("fee not covered");
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert!(node.submissions().is_empty());
    assert!(alice.history().expect("history").get_all_transactions().is_empty());

    let node = MockNode::with_balance(10_000 + ESTIMATED_FEE_LAMPORTS);
    send_transfer(&alice, &node, RECIPIENT, 10_000)
        .await
        .expect("balance covers amount and fee");
}

#[tokio::test]
async fn test_send_transfer_requires_unlocked_wallet() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut alice = wallet(&dir, "alice", SignatureAlgorithm::Dilithium, 2);
    alice.lock();

    let node = MockNode::with_balance(1_000_000_000);
    let err = send_transfer(&alice, &node, RECIPIENT, 1)
        .await
        .expect_err("locked");
    assert_eq!(err.kind(), ErrorKind::WalletLocked);
    assert!(node.submissions().is_empty());
}
