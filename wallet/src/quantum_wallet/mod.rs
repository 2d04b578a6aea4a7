// Quantum-Resistant Wallet Implementation
// Keyring, quantum-signed transfers and password-encrypted storage

pub mod address;
pub mod error;
pub mod keyring;
pub mod keys;
pub mod lifecycle;
pub mod message;
pub mod record;
pub mod storage;
pub mod transaction_builder;

// Re-exports
pub use address::{
    derive_chain_address, is_valid_chain_address, is_valid_quantum_address, quantum_to_chain,
    resolve_recipient, verify_address_mapping, AddressError,
};
pub use error::{ErrorKind, WalletError};
pub use keyring::{Keyring, KeyringError};
pub use keys::{KeyMaterial, PrivateKeyBundle, PublicKeyBundle};
pub use lifecycle::{CreatedWallet, QuantumWallet, WalletInfo};
pub use message::{AccountMeta, Blockhash, Instruction, Message, MessageError, Pubkey};
pub use record::{AlgorithmConfig, WalletMetadata, WalletRecord, WalletSummary};
pub use storage::{BackupInfo, BackupSelector, KdfParams, StorageError, WalletStorage};
pub use transaction_builder::{
    verify_bundle, BroadcastBundle, QuantumTransaction, SignatureMetadata, TransactionError,
    TransactionInfo, TransactionState,
};
