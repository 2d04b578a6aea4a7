// Error taxonomy shared by every wallet component

use dirac_core::{KemError, QuantumError};
use std::fmt;
use thiserror::Error;

use super::address::AddressError;
use super::keyring::KeyringError;
use super::storage::StorageError;
use super::transaction_builder::TransactionError;
use crate::rpc::RpcError;

/// Closed set of failure kinds a caller can branch on without parsing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedAlgorithm,
    InvalidConfiguration,
    WalletLocked,
    InvalidPassword,
    NotFound,
    AlreadyExists,
    InsufficientFunds,
    MissingInstructions,
    MissingFeePayer,
    MissingBlockhash,
    InvalidAmount,
    InvalidAddress,
    NotSigned,
    AirdropUnavailable,
    StorageBusy,
    Io,
    Serialization,
    Crypto,
    Network,
}

impl ErrorKind {
    /// Process exit code used by the command-line front end
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::InvalidPassword => 2,
            ErrorKind::NotFound => 3,
            ErrorKind::AlreadyExists => 4,
            ErrorKind::WalletLocked => 5,
            ErrorKind::InsufficientFunds => 6,
            ErrorKind::UnsupportedAlgorithm | ErrorKind::InvalidConfiguration => 7,
            ErrorKind::InvalidAmount | ErrorKind::InvalidAddress => 8,
            ErrorKind::MissingInstructions
            | ErrorKind::MissingFeePayer
            | ErrorKind::MissingBlockhash
            | ErrorKind::NotSigned => 9,
            ErrorKind::StorageBusy => 10,
            ErrorKind::Network | ErrorKind::AirdropUnavailable => 11,
            ErrorKind::Io | ErrorKind::Serialization | ErrorKind::Crypto => 1,
        }
    }

    /// Short actionable hint for the user
    pub fn guidance(&self) -> &'static str {
        match self {
            ErrorKind::InvalidPassword => "the password is wrong; the wallet stays locked",
            ErrorKind::NotFound => "no wallet or backup with that name; run `list` or `backups`",
            ErrorKind::AlreadyExists => "a wallet with that name exists; pass --overwrite to replace it",
            ErrorKind::WalletLocked => "unlock the wallet first (watch-only wallets cannot sign)",
            ErrorKind::InsufficientFunds => "the balance does not cover this transfer",
            ErrorKind::UnsupportedAlgorithm => "choose one of the registered algorithms",
            ErrorKind::InvalidConfiguration => "check the configuration file and DIRAC_* variables",
            ErrorKind::InvalidAmount => "amounts must be greater than zero",
            ErrorKind::InvalidAddress => "recipient must be a chain address or a quantum address",
            ErrorKind::MissingInstructions
            | ErrorKind::MissingFeePayer
            | ErrorKind::MissingBlockhash
            | ErrorKind::NotSigned => "the transaction is incomplete",
            ErrorKind::StorageBusy => "another process is writing this wallet; retry shortly",
            ErrorKind::AirdropUnavailable => "airdrops are only available on test networks",
            ErrorKind::Network => "the RPC endpoints could not be reached",
            ErrorKind::Io => "a filesystem operation failed",
            ErrorKind::Serialization => "a wallet file is corrupt or in an unknown format",
            ErrorKind::Crypto => "a cryptographic operation failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Kind of a primitive-binding error
pub fn quantum_error_kind(error: &QuantumError) -> ErrorKind {
    match error {
        QuantumError::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
        QuantumError::UnsupportedSecurityLevel(_) | QuantumError::InvalidDigestSize(_) => {
            ErrorKind::InvalidConfiguration
        }
        _ => ErrorKind::Crypto,
    }
}

pub fn kem_error_kind(_error: &KemError) -> ErrorKind {
    ErrorKind::Crypto
}

/// Errors surfaced by the wallet façade and the send flow
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Wallet is locked")]
    WalletLocked,

    #[error("Wallet '{0}' is watch-only and holds no private keys")]
    WatchOnly(String),

    #[error("Wallet '{0}' has not been created or unlocked in this session")]
    NotLoaded(String),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error(transparent)]
    Keyring(#[from] KeyringError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::WalletLocked | WalletError::WatchOnly(_) => ErrorKind::WalletLocked,
            WalletError::NotLoaded(_) => ErrorKind::NotFound,
            WalletError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            WalletError::Keyring(e) => e.kind(),
            WalletError::Address(e) => e.kind(),
            WalletError::Storage(e) => e.kind(),
            WalletError::Transaction(e) => e.kind(),
            WalletError::Rpc(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_password_and_missing_wallet_are_distinct() {
        let wrong = WalletError::Storage(StorageError::InvalidPassword);
        let missing = WalletError::Storage(StorageError::NotFound("alice".to_string()));
        assert_eq!(wrong.kind(), ErrorKind::InvalidPassword);
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_ne!(wrong.kind().exit_code(), missing.kind().exit_code());
    }

    #[test]
    fn test_core_errors_map_to_configuration_kinds() {
        assert_eq!(
            quantum_error_kind(&QuantumError::UnsupportedSecurityLevel(9)),
            ErrorKind::InvalidConfiguration
        );
        assert_eq!(
            quantum_error_kind(&QuantumError::UnsupportedAlgorithm("rsa".into())),
            ErrorKind::UnsupportedAlgorithm
        );
    }
}
