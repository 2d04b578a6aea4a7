//! Dirac wallet: quantum-resistant keyring, transaction signing and encrypted storage.
//!
//! [`quantum_wallet`] holds the core: key bundles, the [`Keyring`], address
//! derivation, the transfer builder and password-encrypted storage behind the
//! [`QuantumWallet`] lifecycle. [`rpc`] is the only module that talks to a chain node.
//!
//! [`Keyring`]: quantum_wallet::Keyring
//! [`QuantumWallet`]: quantum_wallet::QuantumWallet

pub mod cli;
pub mod config;
pub mod history;
pub mod network;
pub mod quantum_wallet;
pub mod rpc;

pub use network::Network;
pub use quantum_wallet::{ErrorKind, QuantumWallet, WalletError};
