// Address derivation
// Chain-native base58 addresses and base64 quantum addresses

use base64::{engine::general_purpose::STANDARD, Engine as _};
use dirac_core::{Hasher, QuantumError};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::error::{quantum_error_kind, ErrorKind};
use super::keyring::Keyring;
use super::keys::PublicKeyBundle;
use super::message::Pubkey;

/// Byte length of a chain address
pub const CHAIN_ADDRESS_BYTES: usize = 32;

/// Shortest decoded quantum address accepted by the validators
pub const MIN_QUANTUM_ADDRESS_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("Invalid address format: {0}")]
    InvalidFormat(String),

    #[error("Invalid address length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Public key of {0} bytes is shorter than a chain address")]
    PublicKeyTooShort(usize),

    #[error("Hash error: {0}")]
    Hash(#[from] QuantumError),
}

impl AddressError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AddressError::InvalidFormat(_) | AddressError::InvalidLength { .. } => {
                ErrorKind::InvalidAddress
            }
            AddressError::PublicKeyTooShort(_) => ErrorKind::InvalidConfiguration,
            AddressError::Hash(e) => quantum_error_kind(e),
        }
    }
}

/// Normalize a public key to exactly [`CHAIN_ADDRESS_BYTES`] and base58-encode it.
///
/// Longer keys are hashed down with `hasher`; 32-byte keys pass through.
pub fn derive_chain_address(public_key: &[u8], hasher: &dyn Hasher) -> Result<String, AddressError> {
    let normalized = match public_key.len() {
        n if n < CHAIN_ADDRESS_BYTES => return Err(AddressError::PublicKeyTooShort(n)),
        CHAIN_ADDRESS_BYTES => public_key.to_vec(),
        _ => hasher.hash(public_key, CHAIN_ADDRESS_BYTES)?,
    };
    Ok(bs58::encode(normalized).into_string())
}

/// Map a quantum address onto the chain's address space.
///
/// Quantum addresses are 64-byte digests; anything that is not already 32
/// bytes is reduced with SHA-256 so addresses exchanged by older wallets
/// keep resolving to the same account.
pub fn quantum_to_chain(quantum_address: &str) -> Result<String, AddressError> {
    let decoded = STANDARD
        .decode(quantum_address.trim())
        .map_err(|e| AddressError::InvalidFormat(format!("not base64: {}", e)))?;
    if decoded.is_empty() {
        return Err(AddressError::InvalidFormat("empty quantum address".to_string()));
    }

    let bytes = if decoded.len() == CHAIN_ADDRESS_BYTES {
        decoded
    } else {
        Sha256::digest(&decoded).to_vec()
    };
    Ok(bs58::encode(bytes).into_string())
}

/// Decode a chain address, requiring exactly 32 bytes
pub fn decode_chain_address(address: &str) -> Result<[u8; CHAIN_ADDRESS_BYTES], AddressError> {
    let decoded = bs58::decode(address.trim())
        .into_vec()
        .map_err(|e| AddressError::InvalidFormat(format!("not base58: {}", e)))?;
    let actual = decoded.len();
    decoded.try_into().map_err(|_| AddressError::InvalidLength {
        expected: CHAIN_ADDRESS_BYTES,
        actual,
    })
}

pub fn is_valid_chain_address(address: &str) -> bool {
    decode_chain_address(address).is_ok()
}

pub fn is_valid_quantum_address(address: &str) -> bool {
    STANDARD
        .decode(address.trim())
        .map(|bytes| bytes.len() >= MIN_QUANTUM_ADDRESS_BYTES)
        .unwrap_or(false)
}

/// Whether `chain_address` is the address `keyring` derives for `public`
pub fn verify_address_mapping(keyring: &Keyring, public: &PublicKeyBundle, chain_address: &str) -> bool {
    match keyring.derive_chain_address(public) {
        Ok(derived) => derived == chain_address,
        Err(_) => false,
    }
}

/// Resolve a recipient given as either a chain address or a quantum address.
///
/// A base58 string decoding to 32 bytes is taken as a chain address first;
/// the two alphabets overlap, so a quantum address is only tried when that fails.
pub fn resolve_recipient(recipient: &str) -> Result<Pubkey, AddressError> {
    if let Ok(bytes) = decode_chain_address(recipient) {
        return Ok(Pubkey::new_from_array(bytes));
    }
    if is_valid_quantum_address(recipient) {
        let chain = quantum_to_chain(recipient)?;
        return Ok(Pubkey::new_from_array(decode_chain_address(&chain)?));
    }
    Err(AddressError::InvalidFormat(format!(
        "'{}' is neither a chain address nor a quantum address",
        recipient
    )))
}
