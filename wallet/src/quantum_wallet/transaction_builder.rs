// Transaction Builder for Quantum-Signed Transfers
// Empty -> Built -> Signed, then consumed into a broadcast bundle

use chrono::{DateTime, Utc};
use dirac_core::{HashAlgorithm, SecurityLevel, SignatureAlgorithm};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info};

use super::address::{resolve_recipient, AddressError};
use super::error::{ErrorKind, WalletError};
use super::keyring::{Keyring, KeyringError};
use super::keys::{base64_bytes, KeyMaterial};
use super::lifecycle::QuantumWallet;
use super::message::{
    parse_system_transfer, system_transfer, Blockhash, Instruction, Message, MessageError, Pubkey,
};

/// Size of the digest that is actually signed
pub const PAYLOAD_DIGEST_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("No instructions")]
    MissingInstructions,

    #[error("Fee payer not set")]
    MissingFeePayer,

    #[error("Recent blockhash required for signing")]
    MissingBlockhash,

    #[error("Wallet is locked")]
    WalletLocked,

    #[error("Wallet is watch-only and cannot sign")]
    WatchOnly,

    #[error("Invalid amount: {0} (must be greater than zero)")]
    InvalidAmount(u64),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Transaction has not been signed")]
    NotSigned,

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Keyring(#[from] KeyringError),
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::MissingInstructions => ErrorKind::MissingInstructions,
            TransactionError::MissingFeePayer => ErrorKind::MissingFeePayer,
            TransactionError::MissingBlockhash => ErrorKind::MissingBlockhash,
            TransactionError::WalletLocked | TransactionError::WatchOnly => ErrorKind::WalletLocked,
            TransactionError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            TransactionError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            TransactionError::NotSigned => ErrorKind::NotSigned,
            TransactionError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            TransactionError::Message(e) => e.kind(),
            TransactionError::Keyring(e) => e.kind(),
        }
    }
}

impl From<AddressError> for TransactionError {
    fn from(e: AddressError) -> Self {
        TransactionError::InvalidAddress(e.to_string())
    }
}

/// Builder progress. Bundling consumes the builder, so it has no state here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Empty,
    Built,
    Signed,
}

/// Recipient and amount of the first native transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDetails {
    pub recipient: Pubkey,
    pub lamports: u64,
}

/// Signed intermediate produced by [`QuantumTransaction::sign`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    #[serde(with = "base64_bytes")]
    pub raw_payload: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub security_level: SecurityLevel,
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    /// Hex of the signed digest
    pub payload_hash: String,
    pub hash_algorithm: HashAlgorithm,
    pub blockhash: Blockhash,
    pub fee_payer: Pubkey,
    pub transfer: Option<TransferDetails>,
    pub timestamp: DateTime<Utc>,
}

/// Everything an independent verifier needs besides the payload itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMetadata {
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub security_level: SecurityLevel,
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    pub payload_hash: String,
    pub hash_algorithm: HashAlgorithm,
}

/// Broadcast-ready transaction.
///
/// The chain cannot check a post-quantum signature, so `metadata` travels
/// beside `raw_payload` for verifiers that run [`verify_bundle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastBundle {
    #[serde(with = "base64_bytes")]
    pub raw_payload: Vec<u8>,
    pub metadata: SignatureMetadata,
    pub blockhash: Blockhash,
    pub transfer: Option<TransferDetails>,
    pub timestamp: DateTime<Utc>,
}

impl BroadcastBundle {
    pub fn verify(&self, keyring: &Keyring) -> bool {
        verify_bundle(&self.raw_payload, &self.metadata, keyring)
    }
}

/// Quantum-signed transfer under construction for one wallet
pub struct QuantumTransaction<'w> {
    wallet: &'w QuantumWallet,
    instructions: Vec<Instruction>,
    fee_payer: Option<Pubkey>,
    signed: Option<TransactionInfo>,
}

impl<'w> QuantumTransaction<'w> {
    pub fn new(wallet: &'w QuantumWallet) -> Self {
        Self {
            wallet,
            instructions: Vec::new(),
            fee_payer: None,
            signed: None,
        }
    }

    pub fn state(&self) -> TransactionState {
        if self.signed.is_some() {
            TransactionState::Signed
        } else if self.instructions.is_empty() {
            TransactionState::Empty
        } else {
            TransactionState::Built
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.fee_payer.as_ref()
    }

    /// Append a native transfer from this wallet and make it the fee payer.
    ///
    /// `recipient` may be a chain address or a quantum address.
    pub fn create_transfer(
        &mut self,
        recipient: &str,
        amount: u64,
    ) -> Result<&mut Self, TransactionError> {
        if amount == 0 {
            return Err(TransactionError::InvalidAmount(amount));
        }
        let to = resolve_recipient(recipient)?;
        let from = self
            .wallet
            .chain_pubkey()
            .ok_or(TransactionError::WalletLocked)?;

        debug!(%from, %to, amount, "Adding transfer instruction");
        self.add_instruction(system_transfer(&from, &to, amount));
        if self.fee_payer.is_none() {
            self.fee_payer = Some(from);
        }
        Ok(self)
    }

    /// Append an arbitrary instruction. Any existing signature is discarded.
    pub fn add_instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self.signed = None;
        self
    }

    pub fn set_fee_payer(&mut self, fee_payer: Pubkey) -> &mut Self {
        self.fee_payer = Some(fee_payer);
        self.signed = None;
        self
    }

    pub fn build_message(&self) -> Result<Message, TransactionError> {
        if self.instructions.is_empty() {
            return Err(TransactionError::MissingInstructions);
        }
        let fee_payer = self.fee_payer.ok_or(TransactionError::MissingFeePayer)?;
        Ok(Message::compile(&self.instructions, &fee_payer)?)
    }

    /// Bind the message to `recent_blockhash`, hash it and sign the digest
    pub fn sign(
        &mut self,
        recent_blockhash: Option<Blockhash>,
    ) -> Result<&TransactionInfo, TransactionError> {
        let wallet = self.wallet;
        let message = self.build_message()?;
        let blockhash = recent_blockhash.ok_or(TransactionError::MissingBlockhash)?;
        let private = wallet.signing_keys().map_err(|e| match e {
            WalletError::WatchOnly(_) => TransactionError::WatchOnly,
            _ => TransactionError::WalletLocked,
        })?;
        let public = wallet.public_key().ok_or(TransactionError::WalletLocked)?;
        let keyring = wallet.keyring();
        let signature_algorithm = public.primary.algorithm.as_signature().ok_or_else(|| {
            KeyringError::UnsupportedAlgorithm(public.primary.algorithm.to_string())
        })?;

        let mut raw_payload = message.serialize()?;
        raw_payload.extend_from_slice(blockhash.as_ref());

        let digest = keyring.hash(&raw_payload, PAYLOAD_DIGEST_BYTES)?;
        let signature = keyring.sign_transaction(&digest, private)?;

        let transfer = self
            .instructions
            .iter()
            .find_map(parse_system_transfer)
            .map(|(_, recipient, lamports)| TransferDetails {
                recipient,
                lamports,
            });

        let info = TransactionInfo {
            raw_payload,
            signature,
            signature_algorithm,
            security_level: public.primary.security_level,
            public_key: public.primary.key.clone(),
            payload_hash: hex::encode(&digest),
            hash_algorithm: keyring.hash_algorithm(),
            blockhash,
            fee_payer: message.account_keys[0],
            transfer,
            timestamp: Utc::now(),
        };

        info!(
            payload_hash = %info.payload_hash,
            algorithm = %info.signature_algorithm,
            signature_len = info.signature.len(),
            "Signed transaction"
        );

        Ok(self.signed.insert(info))
    }

    pub fn signed_info(&self) -> Option<&TransactionInfo> {
        self.signed.as_ref()
    }

    /// Package the signed payload with its signature metadata
    pub fn prepare_for_broadcast(self) -> Result<BroadcastBundle, TransactionError> {
        let info = self.signed.ok_or(TransactionError::NotSigned)?;
        Ok(BroadcastBundle {
            metadata: SignatureMetadata {
                signature: info.signature,
                signature_algorithm: info.signature_algorithm,
                security_level: info.security_level,
                public_key: info.public_key,
                payload_hash: info.payload_hash,
                hash_algorithm: info.hash_algorithm,
            },
            raw_payload: info.raw_payload,
            blockhash: info.blockhash,
            transfer: info.transfer,
            timestamp: info.timestamp,
        })
    }
}

/// Recompute the payload digest and check the quantum signature over it.
///
/// Returns false for any mismatch or malformed field.
pub fn verify_bundle(raw_payload: &[u8], metadata: &SignatureMetadata, keyring: &Keyring) -> bool {
    let digest = match keyring.hash_with(metadata.hash_algorithm, raw_payload, PAYLOAD_DIGEST_BYTES) {
        Ok(digest) => digest,
        Err(_) => return false,
    };
    let expected = match hex::decode(&metadata.payload_hash) {
        Ok(expected) => expected,
        Err(_) => return false,
    };
    if expected.len() != digest.len() || !bool::from(digest.as_slice().ct_eq(expected.as_slice())) {
        debug!("Payload hash mismatch");
        return false;
    }

    let key = KeyMaterial::new(
        metadata.signature_algorithm,
        metadata.security_level,
        metadata.public_key.clone(),
    );
    keyring.verify_with(&digest, &metadata.signature, &key)
}
