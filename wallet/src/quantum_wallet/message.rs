//! Account-chain transaction wire model.
//!
//! Keys and blockhashes are 32 bytes shown in base58. A message is a header,
//! a compact-u16 prefixed list of account keys and a compact-u16 prefixed list
//! of compiled instructions that refer to those keys by index.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::error::ErrorKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Invalid base58 value: {0}")]
    InvalidEncoding(String),

    #[error("Expected 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Message references {0} accounts, more than an index byte can address")]
    TooManyAccounts(usize),

    #[error("Length {0} does not fit a compact-u16 prefix")]
    TooLong(usize),
}

impl MessageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MessageError::InvalidEncoding(_) | MessageError::InvalidLength(_) => {
                ErrorKind::InvalidAddress
            }
            MessageError::TooManyAccounts(_) | MessageError::TooLong(_) => ErrorKind::Serialization,
        }
    }
}

fn decode_32(text: &str) -> Result<[u8; 32], MessageError> {
    let bytes = bs58::decode(text.trim())
        .into_vec()
        .map_err(|e| MessageError::InvalidEncoding(e.to_string()))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| MessageError::InvalidLength(len))
}

macro_rules! base58_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const fn new_from_array(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn to_bytes(&self) -> [u8; 32] {
                self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = MessageError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_32(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

base58_newtype!(Pubkey);
base58_newtype!(Blockhash);

/// The system program owns native transfers
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);

/// Instruction index of a system transfer
const SYSTEM_TRANSFER_TAG: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Native transfer of `lamports` from `from` to `to`
pub fn system_transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_TAG.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data,
    }
}

/// `(from, to, lamports)` when `instruction` is a system transfer
pub fn parse_system_transfer(instruction: &Instruction) -> Option<(Pubkey, Pubkey, u64)> {
    if instruction.program_id != SYSTEM_PROGRAM_ID || instruction.data.len() < 12 {
        return None;
    }
    let tag = u32::from_le_bytes(instruction.data[0..4].try_into().ok()?);
    if tag != SYSTEM_TRANSFER_TAG {
        return None;
    }
    let lamports = u64::from_le_bytes(instruction.data[4..12].try_into().ok()?);
    let from = instruction.accounts.first()?.pubkey;
    let to = instruction.accounts.get(1)?.pubkey;
    Some((from, to, lamports))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Clone, Copy)]
struct KeyFlags {
    signer: bool,
    writable: bool,
}

impl Message {
    /// Order and deduplicate every referenced key, then compile instructions
    /// to index form. The fee payer is always the first, writable signer.
    pub fn compile(instructions: &[Instruction], fee_payer: &Pubkey) -> Result<Self, MessageError> {
        let mut keys: Vec<(Pubkey, KeyFlags)> = vec![(
            *fee_payer,
            KeyFlags {
                signer: true,
                writable: true,
            },
        )];

        let mut touch = |pubkey: Pubkey, signer: bool, writable: bool| {
            match keys.iter_mut().find(|(k, _)| *k == pubkey) {
                Some((_, flags)) => {
                    flags.signer |= signer;
                    flags.writable |= writable;
                }
                None => keys.push((pubkey, KeyFlags { signer, writable })),
            }
        };
        for instruction in instructions {
            for meta in &instruction.accounts {
                touch(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            touch(instruction.program_id, false, false);
        }

        // Stable sort keeps first-seen order inside each class; the fee payer
        // stays first because it is a writable signer seen before all others.
        let class = |flags: &KeyFlags| match (flags.signer, flags.writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };
        keys.sort_by_key(|(_, flags)| class(flags));

        if keys.len() > u8::MAX as usize + 1 {
            return Err(MessageError::TooManyAccounts(keys.len()));
        }

        let count = |wanted: usize| keys.iter().filter(|(_, f)| class(f) == wanted).count();
        let header_byte =
            |n: usize| u8::try_from(n).map_err(|_| MessageError::TooManyAccounts(keys.len()));
        let header = MessageHeader {
            num_required_signatures: header_byte(count(0) + count(1))?,
            num_readonly_signed_accounts: header_byte(count(1))?,
            num_readonly_unsigned_accounts: header_byte(count(3))?,
        };

        let account_keys: Vec<Pubkey> = keys.into_iter().map(|(k, _)| k).collect();
        let index_of = |pubkey: &Pubkey| -> u8 {
            // Every key was inserted above and the length check bounds the index
            account_keys.iter().position(|k| k == pubkey).unwrap_or(0) as u8
        };

        let compiled = instructions
            .iter()
            .map(|instruction| CompiledInstruction {
                program_id_index: index_of(&instruction.program_id),
                accounts: instruction.accounts.iter().map(|m| index_of(&m.pubkey)).collect(),
                data: instruction.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            instructions: compiled,
        })
    }

    /// Canonical wire bytes
    pub fn serialize(&self) -> Result<Vec<u8>, MessageError> {
        let mut out = vec![
            self.header.num_required_signatures,
            self.header.num_readonly_signed_accounts,
            self.header.num_readonly_unsigned_accounts,
        ];

        encode_compact_u16(self.account_keys.len(), &mut out)?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_ref());
        }

        encode_compact_u16(self.instructions.len(), &mut out)?;
        for instruction in &self.instructions {
            out.push(instruction.program_id_index);
            encode_compact_u16(instruction.accounts.len(), &mut out)?;
            out.extend_from_slice(&instruction.accounts);
            encode_compact_u16(instruction.data.len(), &mut out)?;
            out.extend_from_slice(&instruction.data);
        }
        Ok(out)
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.account_keys.first()
    }
}

/// Little-endian base-128 varint capped at three bytes
pub fn encode_compact_u16(len: usize, out: &mut Vec<u8>) -> Result<(), MessageError> {
    let mut rem = u16::try_from(len).map_err(|_| MessageError::TooLong(len))?;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            return Ok(());
        }
        byte |= 0x80;
        out.push(byte);
    }
}
