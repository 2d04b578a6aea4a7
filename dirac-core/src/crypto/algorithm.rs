// Algorithm identifiers
// Closed set of signature, hash and KEM algorithms known to the registry

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::quantum::QuantumError;

/// Quantum-resistant signature schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    /// SPHINCS+ stateless hash-based signatures
    Sphincs,
    /// CRYSTALS-Dilithium lattice signatures
    Dilithium,
    /// Lamport one-time signatures over SHA-256
    Lamport,
}

impl SignatureAlgorithm {
    /// All signature algorithms in registration order
    pub const ALL: [SignatureAlgorithm; 3] = [
        SignatureAlgorithm::Sphincs,
        SignatureAlgorithm::Dilithium,
        SignatureAlgorithm::Lamport,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sphincs => "sphincs",
            SignatureAlgorithm::Dilithium => "dilithium",
            SignatureAlgorithm::Lamport => "lamport",
        }
    }

    /// Whether the parameter set depends on the security level
    pub fn is_parameterized(&self) -> bool {
        !matches!(self, SignatureAlgorithm::Lamport)
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = QuantumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sphincs" | "sphincs+" | "sphincsplus" => Ok(SignatureAlgorithm::Sphincs),
            "dilithium" | "ml-dsa" => Ok(SignatureAlgorithm::Dilithium),
            "lamport" => Ok(SignatureAlgorithm::Lamport),
            other => Err(QuantumError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Hash families used for address derivation and payload digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Standard,
    Improved,
    Grover,
    Shor,
    QuantumEnhanced,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 5] = [
        HashAlgorithm::Standard,
        HashAlgorithm::Improved,
        HashAlgorithm::Grover,
        HashAlgorithm::Shor,
        HashAlgorithm::QuantumEnhanced,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Standard => "standard",
            HashAlgorithm::Improved => "improved",
            HashAlgorithm::Grover => "grover",
            HashAlgorithm::Shor => "shor",
            HashAlgorithm::QuantumEnhanced => "quantum-enhanced",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = QuantumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Older wallet files carry the "dirac_" prefixed names
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "dirac_standard" => Ok(HashAlgorithm::Standard),
            "improved" | "dirac_improved" => Ok(HashAlgorithm::Improved),
            "grover" | "dirac_grover" => Ok(HashAlgorithm::Grover),
            "shor" | "dirac_shor" => Ok(HashAlgorithm::Shor),
            "quantum-enhanced" | "quantum_enhanced" => Ok(HashAlgorithm::QuantumEnhanced),
            other => Err(QuantumError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Key encapsulation mechanisms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KemAlgorithm {
    /// CRYSTALS-Kyber (ML-KEM)
    Kyber,
}

impl KemAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            KemAlgorithm::Kyber => "kyber",
        }
    }
}

impl fmt::Display for KemAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KemAlgorithm {
    type Err = QuantumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kyber" | "ml-kem" => Ok(KemAlgorithm::Kyber),
            other => Err(QuantumError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Any algorithm the registry can bind.
///
/// Serialized as its bare lower-case name; names are unique across families,
/// so the family is recovered on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmId {
    Signature(SignatureAlgorithm),
    Hash(HashAlgorithm),
    Kem(KemAlgorithm),
}

impl AlgorithmId {
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmId::Signature(a) => a.name(),
            AlgorithmId::Hash(a) => a.name(),
            AlgorithmId::Kem(a) => a.name(),
        }
    }

    pub fn as_signature(&self) -> Option<SignatureAlgorithm> {
        match self {
            AlgorithmId::Signature(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_kem(&self) -> Option<KemAlgorithm> {
        match self {
            AlgorithmId::Kem(a) => Some(*a),
            _ => None,
        }
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmId {
    type Err = QuantumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(a) = s.parse::<SignatureAlgorithm>() {
            return Ok(AlgorithmId::Signature(a));
        }
        if let Ok(a) = s.parse::<HashAlgorithm>() {
            return Ok(AlgorithmId::Hash(a));
        }
        if let Ok(a) = s.parse::<KemAlgorithm>() {
            return Ok(AlgorithmId::Kem(a));
        }
        Err(QuantumError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl From<SignatureAlgorithm> for AlgorithmId {
    fn from(a: SignatureAlgorithm) -> Self {
        AlgorithmId::Signature(a)
    }
}

impl From<HashAlgorithm> for AlgorithmId {
    fn from(a: HashAlgorithm) -> Self {
        AlgorithmId::Hash(a)
    }
}

impl From<KemAlgorithm> for AlgorithmId {
    fn from(a: KemAlgorithm) -> Self {
        AlgorithmId::Kem(a)
    }
}

impl Serialize for AlgorithmId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for AlgorithmId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Parameter tier a security level selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityTier {
    /// NIST level 1-2
    Low,
    /// NIST level 3
    Medium,
    /// NIST level 5
    High,
}

/// Security level in the range 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(level: u8) -> Result<Self, QuantumError> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(QuantumError::UnsupportedSecurityLevel(level))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn tier(&self) -> SecurityTier {
        match self.0 {
            1 | 2 => SecurityTier::Low,
            3 => SecurityTier::Medium,
            _ => SecurityTier::High,
        }
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self(3)
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = QuantumError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<SecurityLevel> for u8 {
    fn from(level: SecurityLevel) -> u8 {
        level.0
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
