// Quantum Keyring
// Owns the algorithm choice for one wallet and is the only caller of the primitives

use base64::{engine::general_purpose::STANDARD, Engine as _};
use dirac_core::{
    AlgorithmRegistry, HashAlgorithm, KemAlgorithm, KemError, QuantumError, SecurityLevel,
    SignatureAlgorithm, SignatureScheme,
};
use hkdf::Hkdf;
use sha2::Sha256;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use thiserror::Error;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::address::{self, AddressError};
use super::error::{kem_error_kind, quantum_error_kind, ErrorKind};
use super::keys::{KeyMaterial, PrivateKeyBundle, PublicKeyBundle};
use super::record::AlgorithmConfig;

/// Digest length behind a quantum address
pub const QUANTUM_ADDRESS_DIGEST: usize = 64;

const STREAM_INFO: &[u8] = b"dirac.keyring.stream.v1";

#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Quantum(#[from] QuantumError),

    #[error("KEM error: {0}")]
    Kem(#[from] KemError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl KeyringError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyringError::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            KeyringError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            KeyringError::Quantum(e) => quantum_error_kind(e),
            KeyringError::Kem(e) => kem_error_kind(e),
            KeyringError::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Signature, hash and KEM choices for one wallet, fixed for its lifetime
#[derive(Debug, Clone)]
pub struct Keyring {
    registry: AlgorithmRegistry,
    config: AlgorithmConfig,
}

impl Keyring {
    pub fn new(
        registry: AlgorithmRegistry,
        signature: SignatureAlgorithm,
        hash: HashAlgorithm,
        security_level: SecurityLevel,
        want_backups: bool,
    ) -> Result<Self, KeyringError> {
        Self::from_config(
            registry,
            AlgorithmConfig {
                signature,
                hash,
                kem: KemAlgorithm::Kyber,
                security_level,
                backups: want_backups,
            },
        )
    }

    /// Build from textual algorithm names, rejecting anything the registry cannot bind
    pub fn from_names(
        registry: AlgorithmRegistry,
        signature: &str,
        hash: &str,
        security_level: u8,
        want_backups: bool,
    ) -> Result<Self, KeyringError> {
        let invalid = |e: QuantumError| KeyringError::InvalidConfiguration(e.to_string());

        let signature = registry
            .resolve(signature)
            .map_err(invalid)?
            .as_signature()
            .ok_or_else(|| {
                KeyringError::InvalidConfiguration(format!(
                    "'{}' is not a signature algorithm",
                    signature
                ))
            })?;
        let hash: HashAlgorithm = hash.parse().map_err(invalid)?;
        let security_level = SecurityLevel::new(security_level).map_err(invalid)?;

        Self::new(registry, signature, hash, security_level, want_backups)
    }

    pub fn from_config(
        registry: AlgorithmRegistry,
        config: AlgorithmConfig,
    ) -> Result<Self, KeyringError> {
        if !registry.is_registered(config.signature.into()) {
            return Err(KeyringError::InvalidConfiguration(format!(
                "signature algorithm '{}' is not registered",
                config.signature
            )));
        }
        Ok(Self { registry, config })
    }

    /// Same registry, different algorithm choice
    pub fn reconfigure(&self, config: AlgorithmConfig) -> Result<Self, KeyringError> {
        Self::from_config(self.registry.clone(), config)
    }

    pub fn config(&self) -> AlgorithmConfig {
        self.config
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.config.signature
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.config.hash
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.config.security_level
    }

    /// Algorithms that receive a backup keypair at generation time
    pub fn backup_algorithms(&self) -> Vec<SignatureAlgorithm> {
        if !self.config.backups {
            return Vec::new();
        }
        self.registry
            .signature_algorithms()
            .into_iter()
            .filter(|a| *a != self.config.signature)
            .collect()
    }

    /// Fresh primary, KEM and backup keypairs
    pub fn generate_keypair(&self) -> Result<(PrivateKeyBundle, PublicKeyBundle), KeyringError> {
        let level = self.config.security_level;

        let (primary_private, primary_public) = self.generate_signing_pair(self.config.signature)?;

        let kem = self.registry.kem(self.config.kem, level);
        let raw = kem.generate_keypair()?;
        let encryption_private = KeyMaterial::new(self.config.kem, level, raw.secret_key.to_vec());
        let encryption_public = KeyMaterial::new(self.config.kem, level, raw.public_key);

        let mut private_backups = Vec::new();
        let mut public_backups = Vec::new();
        for algorithm in self.backup_algorithms() {
            let (private, public) = self.generate_signing_pair(algorithm)?;
            private_backups.push(private);
            public_backups.push(public);
        }

        info!(
            algorithm = %self.config.signature,
            security_level = %level,
            backups = public_backups.len(),
            "Generated wallet key material"
        );

        Ok((
            PrivateKeyBundle {
                primary: primary_private,
                encryption: encryption_private,
                backups: private_backups,
            },
            PublicKeyBundle {
                primary: primary_public,
                encryption: encryption_public,
                backups: public_backups,
            },
        ))
    }

    fn generate_signing_pair(
        &self,
        algorithm: SignatureAlgorithm,
    ) -> Result<(KeyMaterial, KeyMaterial), KeyringError> {
        let level = self.config.security_level;
        let scheme = self.registry.signature(algorithm, level)?;
        let raw = scheme.generate_keypair()?;
        Ok((
            KeyMaterial::new(algorithm, level, raw.secret_key.to_vec()),
            KeyMaterial::new(algorithm, level, raw.public_key),
        ))
    }

    pub fn hash(&self, data: &[u8], digest_size: usize) -> Result<Vec<u8>, KeyringError> {
        self.hash_with(self.config.hash, data, digest_size)
    }

    pub fn hash_with(
        &self,
        algorithm: HashAlgorithm,
        data: &[u8],
        digest_size: usize,
    ) -> Result<Vec<u8>, KeyringError> {
        Ok(self.registry.hasher(algorithm).hash(data, digest_size)?)
    }

    /// Quantum address: base64 of the configured hash over the canonical public bundle
    pub fn derive_address(&self, public: &PublicKeyBundle) -> Result<String, KeyringError> {
        let canonical = public
            .canonical_bytes()
            .map_err(|e| KeyringError::Serialization(e.to_string()))?;
        let digest = self.hash(&canonical, QUANTUM_ADDRESS_DIGEST)?;
        Ok(STANDARD.encode(digest))
    }

    /// Chain-native address of the primary public key
    pub fn derive_chain_address(&self, public: &PublicKeyBundle) -> Result<String, AddressError> {
        let hasher = self.registry.hasher(self.config.hash);
        address::derive_chain_address(&public.primary.key, hasher.as_ref())
    }

    /// Sign with the primary key, under the algorithm recorded on that key
    pub fn sign_transaction(
        &self,
        payload: &[u8],
        private: &PrivateKeyBundle,
    ) -> Result<Vec<u8>, KeyringError> {
        self.sign_with(payload, &private.primary)
    }

    pub fn verify_transaction(
        &self,
        payload: &[u8],
        signature: &[u8],
        public: &PublicKeyBundle,
    ) -> bool {
        self.verify_with(payload, signature, &public.primary)
    }

    /// Sign with any signing key, including backups and imported keys
    pub fn sign_with(&self, payload: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, KeyringError> {
        let scheme = self.signer_for(key)?;
        if scheme.algorithm() == SignatureAlgorithm::Lamport {
            warn!("Signing with a Lamport one-time key; each additional signature weakens it");
        }
        Ok(scheme.sign(payload, &key.key)?)
    }

    pub fn verify_with(&self, payload: &[u8], signature: &[u8], key: &KeyMaterial) -> bool {
        match self.signer_for(key) {
            Ok(scheme) => scheme.verify(payload, signature, &key.key),
            Err(e) => {
                debug!(error = %e, "Verification key could not be resolved");
                false
            }
        }
    }

    fn signer_for(&self, key: &KeyMaterial) -> Result<Box<dyn SignatureScheme>, KeyringError> {
        let algorithm = key.algorithm.as_signature().ok_or_else(|| {
            KeyringError::UnsupportedAlgorithm(format!(
                "'{}' is not a signature algorithm",
                key.algorithm
            ))
        })?;
        self.registry
            .signature(algorithm, key.security_level)
            .map_err(|e| match e {
                QuantumError::UnsupportedAlgorithm(name) => KeyringError::UnsupportedAlgorithm(name),
                other => KeyringError::Quantum(other),
            })
    }

    /// Hybrid encryption to the bundle's KEM key. Returns `(ciphertext, kem_ciphertext)`.
    pub fn encrypt(
        &self,
        data: &[u8],
        public: &PublicKeyBundle,
    ) -> Result<(Vec<u8>, Vec<u8>), KeyringError> {
        let key = &public.encryption;
        let kem = self.kem_for(key)?;
        // A fresh encapsulation per call gives every plaintext its own keystream
        let (kem_ciphertext, shared) = kem.encapsulate(&key.key)?;
        let ciphertext = apply_keystream(&shared, &kem_ciphertext, data)?;
        Ok((ciphertext, kem_ciphertext))
    }

    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        kem_ciphertext: &[u8],
        private: &PrivateKeyBundle,
    ) -> Result<Vec<u8>, KeyringError> {
        let key = &private.encryption;
        let kem = self.kem_for(key)?;
        let shared = kem.decapsulate(kem_ciphertext, &key.key)?;
        apply_keystream(&shared, kem_ciphertext, ciphertext)
    }

    fn kem_for(&self, key: &KeyMaterial) -> Result<Box<dyn dirac_core::KemScheme>, KeyringError> {
        let algorithm = key.algorithm.as_kem().ok_or_else(|| {
            KeyringError::UnsupportedAlgorithm(format!("'{}' is not a KEM algorithm", key.algorithm))
        })?;
        Ok(self.registry.kem(algorithm, key.security_level))
    }
}

/// XOR `data` with a SHAKE256 stream seeded by HKDF over the shared secret
fn apply_keystream(
    shared: &[u8],
    kem_ciphertext: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, KeyringError> {
    let hk = Hkdf::<Sha256>::new(Some(kem_ciphertext), shared);
    let mut seed = Zeroizing::new([0u8; 32]);
    hk.expand(STREAM_INFO, &mut seed[..])
        .map_err(|e| QuantumError::CryptoOperationFailed(e.to_string()))?;

    let mut xof = Shake256::default();
    xof.update(&seed[..]);
    let mut stream = Zeroizing::new(vec![0u8; data.len()]);
    xof.finalize_xof().read(&mut stream);

    Ok(data.iter().zip(stream.iter()).map(|(d, k)| d ^ k).collect())
}
