use ::config::{Config, Environment, File};
use dirac_core::{AlgorithmRegistry, HashAlgorithm, SecurityLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::network::Network;
use crate::quantum_wallet::error::ErrorKind;
use crate::quantum_wallet::keyring::{Keyring, KeyringError};
use crate::rpc::RetryPolicy;

/// Environment variable prefix, e.g. `DIRAC_NETWORK=devnet`
pub const ENV_PREFIX: &str = "DIRAC";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::InvalidConfiguration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Active network (mainnet, testnet, devnet, local)
    pub network: String,

    /// Directory holding wallet files; `~` is expanded
    pub wallet_dir: String,

    pub signature_algorithm: String,
    pub hash_algorithm: String,
    pub security_level: u8,

    /// Generate a backup keypair under every other registered algorithm
    pub backup_algorithms: bool,

    /// RPC endpoints per network name, tried in order
    pub networks: BTreeMap<String, Vec<String>>,

    pub retry: RetryConfig,
}

impl Default for WalletConfig {
    fn default() -> Self {
        let networks = Network::ALL
            .iter()
            .map(|n| (n.name().to_string(), vec![n.default_endpoint().to_string()]))
            .collect();
        Self {
            network: Network::default().name().to_string(),
            wallet_dir: "~/.dirac-wallet/wallets".to_string(),
            signature_algorithm: "dilithium".to_string(),
            hash_algorithm: "improved".to_string(),
            security_level: SecurityLevel::default().value(),
            backup_algorithms: true,
            networks,
            retry: RetryConfig::default(),
        }
    }
}

impl WalletConfig {
    /// Defaults, then the TOML file, then `DIRAC_*` environment variables.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                info!("Loading configuration from: {:?}", path);
                builder = builder.add_source(File::from(path.to_path_buf()).required(true));
            }
            None => {
                if let Some(default) = Self::default_path().filter(|p| p.exists()) {
                    info!("Loading configuration from: {:?}", default);
                    builder = builder.add_source(File::from(default).required(false));
                } else {
                    debug!("No configuration file found, using defaults");
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: WalletConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.dirac-wallet/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".dirac-wallet").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let network = self.network()?;

        let registry = AlgorithmRegistry::default();
        let signature = registry
            .resolve(&self.signature_algorithm)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if signature.as_signature().is_none() {
            return Err(ConfigError::Invalid(format!(
                "'{}' is not a signature algorithm",
                self.signature_algorithm
            )));
        }
        self.hash_algorithm
            .parse::<HashAlgorithm>()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        SecurityLevel::new(self.security_level).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        for (name, endpoints) in &self.networks {
            name.parse::<Network>().map_err(ConfigError::Invalid)?;
            if endpoints.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "network '{}' has an empty endpoint list",
                    name
                )));
            }
        }
        if self.endpoints(network).is_empty() {
            return Err(ConfigError::Invalid(format!("no endpoints for {}", network)));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".to_string()));
        }
        if self.wallet_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("wallet_dir is empty".to_string()));
        }
        Ok(())
    }

    pub fn network(&self) -> Result<Network, ConfigError> {
        self.network.parse().map_err(ConfigError::Invalid)
    }

    /// Configured endpoints for `network`, or its public default
    pub fn endpoints(&self, network: Network) -> Vec<String> {
        self.networks
            .iter()
            .find(|(name, _)| name.parse::<Network>().ok() == Some(network))
            .map(|(_, endpoints)| endpoints.clone())
            .unwrap_or_else(|| vec![network.default_endpoint().to_string()])
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff: Duration::from_millis(self.retry.backoff_ms),
            timeout: Duration::from_secs(self.retry.timeout_secs),
        }
    }

    pub fn wallet_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.wallet_dir).into_owned())
    }

    /// Keyring for newly created wallets
    pub fn keyring(&self, registry: AlgorithmRegistry) -> Result<Keyring, KeyringError> {
        Keyring::from_names(
            registry,
            &self.signature_algorithm,
            &self.hash_algorithm,
            self.security_level,
            self.backup_algorithms,
        )
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write this configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}
