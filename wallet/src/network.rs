use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chain clusters a wallet can be bound to
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
    Local,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Mainnet,
        Network::Testnet,
        Network::Devnet,
        Network::Local,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Local => "local",
        }
    }

    /// Public RPC endpoint used when the configuration supplies none
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
            Network::Local => "http://localhost:8899",
        }
    }

    /// Faucets exist everywhere except mainnet
    pub fn supports_airdrop(&self) -> bool {
        !matches!(self, Network::Mainnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "local" | "localnet" | "localhost" => Ok(Network::Local),
            other => Err(format!("Invalid network: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("mainnet-beta".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("LOCALHOST".parse::<Network>().unwrap(), Network::Local);
        assert!("regtest".parse::<Network>().is_err());
    }

    #[test]
    fn test_airdrop_support() {
        assert!(!Network::Mainnet.supports_airdrop());
        assert!(Network::Devnet.supports_airdrop());
    }
}
