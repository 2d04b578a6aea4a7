use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use dirac_core::{AlgorithmRegistry, SecurityLevel, SignatureScheme};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::{ConfigError, WalletConfig};
use crate::network::Network;
use crate::quantum_wallet::{
    verify_bundle, AddressError, BackupSelector, BroadcastBundle, ErrorKind, Keyring,
    KeyringError, Pubkey, QuantumWallet, StorageError, TransactionError, WalletError, WalletStorage,
};
use crate::rpc::{self, ChainRpc, JsonRpcClient, RpcError};

#[derive(Parser)]
#[command(name = "dirac-wallet", author, version, about = "Quantum-resistant wallet", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.dirac-wallet/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding wallet files
    #[arg(short, long, global = true)]
    pub wallet_dir: Option<String>,

    /// Network: mainnet, testnet, devnet or local
    #[arg(short, long, global = true)]
    pub network: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Wallet password; prompted for when omitted
    #[arg(long, global = true, env = "DIRAC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new quantum wallet
    Create {
        name: String,

        /// Signature algorithm (dilithium, sphincs, lamport)
        #[arg(short, long)]
        signature: Option<String>,

        /// Hash algorithm (standard, improved, grover, shor, quantum-enhanced)
        #[arg(long)]
        hash: Option<String>,

        /// Security level 1-5
        #[arg(short = 'l', long)]
        security_level: Option<u8>,

        /// Skip backup keypairs under the other algorithms
        #[arg(long)]
        no_backups: bool,

        /// Replace an existing wallet of the same name
        #[arg(long)]
        overwrite: bool,
    },

    /// Check that a password unlocks a wallet
    UnlockCheck { name: String },

    /// Show wallet details
    Info {
        name: String,

        /// Unlock to show every field
        #[arg(long)]
        unlock: bool,
    },

    /// List wallets
    List,

    /// Query the wallet balance
    Balance { name: String },

    /// Send lamports to a chain or quantum address
    Send {
        name: String,
        recipient: String,
        amount: u64,

        /// Also write the signed bundle as JSON for independent verification
        #[arg(long)]
        bundle_out: Option<PathBuf>,
    },

    /// Request test funds from the network faucet
    Airdrop {
        name: String,
        #[arg(default_value = "1000000000")]
        amount: u64,
    },

    /// Show transaction history
    History {
        name: String,
        #[arg(short = 'l', long, default_value = "20")]
        limit: usize,
    },

    /// Snapshot the wallet file
    Backup { name: String },

    /// List backups, newest first
    Backups { name: String },

    /// Replace the wallet with a backup
    Restore {
        name: String,

        /// Backup id; the newest backup when omitted
        #[arg(long)]
        backup_id: Option<String>,
    },

    /// Export the wallet as JSON
    Export {
        name: String,

        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Include private keys in plaintext
        #[arg(long)]
        include_private: bool,
    },

    /// Import an exported wallet
    Import {
        path: PathBuf,

        /// Store under a different name
        #[arg(long)]
        name: Option<String>,
    },

    /// Verify the quantum signature of a bundle file
    Verify { bundle: PathBuf },

    /// Time keygen, sign and verify for every algorithm
    Bench {
        #[arg(short, long, default_value = "10")]
        iterations: u32,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the configuration file
        #[arg(long)]
        init: bool,
    },
}

struct Session {
    config: WalletConfig,
    network: Network,
    password: Option<String>,
}

impl Session {
    fn storage(&self) -> Result<WalletStorage> {
        let dir = self.config.wallet_dir();
        WalletStorage::new(&dir)
            .with_context(|| format!("Failed to open wallet directory {}", dir.display()))
    }

    fn keyring(&self) -> Result<Keyring> {
        Ok(self.config.keyring(AlgorithmRegistry::default())?)
    }

    fn wallet(&self, name: &str) -> Result<QuantumWallet> {
        Ok(QuantumWallet::new(self.storage()?, self.keyring()?, name, self.network))
    }

    fn rpc(&self) -> Result<JsonRpcClient> {
        Ok(JsonRpcClient::new(
            self.network,
            self.config.endpoints(self.network),
            self.config.retry_policy(),
        )?)
    }

    fn password(&self, prompt: &str) -> Result<String> {
        match &self.password {
            Some(password) => Ok(password.clone()),
            None => rpassword::prompt_password(prompt).context("Failed to read password"),
        }
    }

    fn new_password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        let first = rpassword::prompt_password("New wallet password: ")?;
        let second = rpassword::prompt_password("Repeat password: ")?;
        if first != second {
            bail!("Passwords do not match");
        }
        if first.is_empty() {
            bail!("Password must not be empty");
        }
        Ok(first)
    }

    /// Open and unlock, turning a wrong password into an error
    fn unlocked_wallet(&self, name: &str) -> Result<QuantumWallet> {
        let mut wallet = self.wallet(name)?;
        let password = self.password(&format!("Password for '{}': ", name))?;
        if !wallet.unlock(&password)? {
            return Err(WalletError::Storage(StorageError::InvalidPassword).into());
        }
        Ok(wallet)
    }
}

/// Kind of the first typed wallet error in the chain
pub fn error_kind(error: &anyhow::Error) -> Option<ErrorKind> {
    error.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<WalletError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<StorageError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<TransactionError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<KeyringError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<AddressError>() {
            Some(e.kind())
        } else if let Some(e) = cause.downcast_ref::<RpcError>() {
            Some(e.kind())
        } else {
            cause.downcast_ref::<ConfigError>().map(|e| e.kind())
        }
    })
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let mut config = WalletConfig::load(cli.config.as_deref())?;
    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(dir) = cli.wallet_dir {
        config.wallet_dir = dir;
    }
    config.validate()?;

    let ctx = Session {
        network: config.network()?,
        config,
        password: cli.password,
    };

    match cli.command {
        Some(Commands::Create {
            name,
            signature,
            hash,
            security_level,
            no_backups,
            overwrite,
        }) => {
            let mut config = ctx.config.clone();
            if let Some(signature) = signature {
                config.signature_algorithm = signature;
            }
            if let Some(hash) = hash {
                config.hash_algorithm = hash;
            }
            if let Some(level) = security_level {
                config.security_level = level;
            }
            if no_backups {
                config.backup_algorithms = false;
            }
            let keyring = config.keyring(AlgorithmRegistry::default())?;

            let password = ctx.new_password()?;
            let mut wallet = QuantumWallet::new(ctx.storage()?, keyring, name.as_str(), ctx.network);
            println!("Generating quantum-resistant keys...");
            let created = wallet.create(&password, overwrite)?;

            println!("✓ Wallet '{}' created", name);
            println!("  Chain address:   {}", created.chain_address);
            println!("  Quantum address: {}", created.quantum_address);
            println!("  File:            {}", created.path.display());
            println!("  Initial backup:  {}", created.backup_id);
            Ok(())
        }

        Some(Commands::UnlockCheck { name }) => {
            let wallet = ctx.unlocked_wallet(&name)?;
            println!("✓ Password unlocks wallet '{}'", wallet.name());
            Ok(())
        }

        Some(Commands::Info { name, unlock }) => {
            let wallet = if unlock {
                ctx.unlocked_wallet(&name)?
            } else {
                ctx.wallet(&name)?
            };
            let info = wallet.info()?;
            println!("Wallet:            {}", info.name);
            println!("Network:           {}", info.network);
            println!("Chain address:     {}", info.chain_address);
            if let Some(quantum) = &info.quantum_address {
                println!("Quantum address:   {}", quantum);
            }
            println!("Signature:         {}", info.signature_algorithm);
            if let Some(hash) = info.hash_algorithm {
                println!("Hash:              {}", hash);
            }
            if let Some(level) = info.security_level {
                println!("Security level:    {} ({:?})", level, level.tier());
            }
            if unlock {
                println!("Backup keys:       {}", info.backup_keys);
                println!("Watch-only:        {}", info.watch_only);
            }
            println!("Created:           {}", info.created_at);
            if let Some(accessed) = info.last_accessed {
                println!("Last accessed:     {}", accessed);
            }
            Ok(())
        }

        Some(Commands::List) => {
            let wallets = ctx.storage()?.list()?;
            if wallets.is_empty() {
                println!("No wallets found.");
            } else {
                println!("Wallets:");
                for summary in wallets {
                    println!(
                        "  {} ({}, {}) {}",
                        summary.name, summary.algorithm, summary.network, summary.chain_address
                    );
                }
            }
            Ok(())
        }

        Some(Commands::Balance { name }) => {
            let summary = ctx.storage()?.read_summary(&name)?;
            let address: Pubkey = summary.chain_address.parse()?;
            let balance = ctx.rpc()?.get_balance(&address).await?;
            println!("Balance for '{}': {} lamports", name, balance);
            Ok(())
        }

        Some(Commands::Send {
            name,
            recipient,
            amount,
            bundle_out,
        }) => {
            let wallet = ctx.unlocked_wallet(&name)?;
            let client = ctx.rpc()?;
            let receipt = rpc::send_transfer(&wallet, &client, &recipient, amount).await?;

            println!("✓ Submitted transaction {}", receipt.tx_id);
            println!("  Payload hash: {}", receipt.bundle.metadata.payload_hash);
            println!(
                "  Signature:    {} level {} ({} bytes)",
                receipt.bundle.metadata.signature_algorithm,
                receipt.bundle.metadata.security_level,
                receipt.bundle.metadata.signature.len()
            );
            if let Some(path) = bundle_out {
                std::fs::write(&path, serde_json::to_vec_pretty(&receipt.bundle)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("  Bundle:       {}", path.display());
            }
            Ok(())
        }

        Some(Commands::Airdrop { name, amount }) => {
            let tx_id = rpc::request_airdrop(&ctx.storage()?, &name, &ctx.rpc()?, amount).await?;
            println!("✓ Airdrop of {} lamports requested: {}", amount, tx_id);
            Ok(())
        }

        Some(Commands::History { name, limit }) => {
            let history = ctx.wallet(&name)?.history()?;
            let transactions = history.get_recent_transactions(limit);
            if transactions.is_empty() {
                println!("No transactions recorded for '{}'.", name);
            }
            for tx in transactions {
                println!(
                    "{}  {:?}  {} lamports  {}  {}  {}",
                    tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    tx.direction,
                    tx.amount,
                    tx.counterparty,
                    tx.status,
                    tx.tx_id
                );
            }
            Ok(())
        }

        Some(Commands::Backup { name }) => {
            let id = ctx.wallet(&name)?.create_backup()?;
            println!("✓ Backup created: {}", id);
            Ok(())
        }

        Some(Commands::Backups { name }) => {
            let backups = ctx.wallet(&name)?.list_backups()?;
            if backups.is_empty() {
                println!("No backups for '{}'.", name);
            }
            for backup in backups {
                println!("{}  {}", backup.created_at, backup.id);
            }
            Ok(())
        }

        Some(Commands::Restore { name, backup_id }) => {
            let selector = match backup_id {
                Some(id) => BackupSelector::Id(id),
                None => BackupSelector::Latest,
            };
            let password = ctx.password("Password of the backup: ")?;
            let mut wallet = ctx.wallet(&name)?;
            let summary = wallet.restore(&selector, &password)?;
            println!("✓ Restored '{}' ({})", summary.name, summary.chain_address);
            Ok(())
        }

        Some(Commands::Export {
            name,
            out_dir,
            include_private,
        }) => {
            let password = ctx.password(&format!("Password for '{}': ", name))?;
            let path = ctx
                .storage()?
                .export(&name, &password, &out_dir, include_private)?;
            if include_private {
                println!("⚠️  The export contains private keys in plaintext. Keep it offline.");
            }
            println!("✓ Exported to {}", path.display());
            Ok(())
        }

        Some(Commands::Import { path, name }) => {
            let password = ctx.new_password()?;
            let record = ctx.storage()?.import(&path, name.as_deref(), &password)?;
            println!("✓ Imported '{}' ({})", record.name, record.chain_address);
            if record.is_watch_only() {
                println!("  Watch-only: no private keys, cannot sign");
            }
            Ok(())
        }

        Some(Commands::Verify { bundle }) => {
            let data = std::fs::read(&bundle)
                .with_context(|| format!("Failed to read {}", bundle.display()))?;
            let bundle: BroadcastBundle = serde_json::from_slice(&data)?;
            if verify_bundle(&bundle.raw_payload, &bundle.metadata, &ctx.keyring()?) {
                println!(
                    "✓ Valid {} signature over payload {}",
                    bundle.metadata.signature_algorithm, bundle.metadata.payload_hash
                );
                Ok(())
            } else {
                bail!("Bundle signature is INVALID")
            }
        }

        Some(Commands::Bench { iterations }) => {
            let level = SecurityLevel::new(ctx.config.security_level)?;
            run_bench(&AlgorithmRegistry::default(), level, iterations.max(1))
        }

        Some(Commands::Config { init }) => {
            if init {
                let path = match cli.config.or_else(WalletConfig::default_path) {
                    Some(path) => path,
                    None => bail!("No home directory; pass --config"),
                };
                ctx.config.save(&path)?;
                println!("✓ Wrote {}", path.display());
            } else {
                print!("{}", ctx.config.to_toml()?);
            }
            Ok(())
        }

        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn run_bench(registry: &AlgorithmRegistry, level: SecurityLevel, iterations: u32) -> Result<()> {
    let message = [0x42u8; 32];
    println!("Security level {}, {} iterations", level, iterations);
    println!(
        "{:<10} {:>12} {:>12} {:>12} {:>10}",
        "algorithm", "keygen", "sign", "verify", "sig bytes"
    );

    for algorithm in registry.signature_algorithms() {
        let scheme = registry.signature(algorithm, level)?;
        let (keygen, sign, verify, signature_len) = bench_scheme(scheme.as_ref(), &message, iterations)?;
        println!(
            "{:<10} {:>12?} {:>12?} {:>12?} {:>10}",
            algorithm.name(),
            keygen,
            sign,
            verify,
            signature_len
        );
    }
    Ok(())
}

fn bench_scheme(
    scheme: &dyn SignatureScheme,
    message: &[u8],
    iterations: u32,
) -> Result<(Duration, Duration, Duration, usize)> {
    let mut keygen = Duration::ZERO;
    let mut sign = Duration::ZERO;
    let mut verify = Duration::ZERO;
    let mut signature_len = 0;

    for _ in 0..iterations {
        let start = Instant::now();
        let keypair = scheme.generate_keypair()?;
        keygen += start.elapsed();

        let start = Instant::now();
        let signature = scheme.sign(message, &keypair.secret_key)?;
        sign += start.elapsed();
        signature_len = signature.len();

        let start = Instant::now();
        if !scheme.verify(message, &signature, &keypair.public_key) {
            bail!("{} failed to verify its own signature", scheme.algorithm());
        }
        verify += start.elapsed();
    }

    Ok((keygen / iterations, sign / iterations, verify / iterations, signature_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_send() {
        let cli = Cli::try_parse_from([
            "dirac-wallet",
            "--network",
            "devnet",
            "send",
            "alice",
            "11111111111111111111111111111111",
            "100000000",
        ])
        .unwrap();
        assert_eq!(cli.network.as_deref(), Some("devnet"));
        match cli.command {
            Some(Commands::Send { name, amount, .. }) => {
                assert_eq!(name, "alice");
                assert_eq!(amount, 100_000_000);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_clap_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_error_kind_through_context() {
        let err = anyhow::Error::from(WalletError::Storage(StorageError::InvalidPassword))
            .context("while unlocking");
        assert_eq!(error_kind(&err), Some(ErrorKind::InvalidPassword));
        assert_eq!(error_kind(&anyhow::anyhow!("plain")), None);
    }
}
