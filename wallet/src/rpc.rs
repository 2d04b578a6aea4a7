//! Chain RPC boundary and the send flow built on it.
//!
//! The wallet core never touches the network; everything here is async and
//! goes through the [`ChainRpc`] trait so tests can substitute an in-memory node.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::history::{TransactionDirection, TransactionRecord, TransactionStatus};
use crate::network::Network;
use crate::quantum_wallet::address::decode_chain_address;
use crate::quantum_wallet::error::{ErrorKind, WalletError};
use crate::quantum_wallet::lifecycle::QuantumWallet;
use crate::quantum_wallet::message::{Blockhash, Pubkey};
use crate::quantum_wallet::storage::WalletStorage;
use crate::quantum_wallet::transaction_builder::BroadcastBundle;

/// Flat fee reserved on top of the transfer amount when checking the balance
pub const ESTIMATED_FEE_LAMPORTS: u64 = 5_000;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    InvalidResponse(String),

    #[error("{method} failed after {attempts} attempts: {last}")]
    Exhausted {
        method: String,
        attempts: u32,
        last: String,
    },

    #[error("No RPC endpoints configured for {0}")]
    NoEndpoints(Network),

    #[error("Airdrops are not available on {0}")]
    AirdropUnavailable(Network),
}

impl RpcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::AirdropUnavailable(_) => ErrorKind::AirdropUnavailable,
            RpcError::NoEndpoints(_) => ErrorKind::InvalidConfiguration,
            RpcError::InvalidResponse(_) => ErrorKind::Serialization,
            RpcError::Http(_) | RpcError::Node { .. } | RpcError::Exhausted { .. } => {
                ErrorKind::Network
            }
        }
    }
}

/// Bounded retry across the configured endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Rounds over the full endpoint list
    pub max_attempts: u32,
    /// Pause after round `n` is `backoff * n`
    pub backoff: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Settlement state of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfirmation {
    pub confirmed: bool,
    pub error: Option<String>,
}

/// What the wallet needs from a chain node
#[async_trait]
pub trait ChainRpc: Send + Sync {
    fn network(&self) -> Network;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    async fn get_recent_blockhash(&self) -> Result<Blockhash, RpcError>;

    /// Submit serialized transaction bytes; returns the node's transaction id
    async fn submit_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError>;

    async fn get_transaction_status(&self, tx_id: &str) -> Result<TransactionConfirmation, RpcError>;

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<String, RpcError>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    confirmation_status: Option<String>,
    err: Option<Value>,
}

/// JSON-RPC 2.0 client over HTTP
#[derive(Debug)]
pub struct JsonRpcClient {
    client: Client,
    network: Network,
    endpoints: Vec<String>,
    policy: RetryPolicy,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(network: Network, endpoints: Vec<String>, policy: RetryPolicy) -> Result<Self, RpcError> {
        if endpoints.is_empty() {
            return Err(RpcError::NoEndpoints(network));
        }
        let client = Client::builder().timeout(policy.timeout).build()?;
        Ok(Self {
            client,
            network,
            endpoints,
            policy,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Try each endpoint in order, for up to `max_attempts` rounds.
    ///
    /// An error reported by a node is final; transport failures move on.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = String::new();

        for attempt in 1..=attempts {
            for endpoint in &self.endpoints {
                match self.call_endpoint(endpoint, method, &params).await {
                    Ok(result) => return Ok(result),
                    Err(e @ RpcError::Node { .. }) => return Err(e),
                    Err(e) => {
                        warn!(endpoint = %endpoint, method, attempt, error = %e, "RPC call failed");
                        last = e.to_string();
                    }
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff * attempt).await;
            }
        }

        Err(RpcError::Exhausted {
            method: method.to_string(),
            attempts,
            last,
        })
    }

    async fn call_endpoint<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: &str,
        params: &Value,
    ) -> Result<T, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        debug!(endpoint, method, "Sending RPC request");

        let response: RpcResponse<T> = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl ChainRpc for JsonRpcClient {
    fn network(&self) -> Network {
        self.network
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        let balance: WithContext<u64> = self.call("getBalance", json!([address.to_string()])).await?;
        Ok(balance.value)
    }

    async fn get_recent_blockhash(&self) -> Result<Blockhash, RpcError> {
        let latest: WithContext<LatestBlockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": "finalized" }]))
            .await?;
        latest
            .value
            .blockhash
            .parse()
            .map_err(|e| RpcError::InvalidResponse(format!("blockhash: {}", e)))
    }

    async fn submit_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        self.call(
            "sendTransaction",
            json!([STANDARD.encode(raw), { "encoding": "base64" }]),
        )
        .await
    }

    async fn get_transaction_status(&self, tx_id: &str) -> Result<TransactionConfirmation, RpcError> {
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[tx_id], { "searchTransactionHistory": true }]),
            )
            .await?;

        Ok(match statuses.value.into_iter().next().flatten() {
            Some(status) => {
                let error = status.err.map(|e| e.to_string());
                let settled = matches!(
                    status.confirmation_status.as_deref(),
                    Some("confirmed") | Some("finalized")
                );
                TransactionConfirmation {
                    confirmed: settled && error.is_none(),
                    error,
                }
            }
            None => TransactionConfirmation {
                confirmed: false,
                error: None,
            },
        })
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<String, RpcError> {
        if !self.network.supports_airdrop() {
            return Err(RpcError::AirdropUnavailable(self.network));
        }
        self.call("requestAirdrop", json!([address.to_string(), lamports]))
            .await
    }
}

/// Outcome of [`send_transfer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub tx_id: String,
    pub bundle: BroadcastBundle,
}

/// Check the balance, build and sign a transfer, submit it and record it in history
pub async fn send_transfer(
    wallet: &QuantumWallet,
    rpc: &dyn ChainRpc,
    recipient: &str,
    lamports: u64,
) -> Result<SendReceipt, WalletError> {
    wallet.signing_keys()?;
    let from = wallet
        .chain_pubkey()
        .ok_or_else(|| WalletError::NotLoaded(wallet.name().to_string()))?;

    let available = rpc.get_balance(&from).await?;
    let needed = lamports.saturating_add(ESTIMATED_FEE_LAMPORTS);
    if available < needed {
        return Err(WalletError::InsufficientFunds { needed, available });
    }

    let blockhash = rpc.get_recent_blockhash().await?;

    let mut transaction = wallet.transaction();
    transaction.create_transfer(recipient, lamports)?;
    transaction.sign(Some(blockhash))?;
    let bundle = transaction.prepare_for_broadcast()?;

    let tx_id = rpc.submit_raw_transaction(&bundle.raw_payload).await?;
    info!(
        wallet = wallet.name(),
        tx_id = %tx_id,
        lamports,
        payload_hash = %bundle.metadata.payload_hash,
        "Submitted transfer"
    );

    let counterparty = bundle
        .transfer
        .map(|t| t.recipient.to_string())
        .unwrap_or_else(|| recipient.to_string());
    let record = TransactionRecord {
        tx_id: tx_id.clone(),
        timestamp: bundle.timestamp,
        direction: TransactionDirection::Sent,
        amount: lamports,
        counterparty,
        status: TransactionStatus::Submitted,
        payload_hash: Some(bundle.metadata.payload_hash.clone()),
        signature_algorithm: Some(bundle.metadata.signature_algorithm),
        label: None,
    };
    // The transfer is already on its way; a history write failure must not hide that
    if let Err(e) = wallet.record_transaction(record) {
        warn!(wallet = wallet.name(), error = %e, "Failed to record transaction history");
    }

    Ok(SendReceipt { tx_id, bundle })
}

/// Fund a stored wallet from the network faucet and record the credit.
///
/// Only the clear-text summary is read, so no password is needed.
pub async fn request_airdrop(
    storage: &WalletStorage,
    name: &str,
    rpc: &dyn ChainRpc,
    lamports: u64,
) -> Result<String, WalletError> {
    let summary = storage.read_summary(name)?;
    let address = Pubkey::new_from_array(decode_chain_address(&summary.chain_address)?);
    let tx_id = rpc.request_airdrop(&address, lamports).await?;
    info!(wallet = name, tx_id = %tx_id, lamports, "Requested airdrop");

    let record = TransactionRecord {
        tx_id: tx_id.clone(),
        timestamp: chrono::Utc::now(),
        direction: TransactionDirection::Airdrop,
        amount: lamports,
        counterparty: "faucet".to_string(),
        status: TransactionStatus::Submitted,
        payload_hash: None,
        signature_algorithm: None,
        label: None,
    };
    if let Err(e) = storage.append_transaction(name, record) {
        warn!(wallet = name, error = %e, "Failed to record airdrop");
    }
    Ok(tx_id)
}
