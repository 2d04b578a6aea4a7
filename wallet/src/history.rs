use chrono::{DateTime, Utc};
use dirac_core::SignatureAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
}

/// Transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Sent,
    Received,
    Airdrop,
}

/// Transaction status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Submitted,
    Confirmed,
    Failed(String),
}

/// One entry of a wallet's transaction history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Identifier returned by the RPC node
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub direction: TransactionDirection,
    pub amount: u64,
    pub counterparty: String,
    pub status: TransactionStatus,
    /// Hex digest covered by the quantum signature, absent for airdrops
    #[serde(default)]
    pub payload_hash: Option<String>,
    #[serde(default)]
    pub signature_algorithm: Option<SignatureAlgorithm>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Append-only transaction log for one wallet, persisted as a JSON array
#[derive(Debug, Clone)]
pub struct TransactionHistory {
    transactions: Vec<TransactionRecord>,
    history_path: PathBuf,
}

impl TransactionHistory {
    /// Open the history at `history_path`, loading existing entries
    pub fn new(history_path: PathBuf) -> Result<Self, HistoryError> {
        let mut history = Self {
            transactions: Vec::new(),
            history_path,
        };

        history.load()?;
        Ok(history)
    }

    pub fn path(&self) -> &Path {
        &self.history_path
    }

    /// Add a transaction to history
    pub fn append(&mut self, record: TransactionRecord) -> Result<(), HistoryError> {
        self.transactions.push(record);
        self.save()
    }

    /// Update transaction status
    pub fn update_status(
        &mut self,
        tx_id: &str,
        status: TransactionStatus,
    ) -> Result<(), HistoryError> {
        match self.transactions.iter_mut().find(|tx| tx.tx_id == tx_id) {
            Some(record) => {
                record.status = status;
                self.save()
            }
            None => Err(HistoryError::TransactionNotFound(tx_id.to_string())),
        }
    }

    pub fn get_transaction(&self, tx_id: &str) -> Option<&TransactionRecord> {
        self.transactions.iter().find(|tx| tx.tx_id == tx_id)
    }

    /// All transactions, newest first
    pub fn get_all_transactions(&self) -> Vec<&TransactionRecord> {
        let mut transactions: Vec<_> = self.transactions.iter().collect();
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions
    }

    pub fn get_recent_transactions(&self, count: usize) -> Vec<&TransactionRecord> {
        let mut transactions = self.get_all_transactions();
        transactions.truncate(count);
        transactions
    }

    pub fn get_total_sent(&self) -> u64 {
        self.total(TransactionDirection::Sent)
    }

    /// Received transfers and airdrops together
    pub fn get_total_received(&self) -> u64 {
        self.total(TransactionDirection::Received)
            .saturating_add(self.total(TransactionDirection::Airdrop))
    }

    fn total(&self, direction: TransactionDirection) -> u64 {
        self.transactions
            .iter()
            .filter(|tx| tx.direction == direction)
            .filter(|tx| !matches!(tx.status, TransactionStatus::Failed(_)))
            .fold(0u64, |total, tx| total.saturating_add(tx.amount))
    }

    fn load(&mut self) -> Result<(), HistoryError> {
        if self.history_path.exists() {
            let data = std::fs::read_to_string(&self.history_path)?;
            self.transactions = serde_json::from_str(&data)?;
        }
        Ok(())
    }

    fn save(&self) -> Result<(), HistoryError> {
        let data = serde_json::to_string_pretty(&self.transactions)?;
        let tmp = self.history_path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.history_path)?;
        Ok(())
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Submitted => write!(f, "Submitted"),
            TransactionStatus::Confirmed => write!(f, "Confirmed"),
            TransactionStatus::Failed(reason) => write!(f, "Failed ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn record(tx_id: &str, direction: TransactionDirection, amount: u64) -> TransactionRecord {
        TransactionRecord {
            tx_id: tx_id.to_string(),
            timestamp: Utc::now(),
            direction,
            amount,
            counterparty: "11111111111111111111111111111111".to_string(),
            status: TransactionStatus::Submitted,
            payload_hash: None,
            signature_algorithm: Some(SignatureAlgorithm::Dilithium),
            label: None,
        }
    }

    #[test]
    fn test_transaction_history() {
        let dir = tempdir().unwrap();
        let history_path = dir.path().join("alice.json");
        let mut history = TransactionHistory::new(history_path.clone()).unwrap();

        history
            .append(record("tx1", TransactionDirection::Sent, 1000))
            .unwrap();
        history
            .append(record("tx2", TransactionDirection::Airdrop, 5000))
            .unwrap();
        assert_eq!(history.get_transaction("tx1").unwrap().amount, 1000);

        history
            .update_status("tx1", TransactionStatus::Confirmed)
            .unwrap();
        assert_eq!(
            history.get_transaction("tx1").unwrap().status,
            TransactionStatus::Confirmed
        );
        assert!(matches!(
            history.update_status("missing", TransactionStatus::Confirmed),
            Err(HistoryError::TransactionNotFound(_))
        ));

        assert_eq!(history.get_total_sent(), 1000);
        assert_eq!(history.get_total_received(), 5000);

        // Reopening sees the persisted entries
        let reopened = TransactionHistory::new(history_path).unwrap();
        assert_eq!(reopened.get_all_transactions().len(), 2);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let dir = tempdir().unwrap();
        let mut history = TransactionHistory::new(dir.path().join("whale.json")).unwrap();
        history
            .append(record("tx1", TransactionDirection::Sent, u64::MAX))
            .unwrap();
        history
            .append(record("tx2", TransactionDirection::Sent, 1))
            .unwrap();
        history
            .append(record("tx3", TransactionDirection::Received, u64::MAX - 1))
            .unwrap();
        history
            .append(record("tx4", TransactionDirection::Airdrop, 10))
            .unwrap();

        assert_eq!(history.get_total_sent(), u64::MAX);
        assert_eq!(history.get_total_received(), u64::MAX);
    }

    #[test]
    fn test_failed_transfers_do_not_count() {
        let dir = tempdir().unwrap();
        let mut history = TransactionHistory::new(dir.path().join("bob.json")).unwrap();
        let mut failed = record("tx1", TransactionDirection::Sent, 700);
        failed.status = TransactionStatus::Failed("blockhash expired".to_string());
        history.append(failed).unwrap();
        assert_eq!(history.get_total_sent(), 0);
    }

    #[test]
    fn test_newest_first() {
        let dir = tempdir().unwrap();
        let mut history = TransactionHistory::new(dir.path().join("carol.json")).unwrap();
        let mut older = record("old", TransactionDirection::Received, 1);
        older.timestamp = Utc::now() - Duration::hours(1);
        history.append(older).unwrap();
        history
            .append(record("new", TransactionDirection::Received, 2))
            .unwrap();

        let recent = history.get_recent_transactions(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].tx_id, "new");
    }
}
