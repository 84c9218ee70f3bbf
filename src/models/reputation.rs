use serde::{Deserialize, Serialize};

use crate::rpc::TransactionReceipt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReputationSummary {
    pub address: String,
    pub average_score: f64,
    pub review_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewNote {
    pub reviewer: String,
    pub message: String,
    pub score: u8,
    /// Unix seconds as recorded on-chain.
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub message: String,
    pub score: u8,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

impl From<&TransactionReceipt> for TransactionView {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash.clone(),
            block_number: receipt.block_number(),
        }
    }
}
