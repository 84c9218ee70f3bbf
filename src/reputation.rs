//! Reviews and scores from the on-chain reputation registry.

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use tracing::{debug, info};

use crate::chain::IReputationRegistry;
use crate::chain::writer::{ConfirmationPolicy, wait_for_receipt};
use crate::errors::SyncError;
use crate::models::reputation::{ReputationSummary, ReviewNote};
use crate::rpc::{FallbackTransport, TransactionReceipt};
use crate::wallet::{TransactionRequest, WalletSigner, ensure_chain};

pub const MAX_NOTES: u64 = 500;
pub const MAX_MESSAGE_LEN: usize = 1_000;

/// The registry stores averages scaled by 100.
const SCORE_SCALE: f64 = 100.0;

pub struct ReputationClient {
    transport: FallbackTransport,
    contract: Address,
    chain_id: u64,
    confirmation: ConfirmationPolicy,
}

impl ReputationClient {
    pub fn new(
        transport: FallbackTransport,
        contract: Address,
        chain_id: u64,
        confirmation: ConfirmationPolicy,
    ) -> Self {
        Self {
            transport,
            contract,
            chain_id,
            confirmation,
        }
    }

    pub async fn average_score(&self, target: Address) -> Result<f64, SyncError> {
        let call = IReputationRegistry::getAverageScoreCall { _target: target };
        let scaled = self.call(&call).await?;
        Ok(scaled.saturating_to::<u64>() as f64 / SCORE_SCALE)
    }

    pub async fn review_count(&self, target: Address) -> Result<u64, SyncError> {
        let call = IReputationRegistry::reviewCountCall { target };
        Ok(self.call(&call).await?.saturating_to::<u64>())
    }

    pub async fn summary(&self, target: Address) -> Result<ReputationSummary, SyncError> {
        let (average_score, review_count) =
            tokio::try_join!(self.average_score(target), self.review_count(target))?;
        Ok(ReputationSummary {
            address: format!("{target:#x}"),
            average_score,
            review_count,
        })
    }

    /// Notes are fetched one index at a time; the registry has no batch read.
    pub async fn all_notes(&self, target: Address) -> Result<Vec<ReviewNote>, SyncError> {
        let count = self.review_count(target).await?;
        let bounded = count.min(MAX_NOTES);
        if bounded < count {
            debug!(target = %target, count, "Truncating review list");
        }

        let mut notes = Vec::with_capacity(bounded as usize);
        for index in 0..bounded {
            let call = IReputationRegistry::notesCall {
                target,
                index: alloy_primitives::U256::from(index),
            };
            let note = self.call(&call).await?;
            notes.push(ReviewNote {
                reviewer: format!("{:#x}", note.reviewer),
                message: note.message,
                score: note.score,
                timestamp: note.timestamp.saturating_to::<u64>(),
            });
        }
        Ok(notes)
    }

    pub async fn has_reviewed(&self, target: Address, reviewer: Address) -> Result<bool, SyncError> {
        let call = IReputationRegistry::hasReviewedCall { target, reviewer };
        self.call(&call).await
    }

    pub async fn add_note(
        &self,
        signer: &dyn WalletSigner,
        target: Address,
        message: &str,
        score: u8,
    ) -> Result<TransactionReceipt, SyncError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SyncError::contract("Review message must not be empty"));
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(SyncError::contract(format!(
                "Review message exceeds {MAX_MESSAGE_LEN} characters"
            )));
        }
        if !(1..=5).contains(&score) {
            return Err(SyncError::contract("Score must be between 1 and 5"));
        }

        ensure_chain(signer, self.chain_id).await?;
        let call = IReputationRegistry::addNoteCall {
            _target: target,
            _message: message.to_string(),
            _score: score,
        };
        let request = TransactionRequest {
            from: signer.address(),
            to: self.contract,
            data: call.abi_encode(),
        };
        let hash = signer.send_transaction(&request).await?;
        info!(tx = %hash, target = %target, score, "Review submitted");
        wait_for_receipt(&self.transport, hash, self.confirmation).await
    }

    async fn call<C: SolCall>(&self, call: &C) -> Result<C::Return, SyncError> {
        let output = self.transport.eth_call(self.contract, &call.abi_encode()).await?;
        Ok(C::abi_decode_returns(&output)?)
    }
}
