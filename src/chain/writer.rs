use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use alloy_primitives::{Address, B256};
use alloy_sol_types::SolCall;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::IBookmarkRegistry;
use super::reader::ChainReader;
use crate::errors::{ErrorKind, SyncError};
use crate::models::bookmark::ProfileInput;
use crate::rpc::{FallbackTransport, TransactionReceipt};
use crate::wallet::{TransactionRequest, WalletSigner, ensure_chain};

pub const MAX_PLATFORM_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

/// Wallet-signed mutations against the bookmark contract.
///
/// Writes are never retried here: a resubmitted transaction could double
/// spend gas or trip the contract's "not already bookmarked" precondition.
pub struct ChainWriter {
    reader: Arc<ChainReader>,
    chain_id: u64,
    confirmation: ConfirmationPolicy,
    signer: RwLock<Option<Arc<dyn WalletSigner>>>,
}

impl ChainWriter {
    pub fn new(reader: Arc<ChainReader>, chain_id: u64, confirmation: ConfirmationPolicy) -> Self {
        assert!(chain_id > 0, "Chain id must be non-zero");
        Self {
            reader,
            chain_id,
            confirmation,
            signer: RwLock::new(None),
        }
    }

    pub fn bind(&self, signer: Arc<dyn WalletSigner>) {
        debug!(address = %signer.address(), "Binding wallet signer");
        *self.signer.write().unwrap_or_else(PoisonError::into_inner) = Some(signer);
    }

    pub fn unbind(&self) {
        self.signer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_bound(&self) -> bool {
        self.signer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub async fn add_bookmark(
        &self,
        address: Address,
        platform: &str,
        profile: &ProfileInput,
    ) -> Result<TransactionReceipt, SyncError> {
        let signer = self.signer_for(address)?;
        let platform = normalize_platform(platform)?;

        if self.reader.check_bookmarked(address, platform).await? {
            return Err(SyncError::already_bookmarked(platform));
        }

        let call = IBookmarkRegistry::addBookmarkCall {
            _platform: platform.to_string(),
            _username: profile.display_username().to_string(),
            _avatar: profile.avatar_or_empty().to_string(),
            _profileUrl: profile.url_or_empty().to_string(),
        };
        self.submit(signer.as_ref(), "addBookmark", call.abi_encode())
            .await
    }

    pub async fn remove_bookmark(
        &self,
        address: Address,
        platform: &str,
    ) -> Result<TransactionReceipt, SyncError> {
        let signer = self.signer_for(address)?;
        let platform = normalize_platform(platform)?;
        let call = IBookmarkRegistry::removeBookmarkCall {
            _platform: platform.to_string(),
        };
        self.submit(signer.as_ref(), "removeBookmark", call.abi_encode())
            .await
    }

    pub async fn clear_all(&self, address: Address) -> Result<TransactionReceipt, SyncError> {
        let signer = self.signer_for(address)?;
        let call = IBookmarkRegistry::clearAllBookmarksCall {};
        self.submit(signer.as_ref(), "clearAllBookmarks", call.abi_encode())
            .await
    }

    fn signer_for(&self, address: Address) -> Result<Arc<dyn WalletSigner>, SyncError> {
        let guard = self.signer.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(signer) if signer.address() == address => Ok(Arc::clone(signer)),
            _ => Err(SyncError::wallet_not_connected()),
        }
    }

    async fn submit(
        &self,
        signer: &dyn WalletSigner,
        label: &str,
        data: Vec<u8>,
    ) -> Result<TransactionReceipt, SyncError> {
        ensure_chain(signer, self.chain_id).await?;

        let request = TransactionRequest {
            from: signer.address(),
            to: self.reader.contract(),
            data,
        };
        let hash = signer.send_transaction(&request).await?;
        info!(tx = %hash, label, "Transaction sent");

        let receipt =
            wait_for_receipt(self.reader.transport(), hash, self.confirmation).await?;
        info!(tx = %hash, label, block = ?receipt.block_number(), "Transaction confirmed");
        Ok(receipt)
    }
}

/// Poll until the transaction is mined. Transient RPC failures are tolerated
/// until the confirmation deadline.
pub async fn wait_for_receipt(
    transport: &FallbackTransport,
    hash: B256,
    policy: ConfirmationPolicy,
) -> Result<TransactionReceipt, SyncError> {
    let deadline = Instant::now() + policy.timeout;
    loop {
        match transport.transaction_receipt(hash).await {
            Ok(Some(receipt)) if receipt.succeeded() => return Ok(receipt),
            Ok(Some(_)) => {
                return Err(SyncError::contract(format!(
                    "Transaction {hash} reverted"
                )));
            }
            Ok(None) => {}
            Err(err) if err.kind().is_transient() => {
                warn!(tx = %hash, error = %err, "Receipt poll failed");
            }
            Err(err) => return Err(err),
        }

        if Instant::now() + policy.poll_interval > deadline {
            return Err(SyncError::new(
                ErrorKind::NetworkTimeout,
                format!("Transaction {hash} not confirmed within {:?}", policy.timeout),
            ));
        }
        sleep(policy.poll_interval).await;
    }
}

/// Trimmed platform key, as stored on-chain.
pub fn normalize_platform(platform: &str) -> Result<&str, SyncError> {
    let trimmed = platform.trim();
    if trimmed.is_empty() {
        return Err(SyncError::contract("Platform must not be empty"));
    }
    if trimmed.chars().count() > MAX_PLATFORM_LEN {
        return Err(SyncError::contract(format!(
            "Platform exceeds {MAX_PLATFORM_LEN} character limit"
        )));
    }
    Ok(trimmed)
}
