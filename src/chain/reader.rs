use std::future::Future;
use std::time::Duration;

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{ContractBookmark, IBookmarkRegistry, live_profiles};
use crate::errors::SyncError;
use crate::models::bookmark::BookmarkedProfile;
use crate::rpc::FallbackTransport;

/// Linear-in-attempt backoff: a failed attempt `n` waits `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        assert!(max_attempts > 0, "Retry policy needs at least one attempt");
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `operation` until it succeeds or attempts are exhausted, returning
    /// the error of the final attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => {
                    warn!(label, attempt, error = %err, "Retries exhausted");
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    debug!(label, attempt, ?delay, error = %err, "Retrying chain read");
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Read-only client for the bookmark contract.
pub struct ChainReader {
    transport: FallbackTransport,
    contract: Address,
    retry: RetryPolicy,
}

impl ChainReader {
    pub fn new(transport: FallbackTransport, contract: Address, retry: RetryPolicy) -> Self {
        Self {
            transport,
            contract,
            retry,
        }
    }

    pub fn transport(&self) -> &FallbackTransport {
        &self.transport
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// All records for `user`, including logically removed ones.
    pub async fn fetch_all(&self, user: Address) -> Result<Vec<ContractBookmark>, SyncError> {
        let call = IBookmarkRegistry::getAllBookmarksCall { _user: user };
        let records = self
            .call_with_retry("getAllBookmarks", &call)
            .await?
            .into_iter()
            .map(ContractBookmark::from)
            .collect::<Vec<_>>();
        debug!(user = %user, count = records.len(), "Fetched bookmark records");
        Ok(records)
    }

    pub async fn check_bookmarked(&self, user: Address, platform: &str) -> Result<bool, SyncError> {
        let call = IBookmarkRegistry::isBookmarkedCall {
            _user: user,
            _platform: platform.to_string(),
        };
        self.call_with_retry("isBookmarked", &call).await
    }

    pub async fn bookmark_count(&self, user: Address) -> Result<u64, SyncError> {
        let call = IBookmarkRegistry::getBookmarkCountCall { _user: user };
        let count = self.call_with_retry("getBookmarkCount", &call).await?;
        Ok(count.saturating_to::<u64>())
    }

    /// Live bookmarks of any address, without touching controller state.
    pub async fn bookmarks_for(&self, user: Address) -> Result<Vec<BookmarkedProfile>, SyncError> {
        Ok(live_profiles(self.fetch_all(user).await?))
    }

    async fn call_with_retry<C: SolCall>(&self, label: &str, call: &C) -> Result<C::Return, SyncError> {
        let encoded = call.abi_encode();
        let data = encoded.as_slice();
        let transport = &self.transport;
        let contract = self.contract;
        self.retry
            .run(label, move || async move {
                let output = transport.eth_call(contract, data).await?;
                Ok(C::abi_decode_returns(&output)?)
            })
            .await
    }
}
