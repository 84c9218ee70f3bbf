//! Bookmark sync controller.
//!
//! Owns the in-memory bookmark list of the connected wallet, mirrors it to the
//! durable cache, and reconciles it against the contract. The contract is the
//! source of truth: every mutation is followed by a read-through before it
//! reports completion.
//!
//! Phases move `Uninitialized -> Initializing -> Ready` per wallet address.
//! At most one initialization runs at a time; concurrent callers for the same
//! address share its result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use alloy_primitives::Address;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::chain::live_profiles;
use crate::chain::reader::ChainReader;
use crate::chain::writer::{ChainWriter, normalize_platform};
use crate::errors::SyncError;
use crate::models::bookmark::{BookmarkedProfile, ProfileInput, SyncState};
use crate::rpc::{FallbackTransport, TransactionReceipt};
use crate::store::{CacheKey, CacheStore};
use crate::wallet::WalletProvider;

type InitFuture = Shared<BoxFuture<'static, Result<(), SyncError>>>;

enum Phase {
    Uninitialized,
    Initializing {
        address: Address,
        generation: u64,
        task: InitFuture,
    },
    Ready {
        address: Address,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added(TransactionReceipt),
    Removed(TransactionReceipt),
}

enum InitStep {
    Join(InitFuture),
    WaitForOther(InitFuture),
    Done,
}

pub struct BookmarkSync {
    reader: Arc<ChainReader>,
    writer: Arc<ChainWriter>,
    wallet: Arc<dyn WalletProvider>,
    cache: Arc<dyn CacheStore>,
    state: watch::Sender<SyncState>,
    phase: Mutex<Phase>,
    /// Wallet whose bookmarks are currently held in memory. Survives cleanup.
    owner: Mutex<Option<Address>>,
    generation: AtomicU64,
    mutations: tokio::sync::Mutex<()>,
}

impl BookmarkSync {
    pub fn new(
        reader: Arc<ChainReader>,
        writer: Arc<ChainWriter>,
        wallet: Arc<dyn WalletProvider>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            reader,
            writer,
            wallet,
            cache,
            state,
            phase: Mutex::new(Phase::Uninitialized),
            owner: Mutex::new(None),
            generation: AtomicU64::new(0),
            mutations: tokio::sync::Mutex::new(()),
        }
    }

    /// Show the bookmarks saved at the last disconnect until a wallet connects.
    pub async fn restore(&self) {
        let cached = self.cache.load(&CacheKey::Default).await;
        if cached.is_empty() {
            return;
        }
        let count = cached.len();
        let restored = self.state.send_if_modified(|state| {
            if state.current_address.is_some() || !state.bookmarks.is_empty() {
                return false;
            }
            state.bookmarks = cached;
            true
        });
        if restored {
            info!(count, "Restored cached bookmarks");
        }
    }

    pub async fn initialize_with_wallet(self: &Arc<Self>, address: Address) -> Result<(), SyncError> {
        loop {
            match self.next_init_step(address) {
                InitStep::Done => return Ok(()),
                InitStep::Join(task) => return task.await,
                InitStep::WaitForOther(task) => {
                    debug!(address = %address, "Waiting for in-flight initialization");
                    if let Err(err) = task.await {
                        debug!(address = %address, error = %err, "Previous initialization failed");
                    }
                }
            }
        }
    }

    fn next_init_step(self: &Arc<Self>, address: Address) -> InitStep {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        match &*phase {
            Phase::Ready { address: ready } if *ready == address => InitStep::Done,
            Phase::Initializing {
                address: pending,
                task,
                ..
            } => {
                if *pending == address {
                    InitStep::Join(task.clone())
                } else {
                    InitStep::WaitForOther(task.clone())
                }
            }
            Phase::Uninitialized | Phase::Ready { .. } => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let task = Arc::clone(self)
                    .run_initialize(address, generation)
                    .boxed()
                    .shared();
                *phase = Phase::Initializing {
                    address,
                    generation,
                    task: task.clone(),
                };
                InitStep::Join(task)
            }
        }
    }

    async fn run_initialize(self: Arc<Self>, address: Address, generation: u64) -> Result<(), SyncError> {
        let result = self.initialize(address, generation).await;
        self.settle(address, generation, result.is_ok());
        result
    }

    async fn initialize(&self, address: Address, generation: u64) -> Result<(), SyncError> {
        let Some(signer) = self.wallet.signer(address) else {
            warn!(address = %address, "No signer available for wallet");
            let err = SyncError::wallet_not_connected();
            let phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
            if is_generation(&phase, generation) {
                self.writer.unbind();
                self.state.send_modify(|state| {
                    state.current_address = None;
                    state.loading = false;
                    state.last_error = Some(err.clone());
                });
            }
            return Err(err);
        };

        info!(address = %address, "Initializing bookmark sync");
        let cached = if self.owner() == Some(address) {
            None
        } else {
            Some(self.cache.load(&CacheKey::Wallet(address)).await)
        };

        // Cleanup holds the phase lock too: it either supersedes this publish
        // or sees it complete.
        {
            let phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
            if !is_generation(&phase, generation) {
                debug!(address = %address, "Initialization superseded");
                return Ok(());
            }
            self.writer.bind(signer);
            self.state.send_modify(|state| {
                state.current_address = Some(address);
                state.loading = true;
                state.last_error = None;
                if let Some(cached) = cached {
                    state.bookmarks = cached;
                }
            });
            *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = Some(address);
        }

        self.read_through(address).await;
        Ok(())
    }

    fn settle(&self, address: Address, generation: u64, succeeded: bool) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !is_generation(&phase, generation) {
            return;
        }
        *phase = if succeeded {
            Phase::Ready { address }
        } else {
            Phase::Uninitialized
        };
    }

    /// Re-read the connected wallet's bookmarks. Never fails: on error the
    /// previous list stays and `last_error` is set.
    pub async fn refresh_bookmarks(&self) -> Vec<BookmarkedProfile> {
        let Some(address) = self.ready_address() else {
            return self.get_all_bookmarks();
        };
        self.update_if_current(address, |state| state.loading = true);
        self.read_through(address).await
    }

    async fn read_through(&self, address: Address) -> Vec<BookmarkedProfile> {
        match self.reader.fetch_all(address).await {
            Ok(records) => {
                let bookmarks = live_profiles(records);
                debug!(address = %address, count = bookmarks.len(), "Bookmarks read from chain");
                self.cache.save(&CacheKey::Wallet(address), &bookmarks).await;
                self.update_if_current(address, |state| {
                    state.bookmarks = bookmarks;
                    state.loading = false;
                    state.last_error = None;
                });
            }
            Err(err) => {
                warn!(address = %address, error = %err, "Bookmark refresh failed, keeping cached list");
                self.update_if_current(address, |state| {
                    state.loading = false;
                    state.last_error = Some(err);
                });
            }
        }
        self.get_all_bookmarks()
    }

    /// Apply `update` only while `address` is still the connected wallet.
    fn update_if_current(&self, address: Address, update: impl FnOnce(&mut SyncState)) {
        self.state.send_if_modified(|state| {
            if state.current_address != Some(address) {
                return false;
            }
            update(state);
            true
        });
    }

    pub async fn add_bookmark(
        &self,
        platform: &str,
        profile: &ProfileInput,
    ) -> Result<TransactionReceipt, SyncError> {
        let _guard = self.mutations.lock().await;
        let address = self.require_ready()?;
        let platform = self.platform_key(address, platform)?;
        self.begin_mutation(address);
        let result = self.writer.add_bookmark(address, platform, profile).await;
        self.complete_mutation(address, result).await
    }

    pub async fn remove_bookmark(&self, platform: &str) -> Result<TransactionReceipt, SyncError> {
        let _guard = self.mutations.lock().await;
        let address = self.require_ready()?;
        let platform = self.platform_key(address, platform)?;
        self.begin_mutation(address);
        let result = self.writer.remove_bookmark(address, platform).await;
        self.complete_mutation(address, result).await
    }

    /// Add or remove depending on what the contract says right now; the local
    /// list may be stale.
    pub async fn toggle_bookmark(
        &self,
        platform: &str,
        profile: &ProfileInput,
    ) -> Result<ToggleOutcome, SyncError> {
        let _guard = self.mutations.lock().await;
        let address = self.require_ready()?;
        let platform = self.platform_key(address, platform)?;
        self.begin_mutation(address);

        let bookmarked = match self.reader.check_bookmarked(address, platform).await {
            Ok(bookmarked) => bookmarked,
            Err(err) => {
                self.record_error(address, &err);
                return Err(err);
            }
        };

        if bookmarked {
            let result = self.writer.remove_bookmark(address, platform).await;
            self.complete_mutation(address, result)
                .await
                .map(ToggleOutcome::Removed)
        } else {
            let result = self.writer.add_bookmark(address, platform, profile).await;
            self.complete_mutation(address, result)
                .await
                .map(ToggleOutcome::Added)
        }
    }

    pub async fn clear_all_bookmarks(&self) -> Result<TransactionReceipt, SyncError> {
        let _guard = self.mutations.lock().await;
        let address = self.require_ready()?;
        self.begin_mutation(address);
        let result = self.writer.clear_all(address).await;
        self.complete_mutation(address, result).await
    }

    async fn complete_mutation(
        &self,
        address: Address,
        result: Result<TransactionReceipt, SyncError>,
    ) -> Result<TransactionReceipt, SyncError> {
        match result {
            Ok(receipt) => {
                self.read_through(address).await;
                Ok(receipt)
            }
            Err(err) => {
                self.record_error(address, &err);
                Err(err)
            }
        }
    }

    fn platform_key<'a>(&self, address: Address, platform: &'a str) -> Result<&'a str, SyncError> {
        normalize_platform(platform).inspect_err(|err| self.record_error(address, err))
    }

    /// Mark the write as outstanding from the signature prompt until the
    /// post-write read settles.
    fn begin_mutation(&self, address: Address) {
        self.update_if_current(address, |state| {
            state.loading = true;
            state.last_error = None;
        });
    }

    fn record_error(&self, address: Address, err: &SyncError) {
        self.update_if_current(address, |state| {
            state.loading = false;
            state.last_error = Some(err.clone());
        });
    }

    /// Disconnect: forget the wallet but keep showing its bookmarks.
    pub async fn cleanup(&self) {
        let mut kept = Vec::new();
        {
            let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
            *phase = Phase::Uninitialized;
            self.writer.unbind();
            self.state.send_modify(|state| {
                state.current_address = None;
                state.loading = false;
                state.last_error = None;
                kept = state.bookmarks.clone();
            });
        }
        self.cache.save(&CacheKey::Default, &kept).await;
        info!(count = kept.len(), "Bookmark sync cleaned up");
    }

    /// Drive initialization and cleanup from wallet account changes until
    /// `shutdown` fires or the session goes away.
    pub async fn follow_session(
        self: Arc<Self>,
        mut accounts: watch::Receiver<Option<Address>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let account = *accounts.borrow_and_update();
            match account {
                Some(address) => {
                    if let Err(err) = self.initialize_with_wallet(address).await {
                        warn!(address = %address, error = %err, "Wallet initialization failed");
                    }
                }
                None if self.is_active() => self.cleanup().await,
                None => {}
            }

            tokio::select! {
                changed = accounts.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Wallet session follower stopped");
    }

    /// Read-only view of any wallet's bookmarks. Leaves controller state alone.
    pub async fn bookmarks_for(&self, address: Address) -> Result<Vec<BookmarkedProfile>, SyncError> {
        self.reader.bookmarks_for(address).await
    }

    pub async fn count_for(&self, address: Address) -> Result<u64, SyncError> {
        self.reader.bookmark_count(address).await
    }

    pub fn chain_transport(&self) -> &FallbackTransport {
        self.reader.transport()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn get_all_bookmarks(&self) -> Vec<BookmarkedProfile> {
        self.state.borrow().bookmarks.clone()
    }

    pub fn get_bookmark(&self, platform: &str) -> Option<BookmarkedProfile> {
        let platform = platform.trim();
        self.state
            .borrow()
            .bookmarks
            .iter()
            .find(|bookmark| bookmark.platform == platform)
            .cloned()
    }

    /// Local membership check. May be stale; toggling re-checks on-chain.
    pub fn is_bookmarked_local(&self, platform: &str) -> bool {
        let platform = platform.trim();
        self.state
            .borrow()
            .bookmarks
            .iter()
            .any(|bookmark| bookmark.platform == platform)
    }

    pub fn bookmark_count(&self) -> usize {
        self.state.borrow().bookmarks.len()
    }

    pub fn current_address(&self) -> Option<Address> {
        self.state.borrow().current_address
    }

    pub fn is_initialized(&self) -> bool {
        self.ready_address().is_some()
    }

    pub fn phase_label(&self) -> &'static str {
        match &*self.phase.lock().unwrap_or_else(PoisonError::into_inner) {
            Phase::Uninitialized => "uninitialized",
            Phase::Initializing { .. } => "initializing",
            Phase::Ready { .. } => "ready",
        }
    }

    fn is_active(&self) -> bool {
        !matches!(
            &*self.phase.lock().unwrap_or_else(PoisonError::into_inner),
            Phase::Uninitialized
        ) || self.current_address().is_some()
    }

    fn ready_address(&self) -> Option<Address> {
        match &*self.phase.lock().unwrap_or_else(PoisonError::into_inner) {
            Phase::Ready { address } => Some(*address),
            _ => None,
        }
    }

    fn require_ready(&self) -> Result<Address, SyncError> {
        self.ready_address()
            .ok_or_else(SyncError::wallet_not_connected)
    }

    fn owner(&self) -> Option<Address> {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_generation(phase: &Phase, generation: u64) -> bool {
    matches!(phase, Phase::Initializing { generation: pending, .. } if *pending == generation)
}
