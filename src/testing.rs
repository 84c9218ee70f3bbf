//! In-memory stand-ins for the chain, wallet and cache used by unit tests.
//!
//! `FakeChain` answers `eth_call` and receipt queries for the bookmark and
//! reputation contracts by decoding real calldata with the production ABI.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolInterface};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;

use crate::chain::{Bookmark, IBookmarkRegistry, IReputationRegistry};
use crate::errors::{ErrorKind, SyncError};
use crate::models::bookmark::BookmarkedProfile;
use crate::rpc::{EthTransport, decode_hex};
use crate::store::{CacheKey, CacheStore};
use crate::wallet::{TransactionRequest, WalletProvider, WalletSigner};

pub fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

pub fn dyn_endpoints(
    scripted: &[Arc<ScriptedEndpoint>],
    chains: &[Arc<FakeChain>],
) -> Vec<Arc<dyn EthTransport>> {
    let mut endpoints: Vec<Arc<dyn EthTransport>> = Vec::new();
    for endpoint in scripted {
        endpoints.push(endpoint.clone());
    }
    for chain in chains {
        endpoints.push(chain.clone());
    }
    endpoints
}

#[derive(Clone)]
pub enum EndpointBehavior {
    Respond(Value),
    Fail(SyncError),
    Hang,
}

pub struct ScriptedEndpoint {
    label: String,
    behavior: EndpointBehavior,
    calls: AtomicUsize,
}

impl ScriptedEndpoint {
    pub fn new(label: &str, behavior: EndpointBehavior) -> Self {
        Self {
            label: label.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EthTransport for ScriptedEndpoint {
    fn endpoint(&self) -> &str {
        &self.label
    }

    async fn request(&self, _method: &str, _params: Vec<Value>) -> Result<Value, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            EndpointBehavior::Respond(value) => Ok(value.clone()),
            EndpointBehavior::Fail(err) => Err(err.clone()),
            EndpointBehavior::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
struct ChainState {
    bookmarks: HashMap<Address, Vec<Bookmark>>,
    notes: HashMap<Address, Vec<IReputationRegistry::notesReturn>>,
    receipts: HashMap<B256, Value>,
    read_calls: HashMap<&'static str, usize>,
    total_calls: usize,
    failing_reads: usize,
    offline: bool,
    revert_next_write: bool,
    nonce: u64,
}

pub struct FakeChain {
    label: String,
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub const CHAIN_ID: u64 = 44_787;
    const GENESIS_TIME: u64 = 1_700_000_000;

    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn contract() -> Address {
        Address::repeat_byte(0xc0)
    }

    pub fn seed(&self, user: Address, platform: &str, username: &str, timestamp: u64, exists: bool) {
        let mut state = self.lock();
        state.bookmarks.entry(user).or_default().push(Bookmark {
            platform: platform.to_string(),
            username: username.to_string(),
            avatar: String::new(),
            profileUrl: format!("https://{platform}.example/{username}"),
            timestamp: U256::from(timestamp),
            exists,
        });
    }

    pub fn seed_note(&self, target: Address, reviewer: Address, message: &str, score: u8) {
        let mut state = self.lock();
        state
            .notes
            .entry(target)
            .or_default()
            .push(IReputationRegistry::notesReturn {
                reviewer,
                message: message.to_string(),
                score,
                timestamp: U256::from(Self::GENESIS_TIME),
            });
    }

    /// Fail the next `count` contract reads with a transport error.
    pub fn fail_next_reads(&self, count: usize) {
        self.lock().failing_reads = count;
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn revert_next_write(&self) {
        self.lock().revert_next_write = true;
    }

    pub fn read_calls(&self, function: &str) -> usize {
        self.lock().read_calls.get(function).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().total_calls
    }

    /// Live platforms of `user`, in contract order.
    pub fn platforms(&self, user: Address) -> Vec<String> {
        self.lock()
            .bookmarks
            .get(&user)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record.exists)
                    .map(|record| record.platform.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().expect("fake chain lock")
    }

    fn apply_write(&self, from: Address, to: Address, data: &[u8]) -> Result<B256, SyncError> {
        let mut state = self.lock();
        if to != Self::contract() {
            return Err(SyncError::contract("unknown contract"));
        }
        state.nonce += 1;
        let nonce = state.nonce;
        let hash = B256::left_padding_from(&nonce.to_be_bytes());
        let timestamp = U256::from(Self::GENESIS_TIME + nonce);

        let reverted = std::mem::take(&mut state.revert_next_write);
        if !reverted {
            if let Ok(call) = IBookmarkRegistry::IBookmarkRegistryCalls::abi_decode(data) {
                apply_bookmark_write(&mut state, from, call, timestamp)?;
            } else {
                let call = IReputationRegistry::IReputationRegistryCalls::abi_decode(data)?;
                if let IReputationRegistry::IReputationRegistryCalls::addNote(note) = call {
                    state
                        .notes
                        .entry(note._target)
                        .or_default()
                        .push(IReputationRegistry::notesReturn {
                            reviewer: from,
                            message: note._message,
                            score: note._score,
                            timestamp,
                        });
                }
            }
        }

        state.receipts.insert(
            hash,
            json!({
                "transactionHash": format!("{hash:#x}"),
                "blockNumber": format!("0x{nonce:x}"),
                "status": if reverted { "0x0" } else { "0x1" },
            }),
        );
        Ok(hash)
    }

    fn eth_call(&self, state: &mut ChainState, data: &[u8]) -> Result<Vec<u8>, SyncError> {
        if let Ok(call) = IBookmarkRegistry::IBookmarkRegistryCalls::abi_decode(data) {
            use IBookmarkRegistry::IBookmarkRegistryCalls as Calls;
            return match call {
                Calls::getAllBookmarks(call) => {
                    *state.read_calls.entry("getAllBookmarks").or_default() += 1;
                    check_read(state)?;
                    let records = state.bookmarks.get(&call._user).cloned().unwrap_or_default();
                    Ok(IBookmarkRegistry::getAllBookmarksCall::abi_encode_returns(&records))
                }
                Calls::isBookmarked(call) => {
                    *state.read_calls.entry("isBookmarked").or_default() += 1;
                    check_read(state)?;
                    let found = live(state, call._user)
                        .any(|record| record.platform == call._platform);
                    Ok(IBookmarkRegistry::isBookmarkedCall::abi_encode_returns(&found))
                }
                Calls::getBookmarkCount(call) => {
                    *state.read_calls.entry("getBookmarkCount").or_default() += 1;
                    check_read(state)?;
                    let count = U256::from(live(state, call._user).count() as u64);
                    Ok(IBookmarkRegistry::getBookmarkCountCall::abi_encode_returns(&count))
                }
                _ => Err(SyncError::contract("execution reverted: not a view function")),
            };
        }

        use IReputationRegistry::IReputationRegistryCalls as Calls;
        let call = Calls::abi_decode(data)?;
        check_read(state)?;
        match call {
            Calls::getAverageScore(call) => {
                let notes = state.notes.get(&call._target).cloned().unwrap_or_default();
                let average = if notes.is_empty() {
                    0
                } else {
                    notes.iter().map(|note| u64::from(note.score)).sum::<u64>() * 100
                        / notes.len() as u64
                };
                Ok(IReputationRegistry::getAverageScoreCall::abi_encode_returns(
                    &U256::from(average),
                ))
            }
            Calls::reviewCount(call) => {
                let count = state.notes.get(&call.target).map_or(0, Vec::len) as u64;
                Ok(IReputationRegistry::reviewCountCall::abi_encode_returns(
                    &U256::from(count),
                ))
            }
            Calls::notes(call) => {
                let index = call.index.saturating_to::<usize>();
                let note = state
                    .notes
                    .get(&call.target)
                    .and_then(|notes| notes.get(index))
                    .cloned()
                    .ok_or_else(|| SyncError::contract("execution reverted: index out of bounds"))?;
                Ok(IReputationRegistry::notesCall::abi_encode_returns(&note))
            }
            Calls::hasReviewed(call) => {
                let reviewed = state
                    .notes
                    .get(&call.target)
                    .is_some_and(|notes| notes.iter().any(|note| note.reviewer == call.reviewer));
                Ok(IReputationRegistry::hasReviewedCall::abi_encode_returns(&reviewed))
            }
            Calls::addNote(_) => Err(SyncError::contract("execution reverted: not a view function")),
        }
    }
}

fn live(state: &ChainState, user: Address) -> impl Iterator<Item = &Bookmark> {
    state
        .bookmarks
        .get(&user)
        .into_iter()
        .flatten()
        .filter(|record| record.exists)
}

fn check_read(state: &mut ChainState) -> Result<(), SyncError> {
    if state.offline {
        return Err(SyncError::new(ErrorKind::NetworkUnreachable, "connection refused"));
    }
    if state.failing_reads > 0 {
        state.failing_reads -= 1;
        return Err(SyncError::new(ErrorKind::NetworkUnreachable, "connection reset"));
    }
    Ok(())
}

fn apply_bookmark_write(
    state: &mut ChainState,
    from: Address,
    call: IBookmarkRegistry::IBookmarkRegistryCalls,
    timestamp: U256,
) -> Result<(), SyncError> {
    use IBookmarkRegistry::IBookmarkRegistryCalls as Calls;
    let records = state.bookmarks.entry(from).or_default();
    match call {
        Calls::addBookmark(call) => {
            match records.iter_mut().find(|record| record.platform == call._platform) {
                Some(record) if record.exists => {
                    return Err(SyncError::from_rpc_code(3, "execution reverted: Already bookmarked"));
                }
                Some(record) => {
                    record.username = call._username;
                    record.avatar = call._avatar;
                    record.profileUrl = call._profileUrl;
                    record.timestamp = timestamp;
                    record.exists = true;
                }
                None => records.push(Bookmark {
                    platform: call._platform,
                    username: call._username,
                    avatar: call._avatar,
                    profileUrl: call._profileUrl,
                    timestamp,
                    exists: true,
                }),
            }
        }
        Calls::removeBookmark(call) => {
            let record = records
                .iter_mut()
                .find(|record| record.platform == call._platform && record.exists)
                .ok_or_else(|| SyncError::from_rpc_code(3, "execution reverted: Bookmark does not exist"))?;
            record.exists = false;
        }
        Calls::clearAllBookmarks(_) => {
            for record in records.iter_mut() {
                record.exists = false;
            }
        }
        _ => return Err(SyncError::contract("execution reverted: view function")),
    }
    Ok(())
}

#[async_trait]
impl EthTransport for FakeChain {
    fn endpoint(&self) -> &str {
        &self.label
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, SyncError> {
        let mut state = self.lock();
        state.total_calls += 1;
        match method {
            "eth_call" => {
                let data = params
                    .first()
                    .and_then(|call| call["data"].as_str())
                    .ok_or_else(|| SyncError::contract("missing calldata"))?;
                let data = decode_hex(data)?;
                let output = self.eth_call(&mut state, &data)?;
                Ok(Value::String(format!("0x{}", hex::encode(output))))
            }
            "eth_getTransactionReceipt" => {
                let hash = params
                    .first()
                    .and_then(Value::as_str)
                    .and_then(|hash| hash.parse::<B256>().ok())
                    .ok_or_else(|| SyncError::contract("bad hash"))?;
                Ok(state.receipts.get(&hash).cloned().unwrap_or(Value::Null))
            }
            "eth_chainId" => Ok(Value::String(format!("0x{:x}", Self::CHAIN_ID))),
            other => Err(SyncError::from_rpc_code(-32601, &format!("{other} not supported"))),
        }
    }
}

pub struct FakeSigner {
    address: Address,
    chain: Arc<FakeChain>,
    chain_id: AtomicU64,
    allow_switch: bool,
    reject: bool,
    gate: Option<Arc<Notify>>,
    switches: AtomicUsize,
    sent: AtomicUsize,
}

impl FakeSigner {
    pub fn new(address: Address, chain: Arc<FakeChain>) -> Self {
        Self {
            address,
            chain,
            chain_id: AtomicU64::new(FakeChain::CHAIN_ID),
            allow_switch: true,
            reject: false,
            gate: None,
            switches: AtomicUsize::new(0),
            sent: AtomicUsize::new(0),
        }
    }

    pub fn on_chain(self, chain_id: u64) -> Self {
        self.chain_id.store(chain_id, Ordering::SeqCst);
        self
    }

    pub fn refuse_switch(mut self) -> Self {
        self.allow_switch = false;
        self
    }

    pub fn reject_signatures(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Holds every transaction until `gate` is notified, like a wallet popup
    /// waiting on the user.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn switch_requests(&self) -> usize {
        self.switches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSigner for FakeSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> Result<u64, SyncError> {
        Ok(self.chain_id.load(Ordering::SeqCst))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), SyncError> {
        self.switches.fetch_add(1, Ordering::SeqCst);
        if !self.allow_switch {
            return Err(SyncError::from_rpc_code(4902, "Unrecognized chain ID"));
        }
        self.chain_id.store(chain_id, Ordering::SeqCst);
        Ok(())
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<B256, SyncError> {
        if self.reject {
            return Err(SyncError::from_rpc_code(4001, "User rejected the request."));
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        assert_eq!(request.from, self.address, "signer asked to sign for another account");
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.chain.apply_write(request.from, request.to, &request.data)
    }
}

#[derive(Default)]
pub struct FakeWallet {
    signers: Mutex<HashMap<Address, Arc<FakeSigner>>>,
}

impl FakeWallet {
    pub fn with_signer(signer: Arc<FakeSigner>) -> Self {
        let wallet = Self::default();
        wallet.add(signer);
        wallet
    }

    pub fn add(&self, signer: Arc<FakeSigner>) {
        self.signers
            .lock()
            .expect("wallet lock")
            .insert(signer.address(), signer);
    }
}

impl WalletProvider for FakeWallet {
    fn signer(&self, address: Address) -> Option<Arc<dyn WalletSigner>> {
        let signers = self.signers.lock().expect("wallet lock");
        let signer = signers.get(&address)?;
        Some(signer.clone())
    }
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Vec<BookmarkedProfile>>>,
}

impl MemoryCacheStore {
    pub fn seed(&self, key: &CacheKey, bookmarks: Vec<BookmarkedProfile>) {
        self.entries
            .lock()
            .expect("cache lock")
            .insert(key.storage_key(), bookmarks);
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<BookmarkedProfile>> {
        self.entries
            .lock()
            .expect("cache lock")
            .get(&key.storage_key())
            .cloned()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn load(&self, key: &CacheKey) -> Vec<BookmarkedProfile> {
        self.get(key).unwrap_or_default()
    }

    async fn save(&self, key: &CacheKey, bookmarks: &[BookmarkedProfile]) {
        self.seed(key, bookmarks.to_vec());
    }
}

pub fn profile(platform: &str, username: &str, bookmarked_at: i64) -> BookmarkedProfile {
    BookmarkedProfile {
        platform: platform.to_string(),
        username: username.to_string(),
        avatar: None,
        url: format!("https://{platform}.example/{username}"),
        bookmarked_at,
    }
}
