//! Wallet session and signer seam.
//!
//! Signing is delegated to an external EIP-1193 provider reached over
//! JSON-RPC; this service never holds keys.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::WalletConfig;
use crate::errors::{ErrorKind, SyncError};
use crate::rpc::{EthTransport, RpcClient, encode_hex, parse_quantity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
}

impl TransactionRequest {
    fn to_json(&self) -> Value {
        json!({
            "from": format!("{:#x}", self.from),
            "to": format!("{:#x}", self.to),
            "data": encode_hex(&self.data),
        })
    }
}

/// A component bound to a connected wallet that can produce signed
/// transactions.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Address;

    async fn chain_id(&self) -> Result<u64, SyncError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), SyncError>;

    /// Submit for signing and broadcast; returns the transaction hash.
    async fn send_transaction(&self, request: &TransactionRequest) -> Result<B256, SyncError>;
}

/// Source of signers for connected accounts.
pub trait WalletProvider: Send + Sync {
    fn signer(&self, address: Address) -> Option<Arc<dyn WalletSigner>>;
}

/// Make sure `signer` is on `expected`, asking the wallet to switch if not.
pub async fn ensure_chain(signer: &dyn WalletSigner, expected: u64) -> Result<(), SyncError> {
    let current = signer.chain_id().await?;
    if current == expected {
        return Ok(());
    }

    info!(current, expected, "Requesting wallet network switch");
    signer.switch_chain(expected).await.map_err(|err| {
        if err.kind() == ErrorKind::TransactionRejected {
            err
        } else {
            SyncError::new(
                ErrorKind::WrongNetwork,
                format!("Unable to switch wallet to chain {expected}: {err}"),
            )
        }
    })?;

    let switched = signer.chain_id().await?;
    if switched != expected {
        return Err(SyncError::new(
            ErrorKind::WrongNetwork,
            format!("Wallet is on chain {switched}, expected {expected}"),
        ));
    }
    Ok(())
}

pub struct RpcWalletSigner {
    client: RpcClient,
    address: Address,
}

impl RpcWalletSigner {
    pub fn new(client: RpcClient, address: Address) -> Self {
        Self { client, address }
    }
}

#[async_trait]
impl WalletSigner for RpcWalletSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> Result<u64, SyncError> {
        let value = self.client.request("eth_chainId", vec![]).await?;
        value
            .as_str()
            .and_then(parse_quantity)
            .ok_or_else(|| SyncError::from_message(&format!("Unexpected eth_chainId result {value}")))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), SyncError> {
        self.client
            .request(
                "wallet_switchEthereumChain",
                vec![json!({ "chainId": format!("0x{chain_id:x}") })],
            )
            .await?;
        Ok(())
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<B256, SyncError> {
        let value = self
            .client
            .request("eth_sendTransaction", vec![request.to_json()])
            .await?;
        let hash = value
            .as_str()
            .ok_or_else(|| SyncError::contract("eth_sendTransaction returned no hash"))?;
        hash.parse::<B256>()
            .map_err(|err| SyncError::contract(format!("Invalid transaction hash {hash}: {err}")))
    }
}

/// Connected-account state of the user's wallet.
///
/// Account changes are broadcast to subscribers; the bookmark controller
/// follows them to drive initialization and cleanup.
pub struct WalletSession {
    account: watch::Sender<Option<Address>>,
    provider: Option<RpcClient>,
}

impl WalletSession {
    pub fn new(config: &WalletConfig) -> anyhow::Result<Self> {
        let provider = match config.provider_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                Some(RpcClient::new(url.trim(), config.request_timeout())?)
            }
            _ => {
                warn!("No wallet provider configured; bookmark writes are disabled");
                None
            }
        };
        let (account, _) = watch::channel(None);
        Ok(Self { account, provider })
    }

    pub fn account(&self) -> Option<Address> {
        *self.account.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Address>> {
        self.account.subscribe()
    }

    pub fn connect(&self, address: Address) {
        let previous = self.account.send_replace(Some(address));
        if previous != Some(address) {
            info!(address = %address, "Wallet connected");
        }
    }

    pub fn disconnect(&self) {
        if self.account.send_replace(None).is_some() {
            info!("Wallet disconnected");
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }
}

impl WalletProvider for WalletSession {
    fn signer(&self, address: Address) -> Option<Arc<dyn WalletSigner>> {
        if self.account() != Some(address) {
            return None;
        }
        let client = self.provider.clone()?;
        Some(Arc::new(RpcWalletSigner::new(client, address)))
    }
}
