use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::{ErrorKind, SyncError};

/// A single JSON-RPC endpoint speaking the Ethereum API.
#[async_trait]
pub trait EthTransport: Send + Sync {
    fn endpoint(&self) -> &str;

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, SyncError>;
}

#[derive(Clone)]
pub struct RpcClient {
    inner: HttpClient,
    endpoint: String,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self {
            inner: client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl EthTransport for RpcClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, SyncError> {
        let mut array = ArrayParams::new();
        for param in params {
            array
                .insert(param)
                .map_err(|err| SyncError::contract(format!("Failed to encode {method} params: {err}")))?;
        }
        self.inner
            .request::<Value, _>(method, array)
            .await
            .map_err(|err| SyncError::from_rpc(&err))
    }
}

/// Issues each request against the configured endpoints in fixed order until
/// one answers within the timeout.
#[derive(Clone)]
pub struct FallbackTransport {
    endpoints: Vec<Arc<dyn EthTransport>>,
    timeout: Duration,
}

impl FallbackTransport {
    pub fn new(endpoints: Vec<Arc<dyn EthTransport>>, timeout: Duration) -> Self {
        assert!(
            !endpoints.is_empty(),
            "Fallback transport needs at least one endpoint"
        );
        Self { endpoints, timeout }
    }

    pub fn from_urls(urls: &[String], timeout: Duration) -> anyhow::Result<Self> {
        let mut endpoints: Vec<Arc<dyn EthTransport>> = Vec::with_capacity(urls.len());
        for url in urls {
            endpoints.push(Arc::new(RpcClient::new(url, timeout)?));
        }
        Ok(Self::new(endpoints, timeout))
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, SyncError> {
        let mut last_error: Option<SyncError> = None;
        let mut timed_out = false;

        for endpoint in &self.endpoints {
            let attempt = timeout(self.timeout, endpoint.request(method, params.clone())).await;
            let err = match attempt {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => SyncError::timeout(endpoint.endpoint()),
            };

            // A JSON-RPC error object means the node answered; another node
            // would give the same answer.
            if !err.kind().is_transient() {
                return Err(err);
            }
            timed_out |= err.kind() == ErrorKind::NetworkTimeout;
            warn!(
                endpoint = endpoint.endpoint(),
                method,
                error = %err,
                "RPC endpoint failed, falling back"
            );
            last_error = Some(err);
        }

        let err = last_error.unwrap_or_else(|| {
            SyncError::new(ErrorKind::NetworkUnreachable, "No RPC endpoints configured")
        });
        if timed_out && err.kind() != ErrorKind::NetworkTimeout {
            return Err(SyncError::new(ErrorKind::NetworkTimeout, err.message()));
        }
        Err(err)
    }

    /// `eth_call` against the latest block, returning the raw return data.
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, SyncError> {
        let call = json!({
            "to": format!("{to:#x}"),
            "data": encode_hex(data),
        });
        let value = self
            .request("eth_call", vec![call, Value::String("latest".to_string())])
            .await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| SyncError::contract("eth_call returned a non-string result"))?;
        decode_hex(encoded)
    }

    pub async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, SyncError> {
        let value = self
            .request(
                "eth_getTransactionReceipt",
                vec![Value::String(format!("{hash:#x}"))],
            )
            .await?;
        if value.is_null() {
            debug!(tx = %hash, "Receipt not yet available");
            return Ok(None);
        }
        let receipt: TransactionReceipt = serde_json::from_value(value)
            .map_err(|err| SyncError::contract(format!("Malformed transaction receipt: {err}")))?;
        Ok(Some(receipt))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
}

impl TransactionReceipt {
    /// Pre-Byzantium receipts carry no status and are treated as successful.
    pub fn succeeded(&self) -> bool {
        self.status
            .as_deref()
            .map(|status| parse_quantity(status) == Some(1))
            .unwrap_or(true)
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(parse_quantity)
    }
}

pub fn encode_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn decode_hex(value: &str) -> Result<Vec<u8>, SyncError> {
    let normalized = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(normalized)
        .map_err(|err| SyncError::contract(format!("Failed to decode hex payload: {err}")))
}

/// Parse a JSON-RPC hex quantity such as `0x1a`.
pub fn parse_quantity(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
