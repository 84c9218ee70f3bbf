//! Classified errors surfaced to the UI layer.
//!
//! Transport and contract failures are folded into a small set of
//! [`ErrorKind`]s before they leave the chain boundary, so callers never have
//! to inspect raw JSON-RPC error objects.

use std::fmt;

use alloy_primitives::Address;
use jsonrpsee::core::ClientError;
use serde::Serialize;
use thiserror::Error;

/// EIP-1193: user rejected the request.
pub const CODE_USER_REJECTED: i32 = 4001;
/// EIP-1193: the requested account or method has not been authorized.
pub const CODE_UNAUTHORIZED: i32 = 4100;
/// EIP-1193: the provider is disconnected from all chains.
pub const CODE_DISCONNECTED: i32 = 4900;
/// EIP-3326: unrecognized chain id for `wallet_switchEthereumChain`.
pub const CODE_UNRECOGNIZED_CHAIN: i32 = 4902;
/// Geth-style `execution reverted`.
pub const CODE_EXECUTION_REVERTED: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkTimeout,
    NetworkUnreachable,
    ContractError,
    TransactionRejected,
    WalletNotConnected,
    WrongNetwork,
    AlreadyBookmarked,
    Unknown,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network_timeout",
            Self::NetworkUnreachable => "network_unreachable",
            Self::ContractError => "contract_error",
            Self::TransactionRejected => "transaction_rejected",
            Self::WalletNotConnected => "wallet_not_connected",
            Self::WrongNetwork => "wrong_network",
            Self::AlreadyBookmarked => "already_bookmarked",
            Self::Unknown => "unknown",
        }
    }

    /// Transport-level failures worth another attempt against the chain.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::NetworkTimeout | Self::NetworkUnreachable)
    }

    /// Banner text for the UI. `Unknown` keeps the original message instead.
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::NetworkTimeout => "The network took too long to respond. Please try again.",
            Self::NetworkUnreachable => {
                "Unable to reach the network. Please check your connection and try again."
            }
            Self::ContractError => "The bookmark contract rejected the request.",
            Self::TransactionRejected => "Transaction was rejected in your wallet.",
            Self::WalletNotConnected => "Wallet not connected. Please connect your wallet first.",
            Self::WrongNetwork => "Please switch your wallet to the supported network.",
            Self::AlreadyBookmarked => "This profile is already bookmarked.",
            Self::Unknown => "Something went wrong.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyncError {
    kind: ErrorKind,
    message: String,
}

impl SyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            kind.user_message().to_string()
        } else {
            message
        };
        Self { kind, message }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message suitable for an alert banner.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Unknown | ErrorKind::ContractError | ErrorKind::AlreadyBookmarked => {
                self.message.clone()
            }
            other => other.user_message().to_string(),
        }
    }

    pub fn wallet_not_connected() -> Self {
        Self::new(
            ErrorKind::WalletNotConnected,
            ErrorKind::WalletNotConnected.user_message(),
        )
    }

    pub fn already_bookmarked(platform: &str) -> Self {
        Self::new(
            ErrorKind::AlreadyBookmarked,
            format!("{platform} is already bookmarked"),
        )
    }

    pub fn timeout(endpoint: &str) -> Self {
        Self::new(
            ErrorKind::NetworkTimeout,
            format!("Request to {endpoint} timed out"),
        )
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContractError, message)
    }

    /// Classify a jsonrpsee client failure.
    pub fn from_rpc(err: &ClientError) -> Self {
        match err {
            ClientError::RequestTimeout => {
                Self::new(ErrorKind::NetworkTimeout, "RPC request timed out")
            }
            ClientError::Transport(inner) => Self::new(
                ErrorKind::NetworkUnreachable,
                format!("RPC transport failure: {inner}"),
            ),
            ClientError::Call(object) => Self::from_rpc_code(object.code(), object.message()),
            ClientError::ParseError(inner) => {
                Self::contract(format!("Malformed RPC response: {inner}"))
            }
            other => Self::from_message(&other.to_string()),
        }
    }

    /// Classify a JSON-RPC or EIP-1193 error object by code, then by message.
    pub fn from_rpc_code(code: i32, message: &str) -> Self {
        match code {
            CODE_USER_REJECTED => Self::new(ErrorKind::TransactionRejected, message),
            CODE_UNAUTHORIZED => Self::new(ErrorKind::WalletNotConnected, message),
            CODE_DISCONNECTED => Self::new(ErrorKind::NetworkUnreachable, message),
            CODE_UNRECOGNIZED_CHAIN => Self::new(ErrorKind::WrongNetwork, message),
            CODE_EXECUTION_REVERTED => Self::contract(message),
            _ => {
                let classified = Self::from_message(message);
                if classified.kind == ErrorKind::Unknown && is_server_error_code(code) {
                    return Self::contract(message);
                }
                classified
            }
        }
    }

    /// Heuristic classification for providers that only return text.
    pub fn from_message(message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        let kind = if contains_any(&lowered, &["user rejected", "user denied", "rejected the request"]) {
            ErrorKind::TransactionRejected
        } else if contains_any(&lowered, &["timed out", "timeout", "deadline"]) {
            ErrorKind::NetworkTimeout
        } else if contains_any(
            &lowered,
            &["connection refused", "failed to fetch", "dns", "unreachable", "connection reset"],
        ) {
            ErrorKind::NetworkUnreachable
        } else if contains_any(&lowered, &["chain mismatch", "wrong network", "unrecognized chain"]) {
            ErrorKind::WrongNetwork
        } else if contains_any(&lowered, &["already bookmarked"]) {
            ErrorKind::AlreadyBookmarked
        } else if contains_any(&lowered, &["revert", "invalid opcode", "out of gas", "abi decod"]) {
            ErrorKind::ContractError
        } else if contains_any(&lowered, &["not connected", "no account"]) {
            ErrorKind::WalletNotConnected
        } else {
            ErrorKind::Unknown
        };
        Self::new(kind, message)
    }
}

impl From<alloy_sol_types::Error> for SyncError {
    fn from(err: alloy_sol_types::Error) -> Self {
        Self::contract(format!("Failed to decode contract response: {err}"))
    }
}

/// Parse a wallet address supplied by the session or an HTTP caller.
pub fn parse_wallet_address(value: &str) -> Result<Address, SyncError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SyncError::wallet_not_connected());
    }
    trimmed
        .parse::<Address>()
        .map_err(|err| SyncError::contract(format!("Invalid wallet address {trimmed}: {err}")))
}

fn is_server_error_code(code: i32) -> bool {
    (-32099..=-32000).contains(&code) || code == -32603
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
