//! Error types for wallet, chain and proxy operations
//!
//! Errors raised at the provider, chain client or proxy boundary are never
//! swallowed; the money-market form records them for display and still
//! re-fetches the snapshot.

use alloy_primitives::{B256, U256};
use thiserror::Error;

/// EIP-1193 "user rejected request" error code.
pub const USER_REJECTED_CODE: i64 = 4001;

/// JSON-RPC error code used by nodes for `execution reverted`.
pub const EXECUTION_REVERTED_CODE: i64 = 3;

pub type Result<T> = std::result::Result<T, CompoundError>;

#[derive(Error, Debug)]
pub enum CompoundError {
    /// The wallet refused to authorize the connection.
    #[error("Wallet connection cancelled by user")]
    UserCancelled,

    /// RPC or transport failure (no automatic retry).
    #[error("Provider error: {0}")]
    Provider(String),

    /// The wallet declined to sign a transaction.
    #[error("Signature request rejected: {0}")]
    SignatureRejected(String),

    /// The chain rejected a call or mined a failed transaction.
    #[error("Transaction reverted{}: {reason}", hash_suffix(.tx_hash))]
    Reverted {
        tx_hash: Option<B256>,
        reason: String,
    },

    /// Invalid user input, raised before any network call.
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Wallet not connected")]
    NotConnected,

    #[error("A submission is already in flight")]
    SubmissionInFlight,

    /// The top-up transfer landed but the deposit batch did not.
    #[error("Deposit incomplete, {parked} base units parked at the proxy: {source}")]
    DepositIncomplete {
        parked: U256,
        #[source]
        source: Box<CompoundError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn hash_suffix(tx_hash: &Option<B256>) -> String {
    tx_hash.map(|h| format!(" ({})", h)).unwrap_or_default()
}

impl From<alloy_sol_types::Error> for CompoundError {
    fn from(err: alloy_sol_types::Error) -> Self {
        CompoundError::Abi(err.to_string())
    }
}

impl CompoundError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn reverted(tx_hash: Option<B256>, reason: impl Into<String>) -> Self {
        Self::Reverted {
            tx_hash,
            reason: reason.into(),
        }
    }

    /// Map a JSON-RPC error object onto the error taxonomy.
    pub fn from_rpc(code: i64, message: &str) -> Self {
        if code == USER_REJECTED_CODE {
            Self::SignatureRejected(message.to_string())
        } else if code == EXECUTION_REVERTED_CODE || message.contains("revert") {
            Self::reverted(None, message)
        } else {
            Self::Provider(format!("RPC error {}: {}", code, message))
        }
    }

    /// Whether the error means the chain refused the operation.
    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted { .. })
    }
}
