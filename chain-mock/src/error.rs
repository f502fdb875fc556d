/// Error types of the mock node

use alloy_primitives::Address;
use alloy_sol_types::SolError;
use serde_json::Value;
use thiserror::Error;

/// A simulated contract refused the call; the whole transaction is rolled back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct Revert {
    pub reason: String,
}

impl Revert {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// `Error(string)` revert data as returned by real nodes.
    pub fn encoded(&self) -> Vec<u8> {
        alloy_sol_types::Revert {
            reason: self.reason.clone(),
        }
        .abi_encode()
    }
}

impl From<alloy_sol_types::Error> for Revert {
    fn from(err: alloy_sol_types::Error) -> Self {
        Revert::new(format!("malformed calldata: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("execution reverted")]
    Reverted(#[from] Revert),

    #[error("User rejected the request.")]
    UserRejected,

    #[error("unknown account {0}")]
    UnknownAccount(Address),

    #[error("nonce too low: expected {expected}, got {got}")]
    Nonce { expected: u64, got: u64 },

    #[error("invalid raw transaction: {0}")]
    RawTransaction(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("the method {0} does not exist/is not available")]
    MethodNotFound(String),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::Reverted(_) => 3,
            RpcError::UserRejected => 4001,
            RpcError::InvalidParams(_) => -32602,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::UnknownAccount(_) | RpcError::Nonce { .. } | RpcError::RawTransaction(_) => {
                -32000
            }
        }
    }

    pub fn data(&self) -> Option<Value> {
        match self {
            RpcError::Reverted(revert) => Some(Value::String(format!(
                "0x{}",
                hex::encode(revert.encoded())
            ))),
            _ => None,
        }
    }
}
