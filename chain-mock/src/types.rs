/// JSON-RPC wire types
///
/// Quantities and data are hex strings, as on a real Ethereum node.

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;
use crate::ledger::MinedTransaction;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, err: &RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcErrorObject {
                code: err.code(),
                message: err.to_string(),
                data: err.data(),
            }),
        }
    }
}

/// Transaction object of `eth_call`, `eth_estimateGas` and
/// `eth_sendTransaction`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default, alias = "input")]
    pub data: Option<Bytes>,
    #[serde(default)]
    pub gas: Option<U64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub transaction_hash: B256,
    pub block_number: U64,
    pub from: Address,
    pub to: Address,
    pub gas_used: U256,
    pub status: U64,
}

impl From<&MinedTransaction> for ReceiptResponse {
    fn from(tx: &MinedTransaction) -> Self {
        Self {
            transaction_hash: tx.hash,
            block_number: U64::from(tx.block_number),
            from: tx.from,
            to: tx.to,
            gas_used: U256::from(21_000u64 + 40_000 * tx.calls.len() as u64),
            status: U64::from(tx.succeeded as u64),
        }
    }
}

/// Body of `POST /mock/fund`.
#[derive(Debug, Clone, Deserialize)]
pub struct FundRequest {
    pub address: Address,
    /// Whole DAI
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FundResponse {
    pub address: Address,
    pub balance: U256,
}
