// JSON-RPC envelopes and transaction request types

use alloy_primitives::{Address, Bytes, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CompoundError, Result};

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    /// Unwrap the envelope, mapping error objects onto [`CompoundError`].
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => {
                let reason = err
                    .data
                    .as_ref()
                    .and_then(Value::as_str)
                    .and_then(|data| hex::decode(data.trim_start_matches("0x")).ok())
                    .and_then(|raw| alloy_sol_types::decode_revert_reason(&raw));
                let message = match reason {
                    Some(reason) => format!("{}: {}", err.message, reason),
                    None => err.message,
                };
                Err(CompoundError::from_rpc(err.code, &message))
            }
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Transaction object accepted by `eth_sendTransaction`, `eth_call` and
/// `eth_estimateGas`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, alias = "input", skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U64>,
}

impl TransactionRequest {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_maps_to_revert() {
        let response: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 3, "message": "execution reverted" }
        }))
        .unwrap();
        assert!(response.into_result().unwrap_err().is_revert());
    }

    #[test]
    fn test_null_result_is_not_an_error() {
        let response: JsonRpcResponse =
            serde_json::from_value(json!({ "jsonrpc": "2.0", "id": 7, "result": null })).unwrap();
        assert_eq!(response.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_transaction_request_accepts_input_alias() {
        let tx: TransactionRequest = serde_json::from_value(json!({
            "from": "0x00000000000000000000000000000000000000aa",
            "to": "0x00000000000000000000000000000000000000bb",
            "input": "0xdeadbeef",
            "value": "0x10"
        }))
        .unwrap();
        assert_eq!(tx.data.unwrap().as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(tx.value, Some(U256::from(16u64)));
    }
}
