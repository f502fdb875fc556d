/// Axum HTTP handlers: the JSON-RPC endpoint plus test helpers

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use axum::{extract::State, http::StatusCode, Json};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::RpcError;
use crate::ledger::{Ledger, MinedTransaction};
use crate::types::*;

/// Shared application state
pub type AppState = Arc<Mutex<Ledger>>;

pub fn lock(state: &AppState) -> MutexGuard<'_, Ledger> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn param<T: DeserializeOwned>(params: &Value, index: usize) -> Result<T, RpcError> {
    let value = params
        .get(index)
        .cloned()
        .ok_or_else(|| RpcError::InvalidParams(format!("missing parameter #{}", index)))?;
    serde_json::from_value(value)
        .map_err(|e| RpcError::InvalidParams(format!("parameter #{}: {}", index, e)))
}

fn call_target(request: &CallRequest) -> Result<Address, RpcError> {
    request
        .to
        .ok_or_else(|| RpcError::InvalidParams("contract creation is not supported".to_string()))
}

/// Execute one JSON-RPC method against the ledger.
pub fn dispatch(ledger: &mut Ledger, method: &str, params: &Value) -> Result<Value, RpcError> {
    match method {
        "eth_accounts" => Ok(json!(ledger.accounts())),
        "eth_requestAccounts" => {
            if ledger.config().reject_authorization {
                Err(RpcError::UserRejected)
            } else {
                Ok(json!(ledger.accounts()))
            }
        }
        "net_version" => Ok(json!(ledger.config().network_id.to_string())),
        "eth_chainId" => Ok(json!(U64::from(ledger.config().chain_id))),
        "eth_blockNumber" => Ok(json!(U64::from(ledger.block_number()))),
        "eth_gasPrice" => Ok(json!(ledger.config().gas_price)),
        "eth_getCode" => {
            let address: Address = param(params, 0)?;
            Ok(json!(ledger.code_at(address)))
        }
        "eth_getTransactionCount" => {
            let address: Address = param(params, 0)?;
            Ok(json!(U64::from(ledger.nonce(address))))
        }
        "eth_call" => {
            let request: CallRequest = param(params, 0)?;
            let output = ledger.call(
                request.from.unwrap_or_default(),
                call_target(&request)?,
                request.value.unwrap_or_default(),
                &request.data.clone().unwrap_or_default(),
            )?;
            Ok(json!(output))
        }
        "eth_estimateGas" => {
            let request: CallRequest = param(params, 0)?;
            let gas = ledger.estimate_gas(
                request.from.unwrap_or_default(),
                call_target(&request)?,
                request.value.unwrap_or_default(),
                &request.data.clone().unwrap_or_default(),
            )?;
            Ok(json!(U64::from(gas)))
        }
        "eth_sendTransaction" => {
            let request: CallRequest = param(params, 0)?;
            let from = request
                .from
                .ok_or_else(|| RpcError::InvalidParams("missing sender".to_string()))?;
            let hash = ledger.send_transaction(
                from,
                call_target(&request)?,
                request.value.unwrap_or_default(),
                request.data.unwrap_or_default(),
            )?;
            Ok(json!(hash))
        }
        "eth_sendRawTransaction" => {
            let raw: Bytes = param(params, 0)?;
            Ok(json!(ledger.send_raw_transaction(&raw)?))
        }
        "eth_getTransactionReceipt" => {
            let hash: B256 = param(params, 0)?;
            Ok(ledger
                .receipt(hash)
                .map(|tx| json!(ReceiptResponse::from(tx)))
                .unwrap_or(Value::Null))
        }
        other => Err(RpcError::MethodNotFound(other.to_string())),
    }
}

/// POST /
/// JSON-RPC 2.0 endpoint
pub async fn json_rpc(
    State(ledger): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let outcome = dispatch(&mut lock(&ledger), &request.method, &request.params);
    Json(match outcome {
        Ok(result) => {
            log::debug!("{} -> ok", request.method);
            JsonRpcResponse::result(request.id, result)
        }
        Err(err) => {
            log::debug!("{} -> {}", request.method, err);
            JsonRpcResponse::error(request.id, &err)
        }
    })
}

// ============================================================================
// TEST HELPER ENDPOINTS (not part of the Ethereum JSON-RPC API)
// ============================================================================

/// POST /mock/fund
/// Credit whole DAI to an address
pub async fn fund(
    State(ledger): State<AppState>,
    Json(request): Json<FundRequest>,
) -> Result<Json<FundResponse>, (StatusCode, String)> {
    let amount = U256::from(request.amount)
        .checked_mul(U256::from(10u64).pow(U256::from(18u64)))
        .ok_or((StatusCode::BAD_REQUEST, "amount too large".to_string()))?;

    let mut ledger = lock(&ledger);
    ledger.fund(request.address, amount);
    Ok(Json(FundResponse {
        address: request.address,
        balance: ledger.dai_balance(request.address),
    }))
}

/// GET /mock/transactions
/// Every mined transaction with its call trace
pub async fn transactions(State(ledger): State<AppState>) -> Json<Vec<MinedTransaction>> {
    Json(lock(&ledger).transactions().to_vec())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
