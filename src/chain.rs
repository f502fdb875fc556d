//! Chain client
//!
//! Thin adapter over a [`Provider`]: account and network reads, typed
//! contract calls and transaction submission with receipt polling. Failures
//! are propagated to the caller untouched, never retried.

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::abi::InterfaceCall;
use crate::error::{CompoundError, Result};
use crate::provider::{Provider, TransactionRequest};

/// Mined transaction outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub gas_used: Option<U256>,
    /// 1 = success, 0 = reverted; absent on pre-Byzantium chains
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s == U64::from(1u64))
    }
}

#[derive(Clone)]
pub struct ChainClient {
    provider: Arc<dyn Provider>,
    poll_interval: Duration,
    max_attempts: Option<u32>,
}

impl ChainClient {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            poll_interval: Duration::from_secs(2),
            max_attempts: None,
        }
    }

    /// Configure receipt polling; `max_attempts = None` waits indefinitely.
    pub fn with_receipt_polling(mut self, interval: Duration, max_attempts: Option<u32>) -> Self {
        self.poll_interval = interval;
        self.max_attempts = max_attempts;
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    async fn request<T: serde::de::DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let raw = self.provider.request(method, params).await?;
        serde_json::from_value(raw)
            .map_err(|e| CompoundError::provider(format!("malformed {} response: {}", method, e)))
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.request("eth_accounts", json!([])).await
    }

    /// Ask the wallet to authorize account access.
    pub async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.request("eth_requestAccounts", json!([])).await
    }

    /// Network id as reported by `net_version` (a decimal string).
    pub async fn network_id(&self) -> Result<u64> {
        let raw: Value = self.request("net_version", json!([])).await?;
        let parsed = match &raw {
            Value::String(s) if s.starts_with("0x") => u64::from_str_radix(&s[2..], 16).ok(),
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        };
        parsed.ok_or_else(|| CompoundError::provider(format!("malformed net_version: {}", raw)))
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    pub async fn code_at(&self, address: Address) -> Result<Bytes> {
        self.request("eth_getCode", json!([address, "latest"])).await
    }

    /// Read-only execution against the latest block (no gas, no signature).
    pub async fn call_raw(&self, tx: &TransactionRequest) -> Result<Bytes> {
        self.request("eth_call", json!([tx, "latest"])).await
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<B256> {
        self.request("eth_sendTransaction", json!([tx])).await
    }

    /// Poll until the transaction is mined.
    pub async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let receipt: Option<TransactionReceipt> = self
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }

            if let Some(max) = self.max_attempts {
                if attempt >= max {
                    return Err(CompoundError::provider(format!(
                        "transaction {} not mined after {} attempts",
                        tx_hash, max
                    )));
                }
            }
            log::debug!("Waiting for {} (attempt {})", tx_hash, attempt);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Submit, wait for the receipt and fail if the transaction reverted.
    pub async fn send_and_confirm(&self, tx: &TransactionRequest) -> Result<TransactionReceipt> {
        let tx_hash = self.send_transaction(tx).await?;
        log::info!("📤 Submitted transaction {}", tx_hash);

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            return Err(CompoundError::reverted(
                Some(tx_hash),
                "transaction mined with status 0",
            ));
        }
        log::info!(
            "✅ Transaction {} mined in block {}",
            tx_hash,
            receipt.block_number.map(|b| b.to::<u64>()).unwrap_or_default()
        );
        Ok(receipt)
    }

    pub fn contract<I>(&self, address: Address) -> Contract<I> {
        Contract {
            address,
            chain: self.clone(),
            _interface: PhantomData,
        }
    }
}

/// Contract handle typed by its ABI marker (see [`crate::abi`]).
pub struct Contract<I> {
    address: Address,
    chain: ChainClient,
    _interface: PhantomData<fn() -> I>,
}

impl<I> Clone for Contract<I> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            chain: self.chain.clone(),
            _interface: PhantomData,
        }
    }
}

impl<I> Contract<I> {
    pub fn address(&self) -> Address {
        self.address
    }

    /// ABI-encode a call without sending it.
    pub fn encode<C: InterfaceCall<I>>(&self, call: &C) -> Bytes {
        call.abi_encode().into()
    }

    /// Read-only call.
    pub async fn call<C: InterfaceCall<I>>(&self, call: C) -> Result<C::Return> {
        self.call_from(call, None).await
    }

    /// Read-only call with an explicit sender.
    pub async fn call_from<C: InterfaceCall<I>>(
        &self,
        call: C,
        from: Option<Address>,
    ) -> Result<C::Return> {
        let mut tx = TransactionRequest::call(self.address, call.abi_encode());
        tx.from = from;
        let raw = self.chain.call_raw(&tx).await?;
        Ok(C::abi_decode_returns(&raw, true)?)
    }

    /// Signed, mutating call; resolves once mined.
    pub async fn send<C: InterfaceCall<I>>(
        &self,
        call: C,
        from: Address,
    ) -> Result<TransactionReceipt> {
        log::debug!("Sending {} to {}", C::SIGNATURE, self.address);
        let tx = TransactionRequest::call(self.address, call.abi_encode()).from(from);
        self.chain.send_and_confirm(&tx).await
    }
}
