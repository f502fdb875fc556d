//! Proxy client
//!
//! Resolves the owner's proxy address (CREATE2 through the proxy kit
//! factory) and executes batches through it, deploying the proxy with the
//! first batch when it does not exist yet.
//!
//! # Address derivation
//!
//! ```text
//! salt           = keccak256(abi.encode(owner, salt_nonce))
//! init_code_hash = keccak256(proxy_creation_code ++ abi.encode(master_copy))
//! proxy          = create2(factory, salt, init_code_hash)
//! ```
//!
//! The creation code is fetched from the factory once, when the client is
//! built; every later resolution is a pure function of the owner address.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};

use crate::abi::{CpkFactory, CpkFactoryAbi, GnosisSafe, SafeAbi};
use crate::batch::{Operation, PendingTransactionBatch};
use crate::chain::{ChainClient, Contract, TransactionReceipt};
use crate::config::ProxyKitAddresses;
use crate::error::{CompoundError, Result};

/// Reference to an owner's proxy; the contract may not be deployed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyHandle {
    pub proxy_address: Address,
    pub owner: Address,
}

fn abi_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_slice());
    word
}

/// `keccak256(creation_code ++ abi.encode(master_copy))`
pub fn init_code_hash(creation_code: &[u8], master_copy: Address) -> B256 {
    let mut init_code = Vec::with_capacity(creation_code.len() + 32);
    init_code.extend_from_slice(creation_code);
    init_code.extend_from_slice(&abi_word(master_copy));
    keccak256(init_code)
}

/// `keccak256(abi.encode(owner, salt_nonce))`
pub fn owner_salt(owner: Address, salt_nonce: B256) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(&abi_word(owner));
    preimage[32..].copy_from_slice(salt_nonce.as_slice());
    keccak256(preimage)
}

/// Pre-validated signature accepted when `msg.sender` is the owner:
/// `r = owner`, `s = 0`, `v = 1`.
pub fn owner_signature(owner: Address) -> Bytes {
    let mut signature = Vec::with_capacity(65);
    signature.extend_from_slice(&abi_word(owner));
    signature.extend_from_slice(&[0u8; 32]);
    signature.push(1);
    signature.into()
}

pub struct ProxyClient {
    chain: ChainClient,
    kit: ProxyKitAddresses,
    owner: Address,
    init_code_hash: B256,
}

impl ProxyClient {
    /// Build a client for `owner`, fetching the factory's creation code.
    pub async fn new(chain: ChainClient, owner: Address, kit: ProxyKitAddresses) -> Result<Self> {
        let factory: Contract<CpkFactoryAbi> = chain.contract(kit.factory);
        let creation_code = factory
            .call(CpkFactory::proxyCreationCodeCall {})
            .await?
            ._0;
        if creation_code.is_empty() {
            return Err(CompoundError::Config(format!(
                "factory {} returned empty proxy creation code",
                kit.factory
            )));
        }

        let client = Self::from_creation_code(chain, owner, kit, &creation_code);
        log::info!(
            "🔐 Proxy for {} resolves to {}",
            owner,
            client.handle().proxy_address
        );
        Ok(client)
    }

    /// Build a client from creation code that is already known.
    pub fn from_creation_code(
        chain: ChainClient,
        owner: Address,
        kit: ProxyKitAddresses,
        creation_code: &[u8],
    ) -> Self {
        let init_code_hash = init_code_hash(creation_code, kit.master_copy);
        Self {
            chain,
            kit,
            owner,
            init_code_hash,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Deterministic proxy address for any owner; no network round trip.
    pub fn resolve_proxy(&self, owner: Address) -> ProxyHandle {
        let salt = owner_salt(owner, self.kit.salt_nonce);
        ProxyHandle {
            proxy_address: self.kit.factory.create2(salt.0, self.init_code_hash.0),
            owner,
        }
    }

    /// Handle of the connected owner's proxy.
    pub fn handle(&self) -> ProxyHandle {
        self.resolve_proxy(self.owner)
    }

    pub async fn is_deployed(&self) -> Result<bool> {
        let code = self.chain.code_at(self.handle().proxy_address).await?;
        Ok(!code.is_empty())
    }

    /// Execute the whole batch as one transaction through the proxy.
    ///
    /// Either every call lands or the transaction reverts; a reverted
    /// receipt surfaces as [`CompoundError::Reverted`].
    pub async fn execute(&self, batch: &PendingTransactionBatch) -> Result<TransactionReceipt> {
        let (to, value, data, operation) = match batch.calls() {
            [] => {
                return Err(CompoundError::Input(
                    "cannot execute an empty batch".to_string(),
                ))
            }
            [single] => (
                single.target,
                single.value,
                single.call_data.clone(),
                Operation::Call,
            ),
            _ => (
                self.kit.multi_send,
                U256::ZERO,
                batch.encode_multi_send(),
                Operation::DelegateCall,
            ),
        };

        let handle = self.handle();
        log::info!(
            "📦 Executing {} call(s) through proxy {}",
            batch.len(),
            handle.proxy_address
        );

        if self.is_deployed().await? {
            let safe: Contract<SafeAbi> = self.chain.contract(handle.proxy_address);
            let exec = || GnosisSafe::execTransactionCall {
                to,
                value,
                data: data.clone(),
                operation: operation as u8,
                safeTxGas: U256::ZERO,
                baseGas: U256::ZERO,
                gasPrice: U256::ZERO,
                gasToken: Address::ZERO,
                refundReceiver: Address::ZERO,
                signatures: owner_signature(self.owner),
            };

            let simulated = safe.call_from(exec(), Some(self.owner)).await?._0;
            if !simulated {
                return Err(CompoundError::reverted(
                    None,
                    "proxy reported failure when simulating the batch",
                ));
            }
            safe.send(exec(), self.owner).await
        } else {
            log::info!(
                "🏗️  Proxy {} not deployed yet, deploying with this batch",
                handle.proxy_address
            );
            let factory: Contract<CpkFactoryAbi> = self.chain.contract(self.kit.factory);
            factory
                .send(
                    CpkFactory::createProxyAndExecTransactionCall {
                        masterCopy: self.kit.master_copy,
                        saltNonce: U256::from_be_bytes(self.kit.salt_nonce.0),
                        fallbackHandler: self.kit.fallback_handler,
                        to,
                        value,
                        data,
                        operation: operation as u8,
                    },
                    self.owner,
                )
                .await
        }
    }
}
