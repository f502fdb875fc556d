use alloy_primitives::{keccak256, Address, Bytes, B256, U256, U64};
use alloy_rlp::{Encodable, Header};
use async_trait::async_trait;
use secp256k1::{Message, Secp256k1, SecretKey};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::types::TransactionRequest;
use super::Provider;
use crate::error::{CompoundError, Result};

/// Pre-EIP-2718 transaction signed with EIP-155 replay protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub chain_id: u64,
}

fn encode_list(fields: &[&dyn Encodable]) -> Vec<u8> {
    let payload_length: usize = fields.iter().map(|f| f.length()).sum();
    let mut out = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut out);
    for field in fields {
        field.encode(&mut out);
    }
    out
}

impl LegacyTransaction {
    /// Hash signed by the sender: `keccak(rlp([..fields, chain_id, 0, 0]))`.
    pub fn signing_hash(&self) -> B256 {
        keccak256(encode_list(&[
            &self.nonce,
            &self.gas_price,
            &self.gas_limit,
            &self.to,
            &self.value,
            &self.input,
            &self.chain_id,
            &0u8,
            &0u8,
        ]))
    }

    /// Sign and return the raw transaction bytes for `eth_sendRawTransaction`.
    pub fn sign(&self, key: &SecretKey) -> Bytes {
        let secp = Secp256k1::new();
        let message = Message::from_digest(self.signing_hash().0);
        let signature = secp.sign_ecdsa_recoverable(&message, key);
        let (recovery_id, compact) = signature.serialize_compact();

        let v = recovery_id.to_i32() as u64 + 35 + 2 * self.chain_id;
        let r = U256::from_be_slice(&compact[..32]);
        let s = U256::from_be_slice(&compact[32..]);

        encode_list(&[
            &self.nonce,
            &self.gas_price,
            &self.gas_limit,
            &self.to,
            &self.value,
            &self.input,
            &v,
            &r,
            &s,
        ])
        .into()
    }
}

/// Ethereum address controlled by a secp256k1 key.
pub fn address_of(key: &SecretKey) -> Address {
    let secp = Secp256k1::new();
    let public = key.public_key(&secp).serialize_uncompressed();
    Address::from_slice(&keccak256(&public[1..])[12..])
}

/// Parse a hex private key, with or without `0x`.
pub fn parse_private_key(hex_key: &str) -> Result<SecretKey> {
    let raw = hex::decode(hex_key.trim().trim_start_matches("0x"))
        .map_err(|e| CompoundError::Config(format!("private key is not hex: {}", e)))?;
    SecretKey::from_slice(&raw)
        .map_err(|e| CompoundError::Config(format!("invalid private key: {}", e)))
}

/// Remote endpoint plus a locally held key.
///
/// Answers account requests with the key's address and turns
/// `eth_sendTransaction` into a locally signed `eth_sendRawTransaction`.
/// Every other method is forwarded to the transport untouched.
pub struct KeySessionProvider {
    transport: Arc<dyn Provider>,
    signing_key: SecretKey,
    address: Address,
    chain_id: OnceCell<u64>,
}

impl KeySessionProvider {
    pub fn new(transport: Arc<dyn Provider>, signing_key: SecretKey) -> Self {
        let address = address_of(&signing_key);
        Self {
            transport,
            signing_key,
            address,
            chain_id: OnceCell::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> Result<u64> {
        self.chain_id
            .get_or_try_init(|| async {
                let raw = self.transport.request("eth_chainId", json!([])).await?;
                let id: U64 = serde_json::from_value(raw)?;
                Ok::<u64, CompoundError>(id.to::<u64>())
            })
            .await
            .copied()
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<U256> {
        let raw = self.transport.request(method, params).await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Quantity that must fit a `u64` (nonce, gas).
    async fn small_quantity(&self, method: &str, params: Value) -> Result<u64> {
        let value = self.quantity(method, params).await?;
        u64::try_from(value).map_err(|_| {
            CompoundError::provider(format!("{} returned out-of-range quantity {}", method, value))
        })
    }

    async fn send_transaction(&self, params: Value) -> Result<Value> {
        let request: TransactionRequest = params
            .get(0)
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| CompoundError::provider("eth_sendTransaction without a transaction"))?;

        if let Some(from) = request.from {
            if from != self.address {
                return Err(CompoundError::SignatureRejected(format!(
                    "session key controls {}, not {}",
                    self.address, from
                )));
            }
        }
        let to = request.to.ok_or_else(|| {
            CompoundError::provider("contract creation is not supported by the key session")
        })?;

        let nonce = match request.nonce {
            Some(n) => n.to::<u64>(),
            None => {
                self.small_quantity(
                    "eth_getTransactionCount",
                    json!([self.address, "pending"]),
                )
                .await?
            }
        };
        let gas_price = match request.gas_price {
            Some(p) => p,
            None => self.quantity("eth_gasPrice", json!([])).await?,
        };
        let gas_limit = match request.gas {
            Some(g) => g.to::<u64>(),
            None => {
                let estimate_request = TransactionRequest {
                    from: Some(self.address),
                    ..request.clone()
                };
                self.small_quantity("eth_estimateGas", json!([estimate_request]))
                    .await?
            }
        };

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to,
            value: request.value.unwrap_or_default(),
            input: request.data.unwrap_or_default(),
            chain_id: self.chain_id().await?,
        };
        log::debug!(
            "Signing transaction nonce={} to={} chain={}",
            tx.nonce,
            tx.to,
            tx.chain_id
        );

        let raw = tx.sign(&self.signing_key);
        self.transport
            .request("eth_sendRawTransaction", json!([raw]))
            .await
    }
}

#[async_trait]
impl Provider for KeySessionProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        match method {
            "eth_accounts" | "eth_requestAccounts" => Ok(json!([self.address])),
            "eth_sendTransaction" => self.send_transaction(params).await,
            _ => self.transport.request(method, params).await,
        }
    }

    fn label(&self) -> String {
        format!("key session {} via {}", self.address, self.transport.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    // Well-known development key (first account of the default test mnemonic)
    const DEV_KEY: &str = "0x4f3edf983ac636a65a842ce7c78d9aa706d3b113bce9c46f30d7d21715b23b1d";

    #[test]
    fn test_address_derivation() {
        let key = parse_private_key(DEV_KEY).unwrap();
        assert_eq!(
            address_of(&key),
            address!("90f8bf6a479f320ead074411a4b0e7944ea8c9c1")
        );
    }

    #[test]
    fn test_parse_private_key_rejects_garbage() {
        assert!(matches!(
            parse_private_key("not-hex"),
            Err(CompoundError::Config(_))
        ));
        assert!(matches!(
            parse_private_key("0x00"),
            Err(CompoundError::Config(_))
        ));
    }

    /// Node that answers every quantity with `gas_estimate` for gas and zero otherwise.
    struct StubNode {
        gas_estimate: &'static str,
    }

    #[async_trait]
    impl Provider for StubNode {
        async fn request(&self, method: &str, _params: Value) -> Result<Value> {
            match method {
                "eth_estimateGas" => Ok(json!(self.gas_estimate)),
                "eth_getTransactionCount" | "eth_gasPrice" => Ok(json!("0x0")),
                "eth_chainId" => Ok(json!("0x539")),
                "eth_sendRawTransaction" => Ok(json!(B256::ZERO)),
                other => Err(CompoundError::provider(format!("unexpected {}", other))),
            }
        }

        fn label(&self) -> String {
            "stub".to_string()
        }
    }

    fn transfer_request(session: &KeySessionProvider) -> Value {
        json!([{
            "from": session.address(),
            "to": address!("3535353535353535353535353535353535353535"),
            "data": "0x"
        }])
    }

    #[tokio::test]
    async fn test_oversized_gas_estimate_is_a_provider_error() {
        let session = KeySessionProvider::new(
            Arc::new(StubNode {
                gas_estimate: "0x100000000000000000000",
            }),
            parse_private_key(DEV_KEY).unwrap(),
        );

        let err = session
            .request("eth_sendTransaction", transfer_request(&session))
            .await
            .unwrap_err();
        assert!(matches!(err, CompoundError::Provider(_)));
        assert!(err.to_string().contains("eth_estimateGas"));
    }

    #[tokio::test]
    async fn test_session_signs_with_estimated_gas() {
        let session = KeySessionProvider::new(
            Arc::new(StubNode {
                gas_estimate: "0x5208",
            }),
            parse_private_key(DEV_KEY).unwrap(),
        );

        let hash = session
            .request("eth_sendTransaction", transfer_request(&session))
            .await
            .unwrap();
        assert_eq!(hash, json!(B256::ZERO));
    }

    #[test]
    fn test_signed_transaction_recovers_sender() {
        use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};

        let key = parse_private_key(DEV_KEY).unwrap();
        let tx = LegacyTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21_000,
            to: address!("3535353535353535353535353535353535353535"),
            value: U256::from(1_000_000_000_000_000_000u64),
            input: Bytes::new(),
            chain_id: 1,
        };
        let raw = tx.sign(&key);

        let mut buf: &[u8] = raw.as_ref();
        let header = Header::decode(&mut buf).unwrap();
        assert!(header.list);
        let _nonce = <u64 as alloy_rlp::Decodable>::decode(&mut buf).unwrap();
        let _gas_price = <U256 as alloy_rlp::Decodable>::decode(&mut buf).unwrap();
        let _gas = <u64 as alloy_rlp::Decodable>::decode(&mut buf).unwrap();
        let _to = <Address as alloy_rlp::Decodable>::decode(&mut buf).unwrap();
        let _value = <U256 as alloy_rlp::Decodable>::decode(&mut buf).unwrap();
        let _input = <Bytes as alloy_rlp::Decodable>::decode(&mut buf).unwrap();
        let v = <u64 as alloy_rlp::Decodable>::decode(&mut buf).unwrap();
        let r = <U256 as alloy_rlp::Decodable>::decode(&mut buf).unwrap();
        let s = <U256 as alloy_rlp::Decodable>::decode(&mut buf).unwrap();
        assert!(buf.is_empty());
        assert!(v == 37 || v == 38);

        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&r.to_be_bytes::<32>());
        compact[32..].copy_from_slice(&s.to_be_bytes::<32>());
        let recovery_id = RecoveryId::from_i32((v - 37) as i32).unwrap();
        let signature = RecoverableSignature::from_compact(&compact, recovery_id).unwrap();

        let secp = Secp256k1::new();
        let message = Message::from_digest(tx.signing_hash().0);
        let public = secp.recover_ecdsa(&message, &signature).unwrap();
        let recovered =
            Address::from_slice(&keccak256(&public.serialize_uncompressed()[1..])[12..]);
        assert_eq!(recovered, address_of(&key));
    }
}
