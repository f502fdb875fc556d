/// Decoding of signed legacy (EIP-155) transactions

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Decodable, Encodable, Header};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1};

use crate::error::RpcError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: B256,
    pub sender: Address,
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub chain_id: u64,
}

fn invalid(err: impl std::fmt::Display) -> RpcError {
    RpcError::RawTransaction(err.to_string())
}

fn rlp_list(fields: &[&dyn Encodable]) -> Vec<u8> {
    let payload_length: usize = fields.iter().map(|f| f.length()).sum();
    let mut out = Vec::new();
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

/// Decode `rlp([nonce, gasPrice, gas, to, value, data, v, r, s])` and
/// recover the sender.
pub fn decode_raw_transaction(raw: &[u8]) -> Result<SignedTransaction, RpcError> {
    let mut buf = raw;
    let header = Header::decode(&mut buf).map_err(invalid)?;
    if !header.list {
        return Err(invalid("expected an RLP list"));
    }

    let nonce = u64::decode(&mut buf).map_err(invalid)?;
    let gas_price = U256::decode(&mut buf).map_err(invalid)?;
    let gas_limit = u64::decode(&mut buf).map_err(invalid)?;
    let to = Address::decode(&mut buf).map_err(invalid)?;
    let value = U256::decode(&mut buf).map_err(invalid)?;
    let input = Bytes::decode(&mut buf).map_err(invalid)?;
    let v = u64::decode(&mut buf).map_err(invalid)?;
    let r = U256::decode(&mut buf).map_err(invalid)?;
    let s = U256::decode(&mut buf).map_err(invalid)?;

    if v < 35 {
        return Err(invalid("transaction is not replay protected (EIP-155)"));
    }
    let chain_id = (v - 35) / 2;
    let recovery_id = RecoveryId::from_i32((v - 35 - 2 * chain_id) as i32).map_err(invalid)?;

    let signing_hash = keccak256(rlp_list(&[
        &nonce, &gas_price, &gas_limit, &to, &value, &input, &chain_id, &0u8, &0u8,
    ]));

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&r.to_be_bytes::<32>());
    compact[32..].copy_from_slice(&s.to_be_bytes::<32>());
    let signature = RecoverableSignature::from_compact(&compact, recovery_id).map_err(invalid)?;

    let public = Secp256k1::verification_only()
        .recover_ecdsa(&Message::from_digest(signing_hash.0), &signature)
        .map_err(invalid)?;
    let sender = Address::from_slice(&keccak256(&public.serialize_uncompressed()[1..])[12..]);

    Ok(SignedTransaction {
        hash: keccak256(raw),
        sender,
        nonce,
        gas_price,
        gas_limit,
        to,
        value,
        input,
        chain_id,
    })
}
