//! Pending transaction batches
//!
//! A batch is an ordered list of sub-calls built fresh for one user action
//! and submitted as a unit. The second call of each money-market batch relies
//! on state set up by the first (approval before mint, redemption before
//! transfer), so order is part of the contract.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;

use crate::abi::{CErc20, Erc20, MultiSend};
use crate::config::MarketAddresses;

/// Safe operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    Call = 0,
    DelegateCall = 1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCall {
    pub target: Address,
    pub value: U256,
    pub call_data: Bytes,
}

impl BatchCall {
    pub fn new<C: SolCall>(target: Address, call: &C) -> Self {
        Self {
            target,
            value: U256::ZERO,
            call_data: call.abi_encode().into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTransactionBatch {
    calls: Vec<BatchCall>,
}

impl PendingTransactionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_call(mut self, call: BatchCall) -> Self {
        self.calls.push(call);
        self
    }

    /// `[approve(spender = cDAI, amount), mint(amount)]`
    pub fn deposit(market: &MarketAddresses, amount: U256) -> Self {
        Self::new()
            .with_call(BatchCall::new(
                market.dai,
                &Erc20::approveCall {
                    spender: market.cdai,
                    amount,
                },
            ))
            .with_call(BatchCall::new(
                market.cdai,
                &CErc20::mintCall { mintAmount: amount },
            ))
    }

    /// `[redeemUnderlying(amount), transfer(recipient = owner, amount)]`
    pub fn withdraw(market: &MarketAddresses, owner: Address, amount: U256) -> Self {
        Self::new()
            .with_call(BatchCall::new(
                market.cdai,
                &CErc20::redeemUnderlyingCall {
                    redeemAmount: amount,
                },
            ))
            .with_call(BatchCall::new(
                market.dai,
                &Erc20::transferCall {
                    recipient: owner,
                    amount,
                },
            ))
    }

    pub fn calls(&self) -> &[BatchCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Packed MultiSend payload:
    /// `operation (1) ++ to (20) ++ value (32) ++ data length (32) ++ data`
    /// per call, wrapped in a `multiSend(bytes)` call.
    pub fn encode_multi_send(&self) -> Bytes {
        let mut packed = Vec::new();
        for call in &self.calls {
            packed.push(Operation::Call as u8);
            packed.extend_from_slice(call.target.as_slice());
            packed.extend_from_slice(&call.value.to_be_bytes::<32>());
            packed.extend_from_slice(&U256::from(call.call_data.len()).to_be_bytes::<32>());
            packed.extend_from_slice(&call.call_data);
        }
        MultiSend::multiSendCall {
            transactions: packed.into(),
        }
        .abi_encode()
        .into()
    }
}

/// Amount the owner must move to the position holder before a deposit, if
/// any: `requested - available` when the holder is short.
pub fn top_up_amount(available: U256, requested: U256) -> Option<U256> {
    (available < requested).then(|| requested - available)
}
