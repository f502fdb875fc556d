/// In-memory chain state and contract simulation
///
/// Simulates exactly the contracts the money-market flow touches: a DAI
/// token, a cDAI market, the proxy kit factory, the proxies it deploys and
/// the MultiSend library. Every transaction runs against a copy of the state
/// and is committed only if no call reverted.

use alloy_primitives::{address, hex, keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use serde::Serialize;
use std::collections::HashMap;

use crate::abi::{CErc20, CpkFactory, Erc20, GnosisSafe, MultiSend};
use crate::error::{Revert, RpcError};
use crate::raw_tx::decode_raw_transaction;

/// Contract addresses of the local deployment.
pub mod addresses {
    use super::*;

    pub const DAI: Address = address!("00000000000000000000000000000000000da100");
    pub const CDAI: Address = address!("00000000000000000000000000000000000cda10");
    pub const FACTORY: Address = address!("0000000000000000000000000000000000cf0001");
    pub const MASTER_COPY: Address = address!("0000000000000000000000000000000000cf0002");
    pub const MULTI_SEND: Address = address!("0000000000000000000000000000000000cf0003");
    pub const FALLBACK_HANDLER: Address = address!("0000000000000000000000000000000000cf0004");
}

use addresses::*;

/// Returned by the factory's `proxyCreationCode()`.
pub const PROXY_CREATION_CODE: &[u8] = &hex!(
    "608060405234801561001057600080fd5b5060405161016738038061016783398101604081905261002f91"
);

const PROXY_RUNTIME_CODE: &[u8] = &hex!("6080604052600073ffffffffffffffffffffffffffffffffffffffff");
const SYSTEM_CONTRACT_CODE: &[u8] = &hex!("60806040526004361061");

/// First account of the default development mnemonic.
pub const DEV_ACCOUNT: Address = address!("90f8bf6a479f320ead074411a4b0e7944ea8c9c1");

const OP_CALL: u8 = 0;
const OP_DELEGATE_CALL: u8 = 1;

/// CREATE2 address of `owner`'s proxy.
pub fn proxy_address(owner: Address, salt_nonce: U256) -> Address {
    let mut salt_preimage = [0u8; 64];
    salt_preimage[12..32].copy_from_slice(owner.as_slice());
    salt_preimage[32..].copy_from_slice(&salt_nonce.to_be_bytes::<32>());

    let mut init_code = PROXY_CREATION_CODE.to_vec();
    init_code.extend_from_slice(&[0u8; 12]);
    init_code.extend_from_slice(MASTER_COPY.as_slice());

    FACTORY.create2(keccak256(salt_preimage).0, keccak256(init_code).0)
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub chain_id: u64,
    pub network_id: u64,
    pub supply_rate_per_block: U256,
    pub gas_price: U256,
    /// Accounts the node signs for (`eth_sendTransaction`)
    pub accounts: Vec<Address>,
    /// Answer `eth_requestAccounts` with EIP-1193 code 4001
    pub reject_authorization: bool,
    /// `execTransaction` returns `false` when the inner operation fails
    /// (Safe v1.1.1 with a gas budget) instead of reverting
    pub soft_exec_failures: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            chain_id: 1337,
            network_id: 1337,
            // ~6.67% APR at 2,102,400 blocks per year
            supply_rate_per_block: U256::from(31_709_791_983u64),
            gas_price: U256::from(1_000_000_000u64),
            accounts: vec![DEV_ACCOUNT],
            reject_authorization: false,
            soft_exec_failures: false,
        }
    }
}

/// One message call made while executing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedCall {
    /// 0 for the transaction itself
    pub depth: usize,
    pub sender: Address,
    pub target: Address,
    pub delegate: bool,
    pub input: Bytes,
}

impl ExecutedCall {
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).and_then(|s| s.try_into().ok())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinedTransaction {
    pub hash: B256,
    pub block_number: u64,
    pub from: Address,
    pub to: Address,
    pub input: Bytes,
    pub succeeded: bool,
    pub revert_reason: Option<String>,
    /// Empty when the transaction reverted
    pub calls: Vec<ExecutedCall>,
}

impl MinedTransaction {
    /// Non-delegate calls made by `sender` below the top level.
    pub fn inner_calls_from(&self, sender: Address) -> Vec<&ExecutedCall> {
        self.calls
            .iter()
            .filter(|c| c.depth > 0 && c.sender == sender && !c.delegate)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct ChainState {
    dai: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    supplied: HashMap<Address, U256>,
    /// proxy -> owner
    proxies: HashMap<Address, Address>,
    nonces: HashMap<Address, u64>,
}

impl ChainState {
    fn dai_balance(&self, account: Address) -> U256 {
        self.dai.get(&account).copied().unwrap_or_default()
    }

    fn supplied(&self, account: Address) -> U256 {
        self.supplied.get(&account).copied().unwrap_or_default()
    }

    fn move_dai(&mut self, from: Address, to: Address, amount: U256) -> Result<(), Revert> {
        let balance = self.dai_balance(from);
        if balance < amount {
            return Err(Revert::new("Dai/insufficient-balance"));
        }
        self.dai.insert(from, balance - amount);
        *self.dai.entry(to).or_default() += amount;
        Ok(())
    }
}

fn selector(input: &[u8]) -> Result<[u8; 4], Revert> {
    input
        .get(..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| Revert::new("missing function selector"))
}

/// Executes calls against a scratch copy of the state.
struct Vm {
    state: ChainState,
    supply_rate: U256,
    soft_exec_failures: bool,
    trace: Vec<ExecutedCall>,
}

impl Vm {
    fn call(
        &mut self,
        depth: usize,
        sender: Address,
        target: Address,
        value: U256,
        input: &[u8],
    ) -> Result<Vec<u8>, Revert> {
        if !value.is_zero() {
            return Err(Revert::new("ether transfers are not supported"));
        }
        self.trace.push(ExecutedCall {
            depth,
            sender,
            target,
            delegate: false,
            input: Bytes::copy_from_slice(input),
        });

        if target == DAI {
            self.dai(sender, input)
        } else if target == CDAI {
            self.cdai(sender, input)
        } else if target == FACTORY {
            self.factory(depth, sender, input)
        } else if let Some(owner) = self.state.proxies.get(&target).copied() {
            self.proxy(depth, target, owner, sender, input)
        } else if target == MULTI_SEND {
            Err(Revert::new("MultiSend should only be called via delegatecall"))
        } else if input.is_empty() {
            Ok(Vec::new())
        } else {
            Err(Revert::new(format!("no contract at {}", target)))
        }
    }

    fn dai(&mut self, sender: Address, input: &[u8]) -> Result<Vec<u8>, Revert> {
        match selector(input)? {
            Erc20::balanceOfCall::SELECTOR => {
                let call = Erc20::balanceOfCall::abi_decode(input, true)?;
                Ok(self.state.dai_balance(call.owner).abi_encode())
            }
            Erc20::allowanceCall::SELECTOR => {
                let call = Erc20::allowanceCall::abi_decode(input, true)?;
                let allowance = self
                    .state
                    .allowances
                    .get(&(call.owner, call.spender))
                    .copied()
                    .unwrap_or_default();
                Ok(allowance.abi_encode())
            }
            Erc20::approveCall::SELECTOR => {
                let call = Erc20::approveCall::abi_decode(input, true)?;
                self.state
                    .allowances
                    .insert((sender, call.spender), call.amount);
                Ok(true.abi_encode())
            }
            Erc20::transferCall::SELECTOR => {
                let call = Erc20::transferCall::abi_decode(input, true)?;
                self.state.move_dai(sender, call.recipient, call.amount)?;
                Ok(true.abi_encode())
            }
            _ => Err(Revert::new("Dai: unknown function")),
        }
    }

    fn cdai(&mut self, sender: Address, input: &[u8]) -> Result<Vec<u8>, Revert> {
        match selector(input)? {
            CErc20::supplyRatePerBlockCall::SELECTOR => Ok(self.supply_rate.abi_encode()),
            CErc20::balanceOfUnderlyingCall::SELECTOR => {
                let call = CErc20::balanceOfUnderlyingCall::abi_decode(input, true)?;
                Ok(self.state.supplied(call.owner).abi_encode())
            }
            CErc20::mintCall::SELECTOR => {
                let call = CErc20::mintCall::abi_decode(input, true)?;
                let amount = call.mintAmount;
                let allowance = self
                    .state
                    .allowances
                    .get(&(sender, CDAI))
                    .copied()
                    .unwrap_or_default();
                if allowance < amount {
                    return Err(Revert::new("Dai/insufficient-allowance"));
                }
                self.state.allowances.insert((sender, CDAI), allowance - amount);
                self.state.move_dai(sender, CDAI, amount)?;
                *self.state.supplied.entry(sender).or_default() += amount;
                Ok(U256::ZERO.abi_encode())
            }
            CErc20::redeemUnderlyingCall::SELECTOR => {
                let call = CErc20::redeemUnderlyingCall::abi_decode(input, true)?;
                let amount = call.redeemAmount;
                let supplied = self.state.supplied(sender);
                if supplied < amount {
                    return Err(Revert::new("redeem amount exceeds supplied balance"));
                }
                self.state.supplied.insert(sender, supplied - amount);
                self.state.move_dai(CDAI, sender, amount)?;
                Ok(U256::ZERO.abi_encode())
            }
            _ => Err(Revert::new("cDAI: unknown function")),
        }
    }

    fn factory(&mut self, depth: usize, sender: Address, input: &[u8]) -> Result<Vec<u8>, Revert> {
        match selector(input)? {
            CpkFactory::proxyCreationCodeCall::SELECTOR => {
                Ok(Bytes::from_static(PROXY_CREATION_CODE).abi_encode())
            }
            CpkFactory::createProxyAndExecTransactionCall::SELECTOR => {
                let call = CpkFactory::createProxyAndExecTransactionCall::abi_decode(input, true)?;
                if call.masterCopy != MASTER_COPY {
                    return Err(Revert::new("unknown master copy"));
                }
                let proxy = proxy_address(sender, call.saltNonce);
                if self.state.proxies.contains_key(&proxy) {
                    return Err(Revert::new("proxy already deployed"));
                }
                self.state.proxies.insert(proxy, sender);
                log::debug!("Deployed proxy {} for {}", proxy, sender);

                self.operation(depth + 1, proxy, call.operation, call.to, call.value, &call.data)?;
                Ok(true.abi_encode())
            }
            _ => Err(Revert::new("factory: unknown function")),
        }
    }

    fn proxy(
        &mut self,
        depth: usize,
        proxy: Address,
        owner: Address,
        sender: Address,
        input: &[u8],
    ) -> Result<Vec<u8>, Revert> {
        if selector(input)? != GnosisSafe::execTransactionCall::SELECTOR {
            return Err(Revert::new("proxy: unknown function"));
        }
        let call = GnosisSafe::execTransactionCall::abi_decode(input, true)?;

        // Pre-validated signature: r = owner, s = 0, v = 1, msg.sender = owner
        let signatures = &call.signatures;
        if signatures.len() < 65 {
            return Err(Revert::new("GS020: signatures data too short"));
        }
        if signatures[64] != 1 {
            return Err(Revert::new("GS026: unsupported signature type"));
        }
        let signer = Address::from_slice(&signatures[12..32]);
        if signer != owner {
            return Err(Revert::new("GS026: invalid owner provided"));
        }
        if sender != signer {
            return Err(Revert::new("GS025: hash has not been approved"));
        }

        if !self.soft_exec_failures {
            self.operation(depth + 1, proxy, call.operation, call.to, call.value, &call.data)?;
            return Ok(true.abi_encode());
        }

        let checkpoint = (self.state.clone(), self.trace.len());
        match self.operation(depth + 1, proxy, call.operation, call.to, call.value, &call.data) {
            Ok(()) => Ok(true.abi_encode()),
            Err(revert) => {
                log::debug!("execTransaction on {} failed softly: {}", proxy, revert);
                self.state = checkpoint.0;
                self.trace.truncate(checkpoint.1);
                Ok(false.abi_encode())
            }
        }
    }

    fn operation(
        &mut self,
        depth: usize,
        proxy: Address,
        operation: u8,
        target: Address,
        value: U256,
        data: &[u8],
    ) -> Result<(), Revert> {
        match operation {
            OP_CALL => self.call(depth, proxy, target, value, data).map(|_| ()),
            OP_DELEGATE_CALL if target == MULTI_SEND => self.multi_send(depth, proxy, data),
            OP_DELEGATE_CALL => Err(Revert::new(format!(
                "delegatecall into {} is not supported",
                target
            ))),
            other => Err(Revert::new(format!("unknown operation {}", other))),
        }
    }

    /// Unpack `op (1) ++ to (20) ++ value (32) ++ len (32) ++ data` entries
    /// and run them in the proxy's context.
    fn multi_send(&mut self, depth: usize, proxy: Address, input: &[u8]) -> Result<(), Revert> {
        self.trace.push(ExecutedCall {
            depth,
            sender: proxy,
            target: MULTI_SEND,
            delegate: true,
            input: Bytes::copy_from_slice(input),
        });
        let packed = MultiSend::multiSendCall::abi_decode(input, true)?.transactions;

        let mut rest: &[u8] = &packed;
        while !rest.is_empty() {
            if rest.len() < 85 {
                return Err(Revert::new("MultiSend: truncated transaction"));
            }
            let operation = rest[0];
            let target = Address::from_slice(&rest[1..21]);
            let value = U256::from_be_slice(&rest[21..53]);
            let length = U256::from_be_slice(&rest[53..85]);
            if length > U256::from(rest.len() - 85) {
                return Err(Revert::new("MultiSend: data length out of bounds"));
            }
            let end = 85 + length.to::<usize>();
            self.operation(depth + 1, proxy, operation, target, value, &rest[85..end])?;
            rest = &rest[end..];
        }
        Ok(())
    }
}

pub struct Ledger {
    config: LedgerConfig,
    state: ChainState,
    block_number: u64,
    transactions: Vec<MinedTransaction>,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            state: ChainState::default(),
            block_number: 0,
            transactions: Vec::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut LedgerConfig {
        &mut self.config
    }

    pub fn accounts(&self) -> &[Address] {
        &self.config.accounts
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Mint DAI out of thin air.
    pub fn fund(&mut self, account: Address, amount: U256) {
        *self.state.dai.entry(account).or_default() += amount;
        log::info!("💧 Funded {} with {} DAI base units", account, amount);
    }

    pub fn dai_balance(&self, account: Address) -> U256 {
        self.state.dai_balance(account)
    }

    /// DAI supplied to the cDAI market by `account`.
    pub fn supplied(&self, account: Address) -> U256 {
        self.state.supplied(account)
    }

    pub fn proxy_owner(&self, proxy: Address) -> Option<Address> {
        self.state.proxies.get(&proxy).copied()
    }

    pub fn nonce(&self, account: Address) -> u64 {
        self.state.nonces.get(&account).copied().unwrap_or_default()
    }

    pub fn transactions(&self) -> &[MinedTransaction] {
        &self.transactions
    }

    pub fn receipt(&self, hash: B256) -> Option<&MinedTransaction> {
        self.transactions.iter().find(|tx| tx.hash == hash)
    }

    pub fn code_at(&self, account: Address) -> Bytes {
        if self.state.proxies.contains_key(&account) {
            Bytes::from_static(PROXY_RUNTIME_CODE)
        } else if [DAI, CDAI, FACTORY, MASTER_COPY, MULTI_SEND, FALLBACK_HANDLER].contains(&account)
        {
            Bytes::from_static(SYSTEM_CONTRACT_CODE)
        } else {
            Bytes::new()
        }
    }

    fn vm(&self) -> Vm {
        Vm {
            state: self.state.clone(),
            supply_rate: self.config.supply_rate_per_block,
            soft_exec_failures: self.config.soft_exec_failures,
            trace: Vec::new(),
        }
    }

    /// `eth_call`: execute and discard.
    pub fn call(
        &self,
        from: Address,
        to: Address,
        value: U256,
        input: &[u8],
    ) -> Result<Bytes, Revert> {
        self.vm().call(0, from, to, value, input).map(Bytes::from)
    }

    pub fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
        input: &[u8],
    ) -> Result<u64, Revert> {
        let mut vm = self.vm();
        vm.call(0, from, to, value, input)?;
        Ok(21_000 + 16 * input.len() as u64 + 40_000 * vm.trace.len() as u64)
    }

    /// Transaction from an account the node holds keys for.
    pub fn send_transaction(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
        input: Bytes,
    ) -> Result<B256, RpcError> {
        if !self.config.accounts.contains(&from) {
            return Err(RpcError::UnknownAccount(from));
        }
        let mut preimage = from.to_vec();
        preimage.extend_from_slice(&self.nonce(from).to_be_bytes());
        preimage.extend_from_slice(to.as_slice());
        preimage.extend_from_slice(&input);
        let hash = keccak256(preimage);

        Ok(self.mine(hash, from, to, value, input))
    }

    /// Signed legacy transaction (EIP-155).
    pub fn send_raw_transaction(&mut self, raw: &[u8]) -> Result<B256, RpcError> {
        let tx = decode_raw_transaction(raw)?;
        if tx.chain_id != self.config.chain_id {
            return Err(RpcError::RawTransaction(format!(
                "chain id {} does not match {}",
                tx.chain_id, self.config.chain_id
            )));
        }
        let expected = self.nonce(tx.sender);
        if tx.nonce != expected {
            return Err(RpcError::Nonce {
                expected,
                got: tx.nonce,
            });
        }
        log::debug!("Raw transaction from {} (nonce {})", tx.sender, tx.nonce);
        Ok(self.mine(tx.hash, tx.sender, tx.to, tx.value, tx.input))
    }

    /// Include a transaction in a new block. The nonce is consumed even if
    /// execution reverts.
    fn mine(&mut self, hash: B256, from: Address, to: Address, value: U256, input: Bytes) -> B256 {
        *self.state.nonces.entry(from).or_default() += 1;
        self.block_number += 1;

        let mut vm = self.vm();
        let (succeeded, revert_reason, calls) = match vm.call(0, from, to, value, &input) {
            Ok(_) => {
                self.state = vm.state;
                (true, None, vm.trace)
            }
            Err(revert) => {
                log::info!("⛔ Transaction {} reverted: {}", hash, revert);
                (false, Some(revert.reason), Vec::new())
            }
        };
        log::info!(
            "⛏️  Block {}: {} -> {} ({})",
            self.block_number,
            from,
            to,
            if succeeded { "ok" } else { "reverted" }
        );

        self.transactions.push(MinedTransaction {
            hash,
            block_number: self.block_number,
            from,
            to,
            input,
            succeeded,
            revert_reason,
            calls,
        });
        hash
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Address = DEV_ACCOUNT;
    const SALT_NONCE: U256 = U256::from_limbs([7, 0, 0, 0]);

    fn dai(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn packed(calls: &[(Address, Vec<u8>)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (to, data) in calls {
            out.push(OP_CALL);
            out.extend_from_slice(to.as_slice());
            out.extend_from_slice(&[0u8; 32]);
            out.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());
            out.extend_from_slice(data);
        }
        out
    }

    fn deposit_batch(amount: U256) -> Vec<u8> {
        let approve = Erc20::approveCall {
            spender: CDAI,
            amount,
        }
        .abi_encode();
        let mint = CErc20::mintCall { mintAmount: amount }.abi_encode();
        MultiSend::multiSendCall {
            transactions: packed(&[(DAI, approve), (CDAI, mint)]).into(),
        }
        .abi_encode()
    }

    fn create_and_exec(data: Vec<u8>) -> Bytes {
        CpkFactory::createProxyAndExecTransactionCall {
            masterCopy: MASTER_COPY,
            saltNonce: SALT_NONCE,
            fallbackHandler: FALLBACK_HANDLER,
            to: MULTI_SEND,
            value: U256::ZERO,
            data: data.into(),
            operation: OP_DELEGATE_CALL,
        }
        .abi_encode()
        .into()
    }

    #[test]
    fn test_deploy_and_batch_deposit() {
        let mut ledger = Ledger::default();
        let proxy = proxy_address(OWNER, SALT_NONCE);
        ledger.fund(proxy, dai(100));

        let hash = ledger
            .send_transaction(OWNER, FACTORY, U256::ZERO, create_and_exec(deposit_batch(dai(100))))
            .unwrap();

        let tx = ledger.receipt(hash).unwrap();
        assert!(tx.succeeded);
        assert_eq!(ledger.proxy_owner(proxy), Some(OWNER));
        assert_eq!(ledger.supplied(proxy), dai(100));
        assert_eq!(ledger.dai_balance(proxy), U256::ZERO);
        assert_eq!(ledger.dai_balance(CDAI), dai(100));

        let inner = tx.inner_calls_from(proxy);
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[0].selector(), Some(Erc20::approveCall::SELECTOR));
        assert_eq!(inner[1].selector(), Some(CErc20::mintCall::SELECTOR));
        assert!(!ledger.code_at(proxy).is_empty());
    }

    #[test]
    fn test_failed_batch_rolls_back_everything() {
        let mut ledger = Ledger::default();
        let proxy = proxy_address(OWNER, SALT_NONCE);
        ledger.fund(proxy, dai(10));

        // mint of 100 fails after the approval already ran
        let hash = ledger
            .send_transaction(OWNER, FACTORY, U256::ZERO, create_and_exec(deposit_batch(dai(100))))
            .unwrap();

        let tx = ledger.receipt(hash).unwrap();
        assert!(!tx.succeeded);
        assert_eq!(tx.revert_reason.as_deref(), Some("Dai/insufficient-balance"));
        assert_eq!(ledger.proxy_owner(proxy), None);
        assert_eq!(ledger.dai_balance(proxy), dai(10));
        assert_eq!(ledger.nonce(OWNER), 1);
        assert!(ledger
            .call(OWNER, DAI, U256::ZERO, &Erc20::allowanceCall { owner: proxy, spender: CDAI }.abi_encode())
            .unwrap()
            .iter()
            .all(|b| *b == 0));
    }

    #[test]
    fn test_exec_transaction_requires_owner() {
        let mut ledger = Ledger::default();
        let stranger = address!("00000000000000000000000000000000000000bb");
        ledger.config_mut().accounts.push(stranger);
        let proxy = proxy_address(OWNER, SALT_NONCE);

        let noop = Erc20::approveCall {
            spender: CDAI,
            amount: U256::ZERO,
        }
        .abi_encode();
        let deploy = CpkFactory::createProxyAndExecTransactionCall {
            masterCopy: MASTER_COPY,
            saltNonce: SALT_NONCE,
            fallbackHandler: FALLBACK_HANDLER,
            to: DAI,
            value: U256::ZERO,
            data: noop.clone().into(),
            operation: OP_CALL,
        }
        .abi_encode();
        ledger
            .send_transaction(OWNER, FACTORY, U256::ZERO, deploy.into())
            .unwrap();

        let mut signature = vec![0u8; 65];
        signature[12..32].copy_from_slice(OWNER.as_slice());
        signature[64] = 1;
        let exec = GnosisSafe::execTransactionCall {
            to: DAI,
            value: U256::ZERO,
            data: noop.into(),
            operation: OP_CALL,
            safeTxGas: U256::ZERO,
            baseGas: U256::ZERO,
            gasPrice: U256::ZERO,
            gasToken: Address::ZERO,
            refundReceiver: Address::ZERO,
            signatures: signature.into(),
        }
        .abi_encode();

        let err = ledger.call(stranger, proxy, U256::ZERO, &exec).unwrap_err();
        assert!(err.reason.starts_with("GS025"));
        let ok = ledger.call(OWNER, proxy, U256::ZERO, &exec).unwrap();
        assert_eq!(ok, Bytes::from(true.abi_encode()));
    }

    #[test]
    fn test_soft_exec_failure_returns_false_and_undoes_inner_calls() {
        let mut ledger = Ledger::new(LedgerConfig {
            soft_exec_failures: true,
            ..LedgerConfig::default()
        });
        let proxy = proxy_address(OWNER, SALT_NONCE);
        ledger.fund(proxy, dai(10));
        ledger
            .send_transaction(OWNER, FACTORY, U256::ZERO, create_and_exec(deposit_batch(dai(10))))
            .unwrap();

        let mut signature = vec![0u8; 65];
        signature[12..32].copy_from_slice(OWNER.as_slice());
        signature[64] = 1;
        // approve lands, mint of 50 cannot
        let exec = GnosisSafe::execTransactionCall {
            to: MULTI_SEND,
            value: U256::ZERO,
            data: deposit_batch(dai(50)).into(),
            operation: OP_DELEGATE_CALL,
            safeTxGas: U256::ZERO,
            baseGas: U256::ZERO,
            gasPrice: U256::ZERO,
            gasToken: Address::ZERO,
            refundReceiver: Address::ZERO,
            signatures: signature.into(),
        }
        .abi_encode();

        let output = ledger.call(OWNER, proxy, U256::ZERO, &exec).unwrap();
        assert_eq!(output, Bytes::from(false.abi_encode()));

        let hash = ledger
            .send_transaction(OWNER, proxy, U256::ZERO, exec.into())
            .unwrap();
        let tx = ledger.receipt(hash).unwrap();
        assert!(tx.succeeded);
        assert!(tx.inner_calls_from(proxy).is_empty());
        assert_eq!(ledger.supplied(proxy), dai(10));
        assert!(ledger
            .call(OWNER, DAI, U256::ZERO, &Erc20::allowanceCall { owner: proxy, spender: CDAI }.abi_encode())
            .unwrap()
            .iter()
            .all(|b| *b == 0));
    }

    #[test]
    fn test_multi_send_cannot_be_called_directly() {
        let ledger = Ledger::default();
        let err = ledger
            .call(OWNER, MULTI_SEND, U256::ZERO, &deposit_batch(dai(1)))
            .unwrap_err();
        assert!(err.reason.contains("delegatecall"));
    }

    #[test]
    fn test_unknown_sender_is_refused() {
        let mut ledger = Ledger::default();
        let stranger = address!("00000000000000000000000000000000000000bb");
        assert!(matches!(
            ledger.send_transaction(stranger, DAI, U256::ZERO, Bytes::new()),
            Err(RpcError::UnknownAccount(_))
        ));
    }
}
